//! Sinks against a local HTTP listener and a real child process.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use fleetmend_core::TelemetryPayload;
use fleetmend_telemetry::{TelemetryFeedback, TelemetrySink, WebhookSink};

fn payload() -> TelemetryPayload {
    TelemetryPayload {
        server_name: "web-01".into(),
        timestamp: Utc::now(),
        error_type: "NetworkConnectionFailure".into(),
        action: "REM_NET_FLUSH_DNS".into(),
        outcome: "success".into(),
        context: serde_json::json!({"matchedItemCount": 2}),
    }
}

/// Serve one request, answering with `status` and `body`. Returns the raw request.
async fn serve_once(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/outcomes", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&raw);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|l| {
                        let (k, v) = l.split_once(':')?;
                        k.eq_ignore_ascii_case("content-length").then(|| v.trim().parse::<usize>().ok())?
                    })
                    .unwrap_or(0);
                if raw.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        String::from_utf8_lossy(&raw).into_owned()
    });
    (url, handle)
}

#[tokio::test]
async fn webhook_posts_payload_and_reads_ack() {
    let (url, server) = serve_once("200 OK", r#"{"pendingRetrainRequests":[{"model":"m"}]}"#).await;
    let headers = HashMap::from([("X-Fleet".to_string(), "yes".to_string())]);
    let sink = WebhookSink::new(&url, headers, Duration::from_secs(5)).unwrap();
    let feedback = TelemetryFeedback::new(Box::new(sink));

    let response = feedback.report(&payload()).await.unwrap();
    assert_eq!(response.pending_retrain_requests.len(), 1);

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /outcomes"));
    assert!(request.to_ascii_lowercase().contains("x-fleet: yes"));
    assert!(request.contains(r#""serverName":"web-01""#));
}

#[tokio::test]
async fn webhook_error_status_is_an_error() {
    let (url, server) = serve_once("503 Service Unavailable", "busy").await;
    let sink = WebhookSink::new(&url, HashMap::new(), Duration::from_secs(5)).unwrap();
    assert!(sink.send(&payload()).await.is_err());
    server.await.unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn process_sink_round_trip() {
    use fleetmend_telemetry::ProcessSink;

    let sink = ProcessSink::new(
        r#"grep -q '"action":"REM_NET_FLUSH_DNS"' && echo '{"status":"ok"}'"#,
        Duration::from_secs(5),
    );
    let response = TelemetryFeedback::new(Box::new(sink)).report(&payload()).await.unwrap();
    assert_eq!(response.status.as_deref(), Some("ok"));

    let failing = ProcessSink::new("exit 1", Duration::from_secs(5));
    assert!(TelemetryFeedback::new(Box::new(failing)).report(&payload()).await.is_none());
}
