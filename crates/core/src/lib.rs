pub mod action;
pub mod config;
pub mod error;
pub mod finding;
pub mod process;
pub mod record;
pub mod summary;
pub mod telemetry;

pub use action::*;
pub use config::Config;
pub use error::*;
pub use finding::*;
pub use record::*;
pub use summary::*;
pub use telemetry::*;
