pub mod consumer;
pub mod model;
pub mod subprocess;

pub use consumer::{PredictionConsumer, PredictionOptions};
pub use model::{ModelError, ModelInput, ModelOutput, PredictiveModel};
pub use subprocess::SubprocessModel;
