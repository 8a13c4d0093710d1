pub mod data;
pub mod error;
pub mod factors;
pub mod modeling;
pub mod models;
pub mod registry;
pub mod serving;
pub mod training;
pub mod validation;

pub use data::{generate, load_csv, save_csv, summarize, ClaimRecord};
pub use error::{ModelLoadError, PredictionError, RegistryError, ServeError};
pub use factors::{Gender, RatingFactors, Region};
pub use modeling::{LoadedModel, ModelArtifact, Regressor};
pub use models::{HealthStatus, ModelInfo, PredictionInput, PredictionOutput};
pub use registry::{LocalRegistry, ModelRef, ModelResolver, RegistryClient, Stage};
pub use serving::{
    ApiServer, AuditSink, MetricsServer, PredictionExecutor, ServerConfig, ServingMetrics,
    TracingSink,
};
pub use training::{train, TrainConfig, TrainOutcome};
pub use validation::InputValidator;
