pub mod executor;
pub mod metrics;
pub mod server;
pub mod slot;
pub mod telemetry;

pub use executor::PredictionExecutor;
pub use metrics::{MetricsServer, ServingMetrics};
pub use server::{router, ApiServer, AppState, ServerConfig, PROCESS_TIME_HEADER};
pub use slot::ModelSlot;
pub use telemetry::{AuditEntry, AuditSink, MemorySink, TracingSink};
