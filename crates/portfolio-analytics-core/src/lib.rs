pub mod analytics;
pub mod config;
pub mod error;
pub mod market_data;
pub mod random;
pub mod types;

#[cfg(feature = "optimization")]
pub mod optimization;

#[cfg(feature = "simulation")]
pub mod simulation;

#[cfg(feature = "black_litterman")]
pub mod black_litterman;

#[cfg(feature = "stress_testing")]
pub mod stress_testing;

pub use config::EngineConfig;
pub use error::{AnalyticsError, ErrorKind, ErrorResponse};
pub use types::*;

/// Standard result type for all engine operations
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;
