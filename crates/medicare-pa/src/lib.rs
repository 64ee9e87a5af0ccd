pub mod config;
pub mod datasets;
pub mod error;
pub mod identifiers;
pub mod registry;
pub mod telemetry;
pub mod workflows;

pub use error::AppError;
