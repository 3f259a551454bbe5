mod app;
mod client;
mod config;
mod scenario;
mod sink;
mod validation;

#[cfg(test)]
mod test_support;

pub use app::{AppError, AppResult};
pub use client::{ClientError, ClientResult};
pub use config::ConfigError;
pub use scenario::ScenarioError;
pub use sink::SinkError;
pub use validation::ValidationError;
