pub mod assets;
pub mod companion;
pub mod dispatch;
mod error;
pub mod generator;
pub mod geometry;
pub mod menu;
pub mod metrics;
pub mod pipeline;
pub mod probe;
pub mod settings;
pub mod speech;
mod utils;

#[cfg(feature = "shell")]
mod commands;
#[cfg(feature = "shell")]
mod shell;
#[cfg(feature = "shell")]
mod state;

#[cfg(test)]
mod test_utils;

pub use error::AppError;
#[cfg(feature = "shell")]
pub use shell::run;

/// Installs the global `tracing` subscriber. `RUST_LOG` overrides the
/// default `info` filter.
pub fn init_logging() -> Result<(), AppError> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| AppError::LoggingInit(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::init_logging;

    #[test]
    fn second_logging_init_reports_error() {
        let _ = init_logging();
        assert!(init_logging().is_err());
    }
}
