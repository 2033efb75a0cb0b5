//! The `utils` module provides definitions shared across `linepub`:
//! the error taxonomy and logging initialisation.

pub mod error;
pub mod logging;

pub use error::{AdminError, LinepubError, Result};

#[cfg(test)]
mod tests {
    use super::error::{AdminError, LinepubError};
    use super::logging;

    #[test]
    fn logging_init_accepts_levels() {
        // Should not panic
        logging::init("info");
        logging::init("debug");
        logging::init("warn");
    }

    #[test]
    fn parse_level_falls_back_to_info() {
        assert_eq!(logging::parse_level("WARNING"), tracing::Level::WARN);
        assert_eq!(logging::parse_level("trace"), tracing::Level::TRACE);
        assert_eq!(logging::parse_level("verbose"), tracing::Level::INFO);
    }

    #[test]
    fn admin_error_converts_into_fatal_error() {
        let err: LinepubError = AdminError::MissingTopic("orders".to_string()).into();
        assert_eq!(err.to_string(), "topic 'orders' does not exist");
    }
}
