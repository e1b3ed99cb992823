use crate::transport::TransportBackend;

use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Worker count and per-user limit are positive
/// - Per-user limit does not exceed the global in-flight limit
/// - Progress `min_delta` lies in [0, 1]
/// - The Telegram backend has a bot token
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

    if config.server.port == 0 {
        return invalid("server.port cannot be 0");
    }

    let scheduler = &config.scheduler;
    if scheduler.workers == 0 {
        return invalid("scheduler.workers must be at least 1");
    }
    if scheduler.per_user_limit == 0 {
        return invalid("scheduler.per_user_limit must be at least 1");
    }
    if scheduler.per_user_limit > scheduler.max_in_flight {
        return invalid("scheduler.per_user_limit cannot exceed scheduler.max_in_flight");
    }

    let min_delta = config.progress.min_delta;
    if !(0.0..=1.0).contains(&min_delta) {
        return invalid("progress.min_delta must be between 0 and 1");
    }

    match config.transport.backend {
        TransportBackend::Telegram => match &config.transport.telegram {
            Some(telegram) if !telegram.bot_token.trim().is_empty() => {}
            _ => return invalid("transport.telegram.bot_token is required"),
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    fn config() -> Config {
        load_config_from_str(
            r#"
[transport]
backend = "telegram"

[transport.telegram]
bot_token = "123:abc"
"#,
        )
        .unwrap()
    }

    fn assert_invalid(config: &Config, needle: &str) {
        let err = validate_config(config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        assert!(err.to_string().contains(needle), "{}", err);
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&config()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = config();
        config.server.port = 0;
        assert_invalid(&config, "server.port");
    }

    #[test]
    fn test_validate_scheduler_limits() {
        let mut c = config();
        c.scheduler.workers = 0;
        assert_invalid(&c, "workers");

        let mut c = config();
        c.scheduler.per_user_limit = 0;
        assert_invalid(&c, "per_user_limit");

        let mut c = config();
        c.scheduler.max_in_flight = 2;
        c.scheduler.per_user_limit = 3;
        assert_invalid(&c, "max_in_flight");
    }

    #[test]
    fn test_validate_min_delta() {
        let mut c = config();
        c.progress.min_delta = 1.5;
        assert_invalid(&c, "min_delta");
    }

    #[test]
    fn test_validate_missing_token() {
        let mut c = config();
        c.transport.telegram = None;
        assert_invalid(&c, "bot_token");

        let mut c = config();
        if let Some(telegram) = c.transport.telegram.as_mut() {
            telegram.bot_token = "  ".to_string();
        }
        assert_invalid(&c, "bot_token");
    }
}
