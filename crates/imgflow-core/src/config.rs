//! Pipeline configuration.
//!
//! The three mail settings have no defaults and must come from the
//! environment (`SES_REGION`, `SES_EMAIL_FROM`, `SES_EMAIL_TO`); the queue
//! tuning defaults match the deployed stack. Validation happens once, in
//! [`PipelineConfig::new`], so a bad value stops the process before it serves
//! anything.

use std::time::Duration;

use thiserror::Error;

pub const ENV_REGION: &str = "SES_REGION";
pub const ENV_EMAIL_FROM: &str = "SES_EMAIL_FROM";
pub const ENV_EMAIL_TO: &str = "SES_EMAIL_TO";

/// Largest batch a single poll may ask for.
pub const MAX_BATCH_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be set and non-empty")]
    Missing(&'static str),

    #[error("{field} is not an email address: {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be between 1 and 10, got {value}")]
    InvalidBatchSize { field: &'static str, value: usize },

    #[error("max receive count must be at least 1")]
    InvalidMaxReceiveCount,

    #[error("{field} must be at least 1")]
    InvalidConcurrency { field: &'static str },

    #[error("visibility timeout must be positive")]
    InvalidVisibilityTimeout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailSettings {
    pub region: String,
    pub from: String,
    pub to: String,
}

impl MailSettings {
    pub fn new(region: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Image queue tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSettings {
    pub batch_size: usize,
    pub receive_wait: Duration,
    pub max_receive_count: u32,
    pub visibility_timeout: Duration,
    pub retention: Option<Duration>,
    pub workers: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            batch_size: 5,
            receive_wait: Duration::from_secs(10),
            max_receive_count: 1,
            visibility_timeout: Duration::from_secs(15),
            retention: Some(Duration::from_secs(60)),
            workers: 1,
        }
    }
}

/// Dead-letter (rejection) queue tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetterSettings {
    pub batch_size: usize,
    pub receive_wait: Duration,
    /// Cap on simultaneously running rejection consumers.
    pub max_concurrency: usize,
}

impl Default for DeadLetterSettings {
    fn default() -> Self {
        Self {
            batch_size: 5,
            receive_wait: Duration::from_secs(10),
            max_concurrency: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub mail: MailSettings,
    pub queue: QueueSettings,
    pub dead_letter: DeadLetterSettings,
}

impl PipelineConfig {
    pub fn new(
        mail: MailSettings,
        queue: QueueSettings,
        dead_letter: DeadLetterSettings,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            mail,
            queue,
            dead_letter,
        };
        config.validate()?;
        Ok(config)
    }

    /// Mail settings plus default queue tuning.
    pub fn with_mail(mail: MailSettings) -> Result<Self, ConfigError> {
        Self::new(mail, QueueSettings::default(), DeadLetterSettings::default())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.mail.region.trim().is_empty() {
            return Err(ConfigError::Missing(ENV_REGION));
        }
        check_address(ENV_EMAIL_FROM, &self.mail.from)?;
        check_address(ENV_EMAIL_TO, &self.mail.to)?;

        check_batch_size("batch size", self.queue.batch_size)?;
        check_batch_size("dead-letter batch size", self.dead_letter.batch_size)?;

        if self.queue.max_receive_count == 0 {
            return Err(ConfigError::InvalidMaxReceiveCount);
        }
        if self.queue.visibility_timeout.is_zero() {
            return Err(ConfigError::InvalidVisibilityTimeout);
        }
        if self.queue.workers == 0 {
            return Err(ConfigError::InvalidConcurrency { field: "workers" });
        }
        if self.dead_letter.max_concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency {
                field: "dead-letter max concurrency",
            });
        }
        Ok(())
    }
}

fn check_address(field: &'static str, value: &str) -> Result<(), ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::Missing(field));
    }
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(ConfigError::InvalidAddress {
            field,
            value: value.to_string(),
        }),
    }
}

fn check_batch_size(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if (1..=MAX_BATCH_SIZE).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidBatchSize { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn mail() -> MailSettings {
        MailSettings::new("eu-west-1", "noreply@example.com", "owner@example.com")
    }

    #[test]
    fn defaults_match_deployed_stack() {
        let config = PipelineConfig::with_mail(mail()).unwrap();

        assert_eq!(config.queue.batch_size, 5);
        assert_eq!(config.queue.receive_wait, Duration::from_secs(10));
        assert_eq!(config.queue.max_receive_count, 1);
        assert_eq!(config.queue.visibility_timeout, Duration::from_secs(15));
        assert_eq!(config.queue.retention, Some(Duration::from_secs(60)));
        assert_eq!(config.dead_letter.max_concurrency, 5);
    }

    #[rstest]
    #[case(MailSettings::new("", "a@b", "c@d"), ConfigError::Missing(ENV_REGION))]
    #[case(MailSettings::new("eu-west-1", "", "c@d"), ConfigError::Missing(ENV_EMAIL_FROM))]
    #[case(
        MailSettings::new("eu-west-1", "a@b", "nobody"),
        ConfigError::InvalidAddress { field: ENV_EMAIL_TO, value: "nobody".into() }
    )]
    #[case(
        MailSettings::new("eu-west-1", "@b", "c@d"),
        ConfigError::InvalidAddress { field: ENV_EMAIL_FROM, value: "@b".into() }
    )]
    fn invalid_mail_settings(#[case] mail: MailSettings, #[case] expected: ConfigError) {
        assert_eq!(PipelineConfig::with_mail(mail), Err(expected));
    }

    #[rstest]
    #[case(0)]
    #[case(11)]
    fn batch_size_out_of_range(#[case] batch_size: usize) {
        let queue = QueueSettings {
            batch_size,
            ..QueueSettings::default()
        };
        assert!(matches!(
            PipelineConfig::new(mail(), queue, DeadLetterSettings::default()),
            Err(ConfigError::InvalidBatchSize { .. })
        ));
    }

    #[test]
    fn zero_receive_count_is_rejected() {
        let queue = QueueSettings {
            max_receive_count: 0,
            ..QueueSettings::default()
        };
        assert_eq!(
            PipelineConfig::new(mail(), queue, DeadLetterSettings::default()),
            Err(ConfigError::InvalidMaxReceiveCount)
        );
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let dead_letter = DeadLetterSettings {
            max_concurrency: 0,
            ..DeadLetterSettings::default()
        };
        assert!(matches!(
            PipelineConfig::new(mail(), QueueSettings::default(), dead_letter),
            Err(ConfigError::InvalidConcurrency { .. })
        ));
    }
}
