//! # Input Generator Configuration
//!
//! The generator stamps query inputs with the current time. The clock is
//! the system UTC clock unless a fixed instant is configured, which makes
//! generated inputs reproducible.
//!
//! ## Environment
//!
//! - `ZKID_FIXED_TIMESTAMP` (optional): unix seconds to use for every
//!   `timestamp` input.

use chrono::{DateTime, Utc};
use zkid_zkp::ConfigError;

const FIXED_TIMESTAMP_VAR: &str = "ZKID_FIXED_TIMESTAMP";

/// Time source for `timestamp` inputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Clock {
    /// System UTC time.
    #[default]
    System,
    /// A fixed instant.
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Current instant.
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(at) => *at,
        }
    }

    /// Current unix time in seconds.
    pub fn unix_seconds(&self) -> i64 {
        self.now().timestamp()
    }
}

/// Input generator settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputGeneratorConfig {
    /// Time source.
    pub clock: Clock,
}

impl InputGeneratorConfig {
    /// Configuration with a fixed clock.
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self {
            clock: Clock::Fixed(at),
        }
    }

    /// Load from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(FIXED_TIMESTAMP_VAR) {
            Ok(value) => Ok(Self::fixed(parse_timestamp(&value)?)),
            Err(_) => Ok(Self::default()),
        }
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        var: FIXED_TIMESTAMP_VAR,
        reason,
    };
    let secs: i64 = value
        .trim()
        .parse()
        .map_err(|e| invalid(format!("{value:?} is not unix seconds: {e}")))?;
    if secs < 0 {
        return Err(invalid(format!("{secs} is before the epoch")));
    }
    DateTime::from_timestamp(secs, 0).ok_or_else(|| invalid(format!("{secs} is out of range")))
}
