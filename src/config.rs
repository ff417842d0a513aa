use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::error::StealthDbError;
use crate::types::IsolationLevel;

/// Largest UTC offset accepted for a result zone.
const MAX_OFFSET_SECS: i32 = 18 * 3600;

/// Options for an [`crate::engine::SqlEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Keep one connection open and reuse it between operations
    pub keep_alive: bool,
    /// Zone attached to local temporal values; the local offset when unset
    #[serde(with = "offset_seconds")]
    pub time_zone: Option<FixedOffset>,
    /// Isolation level for transaction scopes opened by the engine
    pub isolation: Option<IsolationLevel>,
    /// Close the connection when a transaction scope ends
    pub release_on_close: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            keep_alive: false,
            time_zone: None,
            isolation: None,
            release_on_close: true,
        }
    }
}

impl EngineOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    #[must_use]
    pub fn with_time_zone(mut self, zone: FixedOffset) -> Self {
        self.time_zone = Some(zone);
        self
    }

    /// Check the options before an engine is built from them.
    ///
    /// # Errors
    /// Returns [`StealthDbError::ConfigError`] if the time zone is more than
    /// 18 hours away from UTC.
    pub fn validate(&self) -> Result<(), StealthDbError> {
        if let Some(zone) = self.time_zone {
            let secs = zone.local_minus_utc();
            if secs.abs() > MAX_OFFSET_SECS {
                return Err(StealthDbError::ConfigError(format!(
                    "time zone offset of {secs} seconds is outside +/-18 hours"
                )));
            }
        }
        Ok(())
    }
}

/// Fluent builder for engine options.
#[derive(Debug, Clone, Default)]
pub struct EngineOptionsBuilder {
    opts: EngineOptions,
}

impl EngineOptionsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.opts.keep_alive = keep_alive;
        self
    }

    #[must_use]
    pub fn time_zone(mut self, zone: FixedOffset) -> Self {
        self.opts.time_zone = Some(zone);
        self
    }

    #[must_use]
    pub fn isolation(mut self, isolation: IsolationLevel) -> Self {
        self.opts.isolation = Some(isolation);
        self
    }

    #[must_use]
    pub fn release_on_close(mut self, release_on_close: bool) -> Self {
        self.opts.release_on_close = release_on_close;
        self
    }

    #[must_use]
    pub fn finish(self) -> EngineOptions {
        self.opts
    }
}

/// Offsets travel as whole seconds east of UTC.
mod offset_seconds {
    use chrono::FixedOffset;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        zone: &Option<FixedOffset>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        zone.map(|zone| zone.local_minus_utc()).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<FixedOffset>, D::Error> {
        Option::<i32>::deserialize(deserializer)?
            .map(|secs| {
                FixedOffset::east_opt(secs)
                    .ok_or_else(|| D::Error::custom(format!("invalid UTC offset: {secs} seconds")))
            })
            .transpose()
    }
}
