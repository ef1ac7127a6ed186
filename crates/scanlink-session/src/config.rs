//! Session configuration.
//!
//! ```
//! use scanlink_session::SessionConfig;
//!
//! let config = SessionConfig::from_json_str(r#"{ "command_timeout_ms": 500 }"#).unwrap();
//! assert_eq!(config.command_timeout().as_millis(), 500);
//! assert_eq!(config.firmware_chunk_size, 512);
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use scanlink_core::{
    Error, Result,
    constants::{
        DEFAULT_COMMAND_TIMEOUT_MS, DEFAULT_FIRMWARE_CHUNK_SIZE, MAX_FIRMWARE_CHUNK_SIZE,
        MAX_FRAME_SIZE,
    },
};

/// Tunables of one device session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Budget for one synchronous round trip, on top of any tag timeout the
    /// request itself carries.
    pub command_timeout_ms: u64,

    /// How long after a timeout the abandoned request's reply is still
    /// expected. A reply arriving in this window is discarded.
    pub late_reply_window_ms: u64,

    /// Bytes per firmware chunk (1..=4096).
    pub firmware_chunk_size: usize,

    /// Largest frame accepted or sent on the link.
    pub max_frame_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: DEFAULT_COMMAND_TIMEOUT_MS,
            late_reply_window_ms: DEFAULT_COMMAND_TIMEOUT_MS,
            firmware_chunk_size: DEFAULT_FIRMWARE_CHUNK_SIZE,
            max_frame_size: MAX_FRAME_SIZE,
        }
    }
}

impl SessionConfig {
    /// Parse and validate a JSON document. Missing keys take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("invalid session config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    pub fn validate(&self) -> Result<()> {
        if self.command_timeout_ms == 0 {
            return Err(Error::Config("command_timeout_ms must be positive".into()));
        }
        if self.late_reply_window_ms == 0 {
            return Err(Error::Config("late_reply_window_ms must be positive".into()));
        }
        if !(1..=MAX_FIRMWARE_CHUNK_SIZE).contains(&self.firmware_chunk_size) {
            return Err(Error::Config(format!(
                "firmware_chunk_size must be 1..={MAX_FIRMWARE_CHUNK_SIZE}, got {}",
                self.firmware_chunk_size
            )));
        }
        // A firmware chunk frame must fit: opcode, offset, total, length, data, framing.
        if self.max_frame_size < self.firmware_chunk_size + 16 {
            return Err(Error::Config(format!(
                "max_frame_size {} cannot carry {}-byte firmware chunks",
                self.max_frame_size, self.firmware_chunk_size
            )));
        }
        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn late_reply_window(&self) -> Duration {
        Duration::from_millis(self.late_reply_window_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.command_timeout(), Duration::from_millis(3000));
        assert_eq!(config.late_reply_window(), config.command_timeout());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = SessionConfig::from_json_str(r#"{"firmware_chunk_size": 1024}"#).unwrap();
        assert_eq!(config.firmware_chunk_size, 1024);
        assert_eq!(config.command_timeout_ms, 3000);
    }

    #[rstest]
    #[case(r#"{"command_timeout_ms": 0}"#)]
    #[case(r#"{"late_reply_window_ms": 0}"#)]
    #[case(r#"{"firmware_chunk_size": 0}"#)]
    #[case(r#"{"firmware_chunk_size": 4097}"#)]
    #[case(r#"{"max_frame_size": 100}"#)]
    #[case(r#"{"command_timeout_ms": "fast"}"#)]
    fn test_rejected_configs(#[case] json: &str) {
        assert!(matches!(
            SessionConfig::from_json_str(json),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = SessionConfig::load("/nonexistent/scanlink.json").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
