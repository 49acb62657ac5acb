use std::env;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Duration;
use intramural_core::ReminderOffsets;
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

macro_rules! from_environment {
    ($config:expr, $($key:expr, $name:tt),*$(,)?) => {{
        $(
            {
                if let Ok(value) = env::var($key) {
                    if let Ok(value) = value.parse() {
                        $config.$name = value;
                    }
                }
            }
        )*
    }};
}

macro_rules! from_environment_error {
    ($config:expr, $($key:expr, $name:tt),*$(,)?) => {{
        $(
            let value = env::var($key).map_err(|_| ConfigError::MissingField($key))?;
            $config.$name = value.parse().map_err(|_| ConfigError::InvalidField($key))?;
        )*
    }};
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub loglevel: LevelFilter,
    /// The directory containing one JSON document per tournament.
    pub data_dir: PathBuf,
    pub reminders: Reminders,
}

impl Config {
    pub async fn from_file<P>(path: P) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
    {
        let mut file = File::open(path).await?;

        let mut buf = Vec::new();
        file.read_to_end(&mut buf).await?;

        let config: Self = toml::from_slice(&buf)?;
        config.reminders.offsets()?;

        Ok(config)
    }

    /// Creates a complete [`Config`] instance from the environment.
    pub fn from_environment() -> Result<Self, ConfigError> {
        let mut this = Self::default();

        from_environment_error!(this, "IM_LOGLEVEL", loglevel, "IM_DATA_DIR", data_dir);

        this.reminders = Reminders::from_environment()?;
        this.reminders.offsets()?;

        Ok(this)
    }

    pub fn with_environment(mut self) -> Self {
        from_environment!(self, "IM_LOGLEVEL", loglevel, "IM_DATA_DIR", data_dir);
        self.reminders = self.reminders.with_environment();

        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            loglevel: LevelFilter::Info,
            data_dir: PathBuf::from("data"),
            reminders: Reminders::default(),
        }
    }
}

/// The largest accepted reminder offset: one year, in seconds.
pub const MAX_REMINDER_OFFSET: u64 = 366 * 24 * 60 * 60;

/// Reminder offsets before the match, in seconds.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Reminders {
    pub early: u64,
    pub late: u64,
}

impl Reminders {
    pub fn from_environment() -> Result<Self, ConfigError> {
        let mut this = Self::default();

        from_environment_error!(this, "IM_REMINDER_EARLY", early, "IM_REMINDER_LATE", late);

        Ok(this)
    }

    pub fn with_environment(mut self) -> Self {
        from_environment!(self, "IM_REMINDER_EARLY", early, "IM_REMINDER_LATE", late);

        self
    }

    /// Returns the offsets as [`ReminderOffsets`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] if an offset exceeds [`MAX_REMINDER_OFFSET`].
    pub fn offsets(&self) -> Result<ReminderOffsets, ConfigError> {
        if self.early > MAX_REMINDER_OFFSET {
            return Err(ConfigError::InvalidField("IM_REMINDER_EARLY"));
        }

        if self.late > MAX_REMINDER_OFFSET {
            return Err(ConfigError::InvalidField("IM_REMINDER_LATE"));
        }

        Ok(ReminderOffsets::new(
            Duration::seconds(self.early as i64),
            Duration::seconds(self.late as i64),
        ))
    }
}

impl Default for Reminders {
    fn default() -> Self {
        Self {
            early: 24 * 60 * 60,
            late: 60 * 60,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error("missing config field: {0}")]
    MissingField(&'static str),
    #[error("invalid config field: {0}")]
    InvalidField(&'static str),
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::Duration;
    use log::LevelFilter;

    use super::{Config, ConfigError, Reminders, MAX_REMINDER_OFFSET};

    #[test]
    fn test_config_toml() {
        let config: Config = toml::from_str(
            r#"
            loglevel = "debug"
            data_dir = "/var/lib/intramural"

            [reminders]
            late = 900
            "#,
        )
        .unwrap();

        assert_eq!(
            config,
            Config {
                loglevel: LevelFilter::Debug,
                data_dir: PathBuf::from("/var/lib/intramural"),
                reminders: Reminders {
                    early: 86400,
                    late: 900,
                },
            }
        );

        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_reminders_offsets() {
        let offsets = Reminders::default().offsets().unwrap();
        assert_eq!(offsets.early, Duration::hours(24));
        assert_eq!(offsets.late, Duration::hours(1));

        let reminders = Reminders {
            early: MAX_REMINDER_OFFSET,
            late: 0,
        };
        assert_eq!(reminders.offsets().unwrap().early, Duration::days(366));

        let reminders = Reminders {
            early: 10_000_000_000_000,
            late: 3600,
        };
        assert!(matches!(
            reminders.offsets(),
            Err(ConfigError::InvalidField("IM_REMINDER_EARLY"))
        ));

        let reminders = Reminders {
            early: 3600,
            late: u64::MAX,
        };
        assert!(matches!(
            reminders.offsets(),
            Err(ConfigError::InvalidField("IM_REMINDER_LATE"))
        ));
    }

    #[tokio::test]
    async fn test_config_from_file_invalid_offset() {
        let path = std::env::temp_dir().join(format!(
            "intramural-config-{}.toml",
            crate::id::TOURNAMENT.generate::<u64>()
        ));
        tokio::fs::write(&path, "[reminders]\nearly = 10000000000000\n")
            .await
            .unwrap();

        assert!(matches!(
            Config::from_file(&path).await,
            Err(ConfigError::InvalidField("IM_REMINDER_EARLY"))
        ));

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_config_from_file() {
        let path = std::env::temp_dir().join(format!(
            "intramural-config-{}.toml",
            crate::id::TOURNAMENT.generate::<u64>()
        ));
        tokio::fs::write(&path, "loglevel = \"warn\"\n").await.unwrap();

        let config = Config::from_file(&path).await.unwrap();
        assert_eq!(config.loglevel, LevelFilter::Warn);
        assert_eq!(config.reminders, Reminders::default());

        tokio::fs::remove_file(&path).await.unwrap();

        assert!(Config::from_file(&path).await.is_err());
    }
}
