use std::path::PathBuf;

use crate::error::ConfigError;

/// Runtime settings, read from the environment (and `.env` via dotenv).
#[derive(Clone, Debug)]
pub struct Config {
    pub bot_token: String,
    pub uploads_per_hour: usize,
    pub uploads_per_day: usize,
    /// Where uploaded documents are stored while their text is extracted.
    pub download_dir: PathBuf,
}

const DEFAULT_UPLOADS_PER_HOUR: usize = 2;
const DEFAULT_UPLOADS_PER_DAY: usize = 5;

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bot_token = lookup("BOT_TOKEN")
            .or_else(|| lookup("TELOXIDE_TOKEN"))
            .filter(|token| !token.trim().is_empty())
            .ok_or(ConfigError::Missing("BOT_TOKEN"))?;

        let parse_count = |var: &'static str, default: usize| match lookup(var) {
            None => Ok(default),
            Some(value) => value
                .trim()
                .parse::<usize>()
                .map_err(|_| ConfigError::Invalid { var, value }),
        };

        Ok(Self {
            bot_token,
            uploads_per_hour: parse_count("UPLOADS_PER_HOUR", DEFAULT_UPLOADS_PER_HOUR)?,
            uploads_per_day: parse_count("UPLOADS_PER_DAY", DEFAULT_UPLOADS_PER_DAY)?,
            download_dir: lookup("DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
        })
    }
}
