/*
Staff Points Daemon: A discord bot that rewards staff for completing tasks.
Copyright (C) 2024 amFOSS

This program is free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation, either version 3 of the License, or
(at your option) any later version.

This program is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/
use anyhow::{anyhow, Context as _};
use chrono_tz::Tz;
use shuttle_runtime::SecretStore;
use tracing::debug;

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_DATA_FILE: &str = "serverData.json";
const DEFAULT_AUTOSAVE_SECS: u64 = 300;

/// Settings read from `Secrets.toml` at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub discord_token: String,
    /// Where the guild data is kept between restarts.
    pub data_file: PathBuf,
    /// Decides where one calendar day ends for daily quotes.
    pub timezone: Tz,
    pub autosave_interval: Duration,
}

impl Config {
    pub fn from_secrets(secrets: &SecretStore) -> anyhow::Result<Self> {
        Self::from_lookup(|key| secrets.get(key))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let discord_token = lookup("DISCORD_TOKEN").context("'DISCORD_TOKEN' was not found")?;

        let data_file = lookup("DATA_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_FILE));

        let timezone = match lookup("TIMEZONE") {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|e| anyhow!("Invalid TIMEZONE '{}': {}", name, e))?,
            None => Tz::UTC,
        };

        let autosave_secs = match lookup("AUTOSAVE_INTERVAL_SECS") {
            Some(secs) => secs
                .parse::<u64>()
                .with_context(|| format!("Invalid AUTOSAVE_INTERVAL_SECS '{}'", secs))?,
            None => DEFAULT_AUTOSAVE_SECS,
        };

        let config = Self {
            discord_token,
            data_file,
            timezone,
            autosave_interval: Duration::from_secs(autosave_secs.max(1)),
        };
        debug!(
            "Config: data_file={:?}, timezone={}, autosave_interval={:?}",
            config.data_file, config.timezone, config.autosave_interval
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let secrets: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| secrets.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("DISCORD_TOKEN", "token")]).unwrap();
        assert_eq!(config.discord_token, "token");
        assert_eq!(config.data_file, PathBuf::from("serverData.json"));
        assert_eq!(config.timezone, Tz::UTC);
        assert_eq!(config.autosave_interval, Duration::from_secs(300));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("DISCORD_TOKEN", "token"),
            ("DATA_FILE", "/data/points.json"),
            ("TIMEZONE", "Asia/Kolkata"),
            ("AUTOSAVE_INTERVAL_SECS", "60"),
        ])
        .unwrap();
        assert_eq!(config.data_file, PathBuf::from("/data/points.json"));
        assert_eq!(config.timezone, chrono_tz::Asia::Kolkata);
        assert_eq!(config.autosave_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_missing_token_fails() {
        assert!(config_from(&[]).is_err());
    }

    #[test]
    fn test_bad_values_fail() {
        assert!(config_from(&[("DISCORD_TOKEN", "t"), ("TIMEZONE", "Mars/Olympus")]).is_err());
        assert!(config_from(&[("DISCORD_TOKEN", "t"), ("AUTOSAVE_INTERVAL_SECS", "soon")]).is_err());
    }
}
