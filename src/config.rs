//! Configuration for the relay
//!
//! Values come from the process environment (a `.env` file is loaded first) and may be
//! overlaid on an optional `config.yml`. Environment variables always win.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default constants
pub const SESSION_NAME: &str = "relay_session";
pub const CONFIG_FILE: &str = "config.yml";
pub const DEFAULT_SOURCE_CHANNEL: &str = "рассылка";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 1;
pub const DEFAULT_PTS_TOTAL_LIMIT: i32 = 10;
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_RETRY_BASE_MS: u64 = 1_000;
pub const DEFAULT_RETRY_MAX_MS: u64 = 30_000;

pub const ENV_PHONE: &str = "USER_PHONE_NUMBER";
pub const ENV_CHATS: &str = "CHATS";
pub const ENV_API_ID: &str = "TELEGRAM_API_ID";
pub const ENV_API_HASH: &str = "TELEGRAM_API_HASH";
pub const ENV_SOURCE_CHANNEL: &str = "SOURCE_CHANNEL";
pub const ENV_POLL_INTERVAL: &str = "POLL_INTERVAL_SECS";
pub const ENV_PTS_TOTAL_LIMIT: &str = "PTS_TOTAL_LIMIT";
pub const ENV_MAX_RETRIES: &str = "RELAY_MAX_RETRIES";
pub const ENV_RETRY_BASE_MS: &str = "RELAY_RETRY_BASE_MS";
pub const ENV_RETRY_MAX_MS: &str = "RELAY_RETRY_MAX_MS";
pub const ENV_SESSION_NAME: &str = "RELAY_SESSION_NAME";

/// YAML config structures
#[derive(Debug, Default, Deserialize)]
pub struct YamlConfig {
    telegram: Option<TelegramConfig>,
    relay: Option<RelayConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramConfig {
    #[serde(default, deserialize_with = "deserialize_string_or_number")]
    api_id: Option<String>,
    api_hash: Option<String>,
    phone: Option<String>,
    session_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RelayConfig {
    #[serde(default)]
    chats: Vec<String>,
    source_channel: Option<String>,
    poll_interval_secs: Option<u64>,
    pts_total_limit: Option<i32>,
    max_retries: Option<u32>,
    retry_base_ms: Option<u64>,
    retry_max_ms: Option<u64>,
}

/// Deserialize a value that can be either a string or a number
fn deserialize_string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let value: Option<serde_yaml::Value> = Option::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(serde_yaml::Value::String(s)) => Ok(Some(s)),
        Some(serde_yaml::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected string or number, got {:?}",
            other
        ))),
    }
}

/// Backoff applied to failed polls before the error is allowed to end the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Consecutive failures tolerated. Zero aborts on the first error.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_MS),
            max_delay: Duration::from_millis(DEFAULT_RETRY_MAX_MS),
        }
    }
}

impl RetryPolicy {
    /// Abort on the first polling error.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based), doubling from `base_delay` and
    /// capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self.base_delay.saturating_mul(1u32 << exponent);
        delay.min(self.max_delay)
    }
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct Config {
    pub phone: String,
    pub api_id: i32,
    pub api_hash: String,
    pub session_name: String,
    /// Destination chat titles, in configuration order.
    pub destinations: Vec<String>,
    pub source_channel: String,
    pub poll_interval: Duration,
    pub pts_total_limit: i32,
    pub retry: RetryPolicy,
}

impl Config {
    /// Read `config.yml` if present, then the process environment.
    ///
    /// Call [`Config::load_dotenv`] first so `.env` values are visible.
    pub fn load() -> Result<Self> {
        let yaml = Self::read_yaml(CONFIG_FILE)?;
        Self::from_sources(yaml, |key| std::env::var(key).ok())
    }

    /// Load .env file into environment variables using dotenvy
    pub fn load_dotenv() {
        if dotenvy::dotenv().is_err() {
            let _ = dotenvy::from_filename("../.env");
        }
    }

    /// Parse a YAML config file. A missing file is not an error.
    pub fn read_yaml<P: AsRef<Path>>(path: P) -> Result<YamlConfig> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(YamlConfig::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Build the configuration from parsed YAML and an environment lookup.
    pub fn from_sources<F>(yaml: YamlConfig, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let telegram = yaml.telegram.unwrap_or_default();
        let relay = yaml.relay.unwrap_or_default();

        let phone = resolve_string(telegram.phone, ENV_PHONE, &env)
            .ok_or_else(|| Error::MissingConfig(ENV_PHONE.to_string()))?;

        let api_id_raw = resolve_string(telegram.api_id, ENV_API_ID, &env)
            .ok_or_else(|| Error::MissingConfig(ENV_API_ID.to_string()))?;
        let api_id = api_id_raw.trim().parse::<i32>().map_err(|_| {
            Error::InvalidConfig(format!("{} must be an integer, got '{}'", ENV_API_ID, api_id_raw))
        })?;

        let api_hash = resolve_string(telegram.api_hash, ENV_API_HASH, &env)
            .ok_or_else(|| Error::MissingConfig(ENV_API_HASH.to_string()))?;

        // A blank CHATS counts as unset and leaves the YAML list in charge.
        let mut destinations = env(ENV_CHATS)
            .map(|raw| parse_chat_names(&raw))
            .unwrap_or_default();
        if destinations.is_empty() {
            destinations = clean_chat_names(relay.chats.iter().map(String::as_str));
        }

        let source_channel = env(ENV_SOURCE_CHANNEL)
            .or(relay.source_channel)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SOURCE_CHANNEL.to_string());

        let poll_secs = parse_env(&env, ENV_POLL_INTERVAL)?
            .or(relay.poll_interval_secs)
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);

        let pts_total_limit = parse_env(&env, ENV_PTS_TOTAL_LIMIT)?
            .or(relay.pts_total_limit)
            .unwrap_or(DEFAULT_PTS_TOTAL_LIMIT);
        if pts_total_limit <= 0 {
            return Err(Error::InvalidConfig(format!(
                "{} must be positive, got {}",
                ENV_PTS_TOTAL_LIMIT, pts_total_limit
            )));
        }

        let retry = RetryPolicy {
            max_retries: parse_env(&env, ENV_MAX_RETRIES)?
                .or(relay.max_retries)
                .unwrap_or(DEFAULT_MAX_RETRIES),
            base_delay: Duration::from_millis(
                parse_env(&env, ENV_RETRY_BASE_MS)?
                    .or(relay.retry_base_ms)
                    .unwrap_or(DEFAULT_RETRY_BASE_MS),
            ),
            max_delay: Duration::from_millis(
                parse_env(&env, ENV_RETRY_MAX_MS)?
                    .or(relay.retry_max_ms)
                    .unwrap_or(DEFAULT_RETRY_MAX_MS),
            ),
        };

        let session_name = env(ENV_SESSION_NAME)
            .or(telegram.session_name)
            .unwrap_or_else(|| SESSION_NAME.to_string());

        Ok(Self {
            phone,
            api_id,
            api_hash,
            session_name,
            destinations,
            source_channel,
            poll_interval: Duration::from_secs(poll_secs),
            pts_total_limit,
            retry,
        })
    }

    /// Destination titles; relaying needs at least one.
    pub fn require_destinations(&self) -> Result<&[String]> {
        if self.destinations.is_empty() {
            return Err(Error::MissingConfig(ENV_CHATS.to_string()));
        }
        Ok(&self.destinations)
    }

    pub fn session_file(&self) -> String {
        format!("{}.session", self.session_name)
    }

    pub fn lock_file(&self) -> String {
        format!("{}.lock", self.session_name)
    }
}

/// Split a comma-separated list of chat titles. Surrounding whitespace is trimmed and
/// empty entries are dropped; titles are otherwise kept verbatim.
pub fn parse_chat_names(raw: &str) -> Vec<String> {
    clean_chat_names(raw.split(','))
}

fn clean_chat_names<'a, I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolve a value: the explicit env key wins, then a YAML value (expanding `${VAR}`).
fn resolve_string<F>(value: Option<String>, env_key: &str, env: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(env_val) = env(env_key).filter(|v| !v.is_empty()) {
        return Some(env_val);
    }
    let value = value?;
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        return env(var_name).filter(|v| !v.is_empty());
    }
    Some(value).filter(|v| !v.is_empty())
}

fn parse_env<T, F>(env: &F, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match env(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| Error::InvalidConfig(format!("{} has an invalid value '{}'", key, raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![
            (ENV_PHONE, "+15550001111"),
            (ENV_CHATS, "Team A,Team B"),
            (ENV_API_ID, "12345"),
            (ENV_API_HASH, "abcdef"),
        ]
    }

    #[test]
    fn loads_required_values_with_defaults() {
        let config = Config::from_sources(YamlConfig::default(), env_from(&required())).unwrap();

        assert_eq!(config.phone, "+15550001111");
        assert_eq!(config.api_id, 12345);
        assert_eq!(config.api_hash, "abcdef");
        assert_eq!(config.destinations, vec!["Team A", "Team B"]);
        assert_eq!(config.source_channel, DEFAULT_SOURCE_CHANNEL);
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.pts_total_limit, 10);
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.session_file(), "relay_session.session");
        assert_eq!(config.lock_file(), "relay_session.lock");
    }

    #[test]
    fn missing_phone_is_reported() {
        let vars: Vec<_> = required().into_iter().filter(|(k, _)| *k != ENV_PHONE).collect();
        let err = Config::from_sources(YamlConfig::default(), env_from(&vars)).unwrap_err();
        assert!(matches!(err, Error::MissingConfig(ref key) if key == ENV_PHONE));
    }

    #[test]
    fn missing_chats_only_blocks_relaying() {
        let vars: Vec<_> = required().into_iter().filter(|(k, _)| *k != ENV_CHATS).collect();
        let config = Config::from_sources(YamlConfig::default(), env_from(&vars)).unwrap();

        assert!(config.destinations.is_empty());
        let err = config.require_destinations().unwrap_err();
        assert!(matches!(err, Error::MissingConfig(ref key) if key == ENV_CHATS));
    }

    #[test]
    fn blank_chat_list_names_no_destination() {
        let mut vars = required();
        vars.retain(|(k, _)| *k != ENV_CHATS);
        vars.push((ENV_CHATS, " , ,"));
        let config = Config::from_sources(YamlConfig::default(), env_from(&vars)).unwrap();
        assert!(config.require_destinations().is_err());
    }

    #[test]
    fn require_destinations_returns_configured_titles() {
        let config = Config::from_sources(YamlConfig::default(), env_from(&required())).unwrap();
        assert_eq!(config.require_destinations().unwrap(), ["Team A", "Team B"]);
    }

    fn yaml_with_chats(chats: &str) -> YamlConfig {
        serde_yaml::from_str(&format!("relay:\n  chats: {}\n", chats)).unwrap()
    }

    #[test]
    fn yaml_chat_titles_are_trimmed_and_blanks_dropped() {
        let vars: Vec<_> = required().into_iter().filter(|(k, _)| *k != ENV_CHATS).collect();
        let yaml = yaml_with_chats(r#"["", " Team A ", "Ops, West"]"#);
        let config = Config::from_sources(yaml, env_from(&vars)).unwrap();

        assert_eq!(config.destinations, vec!["Team A", "Ops, West"]);
    }

    #[test]
    fn yaml_list_of_blanks_names_no_destination() {
        let vars: Vec<_> = required().into_iter().filter(|(k, _)| *k != ENV_CHATS).collect();
        let config = Config::from_sources(yaml_with_chats(r#"["", "  "]"#), env_from(&vars)).unwrap();

        assert!(matches!(
            config.require_destinations(),
            Err(Error::MissingConfig(ref key)) if key == ENV_CHATS
        ));
    }

    #[test]
    fn empty_chats_env_falls_back_to_yaml() {
        let mut vars = required();
        vars.retain(|(k, _)| *k != ENV_CHATS);
        vars.push((ENV_CHATS, ""));
        let config = Config::from_sources(yaml_with_chats(r#"["Ops"]"#), env_from(&vars)).unwrap();

        assert_eq!(config.destinations, vec!["Ops"]);
    }

    #[test]
    fn non_numeric_api_id_is_invalid() {
        let mut vars = required();
        vars.retain(|(k, _)| *k != ENV_API_ID);
        vars.push((ENV_API_ID, "abc"));
        let err = Config::from_sources(YamlConfig::default(), env_from(&vars)).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn optional_overrides_are_parsed() {
        let mut vars = required();
        vars.extend([
            (ENV_SOURCE_CHANNEL, "News"),
            (ENV_POLL_INTERVAL, "5"),
            (ENV_PTS_TOTAL_LIMIT, "100"),
            (ENV_MAX_RETRIES, "0"),
            (ENV_RETRY_BASE_MS, "250"),
            (ENV_RETRY_MAX_MS, "2000"),
            (ENV_SESSION_NAME, "bot"),
        ]);
        let config = Config::from_sources(YamlConfig::default(), env_from(&vars)).unwrap();

        assert_eq!(config.source_channel, "News");
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.pts_total_limit, 100);
        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(config.retry.base_delay, Duration::from_millis(250));
        assert_eq!(config.retry.max_delay, Duration::from_millis(2000));
        assert_eq!(config.session_file(), "bot.session");
    }

    #[test]
    fn invalid_number_in_env_is_rejected() {
        let mut vars = required();
        vars.push((ENV_POLL_INTERVAL, "soon"));
        let err = Config::from_sources(YamlConfig::default(), env_from(&vars)).unwrap_err();
        assert!(err.to_string().contains(ENV_POLL_INTERVAL));
    }

    #[test]
    fn non_positive_pts_limit_is_rejected() {
        let mut vars = required();
        vars.push((ENV_PTS_TOTAL_LIMIT, "0"));
        let err = Config::from_sources(YamlConfig::default(), env_from(&vars)).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn parse_chat_names_trims_and_keeps_order() {
        assert_eq!(
            parse_chat_names("Team A, Team B ,,Team A"),
            vec!["Team A", "Team B", "Team A"]
        );
        assert!(parse_chat_names("").is_empty());
    }

    #[test]
    fn yaml_values_fill_gaps_and_env_wins() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
telegram:
  api_id: 777
  api_hash: "${{HASH_FROM_ENV}}"
  phone: "+10000000000"
relay:
  chats: ["Ops", "Support"]
  source_channel: "Announcements"
  poll_interval_secs: 3
"#
        )
        .unwrap();

        let yaml = Config::read_yaml(file.path()).unwrap();
        let env = env_from(&[("HASH_FROM_ENV", "hash"), (ENV_PHONE, "+19999999999")]);
        let config = Config::from_sources(yaml, env).unwrap();

        assert_eq!(config.api_id, 777);
        assert_eq!(config.api_hash, "hash");
        assert_eq!(config.phone, "+19999999999");
        assert_eq!(config.destinations, vec!["Ops", "Support"]);
        assert_eq!(config.source_channel, "Announcements");
        assert_eq!(config.poll_interval, Duration::from_secs(3));
    }

    #[test]
    fn read_yaml_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = Config::read_yaml(dir.path().join("absent.yml")).unwrap();
        assert!(yaml.telegram.is_none());
        assert!(yaml.relay.is_none());
    }

    #[test]
    fn retry_delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for(40), Duration::from_millis(500));
    }

    #[test]
    fn retry_none_aborts_immediately() {
        assert_eq!(RetryPolicy::none().max_retries, 0);
    }
}
