use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::lobby::LobbySettings;

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub save_dir: PathBuf,
    pub countdown_seconds: u8,
    pub heartbeat_interval: Duration,
    pub queue_sweep_interval: Duration,
    pub chat_min_interval: Duration,
    pub chat_max_chars: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup. Unset or unparsable values fall
    /// back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = &lookup;
        Self {
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parsed(lookup, "PORT").unwrap_or(8080),
            save_dir: lookup("SAVE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./saves")),
            countdown_seconds: positive(parsed(lookup, "COUNTDOWN_SECONDS"), 5),
            heartbeat_interval: Duration::from_secs(positive(parsed(lookup, "HEARTBEAT_INTERVAL_SECS"), 30)),
            queue_sweep_interval: Duration::from_secs(positive(parsed(lookup, "QUEUE_SWEEP_SECS"), 30)),
            chat_min_interval: Duration::from_millis(parsed(lookup, "CHAT_MIN_INTERVAL_MS").unwrap_or(700)),
            chat_max_chars: positive(parsed(lookup, "CHAT_MAX_CHARS"), 80),
        }
    }

    pub fn lobby_settings(&self) -> LobbySettings {
        LobbySettings {
            countdown: self.countdown_seconds,
            chat_min_interval: self.chat_min_interval,
            chat_max_chars: self.chat_max_chars,
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

// Zero would stall the countdown or spin the timers.
fn positive<T: Default + PartialEq>(value: Option<T>, fallback: T) -> T {
    match value {
        Some(v) if v != T::default() => v,
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.save_dir, PathBuf::from("./saves"));
        assert_eq!(config.lobby_settings(), LobbySettings::default());
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
    }

    #[test]
    fn overrides_and_bad_values() {
        let config = config(&[
            ("PORT", "9001"),
            ("COUNTDOWN_SECONDS", "0"),
            ("CHAT_MAX_CHARS", "abc"),
            ("CHAT_MIN_INTERVAL_MS", "250"),
            ("SAVE_DIR", "/tmp/rooms"),
        ]);
        assert_eq!(config.port, 9001);
        assert_eq!(config.countdown_seconds, 5);
        assert_eq!(config.chat_max_chars, 80);
        assert_eq!(config.chat_min_interval, Duration::from_millis(250));
        assert_eq!(config.save_dir, PathBuf::from("/tmp/rooms"));
    }
}
