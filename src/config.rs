use log::LevelFilter;
use rustyline::EditMode;
use std::path::PathBuf;

const DEFAULT_HISTORY_FILE: &str = "bussin_history.txt";

/// Runtime settings shared by the script runner and the REPL.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Rewrite slang spelling to canonical spelling before lexing.
    pub slang: bool,
    pub log_level: LevelFilter,
    pub edit_mode: EditMode,
    pub history_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            slang: true,
            log_level: LevelFilter::Warn,
            edit_mode: EditMode::Emacs,
            history_file: PathBuf::from(DEFAULT_HISTORY_FILE),
        }
    }
}

impl Config {
    /// Reads `BUSSIN_SLANG`, `BUSSIN_LOG`, `BUSSIN_EDIT_MODE` and `BUSSIN_HISTORY`.
    pub fn from_env() -> Self {
        Config::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable source. Unset variables keep
    /// their defaults; unparseable ones are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Config::default();

        if let Some(value) = lookup("BUSSIN_SLANG") {
            match parse_flag(&value) {
                Some(slang) => config.slang = slang,
                None => log::warn!(target: "interpreter", "ignoring BUSSIN_SLANG={:?}", value),
            }
        }
        if let Some(value) = lookup("BUSSIN_LOG") {
            match value.trim().parse::<LevelFilter>() {
                Ok(level) => config.log_level = level,
                Err(_) => log::warn!(target: "interpreter", "ignoring BUSSIN_LOG={:?}", value),
            }
        }
        if let Some(value) = lookup("BUSSIN_EDIT_MODE") {
            match value.trim().to_ascii_lowercase().as_str() {
                "emacs" => config.edit_mode = EditMode::Emacs,
                "vi" => config.edit_mode = EditMode::Vi,
                _ => log::warn!(target: "interpreter", "ignoring BUSSIN_EDIT_MODE={:?}", value),
            }
        }
        if let Some(value) = lookup("BUSSIN_HISTORY") {
            if !value.trim().is_empty() {
                config.history_file = PathBuf::from(value.trim());
            }
        }

        config
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config, Config::default());
        assert!(config.slang);
        assert_eq!(config.log_level, LevelFilter::Warn);
        assert_eq!(config.history_file, PathBuf::from("bussin_history.txt"));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("BUSSIN_SLANG", "off"),
            ("BUSSIN_LOG", "debug"),
            ("BUSSIN_EDIT_MODE", "Vi"),
            ("BUSSIN_HISTORY", "/tmp/h.txt"),
        ]);
        assert!(!config.slang);
        assert_eq!(config.log_level, LevelFilter::Debug);
        assert_eq!(config.edit_mode, EditMode::Vi);
        assert_eq!(config.history_file, PathBuf::from("/tmp/h.txt"));
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = config_from(&[
            ("BUSSIN_SLANG", "maybe"),
            ("BUSSIN_LOG", "loud"),
            ("BUSSIN_EDIT_MODE", "nano"),
            ("BUSSIN_HISTORY", "  "),
        ]);
        assert_eq!(config, Config::default());
    }
}
