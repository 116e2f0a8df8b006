//! Settings resolution for the CLI.
//!
//! Each setting comes from the command-line flag, then the environment
//! variable, then the built-in default.

use multiformats_core::{DEFAULT_ENCODING, DEFAULT_HASHING_ALGORITHM};

pub const HASH_ENV: &str = "MULTIFORMATS_HASH";
pub const BASE_ENV: &str = "MULTIFORMATS_BASE";
pub const LOG_ENV: &str = "MULTIFORMATS_LOG";

const DEFAULT_LOG_LEVEL: &str = "warn";

/// Values supplied on the command line.
#[derive(Debug, Default, Clone)]
pub struct Flags {
    pub hash: Option<String>,
    pub base: Option<String>,
    pub log_level: Option<String>,
}

/// Resolved settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Hashing algorithm name.
    pub hash: String,
    /// Multibase name for encoded output.
    pub base: String,
    /// `tracing-subscriber` filter directive.
    pub log_level: String,
}

impl Settings {
    /// Resolve against the process environment.
    pub fn resolve(flags: Flags) -> Self {
        Self::resolve_with(flags, |key| std::env::var(key).ok())
    }

    /// Resolve against an arbitrary environment lookup.
    pub fn resolve_with(flags: Flags, env: impl Fn(&str) -> Option<String>) -> Self {
        let pick = |flag: Option<String>, key: &str, default: &str| {
            flag.or_else(|| env(key).filter(|v| !v.trim().is_empty()))
                .unwrap_or_else(|| default.to_string())
        };
        Self {
            hash: pick(flags.hash, HASH_ENV, DEFAULT_HASHING_ALGORITHM),
            base: pick(flags.base, BASE_ENV, DEFAULT_ENCODING),
            log_level: pick(flags.log_level, LOG_ENV, DEFAULT_LOG_LEVEL),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::resolve_with(Flags::default(), env(&[]));
        assert_eq!(settings.hash, "sha2-256");
        assert_eq!(settings.base, "base58btc");
        assert_eq!(settings.log_level, "warn");
    }

    #[test]
    fn test_env_overrides_default() {
        let settings = Settings::resolve_with(
            Flags::default(),
            env(&[(HASH_ENV, "blake3"), (BASE_ENV, "base32"), (LOG_ENV, "debug")]),
        );
        assert_eq!(settings.hash, "blake3");
        assert_eq!(settings.base, "base32");
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    fn test_flag_overrides_env() {
        let flags = Flags {
            hash: Some("sha1".into()),
            base: None,
            log_level: Some("trace".into()),
        };
        let settings = Settings::resolve_with(flags, env(&[(HASH_ENV, "blake3"), (BASE_ENV, "base16")]));
        assert_eq!(settings.hash, "sha1");
        assert_eq!(settings.base, "base16");
        assert_eq!(settings.log_level, "trace");
    }

    #[test]
    fn test_blank_env_ignored() {
        let settings = Settings::resolve_with(Flags::default(), env(&[(HASH_ENV, "  ")]));
        assert_eq!(settings.hash, "sha2-256");
    }
}
