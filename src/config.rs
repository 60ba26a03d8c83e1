//! Environment configuration.

use std::env;

use agent_provider_mock::MOCK_PROVIDER_ID;
use shell_host::config::{DEFAULT_MAX_TOOL_ROUNDS, DEFAULT_MODEL};
use shell_host::HostConfig;

pub const PROVIDER_ENV_VAR: &str = "DESK_SHELL_PROVIDER";
pub const DEFAULT_MODEL_ENV_VAR: &str = "DESK_SHELL_DEFAULT_MODEL";
pub const MAX_TOOL_ROUNDS_ENV_VAR: &str = "DESK_SHELL_MAX_TOOL_ROUNDS";
pub const LOG_ENV_VAR: &str = "DESK_SHELL_LOG";
pub const LOG_ANSI_ENV_VAR: &str = "DESK_SHELL_LOG_ANSI";

pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvConfig {
    pub provider: String,
    pub default_model: String,
    pub max_tool_rounds: usize,
    pub log_filter: String,
    pub log_ansi: bool,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            provider: env_string_opt(PROVIDER_ENV_VAR)
                .unwrap_or_else(|| MOCK_PROVIDER_ID.to_string()),
            default_model: env_string_opt(DEFAULT_MODEL_ENV_VAR)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tool_rounds: env_string_opt(MAX_TOOL_ROUNDS_ENV_VAR)
                .and_then(|value| value.trim().parse().ok())
                .unwrap_or(DEFAULT_MAX_TOOL_ROUNDS),
            log_filter: env_string_opt(LOG_ENV_VAR)
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            log_ansi: env_flag(LOG_ANSI_ENV_VAR),
        }
    }

    #[must_use]
    pub fn host_config(&self) -> HostConfig {
        HostConfig {
            default_model: self.default_model.clone(),
            max_tool_rounds: self.max_tool_rounds,
        }
    }
}

fn env_flag(key: &str) -> bool {
    env::var(key).map(|value| value == "1").unwrap_or(false)
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value.trim().to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    const KEYS: [&str; 5] = [
        PROVIDER_ENV_VAR,
        DEFAULT_MODEL_ENV_VAR,
        MAX_TOOL_ROUNDS_ENV_VAR,
        LOG_ENV_VAR,
        LOG_ANSI_ENV_VAR,
    ];

    struct EnvGuard {
        key: &'static str,
        previous: Option<String>,
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(value) = &self.previous {
                env::set_var(self.key, value);
            } else {
                env::remove_var(self.key);
            }
        }
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
            .lock()
            .expect("env lock poisoned")
    }

    fn set_env_guard(key: &'static str, value: Option<&str>) -> EnvGuard {
        let previous = env::var(key).ok();
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
        EnvGuard { key, previous }
    }

    fn cleared() -> Vec<EnvGuard> {
        KEYS.iter().map(|key| set_env_guard(key, None)).collect()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let _lock = env_lock();
        let _guards = cleared();

        let config = EnvConfig::from_env();
        assert_eq!(
            config,
            EnvConfig {
                provider: "mock".to_string(),
                default_model: DEFAULT_MODEL.to_string(),
                max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
                log_filter: "info".to_string(),
                log_ansi: false,
            }
        );
    }

    #[test]
    fn values_are_read_and_trimmed() {
        let _lock = env_lock();
        let _guards = cleared();
        let _g1 = set_env_guard(DEFAULT_MODEL_ENV_VAR, Some(" gemini-2.5-pro "));
        let _g2 = set_env_guard(MAX_TOOL_ROUNDS_ENV_VAR, Some("4"));
        let _g3 = set_env_guard(LOG_ENV_VAR, Some("shell_host=debug"));
        let _g4 = set_env_guard(LOG_ANSI_ENV_VAR, Some("1"));

        let config = EnvConfig::from_env();
        assert_eq!(config.default_model, "gemini-2.5-pro");
        assert_eq!(config.max_tool_rounds, 4);
        assert_eq!(config.log_filter, "shell_host=debug");
        assert!(config.log_ansi);

        let host = config.host_config();
        assert_eq!(host.default_model, "gemini-2.5-pro");
        assert_eq!(host.max_tool_rounds, 4);
    }

    #[test]
    fn blank_and_invalid_values_are_ignored() {
        let _lock = env_lock();
        let _guards = cleared();
        let _g1 = set_env_guard(PROVIDER_ENV_VAR, Some("  "));
        let _g2 = set_env_guard(MAX_TOOL_ROUNDS_ENV_VAR, Some("many"));
        let _g3 = set_env_guard(LOG_ANSI_ENV_VAR, Some("true"));

        let config = EnvConfig::from_env();
        assert_eq!(config.provider, "mock");
        assert_eq!(config.max_tool_rounds, DEFAULT_MAX_TOOL_ROUNDS);
        assert!(!config.log_ansi);
    }
}
