//! 服务器配置
//!
//! 所有环境变量都在这里集中读取，启动时校验一次。

use holdem_duel_core::{BIG_BLIND, STARTING_CHIPS};
use std::net::SocketAddr;
use std::time::Duration;

/// 默认端口，客户端默认也连这里
pub const DEFAULT_PORT: u16 = 25917;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// 监听地址 (`HOLDEM_BIND`)
    pub bind: SocketAddr,
    /// 新账户的初始筹码，输光后也补到这个数 (`HOLDEM_STARTING_CHIPS`)
    pub starting_chips: u32,
    /// 玩家多久不行动就自动弃牌 (`HOLDEM_ACTION_TIMEOUT_SECS`)
    pub action_timeout: Duration,
    /// 每个连接的发送队列长度 (`HOLDEM_CHANNEL_CAPACITY`)
    pub channel_capacity: usize,
}

impl ServerConfig {
    /// 先加载 `.env` (如果有)，再读取进程环境变量
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源读取配置，未设置的项使用默认值
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind = match lookup("HOLDEM_BIND") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                var: "HOLDEM_BIND".to_string(),
                reason: format!("'{}' is not a socket address", raw),
            })?,
            None => SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
        };

        let config = ServerConfig {
            bind,
            starting_chips: parse_or(&lookup, "HOLDEM_STARTING_CHIPS", STARTING_CHIPS)?,
            action_timeout: Duration::from_secs(parse_or(&lookup, "HOLDEM_ACTION_TIMEOUT_SECS", 60)?),
            channel_capacity: parse_or(&lookup, "HOLDEM_CHANNEL_CAPACITY", 32)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // 至少要付得起一次大盲
        if self.starting_chips < BIG_BLIND {
            return Err(ConfigError::Invalid {
                var: "HOLDEM_STARTING_CHIPS".to_string(),
                reason: format!("must be at least the big blind ({})", BIG_BLIND),
            });
        }

        if self.action_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: "HOLDEM_ACTION_TIMEOUT_SECS".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        // tokio 的 mpsc 不接受容量 0
        if self.channel_capacity == 0 {
            return Err(ConfigError::Invalid {
                var: "HOLDEM_CHANNEL_CAPACITY".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            starting_chips: STARTING_CHIPS,
            action_timeout: Duration::from_secs(60),
            channel_capacity: 32,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// 读取并解析一个变量，未设置时使用默认值，设置了但解析失败时报错
fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            var: key.to_string(),
            reason: format!("cannot parse '{}'", raw),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = ServerConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.bind, "0.0.0.0:25917".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_reads_every_variable() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("HOLDEM_BIND", "127.0.0.1:9000"),
            ("HOLDEM_STARTING_CHIPS", "500"),
            ("HOLDEM_ACTION_TIMEOUT_SECS", "15"),
            ("HOLDEM_CHANNEL_CAPACITY", "8"),
        ]))
        .unwrap();
        assert_eq!(config.bind, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.starting_chips, 500);
        assert_eq!(config.action_timeout, Duration::from_secs(15));
        assert_eq!(config.channel_capacity, 8);
    }

    #[test]
    fn test_unparsable_value_is_an_error() {
        let err = ServerConfig::from_lookup(lookup_from(&[("HOLDEM_STARTING_CHIPS", "lots")])).unwrap_err();
        assert!(err.to_string().contains("HOLDEM_STARTING_CHIPS"));

        let err = ServerConfig::from_lookup(lookup_from(&[("HOLDEM_BIND", "localhost")])).unwrap_err();
        assert!(err.to_string().contains("HOLDEM_BIND"));
    }

    #[test]
    fn test_validation_rejects_tiny_stack() {
        let config = ServerConfig { starting_chips: BIG_BLIND - 1, ..ServerConfig::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_validation_rejects_zero_timeout_and_capacity() {
        let config = ServerConfig { action_timeout: Duration::ZERO, ..ServerConfig::default() };
        assert!(config.validate().is_err());
        let config = ServerConfig { channel_capacity: 0, ..ServerConfig::default() };
        assert!(config.validate().is_err());
    }
}
