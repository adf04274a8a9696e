// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Client Configuration
//!
//! Broker address, credentials and application settings. Values come from
//! environment variables (optionally loaded from a `.env` file chosen by
//! `RUST_ENV`) through [`ConfigBuilder`], or from any serde format since every
//! struct here implements `Deserialize`.

use crate::errors::ConfigsError;
use dotenvy::from_filename;
use lapin::uri::{AMQPAuthority, AMQPUri, AMQPUserInfo};
use serde::Deserialize;
use std::{
    env,
    fmt::{Display, Formatter},
};
use tracing::debug;

pub const RUST_ENV_KEY: &str = "RUST_ENV";
pub const APP_NAME_ENV_KEY: &str = "APP_NAME";
pub const LOG_LEVEL_ENV_KEY: &str = "LOG_LEVEL";
pub const ENABLE_EXTERNAL_CRATES_LOGGING_ENV_KEY: &str = "ENABLE_EXTERNAL_CRATES_LOGGING";
pub const AMQP_HOST_ENV_KEY: &str = "AMQP_HOST";
pub const AMQP_PORT_ENV_KEY: &str = "AMQP_PORT";
pub const AMQP_USER_ENV_KEY: &str = "AMQP_USER";
pub const AMQP_PASSWORD_ENV_KEY: &str = "AMQP_PASSWORD";
pub const AMQP_VHOST_ENV_KEY: &str = "AMQP_VHOST";

pub const LOCAL_ENV_FILE_NAME: &str = ".env.local";
pub const DEV_ENV_FILE_NAME: &str = ".env.development";
pub const STAGING_FILE_NAME: &str = ".env.staging";
pub const PROD_FILE_NAME: &str = ".env";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Dev,
    Staging,
    Prod,
}

impl Display for Environment {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let printable = match *self {
            Environment::Local => "local",
            Environment::Dev => "development",
            Environment::Staging => "staging",
            Environment::Prod => "prod",
        };
        write!(f, "{}", printable)
    }
}

impl Environment {
    pub fn from_rust_env() -> Environment {
        Environment::parse(&env::var(RUST_ENV_KEY).unwrap_or_default())
    }

    fn parse(value: &str) -> Environment {
        match value {
            "production" | "prod" | "PRODUCTION" | "PROD" => Environment::Prod,
            "staging" | "stg" | "STAGING" | "STG" => Environment::Staging,
            "develop" | "DEVELOP" | "dev" | "DEV" => Environment::Dev,
            _ => Environment::Local,
        }
    }

    pub fn is_local(&self) -> bool {
        self == &Environment::Local
    }

    fn env_file(&self) -> &'static str {
        match self {
            Environment::Local => LOCAL_ENV_FILE_NAME,
            Environment::Dev => DEV_ENV_FILE_NAME,
            Environment::Staging => STAGING_FILE_NAME,
            Environment::Prod => PROD_FILE_NAME,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfigs {
    ///Default: rabbitmq-client
    pub name: String,
    ///Default: Environment::Local
    pub env: Environment,
    ///Default: debug
    pub log_level: String,
    ///Default: false
    pub enable_external_crates_logging: bool,
}

impl Default for AppConfigs {
    fn default() -> Self {
        Self {
            name: "rabbitmq-client".to_owned(),
            env: Environment::Local,
            log_level: "debug".to_owned(),
            enable_external_crates_logging: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RabbitMQConfigs {
    ///Default: localhost
    pub host: String,
    ///Default: 5672
    pub port: u16,
    ///Default: guest
    pub user: String,
    ///Default: guest
    pub password: String,
    ///Default: /
    pub vhost: String,
}

impl Default for RabbitMQConfigs {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 5672,
            user: "guest".to_owned(),
            password: "guest".to_owned(),
            vhost: "/".to_owned(),
        }
    }
}

impl RabbitMQConfigs {
    /// Broker address as lapin connects to it.
    ///
    /// Built field by field so credentials and vhost go through untouched,
    /// reserved characters such as `@`, `:` or `/` included. An empty vhost
    /// stands for the default `/`.
    pub fn amqp_uri(&self) -> AMQPUri {
        let vhost = match self.vhost.as_str() {
            "" => "/".to_owned(),
            other => other.to_owned(),
        };

        AMQPUri {
            authority: AMQPAuthority {
                userinfo: AMQPUserInfo {
                    username: self.user.clone(),
                    password: self.password.clone(),
                },
                host: self.host.clone(),
                port: self.port,
            },
            vhost,
            ..AMQPUri::default()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Configs {
    pub app: AppConfigs,
    pub rabbitmq: RabbitMQConfigs,
}

/// Builds [`Configs`] from the process environment.
#[derive(Default)]
pub struct ConfigBuilder {
    skip_env_file: bool,
}

impl ConfigBuilder {
    pub fn new() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Do not look for a `.env` file, only read the process environment.
    pub fn skip_env_file(mut self) -> Self {
        self.skip_env_file = true;
        self
    }

    pub fn build(&self) -> Result<Configs, ConfigsError> {
        let env = Environment::from_rust_env();

        if !self.skip_env_file && from_filename(env.env_file()).is_err() {
            debug!(file = env.env_file(), "env file not loaded");
        }

        self.build_from(env, env::vars())
    }

    pub(crate) fn build_from<I>(&self, env: Environment, vars: I) -> Result<Configs, ConfigsError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut cfg = Configs::default();
        cfg.app.env = env;

        for (key, value) in vars {
            self.fill(&mut cfg, &key, value)?;
        }

        Ok(cfg)
    }

    fn fill(&self, cfg: &mut Configs, key: &str, value: String) -> Result<(), ConfigsError> {
        match key {
            APP_NAME_ENV_KEY => cfg.app.name = value,
            LOG_LEVEL_ENV_KEY => cfg.app.log_level = value,
            ENABLE_EXTERNAL_CRATES_LOGGING_ENV_KEY => {
                cfg.app.enable_external_crates_logging = value
                    .parse()
                    .map_err(|_| ConfigsError::InvalidValue(key.to_owned()))?
            }
            AMQP_HOST_ENV_KEY => cfg.rabbitmq.host = value,
            AMQP_PORT_ENV_KEY => {
                cfg.rabbitmq.port = value
                    .parse()
                    .map_err(|_| ConfigsError::InvalidValue(key.to_owned()))?
            }
            AMQP_USER_ENV_KEY => cfg.rabbitmq.user = value,
            AMQP_PASSWORD_ENV_KEY => cfg.rabbitmq.password = value,
            AMQP_VHOST_ENV_KEY => cfg.rabbitmq.vhost = value,
            _ => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn should_build_uri_with_custom_vhost() {
        let cfg = RabbitMQConfigs {
            host: "127.0.0.1".to_owned(),
            port: 5672,
            user: "immoc".to_owned(),
            password: "immoc".to_owned(),
            vhost: "immoc".to_owned(),
        };

        let uri = cfg.amqp_uri();

        assert_eq!(uri.authority.host, "127.0.0.1");
        assert_eq!(uri.authority.port, 5672);
        assert_eq!(uri.authority.userinfo.username, "immoc");
        assert_eq!(uri.authority.userinfo.password, "immoc");
        assert_eq!(uri.vhost, "immoc");
    }

    #[test]
    fn should_use_default_vhost_when_empty() {
        let cfg = RabbitMQConfigs {
            vhost: "".to_owned(),
            ..RabbitMQConfigs::default()
        };

        assert_eq!(cfg.amqp_uri().vhost, "/");
        assert_eq!(RabbitMQConfigs::default().amqp_uri().vhost, "/");
    }

    #[test]
    fn should_keep_reserved_characters_in_credentials() {
        let cfg = RabbitMQConfigs {
            user: "im:moc".to_owned(),
            password: "p@ss/w:rd".to_owned(),
            vhost: "team/a".to_owned(),
            ..RabbitMQConfigs::default()
        };

        let uri = cfg.amqp_uri();

        assert_eq!(uri.authority.userinfo.username, "im:moc");
        assert_eq!(uri.authority.userinfo.password, "p@ss/w:rd");
        assert_eq!(uri.authority.host, "localhost");
        assert_eq!(uri.authority.port, 5672);
        assert_eq!(uri.vhost, "team/a");
    }

    #[test]
    fn should_parse_environment() {
        assert_eq!(Environment::parse("prod"), Environment::Prod);
        assert_eq!(Environment::parse("STG"), Environment::Staging);
        assert_eq!(Environment::parse("dev"), Environment::Dev);
        assert_eq!(Environment::parse(""), Environment::Local);
        assert_eq!(Environment::Dev.to_string(), "development");
    }

    #[test]
    fn should_build_from_env_vars() {
        let cfg = ConfigBuilder::new()
            .build_from(
                Environment::Staging,
                vars(&[
                    (APP_NAME_ENV_KEY, "publisher"),
                    (LOG_LEVEL_ENV_KEY, "info"),
                    (AMQP_HOST_ENV_KEY, "broker"),
                    (AMQP_PORT_ENV_KEY, "5673"),
                    (AMQP_USER_ENV_KEY, "immoc"),
                    (AMQP_PASSWORD_ENV_KEY, "secret"),
                    (AMQP_VHOST_ENV_KEY, "immoc"),
                    ("PATH", "/usr/bin"),
                ]),
            )
            .unwrap();

        assert_eq!(cfg.app.name, "publisher");
        assert_eq!(cfg.app.log_level, "info");
        assert_eq!(cfg.app.env, Environment::Staging);
        let uri = cfg.rabbitmq.amqp_uri();
        assert_eq!(uri.authority.host, "broker");
        assert_eq!(uri.authority.port, 5673);
        assert_eq!(uri.authority.userinfo.password, "secret");
        assert_eq!(uri.vhost, "immoc");
    }

    #[test]
    fn should_reject_invalid_port() {
        let res = ConfigBuilder::new()
            .build_from(Environment::Local, vars(&[(AMQP_PORT_ENV_KEY, "amqp")]));

        assert_eq!(
            res.unwrap_err(),
            ConfigsError::InvalidValue(AMQP_PORT_ENV_KEY.to_owned())
        );
    }

    #[test]
    fn should_deserialize_partial_configs() {
        let cfg: Configs = serde_json::from_str(
            r#"{"app": {"env": "prod"}, "rabbitmq": {"host": "mq", "vhost": "immoc"}}"#,
        )
        .unwrap();

        assert_eq!(cfg.app.env, Environment::Prod);
        assert_eq!(cfg.app.name, "rabbitmq-client");
        assert_eq!(cfg.rabbitmq.port, 5672);
        assert_eq!(cfg.rabbitmq.amqp_uri().authority.host, "mq");
        assert_eq!(cfg.rabbitmq.amqp_uri().vhost, "immoc");
    }
}
