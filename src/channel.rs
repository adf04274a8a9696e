// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # AMQP Channel Management
//!
//! Opens the single connection a client owns and the single channel multiplexed
//! over it. Both are created together and any failure is reported to the caller
//! instead of leaving a half-initialized client behind.

use crate::{configs::Configs, errors::AmqpError};
use lapin::{types::LongString, Channel, Connection, ConnectionProperties};
use std::sync::Arc;
use tracing::{debug, error};

/// Connects to the broker described by `cfg` and opens one channel on it.
///
/// The connection is named after the application so it can be told apart in
/// the broker management UI.
///
/// # Example
/// ```no_run
/// # async fn run() -> Result<(), rabbitmq_client::errors::AmqpError> {
/// let cfg = rabbitmq_client::configs::Configs::default();
/// let (conn, channel) = rabbitmq_client::channel::new_amqp_channel(&cfg).await?;
/// # Ok(())
/// # }
/// ```
pub async fn new_amqp_channel(cfg: &Configs) -> Result<(Connection, Arc<Channel>), AmqpError> {
    debug!("creating amqp connection...");
    let options = ConnectionProperties::default()
        .with_connection_name(LongString::from(cfg.app.name.clone()));

    let conn = match Connection::connect_uri(cfg.rabbitmq.amqp_uri(), options).await {
        Ok(c) => Ok(c),
        Err(err) => {
            error!(
                error = err.to_string(),
                host = cfg.rabbitmq.host,
                port = cfg.rabbitmq.port,
                "failure to connect"
            );
            Err(AmqpError::ConnectionError(err.to_string()))
        }
    }?;
    debug!("amqp connected");

    debug!("creating amqp channel...");
    match conn.create_channel().await {
        Ok(c) => {
            debug!("channel created");
            Ok((conn, Arc::new(c)))
        }
        Err(err) => {
            error!(error = err.to_string(), "error to create the channel");
            if let Err(close_err) = conn.close(0, "channel creation failed").await {
                debug!(error = close_err.to_string(), "error to close the connection");
            }
            Err(AmqpError::ChannelError(err.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{configs::RabbitMQConfigs, errors::ErrorKind};

    #[tokio::test]
    async fn should_fail_to_connect_to_unreachable_broker() {
        let cfg = Configs {
            rabbitmq: RabbitMQConfigs {
                host: "127.0.0.1".to_owned(),
                port: 1,
                ..RabbitMQConfigs::default()
            },
            ..Configs::default()
        };

        let res = new_amqp_channel(&cfg).await;

        assert_eq!(res.err().map(|e| e.kind()), Some(ErrorKind::ConnectionFailed));
    }
}
