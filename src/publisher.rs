// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Message Publisher
//!
//! Wraps basic.publish with the properties every message of the client carries:
//! a `text/plain` content type, a fresh message id and the current trace
//! context in the headers. Messages are neither mandatory nor immediate, so a
//! message no queue is bound for is dropped by the broker.

use crate::{errors::AmqpError, otel};
use lapin::{
    options::BasicPublishOptions,
    types::{FieldTable, ShortString},
    BasicProperties, Channel,
};
use opentelemetry::Context;
use tracing::{debug, error};
use uuid::Uuid;

/// Content type of every published message
pub const TEXT_CONTENT_TYPE: &str = "text/plain";

/// Publishes `data` to `exchange` under `key`.
///
/// An empty `exchange` targets the broker's default exchange, which routes by
/// queue name.
pub async fn publish(
    channel: &Channel,
    ctx: &Context,
    exchange: &str,
    key: &str,
    data: &[u8],
) -> Result<(), AmqpError> {
    debug!(exchange, key, size = data.len(), "publishing message");

    match channel
        .basic_publish(
            exchange,
            key,
            BasicPublishOptions {
                immediate: false,
                mandatory: false,
            },
            data,
            properties(ctx),
        )
        .await
    {
        Err(err) => {
            error!(error = err.to_string(), exchange, key, "error publishing message");
            Err(AmqpError::PublishingError(err.to_string()))
        }
        _ => Ok(()),
    }
}

fn properties(ctx: &Context) -> BasicProperties {
    BasicProperties::default()
        .with_content_type(ShortString::from(TEXT_CONTENT_TYPE))
        .with_message_id(ShortString::from(Uuid::new_v4().to_string()))
        .with_headers(FieldTable::from(otel::inject(ctx)))
}
