// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Consumer Handler
//!
//! The application side of a subscription: every delivery is turned into a
//! [`ConsumerMessage`] and handed to a [`ConsumerHandler`].

use crate::errors::AmqpError;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use opentelemetry::Context;

/// A message received from the broker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerMessage {
    /// Queue the message was consumed from
    pub queue: String,
    /// Exchange the message was published to, empty for the default exchange
    pub exchange: String,
    pub routing_key: String,
    pub data: Box<[u8]>,
    pub delivery_tag: u64,
    pub redelivered: bool,
}

impl ConsumerMessage {
    pub fn new<T>(queue: T, exchange: T, routing_key: T, data: &[u8]) -> Self
    where
        T: Into<String>,
    {
        ConsumerMessage {
            queue: queue.into(),
            exchange: exchange.into(),
            routing_key: routing_key.into(),
            data: data.into(),
            ..ConsumerMessage::default()
        }
    }

    /// Body as UTF-8 text, lossy.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

/// Processes the deliveries of a subscription, one at a time and in order.
///
/// Returning an error marks the delivery as failed: it is logged and recorded
/// on the consumer span, and in manual acknowledgment mode the message is
/// requeued.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConsumerHandler: Send + Sync {
    async fn exec(&self, ctx: &Context, msg: &ConsumerMessage) -> Result<(), AmqpError>;
}
