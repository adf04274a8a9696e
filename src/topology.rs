// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Topologies and Declaration Primitives
//!
//! This module describes which broker entities a client works with and provides
//! the declare/bind primitives every topology shares.
//!
//! The main components are:
//! - `Topology`: simple/work queueing, fanout broadcast or direct routing
//! - `ClientDefinition`: the immutable queue/exchange/routing-key setup of a client
//! - `AmqpTopology`: queue.declare, exchange.declare and queue.bind on a channel

use crate::{
    errors::AmqpError,
    exchange::{ExchangeDefinition, ExchangeKind},
    queue::{QueueBinding, QueueDefinition},
};
use lapin::{types::FieldTable, Channel};
use std::fmt::{Display, Formatter};
use tracing::{debug, error};

/// Interaction pattern of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// Default exchange, named queue, routing key = queue name.
    Simple,
    /// Fanout exchange, every bound queue receives every message.
    Fanout,
    /// Direct exchange, only queues bound with the message key receive it.
    Direct,
}

impl Topology {
    /// Kind of exchange the topology declares, `None` for the default exchange.
    pub fn exchange_kind(&self) -> Option<ExchangeKind> {
        match self {
            Topology::Simple => None,
            Topology::Fanout => Some(ExchangeKind::Fanout),
            Topology::Direct => Some(ExchangeKind::Direct),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Topology::Simple => "simple",
            Topology::Fanout => "fanout",
            Topology::Direct => "direct",
        }
    }
}

impl Display for Topology {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How deliveries are acknowledged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AckMode {
    /// The broker forgets the message as soon as it is handed over.
    #[default]
    Auto,
    /// Ack after the handler succeeds. A failed message is nacked with
    /// requeue once; if it fails again after the redelivery it is nacked
    /// without requeue and dropped (or dead-lettered, if the queue has a
    /// dead letter exchange) instead of looping forever.
    Manual,
}

impl AckMode {
    pub fn is_auto(&self) -> bool {
        self == &AckMode::Auto
    }
}

/// Queue, exchange and routing key a client works with.
///
/// Built through [`ClientDefinition::simple`], [`ClientDefinition::fanout`] or
/// [`ClientDefinition::direct`] and validated when the client is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientDefinition {
    topology: Topology,
    queue: String,
    exchange: String,
    routing_key: String,
    ack_mode: AckMode,
}

impl ClientDefinition {
    pub fn simple(queue: &str) -> ClientDefinition {
        ClientDefinition::new(Topology::Simple, queue, "", "")
    }

    pub fn fanout(exchange: &str) -> ClientDefinition {
        ClientDefinition::new(Topology::Fanout, "", exchange, "")
    }

    pub fn direct(exchange: &str, routing_key: &str) -> ClientDefinition {
        ClientDefinition::new(Topology::Direct, "", exchange, routing_key)
    }

    fn new(topology: Topology, queue: &str, exchange: &str, key: &str) -> ClientDefinition {
        ClientDefinition {
            topology,
            queue: queue.to_owned(),
            exchange: exchange.to_owned(),
            routing_key: key.to_owned(),
            ack_mode: AckMode::default(),
        }
    }

    /// Names the queue of a fanout or direct subscriber instead of letting the
    /// broker generate one.
    pub fn queue(mut self, name: &str) -> Self {
        self.queue = name.to_owned();
        self
    }

    pub fn ack_mode(mut self, mode: AckMode) -> Self {
        self.ack_mode = mode;
        self
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn queue_name(&self) -> &str {
        &self.queue
    }

    pub fn exchange_name(&self) -> &str {
        &self.exchange
    }

    pub fn routing_key_name(&self) -> &str {
        &self.routing_key
    }

    pub fn acknowledgement(&self) -> AckMode {
        self.ack_mode
    }

    /// The exchange to declare, `None` for the simple topology.
    pub fn exchange_definition(&self) -> Option<ExchangeDefinition<'_>> {
        self.topology
            .exchange_kind()
            .map(|kind| ExchangeDefinition::new(&self.exchange, kind))
    }

    pub fn queue_definition(&self) -> QueueDefinition {
        QueueDefinition::new(&self.queue)
    }

    /// Key a bound queue listens on: empty for fanout, the configured key for
    /// direct routing.
    pub fn binding_key(&self) -> &str {
        match self.topology {
            Topology::Direct => &self.routing_key,
            _ => "",
        }
    }

    /// Key messages are published with.
    pub fn publish_key(&self) -> &str {
        match self.topology {
            Topology::Simple => &self.queue,
            Topology::Fanout => "",
            Topology::Direct => &self.routing_key,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), AmqpError> {
        let reason = match self.topology {
            Topology::Simple if self.queue.is_empty() => {
                Some("simple topology requires a queue name")
            }
            Topology::Simple if !self.exchange.is_empty() => {
                Some("simple topology publishes through the default exchange")
            }
            Topology::Simple if !self.routing_key.is_empty() => {
                Some("simple topology routes by queue name")
            }
            Topology::Fanout | Topology::Direct if self.exchange.is_empty() => {
                Some("fanout and direct topologies require an exchange name")
            }
            Topology::Fanout if !self.routing_key.is_empty() => {
                Some("fanout topology ignores routing keys")
            }
            Topology::Direct if self.routing_key.is_empty() => {
                Some("direct topology requires a routing key")
            }
            _ => None,
        };

        match reason {
            Some(reason) => Err(AmqpError::InvalidDefinition(reason.to_owned())),
            None => Ok(()),
        }
    }
}

/// Declare and bind primitives over a channel.
pub struct AmqpTopology<'tp> {
    channel: &'tp Channel,
}

impl<'tp> AmqpTopology<'tp> {
    pub fn new(channel: &'tp Channel) -> AmqpTopology<'tp> {
        AmqpTopology { channel }
    }

    /// Declares the exchange, a no-op when it already exists with the same
    /// parameters.
    pub async fn declare_exchange(&self, def: &ExchangeDefinition<'_>) -> Result<(), AmqpError> {
        debug!(kind = def.kind.to_string(), "creating exchange: {}", def.name);

        match self
            .channel
            .exchange_declare(
                def.name,
                def.kind.into(),
                def.options(),
                FieldTable::default(),
            )
            .await
        {
            Err(err) => {
                error!(
                    error = err.to_string(),
                    name = def.name,
                    "error to declare the exchange"
                );
                Err(AmqpError::DeclareExchangeError(
                    def.name.to_owned(),
                    err.to_string(),
                ))
            }
            _ => {
                debug!("exchange: {} was created", def.name);
                Ok(())
            }
        }
    }

    /// Declares the queue and returns its name, which the broker generates when
    /// the definition has none.
    pub async fn declare_queue(&self, def: &QueueDefinition) -> Result<String, AmqpError> {
        debug!("creating queue: {}", def.name);

        match self
            .channel
            .queue_declare(&def.name, def.options(), FieldTable::default())
            .await
        {
            Err(err) => {
                error!(
                    error = err.to_string(),
                    name = def.name,
                    "error to declare the queue"
                );
                Err(AmqpError::DeclareQueueError(
                    def.name.clone(),
                    err.to_string(),
                ))
            }
            Ok(queue) => {
                let name = queue.name().as_str().to_owned();
                debug!("queue: {} was created", name);
                Ok(name)
            }
        }
    }

    /// Binds a queue to an exchange. Both must already exist.
    pub async fn bind_queue(&self, binding: &QueueBinding<'_>) -> Result<(), AmqpError> {
        debug!(
            "binding queue: {} to the exchange: {} with the key: {}",
            binding.queue_name, binding.exchange_name, binding.routing_key
        );

        match self
            .channel
            .queue_bind(
                binding.queue_name,
                binding.exchange_name,
                binding.routing_key,
                binding.options(),
                FieldTable::default(),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error to bind queue to exchange");
                Err(AmqpError::BindingExchangeToQueueError(
                    binding.exchange_name.to_owned(),
                    binding.queue_name.to_owned(),
                    err.to_string(),
                ))
            }
            _ => {
                debug!("queue was bounded");
                Ok(())
            }
        }
    }
}
