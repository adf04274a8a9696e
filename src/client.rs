// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Messaging Client
//!
//! `MessagingClient` owns one broker connection and one channel and sequences
//! the declare/bind/publish/consume steps of its topology:
//!
//! | topology | publish                                   | consume                                        |
//! |----------|-------------------------------------------|------------------------------------------------|
//! | simple   | declare queue, publish to `""` by queue    | declare queue, subscribe                        |
//! | fanout   | declare exchange, publish with key `""`   | declare exchange, queue, bind with `""`, subscribe |
//! | direct   | declare exchange, publish with the key    | declare exchange, queue, bind with the key, subscribe |
//!
//! Declarations are idempotent on the broker. Publishing declares once per
//! client and remembers it; consuming always declares again.
//!
//! # Example
//! ```no_run
//! use rabbitmq_client::{client::MessagingClient, configs::ConfigBuilder};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = ConfigBuilder::new().build()?;
//! let client = MessagingClient::simple(&cfg, "immocSimple").await?;
//! client.publish_simple(b"Hello L!").await?;
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

use crate::{
    channel::new_amqp_channel,
    configs::Configs,
    dispatcher::RabbitMQDispatcher,
    errors::AmqpError,
    handler::ConsumerHandler,
    publisher,
    queue::QueueBinding,
    topology::{AmqpTopology, ClientDefinition, Topology},
};
use lapin::{Channel, Connection};
use opentelemetry::Context;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Reply code sent with channel.close and connection.close
const REPLY_SUCCESS: u16 = 200;

/// What the client already declared on the broker.
#[derive(Debug, Default)]
struct Declared {
    queue: Option<String>,
    exchange: bool,
}

/// Open/closed flag of a client.
#[derive(Debug, Default)]
struct Lifecycle {
    closed: AtomicBool,
}

impl Lifecycle {
    fn ensure_open(&self) -> Result<(), AmqpError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(AmqpError::ClientClosed);
        }
        Ok(())
    }

    /// Flips to closed, fails if it already was.
    fn close(&self) -> Result<(), AmqpError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(AmqpError::ClientClosed);
        }
        Ok(())
    }
}

/// Facade over one connection and one channel for one topology.
pub struct MessagingClient {
    app: String,
    conn: Connection,
    channel: Arc<Channel>,
    def: ClientDefinition,
    declared: Mutex<Declared>,
    lifecycle: Lifecycle,
}

impl MessagingClient {
    /// Validates `def`, then opens the connection and its channel.
    pub async fn new(cfg: &Configs, def: ClientDefinition) -> Result<MessagingClient, AmqpError> {
        def.validate()?;

        let (conn, channel) = new_amqp_channel(cfg).await?;
        debug!(topology = def.topology().as_str(), "messaging client ready");

        Ok(MessagingClient {
            app: cfg.app.name.clone(),
            conn,
            channel,
            def,
            declared: Mutex::new(Declared::default()),
            lifecycle: Lifecycle::default(),
        })
    }

    /// Simple/work topology on `queue`.
    pub async fn simple(cfg: &Configs, queue: &str) -> Result<MessagingClient, AmqpError> {
        MessagingClient::new(cfg, ClientDefinition::simple(queue)).await
    }

    /// Fanout topology on `exchange` with a broker-named queue.
    pub async fn fanout(cfg: &Configs, exchange: &str) -> Result<MessagingClient, AmqpError> {
        MessagingClient::new(cfg, ClientDefinition::fanout(exchange)).await
    }

    /// Direct-routing topology on `exchange` under `routing_key`.
    pub async fn direct(
        cfg: &Configs,
        exchange: &str,
        routing_key: &str,
    ) -> Result<MessagingClient, AmqpError> {
        MessagingClient::new(cfg, ClientDefinition::direct(exchange, routing_key)).await
    }

    /// Topology, queue, exchange and routing key this client was built with.
    pub fn definition(&self) -> &ClientDefinition {
        &self.def
    }

    /// Whether [`MessagingClient::close`] was already called.
    pub fn is_closed(&self) -> bool {
        self.lifecycle.ensure_open().is_err()
    }

    /// Declares the configured queue and returns its name, generated by the
    /// broker for anonymous subscriber queues.
    pub async fn declare_queue(&self) -> Result<String, AmqpError> {
        self.lifecycle.ensure_open()?;

        AmqpTopology::new(&self.channel)
            .declare_queue(&self.def.queue_definition())
            .await
    }

    /// Declares the configured fanout or direct exchange.
    pub async fn declare_exchange(&self) -> Result<(), AmqpError> {
        self.lifecycle.ensure_open()?;

        let Some(exch) = self.def.exchange_definition() else {
            return Err(AmqpError::TopologyMismatch {
                expected: "fanout or direct",
                actual: self.def.topology().as_str(),
            });
        };

        AmqpTopology::new(&self.channel).declare_exchange(&exch).await
    }

    /// Binds `queue` to the configured exchange with the topology binding key.
    pub async fn bind_queue(&self, queue: &str) -> Result<(), AmqpError> {
        self.lifecycle.ensure_open()?;

        if self.def.topology() == Topology::Simple {
            return Err(AmqpError::TopologyMismatch {
                expected: "fanout or direct",
                actual: self.def.topology().as_str(),
            });
        }

        let binding = QueueBinding::new(queue)
            .exchange(self.def.exchange_name())
            .routing_key(self.def.binding_key());

        AmqpTopology::new(&self.channel).bind_queue(&binding).await
    }

    /// Publishes `data` the way the client topology dictates.
    pub async fn publish(&self, data: &[u8]) -> Result<(), AmqpError> {
        self.lifecycle.ensure_open()?;

        match self.def.topology() {
            Topology::Simple => {
                self.ensure_queue().await?;
            }
            Topology::Fanout | Topology::Direct => {
                self.ensure_exchange().await?;
            }
        }

        publisher::publish(
            &self.channel,
            &Context::current(),
            self.def.exchange_name(),
            self.def.publish_key(),
            data,
        )
        .await
    }

    /// Sends `data` to the configured queue through the default exchange.
    pub async fn publish_simple(&self, data: &[u8]) -> Result<(), AmqpError> {
        self.expect_topology(Topology::Simple)?;
        self.publish(data).await
    }

    /// Broadcasts `data` to every queue bound to the configured exchange.
    pub async fn publish_fanout(&self, data: &[u8]) -> Result<(), AmqpError> {
        self.expect_topology(Topology::Fanout)?;
        self.publish(data).await
    }

    /// Sends `data` to the queues bound to the configured exchange with the
    /// configured routing key.
    pub async fn publish_direct(&self, data: &[u8]) -> Result<(), AmqpError> {
        self.expect_topology(Topology::Direct)?;
        self.publish(data).await
    }

    /// Sets up the topology, subscribes and hands every delivery to `handler`
    /// until `cancel` fires.
    pub async fn consume(
        &self,
        handler: Arc<dyn ConsumerHandler>,
        cancel: CancellationToken,
    ) -> Result<(), AmqpError> {
        self.lifecycle.ensure_open()?;

        let queue = match self.def.topology() {
            Topology::Simple => self.declare_queue().await?,
            Topology::Fanout | Topology::Direct => {
                self.declare_exchange().await?;
                let queue = self.declare_queue().await?;
                self.bind_queue(&queue).await?;
                queue
            }
        };

        RabbitMQDispatcher::new(
            self.channel.clone(),
            &self.app,
            &queue,
            self.def.acknowledgement(),
            handler,
        )
        .consume_blocking(cancel)
        .await
    }

    /// Consumes the configured queue.
    pub async fn consume_simple(
        &self,
        handler: Arc<dyn ConsumerHandler>,
        cancel: CancellationToken,
    ) -> Result<(), AmqpError> {
        self.expect_topology(Topology::Simple)?;
        self.consume(handler, cancel).await
    }

    /// Consumes a queue bound to the fanout exchange.
    pub async fn consume_fanout(
        &self,
        handler: Arc<dyn ConsumerHandler>,
        cancel: CancellationToken,
    ) -> Result<(), AmqpError> {
        self.expect_topology(Topology::Fanout)?;
        self.consume(handler, cancel).await
    }

    /// Consumes a queue bound to the direct exchange under the routing key.
    pub async fn consume_direct(
        &self,
        handler: Arc<dyn ConsumerHandler>,
        cancel: CancellationToken,
    ) -> Result<(), AmqpError> {
        self.expect_topology(Topology::Direct)?;
        self.consume(handler, cancel).await
    }

    /// Closes the channel, then the connection. The client is unusable
    /// afterwards even when closing fails on the broker side.
    pub async fn close(&self) -> Result<(), AmqpError> {
        self.lifecycle.close()?;

        debug!("closing amqp channel...");
        let channel = self
            .channel
            .close(REPLY_SUCCESS, "client closed")
            .await
            .map_err(|err| {
                error!(error = err.to_string(), "error to close the channel");
                AmqpError::ChannelError(err.to_string())
            });

        debug!("closing amqp connection...");
        let conn = self
            .conn
            .close(REPLY_SUCCESS, "client closed")
            .await
            .map_err(|err| {
                error!(error = err.to_string(), "error to close the connection");
                AmqpError::ConnectionError(err.to_string())
            });

        channel.and(conn)
    }

    fn expect_topology(&self, expected: Topology) -> Result<(), AmqpError> {
        self.lifecycle.ensure_open()?;
        check_topology(expected, self.def.topology())
    }

    async fn ensure_queue(&self) -> Result<String, AmqpError> {
        let mut declared = self.declared.lock().await;
        if let Some(queue) = &declared.queue {
            return Ok(queue.clone());
        }

        let queue = self.declare_queue().await?;
        declared.queue = Some(queue.clone());
        Ok(queue)
    }

    async fn ensure_exchange(&self) -> Result<(), AmqpError> {
        let mut declared = self.declared.lock().await;
        if declared.exchange {
            return Ok(());
        }

        self.declare_exchange().await?;
        declared.exchange = true;
        Ok(())
    }
}

fn check_topology(expected: Topology, actual: Topology) -> Result<(), AmqpError> {
    if expected != actual {
        return Err(AmqpError::TopologyMismatch {
            expected: expected.as_str(),
            actual: actual.as_str(),
        });
    }
    Ok(())
}
