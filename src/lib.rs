// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! Messaging client over an AMQP 0-9-1 broker with three topologies:
//! simple/work queueing, fanout broadcast and direct routing-key dispatch.

mod consumer;
mod otel;

pub mod channel;
pub mod client;
pub mod configs;
pub mod dispatcher;
pub mod errors;
pub mod exchange;
pub mod handler;
pub mod logging;
pub mod publisher;
pub mod queue;
pub mod topology;

pub use client::MessagingClient;
pub use tokio_util::sync::CancellationToken;
