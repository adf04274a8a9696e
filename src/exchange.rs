// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Exchange Definitions
//!
//! Exchanges route published messages to bound queues. The client only needs
//! the two kinds its topologies use: `fanout` for broadcast and `direct` for
//! routing-key dispatch. The simple topology never declares one and publishes
//! through the broker's nameless default exchange.

use lapin::options::ExchangeDeclareOptions;
use std::fmt::{Display, Formatter};

/// Kinds of exchange the client can declare.
///
/// - Direct: delivers to queues bound with exactly the message routing key
/// - Fanout: delivers to every bound queue and ignores the routing key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    Direct,
    Fanout,
}

impl From<ExchangeKind> for lapin::ExchangeKind {
    fn from(kind: ExchangeKind) -> Self {
        match kind {
            ExchangeKind::Direct => lapin::ExchangeKind::Direct,
            ExchangeKind::Fanout => lapin::ExchangeKind::Fanout,
        }
    }
}

impl Display for ExchangeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ExchangeKind::Direct => write!(f, "direct"),
            ExchangeKind::Fanout => write!(f, "fanout"),
        }
    }
}

/// Definition of an exchange and the flags it is declared with.
///
/// Every exchange is declared non-durable, non-auto-delete and non-internal so
/// redeclaring it from any client is a no-op on the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeDefinition<'ex> {
    pub(crate) name: &'ex str,
    pub(crate) kind: ExchangeKind,
}

impl<'ex> ExchangeDefinition<'ex> {
    pub fn new(name: &'ex str, kind: ExchangeKind) -> ExchangeDefinition<'ex> {
        ExchangeDefinition { name, kind }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn kind(&self) -> ExchangeKind {
        self.kind
    }

    pub(crate) fn options(&self) -> ExchangeDeclareOptions {
        ExchangeDeclareOptions {
            passive: false,
            durable: false,
            auto_delete: false,
            internal: false,
            nowait: false,
        }
    }
}
