// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Queue Definitions
//!
//! A queue is either named by the caller or left empty so the broker assigns a
//! name, which is how transient fanout and routing subscribers get their own
//! queue. Bindings attach a queue to an exchange under a routing key.

use lapin::options::{QueueBindOptions, QueueDeclareOptions};

/// Definition of a queue and the flags it is declared with.
///
/// Queues are non-durable, non-exclusive and never auto-deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueDefinition {
    pub(crate) name: String,
}

impl QueueDefinition {
    /// An empty `name` asks the broker to generate one.
    pub fn new(name: &str) -> QueueDefinition {
        QueueDefinition {
            name: name.to_owned(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_anonymous(&self) -> bool {
        self.name.is_empty()
    }

    pub(crate) fn options(&self) -> QueueDeclareOptions {
        QueueDeclareOptions {
            passive: false,
            durable: false,
            exclusive: false,
            auto_delete: false,
            nowait: false,
        }
    }
}

/// Configuration for binding a queue to an exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueBinding<'qeb> {
    pub(crate) queue_name: &'qeb str,
    pub(crate) exchange_name: &'qeb str,
    pub(crate) routing_key: &'qeb str,
}

impl<'qeb> QueueBinding<'qeb> {
    /// Creates a binding for `queue` with empty exchange and routing key.
    pub fn new(queue: &'qeb str) -> QueueBinding<'qeb> {
        QueueBinding {
            queue_name: queue,
            exchange_name: "",
            routing_key: "",
        }
    }

    pub fn exchange(mut self, exchange: &'qeb str) -> Self {
        self.exchange_name = exchange;
        self
    }

    /// Left empty for fanout exchanges, which ignore it.
    pub fn routing_key(mut self, key: &'qeb str) -> Self {
        self.routing_key = key;
        self
    }

    pub(crate) fn options(&self) -> QueueBindOptions {
        QueueBindOptions { nowait: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_detect_broker_named_queue() {
        assert!(QueueDefinition::new("").is_anonymous());
        assert!(!QueueDefinition::new("immocSimple").is_anonymous());
    }

    #[test]
    fn should_declare_with_fixed_flags() {
        let opts = QueueDefinition::new("immocSimple").options();

        assert!(!opts.durable);
        assert!(!opts.exclusive);
        assert!(!opts.auto_delete);
        assert!(!opts.nowait);
    }

    #[test]
    fn should_build_binding() {
        let binding = QueueBinding::new("amq.gen-1")
            .exchange("immocRoute")
            .routing_key("immoc.route.one");

        assert_eq!(binding.queue_name, "amq.gen-1");
        assert_eq!(binding.exchange_name, "immocRoute");
        assert_eq!(binding.routing_key, "immoc.route.one");
        assert_eq!(QueueBinding::new("q").routing_key, "");
    }
}
