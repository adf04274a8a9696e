// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Error Types for the Messaging Client
//!
//! `AmqpError` covers every failure the client can report: construction-time
//! failures (connection, channel) and operation-time failures (declare, bind,
//! publish, consume). Construction failures are returned like any other error;
//! the caller decides whether the process should stop.
//!
//! Each variant carries a label for the failed operation plus the underlying
//! cause. `AmqpError::kind` collapses them into a small `ErrorKind` taxonomy
//! so callers and tests can match on the category without parsing strings.

use thiserror::Error;

/// Represents errors that can occur while talking to the broker.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AmqpError {
    /// Error establishing a connection to the RabbitMQ server
    #[error("failure to connect: {0}")]
    ConnectionError(String),

    /// Error creating or closing the channel of an established connection
    #[error("failure to create a channel: {0}")]
    ChannelError(String),

    /// Error declaring an exchange with the given name
    #[error("failure to declare an exchange `{0}`: {1}")]
    DeclareExchangeError(String, String),

    /// Error declaring a queue with the given name
    #[error("failure to declare a queue `{0}`: {1}")]
    DeclareQueueError(String, String),

    /// Error binding a queue to an exchange
    #[error("failure to binding exchange `{0}` to queue `{1}`: {2}")]
    BindingExchangeToQueueError(String, String, String),

    /// Error publishing a message
    #[error("failure to publish: {0}")]
    PublishingError(String),

    /// Error opening a subscription on a queue
    #[error("failure to declare consumer on queue `{0}`: {1}")]
    ConsumerDeclarationError(String, String),

    /// Error while consuming or handling a message
    #[error("failure to consume message: {0}")]
    ConsumerError(String),

    /// The client was closed, nothing can run on it anymore
    #[error("client closed")]
    ClientClosed,

    /// The client definition breaks the topology rules
    #[error("invalid client definition: {0}")]
    InvalidDefinition(String),

    /// An operation of one topology was called on a client of another
    #[error("operation for `{expected}` topology called on a `{actual}` client")]
    TopologyMismatch {
        expected: &'static str,
        actual: &'static str,
    },
}

/// Category of an [`AmqpError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ConnectionFailed,
    ChannelFailed,
    DeclareFailed,
    BindFailed,
    PublishFailed,
    ConsumeFailed,
    ClientClosed,
    InvalidDefinition,
    TopologyMismatch,
}

impl AmqpError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AmqpError::ConnectionError(_) => ErrorKind::ConnectionFailed,
            AmqpError::ChannelError(_) => ErrorKind::ChannelFailed,
            AmqpError::DeclareExchangeError(..) | AmqpError::DeclareQueueError(..) => {
                ErrorKind::DeclareFailed
            }
            AmqpError::BindingExchangeToQueueError(..) => ErrorKind::BindFailed,
            AmqpError::PublishingError(_) => ErrorKind::PublishFailed,
            AmqpError::ConsumerDeclarationError(..) | AmqpError::ConsumerError(_) => {
                ErrorKind::ConsumeFailed
            }
            AmqpError::ClientClosed => ErrorKind::ClientClosed,
            AmqpError::InvalidDefinition(_) => ErrorKind::InvalidDefinition,
            AmqpError::TopologyMismatch { .. } => ErrorKind::TopologyMismatch,
        }
    }
}

/// Errors raised while reading the configuration.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigsError {
    #[error("invalid value for env `{0}`")]
    InvalidValue(String),
}

/// Errors raised while installing the tracing subscriber.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum LoggingError {
    #[error("logging internal error")]
    InternalError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_map_each_error_to_its_kind() {
        let cases = [
            (
                AmqpError::ConnectionError("refused".to_owned()),
                ErrorKind::ConnectionFailed,
            ),
            (
                AmqpError::ChannelError("closed".to_owned()),
                ErrorKind::ChannelFailed,
            ),
            (
                AmqpError::DeclareQueueError("q".to_owned(), "x".to_owned()),
                ErrorKind::DeclareFailed,
            ),
            (
                AmqpError::DeclareExchangeError("e".to_owned(), "x".to_owned()),
                ErrorKind::DeclareFailed,
            ),
            (
                AmqpError::BindingExchangeToQueueError(
                    "e".to_owned(),
                    "q".to_owned(),
                    "x".to_owned(),
                ),
                ErrorKind::BindFailed,
            ),
            (
                AmqpError::PublishingError("x".to_owned()),
                ErrorKind::PublishFailed,
            ),
            (
                AmqpError::ConsumerDeclarationError("q".to_owned(), "x".to_owned()),
                ErrorKind::ConsumeFailed,
            ),
            (
                AmqpError::ConsumerError("x".to_owned()),
                ErrorKind::ConsumeFailed,
            ),
            (AmqpError::ClientClosed, ErrorKind::ClientClosed),
        ];

        for (err, kind) in cases {
            assert_eq!(err.kind(), kind, "{err}");
        }
    }

    #[test]
    fn should_label_errors_with_operation_and_cause() {
        let err = AmqpError::BindingExchangeToQueueError(
            "immocRoute".to_owned(),
            "amq.gen-1".to_owned(),
            "NOT_FOUND".to_owned(),
        );

        assert_eq!(
            err.to_string(),
            "failure to binding exchange `immocRoute` to queue `amq.gen-1`: NOT_FOUND"
        );
        assert_eq!(AmqpError::ClientClosed.to_string(), "client closed");
    }
}
