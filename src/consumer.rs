// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Delivery Handling
//!
//! Turns one broker delivery into a [`ConsumerMessage`], runs the handler under
//! a consumer span and applies the acknowledgment policy:
//!
//! - `AckMode::Auto`: the broker already forgot the message, nothing to send
//! - `AckMode::Manual`: ack on success; on handler failure nack with requeue
//!   the first time, nack without requeue once the message was redelivered

use crate::{
    errors::AmqpError,
    handler::{ConsumerHandler, ConsumerMessage},
    otel,
    topology::AckMode,
};
use lapin::{
    message::Delivery,
    options::{BasicAckOptions, BasicNackOptions},
};
use opentelemetry::{
    global::BoxedTracer,
    trace::{Span, Status},
};
use std::borrow::Cow;
use tracing::{debug, error, warn};

/// Processes a single delivery consumed from `queue`.
///
/// A handler failure is returned after the acknowledgment policy ran, so the
/// subscription loop can log it and move on to the next delivery.
pub(crate) async fn consume(
    tracer: &BoxedTracer,
    delivery: &Delivery,
    queue: &str,
    ack_mode: AckMode,
    handler: &dyn ConsumerHandler,
) -> Result<(), AmqpError> {
    let (ctx, mut span) = otel::new_span(&delivery.properties, tracer, queue);

    debug!(
        "received: {} - exchange: {} - key: {}",
        delivery.delivery_tag,
        delivery.exchange.as_str(),
        delivery.routing_key.as_str(),
    );

    let msg = ConsumerMessage {
        queue: queue.to_owned(),
        exchange: delivery.exchange.to_string(),
        routing_key: delivery.routing_key.to_string(),
        data: delivery.data.as_slice().into(),
        delivery_tag: delivery.delivery_tag,
        redelivered: delivery.redelivered,
    };

    let result = handler.exec(&ctx, &msg).await;

    if let Err(err) = &result {
        span.record_error(err);
        span.set_status(Status::Error {
            description: Cow::from(err.to_string()),
        });
    }

    if ack_mode.is_auto() {
        if result.is_ok() {
            span.set_status(Status::Ok);
        }
        return result;
    }

    match result {
        Ok(()) => {
            debug!("message successfully processed");
            match delivery.ack(BasicAckOptions { multiple: false }).await {
                Err(e) => {
                    error!(error = e.to_string(), "error whiling ack msg");
                    span.record_error(&e);
                    span.set_status(Status::Error {
                        description: Cow::from("error to ack msg"),
                    });
                    Err(AmqpError::ConsumerError(format!("ack: {e}")))
                }
                _ => {
                    span.set_status(Status::Ok);
                    Ok(())
                }
            }
        }
        Err(err) => {
            let requeue = !delivery.redelivered;
            if requeue {
                warn!(error = err.to_string(), "error whiling handling msg, requeuing");
            } else {
                warn!(
                    error = err.to_string(),
                    "error whiling handling redelivered msg, dropping"
                );
            }

            if let Err(e) = delivery
                .nack(BasicNackOptions {
                    multiple: false,
                    requeue,
                })
                .await
            {
                error!(error = e.to_string(), "error whiling nack msg");
                span.record_error(&e);
            }
            Err(err)
        }
    }
}
