// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Subscription Dispatcher
//!
//! Opens a basic.consume subscription on a queue and feeds every delivery to a
//! [`ConsumerHandler`] from a spawned task. The deliveries are processed one
//! after the other in broker order. The subscription lives until its
//! `CancellationToken` fires, at which point it is cancelled on the broker so
//! no further messages are handed to a consumer that stopped reading.

use crate::{consumer::consume, errors::AmqpError, handler::ConsumerHandler, topology::AckMode};
use futures_util::{Stream, StreamExt};
use lapin::{
    message::Delivery,
    options::{BasicCancelOptions, BasicConsumeOptions},
    types::FieldTable,
    Channel,
};
use opentelemetry::global;
use std::sync::Arc;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Drives one subscription on one queue.
pub struct RabbitMQDispatcher {
    channel: Arc<Channel>,
    queue: String,
    tag: String,
    ack_mode: AckMode,
    handler: Arc<dyn ConsumerHandler>,
}

impl RabbitMQDispatcher {
    /// `app` prefixes the consumer tag so the subscription can be spotted in
    /// the broker management UI.
    pub fn new(
        channel: Arc<Channel>,
        app: &str,
        queue: &str,
        ack_mode: AckMode,
        handler: Arc<dyn ConsumerHandler>,
    ) -> RabbitMQDispatcher {
        RabbitMQDispatcher {
            channel,
            queue: queue.to_owned(),
            tag: consumer_tag(app),
            ack_mode,
            handler,
        }
    }

    /// Consumes until `cancel` fires.
    ///
    /// The subscription is established before this returns control to the
    /// delivery task, so a failure to subscribe is reported right away. Returns
    /// `Ok(())` after a cancellation and `ConsumerError` when the broker closes
    /// the delivery stream on its own. If the delivery task dies the
    /// subscription is still cancelled on the broker before `ConsumerError`
    /// is returned.
    pub async fn consume_blocking(&self, cancel: CancellationToken) -> Result<(), AmqpError> {
        let consumer = match self
            .channel
            .basic_consume(
                &self.queue,
                &self.tag,
                BasicConsumeOptions {
                    no_local: false,
                    no_ack: self.ack_mode.is_auto(),
                    exclusive: false,
                    nowait: false,
                },
                FieldTable::default(),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error to create the consumer");
                Err(AmqpError::ConsumerDeclarationError(
                    self.queue.clone(),
                    err.to_string(),
                ))
            }
            Ok(c) => Ok(c),
        }?;

        info!(queue = self.queue, tag = self.tag, "waiting for messages");

        let spawned = tokio::spawn(dispatch(
            consumer,
            cancel,
            self.queue.clone(),
            self.ack_mode,
            self.handler.clone(),
        ))
        .await;

        let (still_subscribed, result) = settle(&self.queue, spawned);
        if still_subscribed {
            self.cancel_consumer().await;
        }
        result
    }

    async fn cancel_consumer(&self) {
        debug!(tag = self.tag, "cancelling consumer");
        if let Err(err) = self
            .channel
            .basic_cancel(&self.tag, BasicCancelOptions { nowait: false })
            .await
        {
            error!(error = err.to_string(), "error to cancel the consumer");
        }
    }
}

/// Why a delivery loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Exit {
    Cancelled,
    StreamClosed,
}

/// Maps how the delivery task ended to whether the subscription still lives on
/// the broker and what `consume_blocking` reports.
fn settle(queue: &str, ended: Result<Exit, JoinError>) -> (bool, Result<(), AmqpError>) {
    match ended {
        Ok(Exit::Cancelled) => (true, Ok(())),
        // the broker already dropped the consumer together with the stream
        Ok(Exit::StreamClosed) => (
            false,
            Err(AmqpError::ConsumerError(format!(
                "delivery stream of queue `{}` closed by the broker",
                queue
            ))),
        ),
        Err(err) => {
            error!(error = err.to_string(), "tokio process error");
            (true, Err(AmqpError::ConsumerError(err.to_string())))
        }
    }
}

/// Hands the deliveries of `deliveries` to `handler` one at a time until the
/// stream ends or `cancel` fires. Handler failures are logged and the loop
/// goes on with the next delivery.
pub(crate) async fn dispatch<S>(
    mut deliveries: S,
    cancel: CancellationToken,
    queue: String,
    ack_mode: AckMode,
    handler: Arc<dyn ConsumerHandler>,
) -> Exit
where
    S: Stream<Item = Result<Delivery, lapin::Error>> + Unpin,
{
    let tracer = global::tracer("amqp consumer");

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Exit::Cancelled,
            next = deliveries.next() => next,
        };

        match next {
            Some(Ok(delivery)) => {
                if let Err(err) =
                    consume(&tracer, &delivery, &queue, ack_mode, handler.as_ref()).await
                {
                    error!(error = err.to_string(), "error consume msg");
                }
            }
            Some(Err(err)) => error!(error = err.to_string(), "errors consume msg"),
            None => {
                debug!("delivery stream closed");
                return Exit::StreamClosed;
            }
        }
    }
}

fn consumer_tag(app: &str) -> String {
    format!("{}-{}", app, Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{errors::ErrorKind, handler::ConsumerMessage};
    use async_trait::async_trait;
    use futures_util::stream;
    use lapin::{acker::Acker, protocol::basic::AMQPProperties, types::ShortString};
    use opentelemetry::Context;
    use std::sync::Mutex;

    /// Keeps every body it sees, fails on `fail_on` and cancels `cancel`
    /// after `cancel_after` messages.
    #[derive(Default)]
    struct Recorder {
        bodies: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
        cancel_after: Option<(usize, CancellationToken)>,
    }

    impl Recorder {
        fn bodies(&self) -> Vec<String> {
            self.bodies.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ConsumerHandler for Recorder {
        async fn exec(&self, _ctx: &Context, msg: &ConsumerMessage) -> Result<(), AmqpError> {
            let body = msg.text();
            let mut bodies = self.bodies.lock().unwrap();
            bodies.push(body.clone());

            if let Some((count, cancel)) = &self.cancel_after {
                if bodies.len() >= *count {
                    cancel.cancel();
                }
            }

            match self.fail_on {
                Some(fail_on) if fail_on == body => Err(AmqpError::ConsumerError(body)),
                _ => Ok(()),
            }
        }
    }

    fn delivery(tag: u64, body: &str) -> Result<Delivery, lapin::Error> {
        Ok(Delivery {
            acker: Acker::default(),
            data: body.as_bytes().to_vec(),
            delivery_tag: tag,
            exchange: ShortString::from(""),
            properties: AMQPProperties::default(),
            redelivered: false,
            routing_key: ShortString::from("immocSimple"),
        })
    }

    async fn run(
        deliveries: Vec<Result<Delivery, lapin::Error>>,
        cancel: CancellationToken,
        handler: Arc<Recorder>,
    ) -> Exit {
        dispatch(
            stream::iter(deliveries).chain(stream::pending()),
            cancel,
            "immocSimple".to_owned(),
            AckMode::Auto,
            handler,
        )
        .await
    }

    #[test]
    fn should_prefix_consumer_tag_with_app_name() {
        let tag = consumer_tag("worker");
        let (app, id) = tag.split_at("worker-".len());

        assert_eq!(app, "worker-");
        assert!(Uuid::parse_str(id).is_ok());
        assert_ne!(consumer_tag("worker"), tag);
    }

    #[tokio::test]
    async fn should_handle_deliveries_in_order_until_stream_closes() {
        let handler = Arc::new(Recorder::default());

        let exit = dispatch(
            stream::iter(vec![delivery(1, "one"), delivery(2, "two"), delivery(3, "three")]),
            CancellationToken::new(),
            "immocSimple".to_owned(),
            AckMode::Auto,
            handler.clone(),
        )
        .await;

        assert_eq!(exit, Exit::StreamClosed);
        assert_eq!(handler.bodies(), vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn should_keep_consuming_after_handler_failure() {
        let handler = Arc::new(Recorder {
            fail_on: Some("one"),
            ..Recorder::default()
        });

        let exit = dispatch(
            stream::iter(vec![delivery(1, "one"), delivery(2, "two")]),
            CancellationToken::new(),
            "immocSimple".to_owned(),
            AckMode::Manual,
            handler.clone(),
        )
        .await;

        assert_eq!(exit, Exit::StreamClosed);
        assert_eq!(handler.bodies(), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn should_skip_delivery_errors() {
        let handler = Arc::new(Recorder::default());

        let exit = dispatch(
            stream::iter(vec![
                delivery(1, "one"),
                Err(lapin::Error::ChannelsLimitReached),
                delivery(2, "two"),
            ]),
            CancellationToken::new(),
            "immocSimple".to_owned(),
            AckMode::Auto,
            handler.clone(),
        )
        .await;

        assert_eq!(exit, Exit::StreamClosed);
        assert_eq!(handler.bodies(), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn should_stop_before_any_delivery_when_already_cancelled() {
        let handler = Arc::new(Recorder::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let exit = run(vec![delivery(1, "one")], cancel, handler.clone()).await;

        assert_eq!(exit, Exit::Cancelled);
        assert!(handler.bodies().is_empty());
    }

    #[tokio::test]
    async fn should_stop_after_cancellation_while_stream_stays_open() {
        let cancel = CancellationToken::new();
        let handler = Arc::new(Recorder {
            cancel_after: Some((2, cancel.clone())),
            ..Recorder::default()
        });

        let exit = run(
            vec![delivery(1, "one"), delivery(2, "two"), delivery(3, "three")],
            cancel,
            handler.clone(),
        )
        .await;

        assert_eq!(exit, Exit::Cancelled);
        assert_eq!(handler.bodies(), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn should_stop_idle_loop_on_cancellation() {
        let handler = Arc::new(Recorder::default());
        let cancel = CancellationToken::new();

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                cancel.cancel();
            })
        };

        let exit = run(vec![delivery(1, "one")], cancel, handler.clone()).await;
        canceller.await.unwrap();

        assert_eq!(exit, Exit::Cancelled);
        assert_eq!(handler.bodies(), vec!["one"]);
    }

    #[tokio::test]
    async fn should_cancel_subscription_when_delivery_task_panics() {
        async fn blow_up() -> Exit {
            panic!("handler blew up")
        }
        let ended = tokio::spawn(blow_up()).await;

        let (still_subscribed, result) = settle("immocSimple", ended);

        assert!(still_subscribed);
        assert_eq!(result.map_err(|e| e.kind()), Err(ErrorKind::ConsumeFailed));
    }

    #[test]
    fn should_cancel_subscription_after_cancellation() {
        assert_eq!(settle("immocSimple", Ok(Exit::Cancelled)), (true, Ok(())));
    }

    #[test]
    fn should_not_cancel_subscription_closed_by_broker() {
        let (still_subscribed, result) = settle("immocSimple", Ok(Exit::StreamClosed));

        assert!(!still_subscribed);
        assert_eq!(
            result,
            Err(AmqpError::ConsumerError(
                "delivery stream of queue `immocSimple` closed by the broker".to_owned()
            ))
        );
    }
}
