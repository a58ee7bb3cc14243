//! Channel-backed event bus for deferred work.
//!
//! `publish` only offers the event to a bounded `mpsc` channel and never
//! waits: when the queue is full the event is dropped and reported. A
//! separate `EventDispatcher` task drains the channel and runs each event on
//! its own task, every handler under its own retry policy, so one stuck
//! consumer (document rendering, e-mail) holds up neither later events nor a
//! ledger write.

use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope};
use crate::ports::{EventHandler, EventPublisher, EventSubscriber};

type HandlerMap = Arc<RwLock<HashMap<String, Vec<Arc<dyn EventHandler>>>>>;

/// Retry and buffering policy for the channel bus.
#[derive(Debug, Clone)]
pub struct ChannelEventBusConfig {
    /// Events buffered before `publish` starts dropping.
    pub capacity: usize,

    /// Events delivered concurrently; the dispatcher stops reading beyond it.
    pub max_in_flight: usize,

    /// Attempts per handler, first try included.
    pub max_attempts: usize,

    /// Delay unit; retry `n` waits about `2^n * base_delay`.
    pub base_delay: Duration,

    /// Upper bound on a single retry delay.
    pub max_delay: Duration,

    /// Budget for one handler attempt.
    pub attempt_timeout: Duration,
}

impl Default for ChannelEventBusConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            max_in_flight: 64,
            max_attempts: 5,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

/// Publishing half; cheap to clone into handlers.
#[derive(Clone)]
pub struct ChannelEventBus {
    sender: mpsc::Sender<EventEnvelope>,
    handlers: HandlerMap,
}

/// Consuming half; run it on its own task.
pub struct EventDispatcher {
    receiver: mpsc::Receiver<EventEnvelope>,
    delivery: Delivery,
    in_flight: Arc<Semaphore>,
}

/// Handler lookup and retry policy, shared by every delivery task.
#[derive(Clone)]
struct Delivery {
    handlers: HandlerMap,
    config: ChannelEventBusConfig,
}

impl ChannelEventBus {
    pub fn new(config: ChannelEventBusConfig) -> (Self, EventDispatcher) {
        let (sender, receiver) = mpsc::channel(config.capacity.max(1));
        let handlers: HandlerMap = Arc::default();
        let in_flight = Arc::new(Semaphore::new(config.max_in_flight.max(1)));

        (
            Self {
                sender,
                handlers: Arc::clone(&handlers),
            },
            EventDispatcher {
                receiver,
                delivery: Delivery { handlers, config },
                in_flight,
            },
        )
    }
}

#[async_trait]
impl EventPublisher for ChannelEventBus {
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError> {
        self.sender.try_send(event).map_err(|e| match e {
            TrySendError::Full(event) => DomainError::new(
                ErrorCode::DeliveryFailed,
                format!("Event queue full, dropped {}", event.event_type),
            ),
            TrySendError::Closed(event) => DomainError::new(
                ErrorCode::InternalError,
                format!("Event channel closed, dropped {}", event.event_type),
            ),
        })
    }

    async fn publish_all(&self, events: Vec<EventEnvelope>) -> Result<(), DomainError> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }
}

impl EventSubscriber for ChannelEventBus {
    fn subscribe(&self, event_type: &str, handler: Arc<dyn EventHandler>) {
        self.subscribe_all(&[event_type], handler);
    }

    fn subscribe_all(&self, event_types: &[&str], handler: Arc<dyn EventHandler>) {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        for event_type in event_types {
            handlers
                .entry(event_type.to_string())
                .or_default()
                .push(Arc::clone(&handler));
        }
    }
}

impl EventDispatcher {
    /// Dispatches until shutdown, then drains what is already queued and
    /// waits for deliveries still in flight.
    ///
    /// Also returns once every `ChannelEventBus` clone has been dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                next = self.receiver.recv() => match next {
                    Some(event) => self.spawn(&mut tasks, event).await,
                    None => break,
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => log_join(joined),
            }
        }

        self.receiver.close();
        while let Some(event) = self.receiver.recv().await {
            self.spawn(&mut tasks, event).await;
        }
        while let Some(joined) = tasks.join_next().await {
            log_join(joined);
        }
        tracing::info!("Event dispatcher stopped");
    }

    /// Runs every handler subscribed to the event's type concurrently and
    /// returns once all of them finished or gave up.
    pub async fn dispatch(&self, event: EventEnvelope) {
        self.delivery.dispatch(event).await;
    }

    async fn spawn(&self, tasks: &mut JoinSet<()>, event: EventEnvelope) {
        let Ok(permit) = Arc::clone(&self.in_flight).acquire_owned().await else {
            return;
        };
        let delivery = self.delivery.clone();
        tasks.spawn(async move {
            delivery.dispatch(event).await;
            drop(permit);
        });
    }
}

fn log_join(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            tracing::error!(error = %e, "Event delivery task panicked");
        }
    }
}

impl Delivery {
    async fn dispatch(&self, event: EventEnvelope) {
        let handlers = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&event.event_type)
            .cloned()
            .unwrap_or_default();

        join_all(
            handlers
                .into_iter()
                .map(|handler| self.deliver(handler, event.clone())),
        )
        .await;
    }

    async fn deliver(&self, handler: Arc<dyn EventHandler>, event: EventEnvelope) {
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(self.config.base_delay.as_millis().max(1) as u64)
            .max_delay(self.config.max_delay)
            .map(jitter)
            .take(self.config.max_attempts.saturating_sub(1));
        let attempt_timeout = self.config.attempt_timeout;

        let result = Retry::spawn(strategy, || {
            let handler = Arc::clone(&handler);
            let event = event.clone();
            async move {
                match tokio::time::timeout(attempt_timeout, handler.handle(event.clone())).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => {
                        tracing::warn!(
                            handler = handler.name(),
                            event_id = %event.event_id,
                            error = %e,
                            "Event handler attempt failed"
                        );
                        Err(e)
                    }
                    Err(_) => {
                        tracing::warn!(
                            handler = handler.name(),
                            event_id = %event.event_id,
                            timeout_ms = attempt_timeout.as_millis() as u64,
                            "Event handler attempt timed out"
                        );
                        Err(DomainError::new(
                            ErrorCode::DeliveryFailed,
                            format!("{} timed out", handler.name()),
                        ))
                    }
                }
            }
        })
        .await;

        if let Err(e) = result {
            tracing::error!(
                handler = handler.name(),
                event_id = %event.event_id,
                event_type = %event.event_type,
                error = %e,
                "Giving up on event after retries"
            );
        }
    }
}
