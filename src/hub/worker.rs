//! Publish queue and dispatch worker pool.
//!
//! Producers (the notification service, the operator endpoints) never touch
//! the registry directly: they enqueue a `NotificationEvent` and return
//! immediately. A fixed pool of worker tasks drains the queue and runs the
//! dispatcher, so a burst of events cannot block the caller and slow fan-outs
//! overlap instead of serializing.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use crate::hub::dispatcher::{Dispatcher, NotificationEvent};
use crate::hub::registry::ConnectionRegistry;

/// Cheap clonable handle for publishing events into the dispatch queue.
#[derive(Clone)]
pub struct NotificationHub {
    tx: mpsc::UnboundedSender<NotificationEvent>,
}

impl NotificationHub {
    /// Enqueue an event for dispatch. Never blocks. The send only fails if
    /// the worker pool is gone, which means the process is shutting down.
    pub fn publish(&self, event: NotificationEvent) {
        if self.tx.send(event).is_err() {
            tracing::error!("dispatch queue closed, event dropped");
        }
    }

    pub fn send_to_user(&self, user_id: i64, payload: impl Into<Arc<str>>) {
        self.publish(NotificationEvent::user_targeted(user_id, payload));
    }

    pub fn send_to_role(&self, role: impl Into<String>, payload: impl Into<Arc<str>>) {
        self.publish(NotificationEvent::role_targeted(role, payload));
    }

    pub fn send_to_group(&self, group: impl Into<String>, payload: impl Into<Arc<str>>) {
        self.publish(NotificationEvent::group_targeted(group, payload));
    }

    pub fn broadcast(&self, payload: impl Into<Arc<str>>) {
        self.publish(NotificationEvent::broadcast(payload));
    }
}

/// Spawn `workers` dispatch tasks sharing one queue and return the publish
/// handle. The receiver lock is held only while waiting for the next event,
/// never across a dispatch, so deliveries overlap.
pub fn spawn_dispatch_workers(registry: Arc<ConnectionRegistry>, workers: usize) -> NotificationHub {
    let (tx, rx) = mpsc::unbounded_channel::<NotificationEvent>();
    let rx = Arc::new(Mutex::new(rx));

    for worker in 0..workers.max(1) {
        let rx = rx.clone();
        let dispatcher = Dispatcher::new(registry.clone());

        tokio::spawn(async move {
            loop {
                let event = {
                    let mut rx = rx.lock().await;
                    match rx.recv().await {
                        Some(event) => event,
                        None => break,
                    }
                };

                match dispatcher.dispatch(&event) {
                    Ok(receipt) => {
                        tracing::debug!(
                            worker,
                            kind = event.kind(),
                            targets = receipt.targets,
                            delivered = receipt.delivered,
                            failed = receipt.failed,
                            "event dispatched"
                        );
                    }
                    Err(e) => {
                        // Producers validate before enqueueing; anything that
                        // still slips through is dropped here.
                        tracing::warn!(worker, error = %e, "malformed event dropped");
                    }
                }
            }
        });
    }

    NotificationHub { tx }
}
