//! Broadcast emitter for store events.

use tokio::sync::broadcast;
use tracing::trace;

use crate::core::config::StoreConfig;
use crate::core::errors::{StoreError, StoreResult};
use crate::events::kinds::StoreEvent;

/// Cloneable handle to the event stream.
///
/// Every subscriber sees every event in emission order.
#[derive(Clone, Debug)]
pub struct EventEmitter {
    sender: broadcast::Sender<StoreEvent>,
}

impl EventEmitter {
    /// Create an emitter buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Create an emitter sized by `event_buffer`.
    #[must_use]
    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.event_buffer)
    }

    /// Handle that does not keep the channel open.
    #[must_use]
    pub fn downgrade(&self) -> WeakEventEmitter {
        WeakEventEmitter {
            sender: self.sender.downgrade(),
        }
    }

    /// Publish an event; returns how many subscribers received it.
    ///
    /// # Errors
    /// Returns `ChannelClosed` when nobody is subscribed.
    pub fn emit(&self, event: StoreEvent) -> StoreResult<usize> {
        let kind = event.kind();
        let delivered = self
            .sender
            .send(event)
            .map_err(|_| StoreError::ChannelClosed)?;
        trace!(%kind, delivered, "event emitted");
        Ok(delivered)
    }

    /// Subscribe to events emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Non-owning emitter handle.
///
/// Once every [`EventEmitter`] is dropped, subscribers see the channel close
/// and [`Self::upgrade`] returns `None`.
#[derive(Clone)]
pub struct WeakEventEmitter {
    sender: broadcast::WeakSender<StoreEvent>,
}

impl WeakEventEmitter {
    /// Strong handle, while any other one is alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<EventEmitter> {
        self.sender.upgrade().map(|sender| EventEmitter { sender })
    }
}
