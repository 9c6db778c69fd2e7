use super::message::{Message, MessageId, MessageStatus};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// Ordered, append-only conversation log shared between the active turn and
/// whatever renders it.
///
/// Every mutation bumps a revision counter before returning, so a renderer
/// that wakes on [`MessageStore::subscribe`] always sees the change in the
/// next [`MessageStore::snapshot`].
#[derive(Clone)]
pub struct MessageStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    messages: Mutex<Vec<Message>>,
    revision: watch::Sender<u64>,
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageStore {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(StoreInner {
                messages: Mutex::new(Vec::new()),
                revision,
            }),
        }
    }

    pub fn append(&self, message: Message) -> MessageId {
        let id = message.id;
        self.lock().push(message);
        self.bump();
        id
    }

    /// Replace the content of `id` with `transform(current)`.
    /// Returns false when no such message exists or it is already settled.
    pub fn update_content<F>(&self, id: MessageId, transform: F) -> bool
    where
        F: FnOnce(&str) -> String,
    {
        let updated = {
            let mut messages = self.lock();
            match messages.iter_mut().find(|message| message.id == id) {
                Some(message) if message.is_pending() => {
                    message.content = transform(&message.content);
                    true
                }
                _ => false,
            }
        };
        if updated {
            self.bump();
        }
        updated
    }

    pub fn settle(&self, id: MessageId) -> bool {
        let updated = {
            let mut messages = self.lock();
            match messages.iter_mut().find(|message| message.id == id) {
                Some(message) if message.status != MessageStatus::Settled => {
                    message.status = MessageStatus::Settled;
                    true
                }
                _ => false,
            }
        };
        if updated {
            self.bump();
        }
        updated
    }

    /// Read-only handle for renderers.
    pub fn view(&self) -> StoreView {
        StoreView {
            store: self.clone(),
        }
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.lock().clone()
    }

    pub fn get(&self, id: MessageId) -> Option<Message> {
        self.lock().iter().find(|message| message.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn revision(&self) -> u64 {
        *self.inner.revision.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Message>> {
        self.inner
            .messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.inner.revision.send_modify(|revision| *revision += 1);
    }
}

/// Observation-only access to a [`MessageStore`].
#[derive(Clone)]
pub struct StoreView {
    store: MessageStore,
}

impl StoreView {
    pub fn snapshot(&self) -> Vec<Message> {
        self.store.snapshot()
    }

    pub fn get(&self, id: MessageId) -> Option<Message> {
        self.store.get(id)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.store.revision()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.store.subscribe()
    }
}
