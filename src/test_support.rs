use crate::state::{MessageId, StoreView};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;

/// Process-wide lock for tests that mutate environment variables.
/// Use `.blocking_lock()` in sync tests and `.lock().await` in async tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Wait until the message `id` holds exactly `expected`.
pub async fn wait_for_content(store: &StoreView, id: MessageId, expected: &str) {
    let mut revisions = store.subscribe();
    let reached = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if store.get(id).is_some_and(|message| message.content == expected) {
                return;
            }
            if revisions.changed().await.is_err() {
                return;
            }
        }
    })
    .await;
    assert!(reached.is_ok(), "timed out waiting for content {expected:?}");
    assert_eq!(store.get(id).map(|message| message.content).as_deref(), Some(expected));
}
