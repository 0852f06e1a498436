//! # Deferred Deduplication
//!
//! A [`PromiseStash`] keys in-flight work by string. The first caller to [`PromiseStash::defer`]
//! a key becomes its producer and receives a [`Deferred`]; everybody else joins the shared
//! [`Promise`] and waits for the same settlement.
//!
//! ```text
//!   defer("pkg")  --> Some(Deferred) --resolve(v)--+
//!   defer("pkg")  --> None                         |
//!   promise("pkg") --> Promise ---- await ---------+--> Ok(v)
//! ```
//!
//! Entries are never evicted on settlement: later callers get the settled value from the same
//! promise until the key is [`removed`](PromiseStash::remove). A producer that drops its
//! `Deferred` without settling rejects every joiner with [`Error::Abandoned`].
//!
//! Long-running producers report progress through a [`Notifier`], an optional unbounded channel
//! of JSON notes.

use crate::error::{Error, Result};
use futures::channel::{mpsc, oneshot};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::trace;

/// Outcome shared by every joiner of a promise.
pub type Settled<T> = std::result::Result<T, Arc<Error>>;

/// Cloneable handle on a pending or settled value.
pub type Promise<T> = Shared<BoxFuture<'static, Settled<T>>>;

/// Progress channel handed to long-running work. Notes sent to a silent notifier are dropped.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    tx: Option<mpsc::UnboundedSender<Value>>,
}

impl Notifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn silent() -> Self {
        Self::default()
    }

    pub fn is_silent(&self) -> bool {
        self.tx.is_none()
    }

    pub fn notify(&self, note: impl Into<Value>) {
        if let Some(tx) = &self.tx {
            // a closed receiver just means nobody listens anymore
            let _ = tx.unbounded_send(note.into());
        }
    }
}

/// Producer side of a stashed promise.
pub struct Deferred<T> {
    key: String,
    tx: oneshot::Sender<Settled<T>>,
    promise: Promise<T>,
}

impl<T> Deferred<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn new(key: &str) -> Self {
        let (tx, rx) = oneshot::channel::<Settled<T>>();
        let abandoned = key.to_string();
        let promise = rx
            .map(move |settled| match settled {
                Ok(settled) => settled,
                Err(oneshot::Canceled) => Err(Arc::new(Error::Abandoned(abandoned))),
            })
            .boxed()
            .shared();
        Self {
            key: key.to_string(),
            tx,
            promise,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn promise(&self) -> Promise<T> {
        self.promise.clone()
    }

    pub fn resolve(self, value: T) {
        trace!(key = %self.key, "deferred resolved");
        let _ = self.tx.send(Ok(value));
    }

    pub fn reject(self, error: Error) {
        trace!(key = %self.key, %error, "deferred rejected");
        let _ = self.tx.send(Err(Arc::new(error)));
    }

    pub fn settle(self, result: Result<T>) {
        match result {
            Ok(value) => self.resolve(value),
            Err(error) => self.reject(error),
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred").field("key", &self.key).finish()
    }
}

pub struct PromiseStash<T> {
    entries: Mutex<HashMap<String, Promise<T>>>,
}

impl<T> Default for PromiseStash<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> fmt::Debug for PromiseStash<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        f.debug_struct("PromiseStash").field("keys", &keys).finish()
    }
}

impl<T> PromiseStash<T> {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Promise<T>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<T> PromiseStash<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn promise(&self, key: &str) -> Option<Promise<T>> {
        self.lock().get(key).cloned()
    }

    /// Claims `key`. Returns `None` when a promise for it already exists.
    pub fn defer(&self, key: &str) -> Option<Deferred<T>> {
        let mut entries = self.lock();
        if entries.contains_key(key) {
            trace!(key, "joining stashed promise");
            return None;
        }
        let deferred = Deferred::new(key);
        entries.insert(key.to_string(), deferred.promise());
        Some(deferred)
    }

    pub fn remove(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Runs `produce` for the first caller of `key`; every caller awaits the same outcome.
    pub async fn share<F, Fut>(&self, key: &str, produce: F) -> Settled<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match self.defer(key) {
            Some(deferred) => {
                trace!(key = deferred.key(), "producing shared value");
                let promise = deferred.promise();
                deferred.settle(produce().await);
                promise.await
            }
            None => match self.promise(key) {
                Some(promise) => promise.await,
                None => Err(Arc::new(Error::Abandoned(key.to_string()))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn second_defer_joins_the_first() {
        let stash = PromiseStash::<String>::new();
        let deferred = stash.defer("pkg").unwrap();
        assert!(stash.defer("pkg").is_none());
        assert!(stash.has("pkg"));

        let joined = stash.promise("pkg").unwrap();
        deferred.resolve("v1".to_string());
        assert_eq!(joined.await.unwrap(), "v1");
    }

    #[tokio::test]
    async fn settled_entries_stay_until_removed() {
        let stash = PromiseStash::<u32>::new();
        stash.defer("k").unwrap().resolve(7);

        assert_eq!(stash.promise("k").unwrap().await.unwrap(), 7);
        assert!(stash.defer("k").is_none());

        assert!(stash.remove("k"));
        assert!(!stash.has("k"));
        assert!(stash.defer("k").is_some());
    }

    #[tokio::test]
    async fn rejection_reaches_every_joiner() {
        let stash = PromiseStash::<u32>::new();
        let deferred = stash.defer("k").unwrap();
        let one = stash.promise("k").unwrap();
        let two = stash.promise("k").unwrap();
        deferred.reject(Error::command("offline"));

        assert_eq!(one.await.unwrap_err().to_string(), "offline");
        assert_eq!(two.await.unwrap_err().to_string(), "offline");
    }

    #[tokio::test]
    async fn dropped_deferred_abandons_joiners() {
        let stash = PromiseStash::<u32>::new();
        let deferred = stash.defer("lost").unwrap();
        let joined = stash.promise("lost").unwrap();
        drop(deferred);

        let err = joined.await.unwrap_err();
        assert!(matches!(*err, Error::Abandoned(ref key) if key == "lost"));
    }

    #[tokio::test]
    async fn share_runs_producer_once() {
        let stash = PromiseStash::<usize>::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = stash
                .share("count", || async {
                    Ok(calls.fetch_add(1, Ordering::SeqCst) + 1)
                })
                .await
                .unwrap();
            assert_eq!(value, 1);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn notifier_channel_delivers_notes() {
        let (notifier, mut rx) = Notifier::channel();
        assert!(!notifier.is_silent());
        notifier.notify("downloading");
        notifier.clone().notify(serde_json::json!({"done": 1}));
        drop(notifier);

        let notes: Vec<Value> = rx.by_ref().collect().await;
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0], "downloading");
    }

    #[test]
    fn silent_notifier_drops_notes() {
        let notifier = Notifier::silent();
        assert!(notifier.is_silent());
        notifier.notify("ignored");
    }
}
