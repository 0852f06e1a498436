use crate::error::{Error, Result};
use crate::stash::Notifier;
use std::collections::HashMap;
use std::future::Future;
use tracing::debug;

/// Actions registered by id, dispatched one at a time.
///
/// The map does not know how to call an action; callers pass an `invoke` closure that receives
/// the registered action and the notifier. This keeps the stored type free of any async
/// signature.
#[derive(Debug, Clone)]
pub struct ActionMap<T> {
    actions: HashMap<String, T>,
}

impl<T> Default for ActionMap<T> {
    fn default() -> Self {
        Self {
            actions: HashMap::new(),
        }
    }
}

impl<T: Clone> ActionMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `action` under `id`, returning the action it replaced.
    pub fn set(&mut self, id: &str, action: T) -> Option<T> {
        self.actions.insert(id.to_string(), action)
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.actions.get(id)
    }

    pub fn has(&self, id: &str) -> bool {
        self.actions.contains_key(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<T> {
        self.actions.remove(id)
    }

    /// Registered ids, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.actions.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Invokes the action registered under `id` and awaits it.
    ///
    /// An unknown id fails with [`Error::MissingAction`], unless `optional` is set, in which
    /// case nothing is invoked and the result is `Ok(None)`.
    pub async fn run<R, F, Fut>(
        &self,
        id: &str,
        notifier: &Notifier,
        invoke: F,
        optional: bool,
    ) -> Result<Option<R>>
    where
        F: FnOnce(T, Notifier) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        match self.actions.get(id) {
            Some(action) => {
                debug!(action = id, "running action");
                invoke(action.clone(), notifier.clone()).await.map(Some)
            }
            None if optional => {
                debug!(action = id, "skipping unregistered optional action");
                Ok(None)
            }
            None => Err(Error::MissingAction(id.to_string())),
        }
    }

    /// Runs several actions one after another, yielding the last produced value.
    ///
    /// Ids are taken from the **end** of the list: `[a, b, c]` runs `c`, then `b`, then `a`.
    /// Callers relying on declaration order should reverse the list first. The first failure
    /// stops the sequence.
    pub async fn run_serial<I, S, R, F, Fut>(
        &self,
        ids: I,
        notifier: &Notifier,
        mut invoke: F,
        optional: bool,
    ) -> Result<Option<R>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: FnMut(T, Notifier) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        let mut queue: Vec<String> = ids.into_iter().map(|id| id.as_ref().to_string()).collect();
        let mut last = None;
        while let Some(id) = queue.pop() {
            last = self.run(&id, notifier, &mut invoke, optional).await?;
        }
        Ok(last)
    }
}
