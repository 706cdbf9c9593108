//! Load/loading/error/data lifecycle around one server collection or item.
//!
//! A [`Resource`] is keyed by a dependency (slug, search filter, post id...).
//! Every issued fetch gets a generation number; a response is applied only if
//! no newer fetch was issued since, so a slow stale response can never
//! overwrite fresher state.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::watch;

use crate::error::{ClientError, ClientResult};

type Fetcher<K, T> = dyn Fn(K) -> BoxFuture<'static, ClientResult<T>> + Send + Sync;

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceState<K, T> {
    /// Dependency key of the latest issued fetch.
    pub key: Option<K>,
    /// Last successfully fetched payload; kept when a later fetch fails.
    pub data: Option<T>,
    pub loading: bool,
    /// Human-readable message of the latest failure.
    pub error: Option<String>,
    failure: Option<ClientError>,
    generation: u64,
}

impl<K, T> Default for ResourceState<K, T> {
    fn default() -> Self {
        Self {
            key: None,
            data: None,
            loading: false,
            error: None,
            failure: None,
            generation: 0,
        }
    }
}

impl<K, T> ResourceState<K, T> {
    fn settle(&mut self, generation: u64, outcome: ClientResult<T>) -> bool {
        if generation != self.generation {
            tracing::debug!(
                generation,
                latest = self.generation,
                "discarding superseded response"
            );
            return false;
        }
        self.loading = false;
        match outcome {
            Ok(data) => {
                self.data = Some(data);
                self.error = None;
                self.failure = None;
            }
            Err(err) => {
                tracing::warn!("fetch failed: {}", err);
                self.error = Some(err.user_message());
                self.failure = Some(err);
            }
        }
        true
    }
}

pub struct Resource<K, T> {
    state: Arc<watch::Sender<ResourceState<K, T>>>,
    fetch: Arc<Fetcher<K, T>>,
}

impl<K, T> Clone for Resource<K, T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            fetch: Arc::clone(&self.fetch),
        }
    }
}

impl<K, T> Resource<K, T>
where
    K: Clone + PartialEq + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(fetch: F) -> Self
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ClientResult<T>> + Send + 'static,
    {
        let (state, _) = watch::channel(ResourceState::default());
        let fetch: Arc<Fetcher<K, T>> = Arc::new(move |key| fetch(key).boxed());
        Self {
            state: Arc::new(state),
            fetch,
        }
    }

    /// Issue a fetch for `key` right away and return its completion.
    ///
    /// Loading starts and the previous error is cleared before this returns;
    /// the returned future applies the response.
    pub fn load(&self, key: K) -> impl Future<Output = ()> + Send + 'static {
        let mut generation = 0;
        self.state.send_modify(|state| {
            state.generation += 1;
            generation = state.generation;
            state.key = Some(key.clone());
            state.loading = true;
            state.error = None;
            state.failure = None;
        });

        let pending = (self.fetch)(key);
        let state = Arc::clone(&self.state);
        async move {
            let outcome = pending.await;
            state.send_if_modified(|s| s.settle(generation, outcome));
        }
    }

    /// Fetch only when `key` differs from the current dependency key.
    pub fn use_key(&self, key: K) -> BoxFuture<'static, ()> {
        let unchanged = self.state.borrow().key.as_ref() == Some(&key);
        if unchanged {
            futures::future::ready(()).boxed()
        } else {
            self.load(key).boxed()
        }
    }

    /// Re-run the lookup with the last-used key. Resolves to `false` if
    /// nothing was ever loaded.
    pub fn refetch(&self) -> impl Future<Output = bool> + Send + 'static {
        let key = self.state.borrow().key.clone();
        let pending = key.map(|key| self.load(key));
        async move {
            match pending {
                Some(load) => {
                    load.await;
                    true
                }
                None => false,
            }
        }
    }

    /// Local edit of the held data, e.g. an optimistic prepend.
    pub fn mutate(&self, edit: impl FnOnce(&mut Option<T>)) {
        self.state.send_modify(|state| edit(&mut state.data));
    }

    pub fn snapshot(&self) -> ResourceState<K, T> {
        self.state.borrow().clone()
    }

    pub fn data(&self) -> Option<T> {
        self.state.borrow().data.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    /// The latest failure itself, for callers that act on its kind.
    pub fn failure(&self) -> Option<ClientError> {
        self.state.borrow().failure.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }
}
