//! Observable query handles.
//!
//! A [`Query`] wraps one fetch (a closure over the aggregator) and publishes
//! its latest [`QueryState`] on a `watch` channel, giving consumers the same
//! `{ data, is_loading, is_error, error, refetch }` surface a UI hook would.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::cache::ReadCache;
use crate::errors::TrackerError;

/// Result of one read, as seen by a consumer.
#[derive(Debug, Clone)]
pub struct QueryState<T> {
    pub data: T,
    pub is_loading: bool,
    pub is_error: bool,
    pub error: Option<Arc<TrackerError>>,
}

impl<T: Default> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            data: T::default(),
            is_loading: false,
            is_error: false,
            error: None,
        }
    }
}

impl<T: Default> QueryState<T> {
    pub fn loaded(data: T) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    /// A systemic failure: no data, error attached.
    pub fn failed(error: TrackerError) -> Self {
        Self {
            is_error: true,
            error: Some(Arc::new(error)),
            ..Self::default()
        }
    }

    pub fn map<U: Default>(self, f: impl FnOnce(T) -> U) -> QueryState<U> {
        QueryState {
            data: f(self.data),
            is_loading: self.is_loading,
            is_error: self.is_error,
            error: self.error,
        }
    }
}

/// JSON view of a settled query for the read API.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryView<'a, T: Serialize> {
    pub data: &'a T,
    pub is_loading: bool,
    pub is_error: bool,
    pub error: Option<String>,
}

impl<T: Serialize> QueryState<T> {
    pub fn view(&self) -> QueryView<'_, T> {
        QueryView {
            data: &self.data,
            is_loading: self.is_loading,
            is_error: self.is_error,
            error: self.error.as_ref().map(|e| e.to_string()),
        }
    }
}

pub struct Query<T, F> {
    fetch: F,
    cache: Option<Arc<ReadCache>>,
    state: watch::Sender<QueryState<T>>,
}

impl<T, F, Fut> Query<T, F>
where
    T: Clone + Default,
    F: Fn() -> Fut,
    Fut: Future<Output = QueryState<T>>,
{
    pub fn new(fetch: F) -> Self {
        let (state, _) = watch::channel(QueryState::default());
        Self {
            fetch,
            cache: None,
            state,
        }
    }

    /// Make [`Query::refetch`] bypass cached reads.
    pub fn with_cache(mut self, cache: Arc<ReadCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn snapshot(&self) -> QueryState<T> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryState<T>> {
        self.state.subscribe()
    }

    /// Run the fetch. Previous data stays visible with `is_loading` set until
    /// the new result lands.
    pub async fn refetch(&self) -> QueryState<T> {
        if let Some(cache) = &self.cache {
            cache.invalidate_all();
        }
        self.state.send_modify(|s| s.is_loading = true);
        let next = (self.fetch)().await;
        self.state.send_replace(next.clone());
        next
    }
}
