//! Single-pass query result cursors.

use crate::error::BuddyResult;
use futures_core::Stream;
use futures_util::StreamExt;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Forward-only cursor over mapped rows.
///
/// A result is either buffered (rows materialized before the first read) or
/// streaming (rows pulled from the executor on demand). Both behave the same
/// to callers. [`QueryResult::map`] composes lazily and only sees elements that
/// have not been consumed yet.
#[must_use]
pub struct QueryResult<T> {
    inner: Pin<Box<dyn Stream<Item = BuddyResult<T>> + Send>>,
    peeked: Option<BuddyResult<T>>,
}

impl<T> Unpin for QueryResult<T> {}

#[cfg(test)]
impl<T> std::fmt::Debug for QueryResult<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResult").finish_non_exhaustive()
    }
}

impl<T: Send + 'static> QueryResult<T> {
    pub fn buffered(items: Vec<T>) -> Self {
        Self::streaming(futures_util::stream::iter(items.into_iter().map(Ok)))
    }

    pub fn streaming<S>(stream: S) -> Self
    where
        S: Stream<Item = BuddyResult<T>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
            peeked: None,
        }
    }

    /// Whether another element is available. Errors count as elements.
    pub async fn has_next(&mut self) -> bool {
        if self.peeked.is_none() {
            self.peeked = self.inner.next().await;
        }
        self.peeked.is_some()
    }

    /// Next element, or `None` once the cursor is exhausted.
    pub async fn next(&mut self) -> BuddyResult<Option<T>> {
        match self.peeked.take() {
            Some(item) => item.map(Some),
            None => self.inner.next().await.transpose(),
        }
    }

    /// Drain the remaining elements.
    pub async fn to_list(mut self) -> BuddyResult<Vec<T>> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await? {
            items.push(item);
        }
        Ok(items)
    }

    pub fn map<U, F>(self, mut f: F) -> QueryResult<U>
    where
        U: Send + 'static,
        F: FnMut(T) -> U + Send + 'static,
    {
        self.try_map(move |item| Ok(f(item)))
    }

    /// Like [`QueryResult::map`] for fallible conversions.
    pub fn try_map<U, F>(self, mut f: F) -> QueryResult<U>
    where
        U: Send + 'static,
        F: FnMut(T) -> BuddyResult<U> + Send + 'static,
    {
        let head = futures_util::stream::iter(self.peeked);
        let stream = head
            .chain(self.inner)
            .map(move |item| item.and_then(&mut f));
        QueryResult::streaming(stream)
    }
}

impl<T> Stream for QueryResult<T> {
    type Item = BuddyResult<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(item) = self.peeked.take() {
            return Poll::Ready(Some(item));
        }
        self.inner.as_mut().poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BuddyError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn cursor_is_single_pass() {
        let mut result = QueryResult::buffered(vec![1, 2, 3]);
        assert!(result.has_next().await);
        assert!(result.has_next().await);
        assert_eq!(result.next().await.unwrap(), Some(1));
        assert_eq!(result.to_list().await.unwrap(), vec![2, 3]);
    }

    #[tokio::test]
    async fn exhausted_cursor() {
        let mut result = QueryResult::<i32>::buffered(vec![]);
        assert!(!result.has_next().await);
        assert_eq!(result.next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn map_is_lazy_and_skips_consumed_elements() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let mut result = QueryResult::buffered(vec![1, 2, 3, 4]);
        assert_eq!(result.next().await.unwrap(), Some(1));
        assert!(result.has_next().await);

        let mut mapped = result.map(move |n| {
            seen.fetch_add(1, Ordering::SeqCst);
            n * 10
        });
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(mapped.next().await.unwrap(), Some(20));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(mapped.to_list().await.unwrap(), vec![30, 40]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn streaming_surfaces_errors_in_place() {
        let stream = futures_util::stream::iter(vec![
            Ok(1),
            Err(BuddyError::NoDataFound),
            Ok(3),
        ]);
        let mut result = QueryResult::streaming(stream);
        assert_eq!(result.next().await.unwrap(), Some(1));
        assert!(result.next().await.unwrap_err().is_no_data_found());
        assert_eq!(result.next().await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn try_map_propagates_failures() {
        let result = QueryResult::buffered(vec!["1", "x"])
            .try_map(|s| s.parse::<i32>().map_err(|e| BuddyError::decode("n", e.to_string())));
        assert!(result.to_list().await.is_err());
    }
}
