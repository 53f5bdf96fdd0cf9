//! Stream combinators for derived, reactive views
//!
//! Upstreams are `tokio::sync::watch` channels turned into streams. Derived
//! views are built from a handful of combinators: combine-latest, switch to
//! latest inner stream, and suppression of equal consecutive values.
//!
//! Fallible streams carry `Result` items and end after the first error.

use crate::error::Result;
use futures::future;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use tokio::sync::watch;

/// A boxed, fallible stream that owns everything it needs
pub type ResultStream<T> = BoxStream<'static, Result<T>>;

/// Current value of a watch channel, then every later change
///
/// Changes that land while the consumer is busy are coalesced into the most
/// recent value. The stream ends when the sender is dropped.
pub fn watch_stream<T>(rx: watch::Receiver<T>) -> BoxStream<'static, T>
where
    T: Clone + Send + Sync + 'static,
{
    stream::unfold((rx, true), |(mut rx, first)| async move {
        if !first {
            rx.changed().await.ok()?;
        }
        let value = rx.borrow_and_update().clone();
        Some((value, (rx, false)))
    })
    .boxed()
}

/// Drop items equal to the previously emitted one
pub fn distinct_until_changed<S, T>(source: S) -> BoxStream<'static, T>
where
    S: Stream<Item = T> + Send + 'static,
    T: Clone + PartialEq + Send + 'static,
{
    let mut last: Option<T> = None;
    source
        .filter(move |item| {
            let changed = last.as_ref() != Some(item);
            if changed {
                last = Some(item.clone());
            }
            future::ready(changed)
        })
        .boxed()
}

/// [`distinct_until_changed`] for fallible streams; errors always pass through
pub fn distinct_ok<T>(source: ResultStream<T>) -> ResultStream<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    let mut last: Option<T> = None;
    let filtered = source.filter(move |item| {
        let keep = match item {
            Ok(value) => {
                let changed = last.as_ref() != Some(value);
                if changed {
                    last = Some(value.clone());
                }
                changed
            }
            Err(_) => true,
        };
        future::ready(keep)
    });
    until_error(filtered.boxed())
}

/// End the stream right after it yields its first error
pub fn until_error<T: Send + 'static>(source: ResultStream<T>) -> ResultStream<T> {
    stream::unfold(Some(source), |state| async move {
        let mut source = state?;
        match source.next().await? {
            Ok(value) => Some((Ok(value), Some(source))),
            Err(e) => Some((Err(e), None)),
        }
    })
    .boxed()
}

enum Side<A, B> {
    Left(A),
    Right(B),
}

/// Recompute from the latest value of each upstream whenever either emits
///
/// Nothing is emitted until both upstreams have produced a value.
pub fn combine_latest<A, B, O, F>(
    left: ResultStream<A>,
    right: ResultStream<B>,
    mut combine: F,
) -> ResultStream<O>
where
    A: Send + 'static,
    B: Send + 'static,
    O: Send + 'static,
    F: FnMut(&A, &B) -> O + Send + 'static,
{
    let merged = stream::select(
        left.map(|item| item.map(Side::Left)),
        right.map(|item| item.map(Side::Right)),
    );

    let mut latest_left: Option<A> = None;
    let mut latest_right: Option<B> = None;
    let combined = merged.filter_map(move |item| {
        let out = match item {
            Err(e) => Some(Err(e)),
            Ok(side) => {
                match side {
                    Side::Left(value) => latest_left = Some(value),
                    Side::Right(value) => latest_right = Some(value),
                }
                match (&latest_left, &latest_right) {
                    (Some(l), Some(r)) => Some(Ok(combine(l, r))),
                    _ => None,
                }
            }
        };
        future::ready(out)
    });

    until_error(combined.boxed())
}

enum Step<O, I> {
    Outer(Option<O>),
    Inner(Option<I>),
}

struct Switch<T> {
    outer: Option<ResultStream<ResultStream<T>>>,
    inner: Option<ResultStream<T>>,
}

impl<T> Switch<T> {
    fn finished() -> Self {
        Self {
            outer: None,
            inner: None,
        }
    }
}

/// Flatten a stream of streams, always following the most recent inner stream
///
/// A new inner stream replaces (and drops) the previous one before it is
/// polled, so values from a superseded subscription are never emitted. The
/// outer stream is polled first, which discards an inner value that races
/// with its own replacement.
pub fn switch_latest<T: Send + 'static>(outer: ResultStream<ResultStream<T>>) -> ResultStream<T> {
    let state = Switch {
        outer: Some(outer),
        inner: None,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            let step = match (&mut state.outer, &mut state.inner) {
                (None, None) => return None,
                (Some(outer), None) => Step::Outer(outer.next().await),
                (None, Some(inner)) => Step::Inner(inner.next().await),
                (Some(outer), Some(inner)) => {
                    tokio::select! {
                        biased;
                        next = outer.next() => Step::Outer(next),
                        next = inner.next() => Step::Inner(next),
                    }
                }
            };

            match step {
                Step::Outer(Some(Ok(next))) => state.inner = Some(next),
                Step::Outer(Some(Err(e))) => return Some((Err(e), Switch::finished())),
                Step::Outer(None) => state.outer = None,
                Step::Inner(Some(Ok(value))) => return Some((Ok(value), state)),
                Step::Inner(Some(Err(e))) => return Some((Err(e), Switch::finished())),
                Step::Inner(None) => state.inner = None,
            }
        }
    })
    .boxed()
}
