//! Push-based streams.
//!
//! A [`Subject`] is a slot holding the latest value plus an ordered list of
//! observers. A [`Stream`] is a cold description of how to subscribe to
//! something; transform stages (see [`crate::transform`]) wrap one stream in
//! another and are built once at wiring time.
//!
//! Delivery is synchronous: `Subject::next` invokes every observer in
//! registration order on the caller's thread. Observers must not block.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

/// Callback receiving stream emissions.
pub type Observer<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Owned handle to a live subscription.
///
/// Disposing runs the teardown exactly once. Dropping a handle that is still
/// live disposes it.
#[must_use = "dropping a Subscription disposes it immediately"]
pub struct Subscription {
    teardown: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Create a subscription that runs `teardown` when disposed.
    pub fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
        Self {
            teardown: Some(Box::new(teardown)),
        }
    }

    /// A subscription with nothing to release.
    pub fn empty() -> Self {
        Self { teardown: None }
    }

    /// Combine several subscriptions into one handle.
    pub fn composite(subscriptions: Vec<Subscription>) -> Self {
        Self::new(move || {
            for mut subscription in subscriptions {
                subscription.dispose();
            }
        })
    }

    /// Release the subscription. Later calls do nothing.
    pub fn dispose(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.teardown.is_none()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

struct SubjectInner<T> {
    latest: Option<T>,
    observers: Vec<(u64, Observer<T>)>,
    next_id: u64,
}

/// Latest-value slot with ordered fan-out.
///
/// A new subscriber immediately receives the current value (if any) and then
/// every later value, in the same order as every other subscriber.
pub struct Subject<T> {
    inner: Arc<Mutex<SubjectInner<T>>>,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> Subject<T> {
    /// Create an empty subject.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SubjectInner {
                latest: None,
                observers: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Create a subject already holding `value`.
    pub fn with_value(value: T) -> Self {
        let subject = Self::new();
        lock(&subject.inner).latest = Some(value);
        subject
    }

    /// Store `value` and deliver it to every observer.
    pub fn next(&self, value: T) {
        let observers: Vec<Observer<T>> = {
            let mut inner = lock(&self.inner);
            inner.latest = Some(value.clone());
            inner.observers.iter().map(|(_, o)| o.clone()).collect()
        };

        for observer in observers {
            observer(value.clone());
        }
    }

    /// The latest value, if one has been emitted.
    pub fn value(&self) -> Option<T> {
        lock(&self.inner).latest.clone()
    }

    pub fn observer_count(&self) -> usize {
        lock(&self.inner).observers.len()
    }

    /// Drop every observer without notifying them.
    pub fn clear_observers(&self) {
        lock(&self.inner).observers.clear();
    }

    /// Register an observer, replaying the latest value to it first.
    pub fn subscribe_observer(&self, observer: Observer<T>) -> Subscription {
        let (id, replay) = {
            let mut inner = lock(&self.inner);
            let id = inner.next_id;
            inner.next_id += 1;
            inner.observers.push((id, observer.clone()));
            (id, inner.latest.clone())
        };

        if let Some(value) = replay {
            observer(value);
        }

        let weak: Weak<Mutex<SubjectInner<T>>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner).observers.retain(|(oid, _)| *oid != id);
            }
        })
    }

    /// View this subject as a stream.
    pub fn as_stream(&self) -> Stream<T> {
        let subject = self.clone();
        Stream::new(move |observer| subject.subscribe_observer(observer))
    }
}

/// Cold, cloneable stream description.
pub struct Stream<T> {
    source: Arc<dyn Fn(Observer<T>) -> Subscription + Send + Sync>,
}

impl<T> Clone for Stream<T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Stream")
    }
}

impl<T: Clone + Send + Sync + 'static> Stream<T> {
    /// Build a stream from its subscribe function.
    pub fn new(subscribe: impl Fn(Observer<T>) -> Subscription + Send + Sync + 'static) -> Self {
        Self {
            source: Arc::new(subscribe),
        }
    }

    /// A stream that never emits.
    pub fn empty() -> Self {
        Self::new(|_| Subscription::empty())
    }

    /// A stream that emits `value` once to each subscriber.
    pub fn just(value: T) -> Self {
        Self::new(move |observer| {
            observer(value.clone());
            Subscription::empty()
        })
    }

    /// Subscribe with a closure.
    pub fn subscribe(&self, observer: impl Fn(T) + Send + Sync + 'static) -> Subscription {
        (self.source)(Arc::new(observer))
    }

    pub fn subscribe_observer(&self, observer: Observer<T>) -> Subscription {
        (self.source)(observer)
    }
}

/// Source of periodic ticks, used by sampling stages.
pub trait Ticker: Send + Sync {
    /// A stream emitting `()` once per `period` while subscribed.
    fn every(&self, period: Duration) -> Stream<()>;
}

/// Ticker driven by explicit [`ManualTicker::tick`] calls.
///
/// Every period shares the same tick source, so one call ticks every stream
/// built from this ticker.
#[derive(Clone, Default)]
pub struct ManualTicker {
    sink: Arc<Mutex<Vec<Observer<()>>>>,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver one tick to every subscribed stream.
    pub fn tick(&self) {
        let observers: Vec<Observer<()>> = lock(&self.sink).clone();
        for observer in observers {
            observer(());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.sink).len()
    }
}

impl Ticker for ManualTicker {
    fn every(&self, _period: Duration) -> Stream<()> {
        let sink = self.sink.clone();
        Stream::new(move |observer| {
            lock(&sink).push(observer.clone());
            let sink = Arc::downgrade(&sink);
            Subscription::new(move || {
                if let Some(sink) = sink.upgrade() {
                    lock(&sink).retain(|o| !Arc::ptr_eq(o, &observer));
                }
            })
        })
    }
}
