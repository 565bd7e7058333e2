//! Stream transform stages.
//!
//! Every stage returns a new [`Stream`] wrapping its source. Stage state
//! (last emitted value, latest combined values) is created per subscription,
//! so two subscribers of the same stage never share filter state.

use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::config::NumericFilter;
use crate::stream::{lock, Observer, Stream, Subscription};

/// Tolerance used when comparing a change against a threshold.
const THRESHOLD_EPSILON: f64 = 1e-9;

impl<T: Clone + Send + Sync + 'static> Stream<T> {
    /// Transform every value.
    pub fn map<U, F>(&self, f: F) -> Stream<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let source = self.clone();
        let f = Arc::new(f);
        Stream::new(move |observer: Observer<U>| {
            let f = f.clone();
            source.subscribe(move |value| observer(f(value)))
        })
    }

    /// Pass only values matching `predicate`.
    pub fn filter<F>(&self, predicate: F) -> Stream<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let source = self.clone();
        let predicate = Arc::new(predicate);
        Stream::new(move |observer: Observer<T>| {
            let predicate = predicate.clone();
            source.subscribe(move |value| {
                if predicate(&value) {
                    observer(value);
                }
            })
        })
    }

    /// Transform values, dropping those mapped to `None`.
    pub fn filter_map<U, F>(&self, f: F) -> Stream<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> Option<U> + Send + Sync + 'static,
    {
        let source = self.clone();
        let f = Arc::new(f);
        Stream::new(move |observer: Observer<U>| {
            let f = f.clone();
            source.subscribe(move |value| {
                if let Some(mapped) = f(value) {
                    observer(mapped);
                }
            })
        })
    }

    /// Suppress a value when `same(previous_emitted, value)` holds.
    pub fn distinct_until_changed_by<F>(&self, same: F) -> Stream<T>
    where
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        let source = self.clone();
        let same = Arc::new(same);
        Stream::new(move |observer: Observer<T>| {
            let same = same.clone();
            let last: Arc<Mutex<Option<T>>> = Arc::new(Mutex::new(None));
            source.subscribe(move |value| {
                let emit = {
                    let mut last = lock(&last);
                    let duplicate =
                        matches!(last.as_ref(), Some(previous) if same(previous, &value));
                    if !duplicate {
                        *last = Some(value.clone());
                    }
                    !duplicate
                };
                if emit {
                    observer(value);
                }
            })
        })
    }

    /// Emit the latest value on each trigger emission, if a new value arrived
    /// since the previous trigger.
    pub fn sample<U: Clone + Send + Sync + 'static>(&self, trigger: &Stream<U>) -> Stream<T> {
        let source = self.clone();
        let trigger = trigger.clone();
        Stream::new(move |observer: Observer<T>| {
            let state: Arc<Mutex<(Option<T>, bool)>> = Arc::new(Mutex::new((None, false)));

            let on_value = state.clone();
            let values = source.subscribe(move |value| {
                let mut state = lock(&on_value);
                state.0 = Some(value);
                state.1 = true;
            });

            let ticks = trigger.subscribe(move |_| {
                let pending = {
                    let mut state = lock(&state);
                    if state.1 {
                        state.1 = false;
                        state.0.clone()
                    } else {
                        None
                    }
                };
                if let Some(value) = pending {
                    observer(value);
                }
            });

            Subscription::composite(vec![values, ticks])
        })
    }

    /// Emit a value once it has stayed unchanged for a full trigger period.
    ///
    /// A value arriving between two triggers is held back; if no newer value
    /// arrives before the next-but-one trigger it is emitted.
    pub fn debounce<U: Clone + Send + Sync + 'static>(&self, trigger: &Stream<U>) -> Stream<T> {
        let source = self.clone();
        let trigger = trigger.clone();
        Stream::new(move |observer: Observer<T>| {
            // (pending value, arrived since last trigger)
            let state: Arc<Mutex<(Option<T>, bool)>> = Arc::new(Mutex::new((None, false)));

            let on_value = state.clone();
            let values = source.subscribe(move |value| {
                let mut state = lock(&on_value);
                state.0 = Some(value);
                state.1 = true;
            });

            let ticks = trigger.subscribe(move |_| {
                let settled = {
                    let mut state = lock(&state);
                    if state.1 {
                        state.1 = false;
                        None
                    } else {
                        state.0.take()
                    }
                };
                if let Some(value) = settled {
                    observer(value);
                }
            });

            Subscription::composite(vec![values, ticks])
        })
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Stream<T> {
    /// Suppress consecutive equal values.
    pub fn distinct_until_changed(&self) -> Stream<T> {
        self.distinct_until_changed_by(|a, b| a == b)
    }
}

/// Interleave several streams; every value of every source is forwarded as
/// it arrives (last value wins downstream).
pub fn merge<T: Clone + Send + Sync + 'static>(streams: Vec<Stream<T>>) -> Stream<T> {
    Stream::new(move |observer: Observer<T>| {
        let subscriptions = streams
            .iter()
            .map(|stream| stream.subscribe_observer(observer.clone()))
            .collect();
        Subscription::composite(subscriptions)
    })
}

/// Emit `(a, b)` whenever either source emits, once both have emitted.
pub fn combine_latest2<A, B>(a: &Stream<A>, b: &Stream<B>) -> Stream<(A, B)>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    let (a, b) = (a.clone(), b.clone());
    Stream::new(move |observer: Observer<(A, B)>| {
        let state: Arc<Mutex<(Option<A>, Option<B>)>> = Arc::new(Mutex::new((None, None)));

        let (state_a, observer_a) = (state.clone(), observer.clone());
        let sub_a = a.subscribe(move |value: A| {
            let combined = {
                let mut state = lock(&state_a);
                state.0 = Some(value.clone());
                state.1.clone().map(|b| (value, b))
            };
            if let Some(pair) = combined {
                observer_a(pair);
            }
        });

        let sub_b = b.subscribe(move |value: B| {
            let combined = {
                let mut state = lock(&state);
                state.1 = Some(value.clone());
                state.0.clone().map(|a| (a, value))
            };
            if let Some(pair) = combined {
                observer(pair);
            }
        });

        Subscription::composite(vec![sub_a, sub_b])
    })
}

/// Three-source form of [`combine_latest2`].
pub fn combine_latest3<A, B, C>(a: &Stream<A>, b: &Stream<B>, c: &Stream<C>) -> Stream<(A, B, C)>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    combine_latest2(&combine_latest2(a, b), c).map(|((a, b), c)| (a, b, c))
}

/// Emit the latest value of every source, in source order, whenever any
/// source emits and all have emitted at least once. An empty list never
/// emits.
pub fn combine_latest_all<T: Clone + Send + Sync + 'static>(
    streams: Vec<Stream<T>>,
) -> Stream<Vec<T>> {
    Stream::new(move |observer: Observer<Vec<T>>| {
        let latest: Arc<Mutex<Vec<Option<T>>>> = Arc::new(Mutex::new(vec![None; streams.len()]));

        let subscriptions = streams
            .iter()
            .enumerate()
            .map(|(index, stream)| {
                let latest = latest.clone();
                let observer = observer.clone();
                stream.subscribe(move |value| {
                    let combined: Option<Vec<T>> = {
                        let mut latest = lock(&latest);
                        latest[index] = Some(value);
                        latest.iter().cloned().collect()
                    };
                    if let Some(values) = combined {
                        observer(values);
                    }
                })
            })
            .collect();

        Subscription::composite(subscriptions)
    })
}

/// Round a number to `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

fn number(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Interpret a telemetry value as a boolean.
///
/// Numbers are true when non-zero, strings when they read "true"/"on"/"1".
pub fn value_as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|x| x != 0.0),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "on" | "1" => Some(true),
            "false" | "off" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

impl Stream<Value> {
    /// Round numeric values to `decimals` places; other values pass through.
    pub fn round(&self, decimals: u32) -> Stream<Value> {
        self.map(move |value| match value.as_f64() {
            Some(x) => number(round_to(x, decimals)),
            None => value,
        })
    }

    /// Pass a numeric value only if it differs from the last emitted one by
    /// at least `threshold`. The first value always passes; non-numeric
    /// values pass whenever they differ from the last emitted value.
    pub fn min_change(&self, threshold: f64) -> Stream<Value> {
        self.distinct_until_changed_by(move |previous, value| {
            match (previous.as_f64(), value.as_f64()) {
                (Some(a), Some(b)) => {
                    let delta = (b - a).abs();
                    delta == 0.0 || delta + THRESHOLD_EPSILON < threshold
                }
                _ => previous == value,
            }
        })
    }

    /// Round then threshold, per the quantity's filter.
    pub fn numeric(&self, filter: NumericFilter) -> Stream<Value> {
        self.round(filter.decimals).min_change(filter.min_change)
    }

    /// Map values to booleans, dropping values that are not boolean-like.
    pub fn as_bool(&self) -> Stream<Value> {
        self.filter_map(|value| value_as_bool(&value).map(Value::Bool))
    }

    /// Boolean negation of [`Stream::as_bool`].
    pub fn invert_bool(&self) -> Stream<Value> {
        self.filter_map(|value| value_as_bool(&value).map(|b| Value::Bool(!b)))
    }

    /// `true` while a numeric level is above zero.
    pub fn level_on(&self) -> Stream<Value> {
        self.filter_map(|value| value.as_f64().map(|level| Value::Bool(level > 0.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::Subject;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record<T: Clone + Send + Sync + 'static>(
        stream: &Stream<T>,
    ) -> (Arc<Mutex<Vec<T>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let sub = stream.subscribe(move |v| sink.lock().unwrap().push(v));
        (seen, sub)
    }

    #[test]
    fn test_voltage_round_then_threshold() {
        let subject = Subject::new();
        let stream = subject.as_stream().numeric(NumericFilter {
            decimals: 1,
            min_change: 0.1,
        });
        let (seen, _sub) = record(&stream);

        for v in [12.00, 12.04, 12.20] {
            subject.next(json!(v));
        }

        assert_eq!(*seen.lock().unwrap(), vec![json!(12.0), json!(12.2)]);
    }

    #[test]
    fn test_threshold_boundary_passes() {
        let subject = Subject::new();
        let stream = subject.as_stream().numeric(NumericFilter {
            decimals: 1,
            min_change: 0.1,
        });
        let (seen, _sub) = record(&stream);

        subject.next(json!(12.0));
        subject.next(json!(12.1));
        subject.next(json!(12.18));

        assert_eq!(*seen.lock().unwrap(), vec![json!(12.0), json!(12.1), json!(12.2)]);
    }

    #[test]
    fn test_min_change_suppresses_small_moves() {
        let subject = Subject::new();
        let (seen, _sub) = record(&subject.as_stream().min_change(1.0));

        for v in [10.0, 10.5, 10.9, 11.2, 10.4] {
            subject.next(json!(v));
        }

        assert_eq!(*seen.lock().unwrap(), vec![json!(10.0), json!(11.2)]);
    }

    #[test]
    fn test_min_change_non_numeric_values() {
        let subject = Subject::new();
        let (seen, _sub) = record(&subject.as_stream().min_change(1.0));

        subject.next(json!("Connected"));
        subject.next(json!("Connected"));
        subject.next(Value::Null);

        assert_eq!(*seen.lock().unwrap(), vec![json!("Connected"), Value::Null]);
    }

    #[test]
    fn test_filter_state_is_per_subscription() {
        let subject = Subject::new();
        let stream = subject.as_stream().distinct_until_changed();

        let (first, _a) = record(&stream);
        subject.next(1);
        let (second, _b) = record(&stream);
        subject.next(1);

        assert_eq!(*first.lock().unwrap(), vec![1]);
        assert_eq!(*second.lock().unwrap(), vec![1]);
    }

    #[test]
    fn test_merge_last_value_wins() {
        let a = Subject::new();
        let b = Subject::new();
        let (seen, _sub) = record(&merge(vec![a.as_stream(), b.as_stream()]));

        a.next(json!(true));
        b.next(json!(false));
        a.next(json!(true));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![json!(true), json!(false), json!(true)]
        );
    }

    #[test]
    fn test_combine_latest_waits_for_all() {
        let a = Subject::new();
        let b = Subject::new();
        let (seen, _sub) = record(&combine_latest2(&a.as_stream(), &b.as_stream()));

        a.next(1);
        a.next(2);
        b.next("x");
        a.next(3);

        assert_eq!(*seen.lock().unwrap(), vec![(2, "x"), (3, "x")]);
    }

    #[test]
    fn test_combine_latest_all_replayed_sources() {
        let a = Subject::with_value(1);
        let b = Subject::with_value(2);
        let (seen, _sub) = record(&combine_latest_all(vec![a.as_stream(), b.as_stream()]));
        b.next(5);

        assert_eq!(*seen.lock().unwrap(), vec![vec![1, 2], vec![1, 5]]);
    }

    #[test]
    fn test_combine_latest_all_empty_never_emits() {
        let (seen, _sub) = record(&combine_latest_all::<i32>(Vec::new()));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_sample_emits_only_fresh_values() {
        let source = Subject::new();
        let trigger = Subject::new();
        let (seen, _sub) = record(&source.as_stream().sample(&trigger.as_stream()));

        trigger.next(());
        source.next(1);
        source.next(2);
        trigger.next(());
        trigger.next(());
        source.next(3);
        trigger.next(());

        assert_eq!(*seen.lock().unwrap(), vec![2, 3]);
    }

    #[test]
    fn test_debounce_waits_for_quiet_period() {
        let source = Subject::new();
        let trigger = Subject::new();
        let (seen, _sub) = record(&source.as_stream().debounce(&trigger.as_stream()));

        source.next(1);
        trigger.next(());
        source.next(2);
        trigger.next(());
        assert!(seen.lock().unwrap().is_empty());

        trigger.next(());
        trigger.next(());
        assert_eq!(*seen.lock().unwrap(), vec![2]);
    }

    #[test]
    fn test_boolean_helpers() {
        let subject = Subject::new();
        let (on, _a) = record(&subject.as_stream().level_on());
        let (inverted, _b) = record(&subject.as_stream().invert_bool());

        subject.next(json!(0));
        subject.next(json!(55));
        subject.next(json!("garbage"));

        assert_eq!(*on.lock().unwrap(), vec![json!(false), json!(true)]);
        assert_eq!(*inverted.lock().unwrap(), vec![json!(true), json!(false)]);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(47.1234567, 5), 47.12346);
        assert_eq!(round_to(3.456, 2), 3.46);
        assert_eq!(round_to(12.04, 1), 12.0);
    }
}
