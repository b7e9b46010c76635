//! Wall-clock timing for arbitrary functions.
//!
//! A wrapped function keeps its calling convention: [`wrap_sync`] returns a
//! plain closure and [`wrap_async`] returns a closure producing a future.
//! Every successful call reports `(name, seconds)` to a [`TimingSink`], with
//! seconds rounded to four decimal places.
//!
//! For functions returning `Result`, the `_fallible` variants report only
//! `Ok` returns; an `Err` is handed back to the caller untimed. A call that
//! panics unwinds through any wrapper and is not reported.
//!
//! ```ignore
//! use voiceassist_core::timing::wrap_async_fallible;
//!
//! let timed = wrap_async_fallible("list_calendars", |service: Arc<CalendarService>| async move {
//!     service.list_calendars().await
//! });
//! let calendars = timed(service).await?;
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Receives one report per completed call.
pub trait TimingSink: Send + Sync {
    fn record(&self, function: &str, duration_secs: f64);
}

/// Reports durations as `info` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TimingSink for TracingSink {
    fn record(&self, function: &str, duration_secs: f64) {
        info!(function, duration_secs, "function runtime");
    }
}

impl<T: TimingSink + ?Sized> TimingSink for Arc<T> {
    fn record(&self, function: &str, duration_secs: f64) {
        (**self).record(function, duration_secs)
    }
}

/// Elapsed seconds rounded to four decimal places.
pub fn round_duration(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 10_000.0).round() / 10_000.0
}

/// Produces timed wrappers that all report to the same sink.
#[derive(Clone)]
pub struct TimingInstrument {
    sink: Arc<dyn TimingSink>,
}

impl Default for TimingInstrument {
    fn default() -> Self {
        Self::new(TracingSink)
    }
}

impl std::fmt::Debug for TimingInstrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimingInstrument").finish_non_exhaustive()
    }
}

impl TimingInstrument {
    pub fn new(sink: impl TimingSink + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
        }
    }

    /// Wraps a synchronous function.
    ///
    /// Multiple arguments are passed as a tuple.
    pub fn wrap_sync<A, R, F>(&self, name: &str, f: F) -> impl Fn(A) -> R + use<A, R, F>
    where
        F: Fn(A) -> R,
    {
        let name = name.to_string();
        let sink = Arc::clone(&self.sink);
        move |args| {
            let start = Instant::now();
            let result = f(args);
            sink.record(&name, round_duration(start.elapsed()));
            result
        }
    }

    /// Wraps an asynchronous function.
    ///
    /// Timing starts when the returned future is first polled and stops once
    /// the inner future has completed.
    pub fn wrap_async<A, F, Fut>(
        &self,
        name: &str,
        f: F,
    ) -> impl Fn(A) -> BoxFuture<'static, Fut::Output> + use<A, F, Fut>
    where
        F: Fn(A) -> Fut,
        Fut: Future + Send + 'static,
    {
        let name: Arc<str> = Arc::from(name);
        let sink = Arc::clone(&self.sink);
        move |args| {
            let inner = f(args);
            let name = Arc::clone(&name);
            let sink = Arc::clone(&sink);
            Box::pin(async move {
                let start = Instant::now();
                let result = inner.await;
                sink.record(&name, round_duration(start.elapsed()));
                result
            })
        }
    }

    /// Wraps a synchronous function returning `Result`; only `Ok` is timed.
    pub fn wrap_sync_fallible<A, T, E, F>(
        &self,
        name: &str,
        f: F,
    ) -> impl Fn(A) -> Result<T, E> + use<A, T, E, F>
    where
        F: Fn(A) -> Result<T, E>,
    {
        let name = name.to_string();
        let sink = Arc::clone(&self.sink);
        move |args| {
            let start = Instant::now();
            let result = f(args);
            if result.is_ok() {
                sink.record(&name, round_duration(start.elapsed()));
            }
            result
        }
    }

    /// Wraps an asynchronous function returning `Result`; only `Ok` is timed.
    pub fn wrap_async_fallible<A, T, E, F, Fut>(
        &self,
        name: &str,
        f: F,
    ) -> impl Fn(A) -> BoxFuture<'static, Result<T, E>> + use<A, T, E, F, Fut>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let name: Arc<str> = Arc::from(name);
        let sink = Arc::clone(&self.sink);
        move |args| {
            let inner = f(args);
            let name = Arc::clone(&name);
            let sink = Arc::clone(&sink);
            Box::pin(async move {
                let start = Instant::now();
                let result = inner.await;
                if result.is_ok() {
                    sink.record(&name, round_duration(start.elapsed()));
                }
                result
            })
        }
    }
}

/// [`TimingInstrument::wrap_sync`] reporting through [`TracingSink`].
pub fn wrap_sync<A, R, F>(name: &str, f: F) -> impl Fn(A) -> R + use<A, R, F>
where
    F: Fn(A) -> R,
{
    TimingInstrument::default().wrap_sync(name, f)
}

/// [`TimingInstrument::wrap_async`] reporting through [`TracingSink`].
pub fn wrap_async<A, F, Fut>(
    name: &str,
    f: F,
) -> impl Fn(A) -> BoxFuture<'static, Fut::Output> + use<A, F, Fut>
where
    F: Fn(A) -> Fut,
    Fut: Future + Send + 'static,
{
    TimingInstrument::default().wrap_async(name, f)
}

/// [`TimingInstrument::wrap_sync_fallible`] reporting through [`TracingSink`].
pub fn wrap_sync_fallible<A, T, E, F>(
    name: &str,
    f: F,
) -> impl Fn(A) -> Result<T, E> + use<A, T, E, F>
where
    F: Fn(A) -> Result<T, E>,
{
    TimingInstrument::default().wrap_sync_fallible(name, f)
}

/// [`TimingInstrument::wrap_async_fallible`] reporting through [`TracingSink`].
pub fn wrap_async_fallible<A, T, E, F, Fut>(
    name: &str,
    f: F,
) -> impl Fn(A) -> BoxFuture<'static, Result<T, E>> + use<A, T, E, F, Fut>
where
    F: Fn(A) -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    TimingInstrument::default().wrap_async_fallible(name, f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        reports: Mutex<Vec<(String, f64)>>,
    }

    impl RecordingSink {
        fn reports(&self) -> Vec<(String, f64)> {
            self.reports.lock().unwrap().clone()
        }
    }

    impl TimingSink for RecordingSink {
        fn record(&self, function: &str, duration_secs: f64) {
            self.reports
                .lock()
                .unwrap()
                .push((function.to_string(), duration_secs));
        }
    }

    fn instrument() -> (TimingInstrument, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        (TimingInstrument::new(Arc::clone(&sink)), sink)
    }

    fn assert_rounded(duration: f64) {
        assert!(duration >= 0.0);
        assert_eq!((duration * 10_000.0).round() / 10_000.0, duration);
    }

    fn double(x: i32) -> i32 {
        x * 2
    }

    async fn double_async(x: i32) -> i32 {
        x * 2
    }

    #[test]
    fn round_duration_keeps_four_decimals() {
        assert_eq!(round_duration(Duration::from_micros(123_456)), 0.1235);
        assert_eq!(round_duration(Duration::from_secs(2)), 2.0);
        assert_eq!(round_duration(Duration::ZERO), 0.0);
    }

    #[test]
    fn sync_wrapper_returns_result_and_reports_once() {
        let (instrument, sink) = instrument();
        let timed = instrument.wrap_sync("double", double);

        assert_eq!(timed(21), 42);

        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].0, "double");
        assert_rounded(reports[0].1);
    }

    #[test]
    fn sync_wrapper_reports_every_call() {
        let (instrument, sink) = instrument();
        let timed = instrument.wrap_sync("add", |(a, b): (i32, i32)| a + b);

        assert_eq!(timed((1, 2)), 3);
        assert_eq!(timed((20, 22)), 42);
        assert_eq!(sink.reports().len(), 2);
    }

    #[test]
    fn fallible_sync_wrapper_skips_errors() {
        let (instrument, sink) = instrument();
        let timed = instrument.wrap_sync_fallible("parse", |s: &str| s.parse::<i32>());

        assert!(timed("nope").is_err());
        assert!(sink.reports().is_empty());

        assert_eq!(timed("7"), Ok(7));
        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].0, "parse");
        assert_rounded(reports[0].1);
    }

    #[tokio::test]
    async fn fallible_async_wrapper_skips_errors() {
        let (instrument, sink) = instrument();
        let timed = instrument.wrap_async_fallible("fetch", |ok: bool| async move {
            if ok {
                Ok(42)
            } else {
                Err("boom".to_string())
            }
        });

        assert_eq!(timed(false).await, Err("boom".to_string()));
        assert!(sink.reports().is_empty());

        assert_eq!(timed(true).await, Ok(42));
        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].0, "fetch");
        assert_rounded(reports[0].1);
    }

    #[test]
    fn sync_wrapper_does_not_report_panics() {
        let (instrument, sink) = instrument();
        let timed = instrument.wrap_sync("boom", |_: ()| -> i32 { panic!("boom") });

        let outcome = catch_unwind(AssertUnwindSafe(|| timed(())));
        assert!(outcome.is_err());
        assert!(sink.reports().is_empty());
    }

    #[tokio::test]
    async fn async_wrapper_returns_result_and_reports_once() {
        let (instrument, sink) = instrument();
        let timed = instrument.wrap_async("double_async", double_async);

        assert_eq!(timed(21).await, 42);

        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].0, "double_async");
        assert_rounded(reports[0].1);
    }

    #[tokio::test]
    async fn async_wrapper_measures_until_completion() {
        let (instrument, sink) = instrument();
        let timed = instrument.wrap_async("sleepy", |ms: u64| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            ms
        });

        assert_eq!(timed(20).await, 20);

        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].1 >= 0.02, "duration was {}", reports[0].1);
    }

    #[tokio::test]
    async fn async_wrapper_reports_nothing_until_awaited() {
        let (instrument, sink) = instrument();
        let timed = instrument.wrap_async("lazy", double_async);

        let pending = timed(1);
        assert!(sink.reports().is_empty());
        assert_eq!(pending.await, 2);
        assert_eq!(sink.reports().len(), 1);
    }

    #[tokio::test]
    async fn default_wrappers_use_tracing_sink() {
        let timed_sync = wrap_sync("double", double);
        let timed_async = wrap_async("double_async", double_async);

        assert_eq!(timed_sync(21), 42);
        assert_eq!(timed_async(21).await, 42);

        let fallible_sync = wrap_sync_fallible("parse", |s: &str| s.parse::<i32>());
        let fallible_async =
            wrap_async_fallible("double_ok", |x: i32| async move { Ok::<_, String>(x * 2) });
        assert_eq!(fallible_sync("21"), Ok(21));
        assert_eq!(fallible_async(21).await, Ok(42));
    }
}
