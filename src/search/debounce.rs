//! Debounced execution of an async single-argument function
//!
//! Every [`Debouncer::call`] arms a timer for the quiet period and disarms the
//! timer of the previous call. Only a call whose timer runs out actually
//! invokes the wrapped function. Calls replaced before their timer ran out
//! resolve with [`DebounceError::Superseded`] instead of hanging forever.
//!
//! Cancellation is timer-level only: once a timer has fired the wrapped
//! function runs to completion, and a later call simply arms a new timer.

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Why a debounced call produced no output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DebounceError {
    /// A newer call replaced this one before its quiet period elapsed
    #[error("call superseded by a newer call before its quiet period elapsed")]
    Superseded,
    /// The timer task was dropped (e.g. runtime shutdown)
    #[error("debounced task dropped before completing")]
    Dropped,
}

type Task<A, R> = Arc<dyn Fn(A) -> BoxFuture<'static, R> + Send + Sync>;

/// The call currently waiting for its quiet period to elapse
struct Pending<R> {
    id: u64,
    token: CancellationToken,
    reply: oneshot::Sender<Result<R, DebounceError>>,
}

struct Inner<A, R> {
    task: Task<A, R>,
    delay: Duration,
    next_id: AtomicU64,
    pending: Mutex<Option<Pending<R>>>,
}

/// Wraps an async function so that bursts of calls collapse into one
pub struct Debouncer<A, R> {
    inner: Arc<Inner<A, R>>,
}

impl<A, R> Clone for Debouncer<A, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A, R> std::fmt::Debug for Debouncer<A, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.inner.delay)
            .field("has_pending", &self.has_pending())
            .finish()
    }
}

impl<A, R> Debouncer<A, R>
where
    A: Send + 'static,
    R: Send + 'static,
{
    pub fn new<F, Fut>(delay: Duration, task: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let task: Task<A, R> = Arc::new(move |arg: A| task(arg).boxed());

        Self {
            inner: Arc::new(Inner {
                task,
                delay,
                next_id: AtomicU64::new(0),
                pending: Mutex::new(None),
            }),
        }
    }

    /// Schedule `arg` and supersede whatever call is still waiting.
    ///
    /// The timer is armed immediately; the returned future only waits for the
    /// outcome. Must be called from within a tokio runtime.
    pub fn call(&self, arg: A) -> DebouncedCall<R> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let (reply, outcome) = oneshot::channel();

        self.inner.replace_pending(Some(Pending {
            id,
            token: token.clone(),
            reply,
        }));

        let inner = Arc::clone(&self.inner);
        tokio::spawn(inner.fire(id, token, arg));

        DebouncedCall { outcome }
    }
}

impl<A, R> Debouncer<A, R> {
    /// Supersede the waiting call without scheduling a new one.
    ///
    /// Returns `true` if a call was waiting.
    pub fn cancel(&self) -> bool {
        self.inner.replace_pending(None)
    }

    /// Whether a call is waiting for its quiet period to elapse
    pub fn has_pending(&self) -> bool {
        self.inner.pending.lock().is_some()
    }
}

impl<A, R> Inner<A, R> {
    fn replace_pending(&self, next: Option<Pending<R>>) -> bool {
        let previous = std::mem::replace(&mut *self.pending.lock(), next);

        match previous {
            Some(previous) => {
                previous.token.cancel();
                let _ = previous.reply.send(Err(DebounceError::Superseded));
                tracing::trace!(id = previous.id, "debounced call superseded");
                true
            }
            None => false,
        }
    }

    /// Claim the pending slot if it still belongs to call `id`
    fn claim(&self, id: u64) -> Option<Pending<R>> {
        let mut slot = self.pending.lock();
        if slot.as_ref().is_some_and(|pending| pending.id == id) {
            slot.take()
        } else {
            None
        }
    }
}

impl<A, R> Inner<A, R>
where
    A: Send + 'static,
    R: Send + 'static,
{
    /// Timer task for call `id`.
    ///
    /// The guard is created before the returned future is first polled, so a
    /// task dropped while still waiting settles its call with `Dropped`.
    fn fire(
        self: Arc<Self>,
        id: u64,
        token: CancellationToken,
        arg: A,
    ) -> impl Future<Output = ()> + Send + 'static {
        let guard = SettleOnDrop { inner: self, id };

        async move {
            let inner = &guard.inner;
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(inner.delay) => {}
            }

            let Some(pending) = inner.claim(id) else {
                return;
            };

            tracing::trace!(id, "quiet period elapsed, running debounced call");
            let output = (inner.task)(arg).await;
            let _ = pending.reply.send(Ok(output));
        }
    }
}

/// Releases the pending slot of call `id` when its timer task goes away.
///
/// A no-op once the call was claimed or superseded, since the slot no longer
/// holds `id` by then.
struct SettleOnDrop<A, R> {
    inner: Arc<Inner<A, R>>,
    id: u64,
}

impl<A, R> Drop for SettleOnDrop<A, R> {
    fn drop(&mut self) {
        if let Some(pending) = self.inner.claim(self.id) {
            pending.token.cancel();
            let _ = pending.reply.send(Err(DebounceError::Dropped));
            tracing::warn!(id = self.id, "debounce timer dropped before its quiet period elapsed");
        }
    }
}

/// Outcome of one [`Debouncer::call`].
///
/// Dropping it does not cancel the call; the output is then discarded.
#[derive(Debug)]
#[must_use = "the outcome of a debounced call is only observable by awaiting it"]
pub struct DebouncedCall<R> {
    outcome: oneshot::Receiver<Result<R, DebounceError>>,
}

impl<R> Future for DebouncedCall<R> {
    type Output = Result<R, DebounceError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.outcome)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(DebounceError::Dropped)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    const QUIET: Duration = Duration::from_millis(400);

    /// Debouncer over an echo task that records every argument it runs with
    fn recording_debouncer(
        latency: Duration,
    ) -> (Debouncer<u32, u32>, Arc<Mutex<Vec<u32>>>) {
        let runs = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&runs);
        let debouncer = Debouncer::new(QUIET, move |arg: u32| {
            recorded.lock().push(arg);
            async move {
                tokio::time::sleep(latency).await;
                arg * 10
            }
        });
        (debouncer, runs)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_runs_only_last_call() {
        let (debouncer, runs) = recording_debouncer(Duration::ZERO);

        let first = debouncer.call(1);
        let second = debouncer.call(2);
        let third = debouncer.call(3);

        assert_eq!(first.await, Err(DebounceError::Superseded));
        assert_eq!(second.await, Err(DebounceError::Superseded));
        assert_eq!(third.await, Ok(30));
        assert_eq!(*runs.lock(), vec![3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_calls_settle_before_quiet_period() {
        let (debouncer, _runs) = recording_debouncer(Duration::ZERO);
        let started = tokio::time::Instant::now();

        let first = debouncer.call(1);
        let _second = debouncer.call(2);

        assert_eq!(first.await, Err(DebounceError::Superseded));
        assert!(started.elapsed() < QUIET);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_calls_all_run() {
        let (debouncer, runs) = recording_debouncer(Duration::ZERO);

        assert_eq!(debouncer.call(1).await, Ok(10));
        assert_eq!(debouncer.call(2).await, Ok(20));
        assert_eq!(*runs.lock(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fired_call_is_not_superseded() {
        let (debouncer, runs) = recording_debouncer(Duration::from_millis(1000));

        let first = debouncer.call(1);
        // Past the quiet period: the first call is now executing
        tokio::time::sleep(QUIET + Duration::from_millis(50)).await;
        assert!(!debouncer.has_pending());

        let second = debouncer.call(2);
        assert!(debouncer.has_pending());

        assert_eq!(first.await, Ok(10));
        assert_eq!(second.await, Ok(20));
        assert_eq!(*runs.lock(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_supersedes_without_running() {
        let (debouncer, runs) = recording_debouncer(Duration::ZERO);

        let call = debouncer.call(7);
        assert!(debouncer.cancel());
        assert!(!debouncer.cancel());

        assert_eq!(call.await, Err(DebounceError::Superseded));
        tokio::time::sleep(QUIET * 2).await;
        assert!(runs.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_reaches_only_the_fired_call() {
        let executions = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&executions);
        let debouncer = Debouncer::new(QUIET, move |arg: &'static str| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { Err::<(), _>(format!("{arg} failed")) }
        });

        let earlier = debouncer.call("a");
        let latest = debouncer.call("b");

        assert_eq!(earlier.await, Err(DebounceError::Superseded));
        assert_eq!(latest.await, Ok(Err("b failed".to_string())));
        assert_eq!(executions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_runtime_shutdown_settles_waiting_call() {
        let (debouncer, runs) = recording_debouncer(Duration::ZERO);

        let first = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let call = {
            let _entered = first.enter();
            debouncer.call(1)
        };
        // Shutting down drops the timer task before it was ever polled
        drop(first);

        assert!(!debouncer.has_pending());

        let second = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let outcome =
            second.block_on(async { tokio::time::timeout(Duration::from_secs(2), call).await });

        assert_eq!(outcome, Ok(Err(DebounceError::Dropped)));
        assert!(runs.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_share_the_pending_slot() {
        let (debouncer, runs) = recording_debouncer(Duration::ZERO);
        let clone = debouncer.clone();

        let first = debouncer.call(1);
        let second = clone.call(2);

        assert_eq!(first.await, Err(DebounceError::Superseded));
        assert_eq!(second.await, Ok(20));
        assert_eq!(*runs.lock(), vec![2]);
    }
}
