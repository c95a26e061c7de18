//! Wait for a remote resource to reach a target status.
//!
//! # Design
//! The loop owns nothing but an attempt counter; fetching is delegated to a
//! [`StatusSource`] and waiting to a [`Sleeper`], so the same loop drives a
//! real HTTP client in production and scripted fakes in tests. A session is
//! sequential: one fetch at a time with a non-blocking wait in between.
//! Independent sessions on the same resource are not coordinated.
//!
//! Fetch failures end the session immediately. Retrying transport errors is
//! the transport's business.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backoff::BackoffMethod;
use crate::error::PollError;

/// Fetches the current state of a resource.
pub trait StatusSource {
    type Id: fmt::Display;
    type Resource;
    type Status: PartialEq + fmt::Debug;
    type Error: std::error::Error + 'static;

    fn fetch(&self, id: &Self::Id) -> impl Future<Output = Result<Self::Resource, Self::Error>>;

    fn status_of(&self, resource: &Self::Resource) -> Self::Status;
}

/// Non-blocking delay between attempts.
pub trait Sleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()>;
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await
    }
}

/// Runs poll sessions with a fixed backoff method, sleeper and cancellation
/// token.
#[derive(Debug, Clone)]
pub struct Poller<B, Z = TokioSleeper> {
    backoff: B,
    sleeper: Z,
    cancel: CancellationToken,
}

impl<B: BackoffMethod> Poller<B> {
    pub fn new(backoff: B) -> Self {
        Self {
            backoff,
            sleeper: TokioSleeper,
            cancel: CancellationToken::new(),
        }
    }
}

impl<B: BackoffMethod, Z: Sleeper> Poller<B, Z> {
    pub fn with_sleeper<Z2: Sleeper>(self, sleeper: Z2) -> Poller<B, Z2> {
        Poller {
            backoff: self.backoff,
            sleeper,
            cancel: self.cancel,
        }
    }

    /// Stop sessions when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fetch `id` until its status equals `target`.
    ///
    /// Waits `next_delay(0)` before the first fetch and `next_delay(n)` before
    /// fetch `n`. Gives up with [`PollError::Timeout`] once `max_attempts`
    /// fetches have been made.
    pub async fn poll_until<S: StatusSource>(
        &self,
        source: &S,
        id: &S::Id,
        target: &S::Status,
    ) -> Result<S::Resource, PollError<S::Status, S::Error>> {
        let max_attempts = self.backoff.max_attempts();
        let mut attempts = 0u32;

        loop {
            self.wait::<S::Status, S::Error>(self.backoff.next_delay(attempts), attempts)
                .await?;
            if self.cancel.is_cancelled() {
                return Err(PollError::Cancelled { attempts });
            }

            let resource = source.fetch(id).await.map_err(|err| {
                warn!(%id, attempt = attempts, error = %err, "status fetch failed");
                PollError::ResourceFetch(err)
            })?;
            attempts += 1;

            let status = source.status_of(&resource);
            if status == *target {
                info!(%id, ?status, attempts, "resource reached target status");
                return Ok(resource);
            }
            debug!(%id, ?status, ?target, attempts, max_attempts, "resource not ready");

            if attempts >= max_attempts {
                warn!(%id, ?status, ?target, attempts, "gave up waiting for target status");
                return Err(PollError::Timeout {
                    last_status: status,
                    attempts,
                });
            }
        }
    }

    async fn wait<T, E>(&self, delay: Duration, attempts: u32) -> Result<(), PollError<T, E>>
    where
        T: fmt::Debug,
        E: std::error::Error + 'static,
    {
        if self.cancel.is_cancelled() {
            return Err(PollError::Cancelled { attempts });
        }
        if delay.is_zero() {
            return Ok(());
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Err(PollError::Cancelled { attempts }),
            _ = self.sleeper.sleep(delay) => Ok(()),
        }
    }
}

/// One-shot form of [`Poller::poll_until`] with the tokio timer and no
/// cancellation.
pub async fn poll_until<S, B>(
    source: &S,
    id: &S::Id,
    target: &S::Status,
    backoff: &B,
) -> Result<S::Resource, PollError<S::Status, S::Error>>
where
    S: StatusSource,
    B: BackoffMethod + ?Sized,
{
    Poller::new(backoff).poll_until(source, id, target).await
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::io;
    use std::rc::Rc;

    use super::*;
    use crate::backoff::BackoffPolicy;

    struct ScriptedSource {
        statuses: RefCell<VecDeque<&'static str>>,
        fetches: Cell<u32>,
        fail_on_fetch: Option<u32>,
        cancel_after_fetch: Option<(u32, CancellationToken)>,
    }

    impl ScriptedSource {
        fn new(statuses: &[&'static str]) -> Self {
            Self {
                statuses: RefCell::new(statuses.iter().copied().collect()),
                fetches: Cell::new(0),
                fail_on_fetch: None,
                cancel_after_fetch: None,
            }
        }

        fn repeating(status: &'static str) -> Self {
            Self::new(&[status; 64])
        }
    }

    impl StatusSource for ScriptedSource {
        type Id = u64;
        type Resource = &'static str;
        type Status = &'static str;
        type Error = io::Error;

        async fn fetch(&self, _id: &u64) -> Result<&'static str, io::Error> {
            let n = self.fetches.get() + 1;
            self.fetches.set(n);
            if self.fail_on_fetch == Some(n) {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"));
            }
            if let Some((after, token)) = &self.cancel_after_fetch {
                if *after == n {
                    token.cancel();
                }
            }
            Ok(self.statuses.borrow_mut().pop_front().unwrap_or("offline"))
        }

        fn status_of(&self, resource: &&'static str) -> &'static str {
            *resource
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSleeper {
        sleeps: Rc<RefCell<Vec<Duration>>>,
    }

    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.sleeps.borrow_mut().push(duration);
        }
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[tokio::test]
    async fn resolves_after_third_fetch() {
        let source = ScriptedSource::new(&["provisioning", "booting", "running"]);
        let sleeper = RecordingSleeper::default();
        let policy = BackoffPolicy::fixed(secs(5), Duration::ZERO, 25).unwrap();
        let poller = Poller::new(policy).with_sleeper(sleeper.clone());

        let resource = poller.poll_until(&source, &1, &"running").await.unwrap();

        assert_eq!(resource, "running");
        assert_eq!(source.fetches.get(), 3);
        assert_eq!(*sleeper.sleeps.borrow(), vec![secs(5), secs(5)]);
    }

    #[tokio::test]
    async fn initial_delay_precedes_first_fetch() {
        let source = ScriptedSource::new(&["provisioning", "booting", "running"]);
        let sleeper = RecordingSleeper::default();
        let poller = Poller::new(BackoffPolicy::default()).with_sleeper(sleeper.clone());

        poller.poll_until(&source, &1, &"running").await.unwrap();

        assert_eq!(*sleeper.sleeps.borrow(), vec![secs(15), secs(5), secs(5)]);
    }

    #[tokio::test]
    async fn times_out_when_target_never_reached() {
        let source = ScriptedSource::repeating("booting");
        let policy = BackoffPolicy::fixed(secs(1), Duration::ZERO, 2).unwrap();
        let poller = Poller::new(policy).with_sleeper(RecordingSleeper::default());

        let err = poller.poll_until(&source, &1, &"running").await.unwrap_err();

        match err {
            PollError::Timeout { last_status, attempts } => {
                assert_eq!(last_status, "booting");
                assert_eq!(attempts, 2);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(source.fetches.get(), 2);
    }

    #[tokio::test]
    async fn fetch_errors_are_not_retried() {
        let mut source = ScriptedSource::repeating("booting");
        source.fail_on_fetch = Some(2);
        let policy = BackoffPolicy::fixed(secs(1), Duration::ZERO, 25).unwrap();
        let poller = Poller::new(policy).with_sleeper(RecordingSleeper::default());

        let err = poller.poll_until(&source, &1, &"running").await.unwrap_err();

        assert!(matches!(err, PollError::ResourceFetch(ref e) if e.kind() == io::ErrorKind::ConnectionReset));
        assert_eq!(source.fetches.get(), 2);
    }

    #[tokio::test]
    async fn cancelled_before_start_never_fetches() {
        let source = ScriptedSource::new(&["running"]);
        let token = CancellationToken::new();
        token.cancel();
        let poller = Poller::new(BackoffPolicy::default())
            .with_sleeper(RecordingSleeper::default())
            .with_cancellation(token);

        let err = poller.poll_until(&source, &1, &"running").await.unwrap_err();

        assert!(matches!(err, PollError::Cancelled { attempts: 0 }));
        assert_eq!(source.fetches.get(), 0);
    }

    #[tokio::test]
    async fn cancellation_between_attempts_stops_the_session() {
        let token = CancellationToken::new();
        let mut source = ScriptedSource::repeating("booting");
        source.cancel_after_fetch = Some((2, token.clone()));
        let sleeper = RecordingSleeper::default();
        let policy = BackoffPolicy::fixed(secs(1), Duration::ZERO, 25).unwrap();
        let poller = Poller::new(policy)
            .with_sleeper(sleeper.clone())
            .with_cancellation(token);

        let err = poller.poll_until(&source, &1, &"running").await.unwrap_err();

        assert!(err.is_cancelled());
        assert!(matches!(err, PollError::Cancelled { attempts: 2 }));
        assert_eq!(source.fetches.get(), 2);
        assert_eq!(sleeper.sleeps.borrow().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_a_pending_wait() {
        let source = ScriptedSource::new(&["running"]);
        let poller = Poller::new(BackoffPolicy::fixed(secs(1), secs(3600), 1).unwrap());
        let token = poller.cancellation_token().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });

        let started = tokio::time::Instant::now();
        let err = poller.poll_until(&source, &1, &"running").await.unwrap_err();

        assert!(matches!(err, PollError::Cancelled { attempts: 0 }));
        assert!(started.elapsed() < secs(3600));
        assert_eq!(source.fetches.get(), 0);
    }

    #[tokio::test]
    async fn free_function_borrows_the_policy() {
        let source = ScriptedSource::new(&["running"]);
        let policy = BackoffPolicy::fixed(Duration::ZERO, Duration::ZERO, 1).unwrap();

        let resource = poll_until(&source, &9, &"running", &policy).await.unwrap();

        assert_eq!(resource, "running");
        assert_eq!(source.fetches.get(), 1);
    }
}
