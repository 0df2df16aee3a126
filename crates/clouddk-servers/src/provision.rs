//! Deadline-bounded loops that race the platform's asynchronous provisioning.
//!
//! [`BootPoller`] re-reads a freshly created server until it reports `booted`.
//! [`DeletionRetrier`] re-issues a delete until the server is gone, riding out
//! the lock contention the platform reports as non-2xx answers. Both share the
//! [`WaitPolicy`] cadence and stop on the caller's [`CancelSignal`].

use crate::client::ServerApi;
use crate::models::Server;
use crate::Result;
use clouddk_core::id::ServerId;
use clouddk_core::wait::{CancelSignal, Tick, Ticker, WaitPolicy};
use clouddk_core::Error;
use tracing::{debug, info, warn};

/// Boot confirmation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootState {
    /// Still waiting for `booted`
    Booting,
    /// The server reported `booted`
    Ready,
    /// The deadline passed first
    TimedOut,
    /// A read failed
    Failed,
}

/// Deletion confirmation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionState {
    /// Deletion not yet confirmed
    Pending,
    /// The API accepted the delete
    Deleted,
    /// The server was already gone
    NotFound,
    /// The deadline passed first
    TimedOut,
}

impl DeletionState {
    /// Returns true when the server is confirmed gone.
    #[must_use]
    pub const fn is_gone(self) -> bool {
        matches!(self, Self::Deleted | Self::NotFound)
    }
}

fn describe(hostname: &str, id: &ServerId) -> String {
    format!("'{hostname}' (id: {id})")
}

/// Polls a server until it reports `booted`.
#[derive(Debug)]
pub struct BootPoller<'a, A: ServerApi + ?Sized> {
    api: &'a A,
    id: &'a ServerId,
    hostname: &'a str,
    policy: WaitPolicy,
    state: BootState,
    reads: u32,
}

impl<'a, A: ServerApi + ?Sized> BootPoller<'a, A> {
    /// Create a poller for one server.
    #[must_use]
    pub fn new(api: &'a A, id: &'a ServerId, hostname: &'a str, policy: WaitPolicy) -> Self {
        Self {
            api,
            id,
            hostname,
            policy,
            state: BootState::Booting,
            reads: 0,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> BootState {
        self.state
    }

    /// Number of reads issued so far.
    #[must_use]
    pub const fn reads(&self) -> u32 {
        self.reads
    }

    fn transition(&mut self, state: BootState) {
        self.state = state;
        info!(
            hostname = self.hostname,
            id = %self.id,
            state = ?state,
            reads = self.reads,
            "boot confirmation finished"
        );
    }

    /// Read the server every interval until it boots, the deadline passes, or
    /// `cancel` fires.
    ///
    /// The first read happens immediately, so an already booted server costs a
    /// single confirming read.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TimedOut`] at the deadline, [`Error::Cancelled`] on
    /// cancellation, and the read error unchanged if any read fails.
    pub async fn run(&mut self, cancel: &mut CancelSignal) -> Result<Server> {
        let mut ticker = Ticker::start(self.policy);

        loop {
            let attempt = match ticker.next(cancel).await {
                Tick::Attempt(attempt) => attempt,
                Tick::Expired => {
                    self.transition(BootState::TimedOut);
                    return Err(Error::TimedOut(format!(
                        "The server {} seems to be unable to boot",
                        describe(self.hostname, self.id)
                    )));
                }
                Tick::Cancelled => return Err(self.cancelled()),
            };

            debug!(hostname = self.hostname, id = %self.id, attempt, "polling server boot state");
            self.reads += 1;

            let read = tokio::select! {
                read = self.api.get_server(self.id) => read,
                () = cancel.cancelled() => return Err(self.cancelled()),
            };

            match read {
                Ok(server) if server.booted => {
                    self.transition(BootState::Ready);
                    return Ok(server);
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(hostname = self.hostname, id = %self.id, error = %err, "read failed while waiting for boot");
                    self.transition(BootState::Failed);
                    return Err(err);
                }
            }
        }
    }

    fn cancelled(&self) -> Error {
        info!(hostname = self.hostname, id = %self.id, reads = self.reads, "boot confirmation cancelled");
        Error::Cancelled(format!(
            "waiting for the server {} to boot",
            describe(self.hostname, self.id)
        ))
    }
}

/// Re-issues a delete until the server is gone.
#[derive(Debug)]
pub struct DeletionRetrier<'a, A: ServerApi + ?Sized> {
    api: &'a A,
    id: &'a ServerId,
    hostname: &'a str,
    policy: WaitPolicy,
    state: DeletionState,
    attempts: u32,
    last_error: Option<Error>,
}

impl<'a, A: ServerApi + ?Sized> DeletionRetrier<'a, A> {
    /// Create a retrier for one server.
    #[must_use]
    pub fn new(api: &'a A, id: &'a ServerId, hostname: &'a str, policy: WaitPolicy) -> Self {
        Self {
            api,
            id,
            hostname,
            policy,
            state: DeletionState::Pending,
            attempts: 0,
            last_error: None,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> DeletionState {
        self.state
    }

    /// Number of delete requests issued so far.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// HTTP status of the most recent rejected delete.
    #[must_use]
    pub fn last_status(&self) -> Option<u16> {
        self.last_error.as_ref().and_then(Error::status)
    }

    fn transition(&mut self, state: DeletionState) {
        self.state = state;
        info!(
            hostname = self.hostname,
            id = %self.id,
            state = ?state,
            attempts = self.attempts,
            "deletion finished"
        );
    }

    /// Delete the server every interval until the API accepts it or reports it
    /// missing, the deadline passes, or `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TimedOut`] carrying the last rejection at the deadline,
    /// [`Error::Cancelled`] on cancellation, and any non-API error unchanged.
    pub async fn run(&mut self, cancel: &mut CancelSignal) -> Result<DeletionState> {
        let mut ticker = Ticker::start(self.policy);

        loop {
            let attempt = match ticker.next(cancel).await {
                Tick::Attempt(attempt) => attempt,
                Tick::Expired => {
                    self.transition(DeletionState::TimedOut);
                    let reason = self
                        .last_error
                        .as_ref()
                        .map_or_else(|| "no response".to_string(), ToString::to_string);
                    return Err(Error::TimedOut(format!(
                        "gave up after {} attempts - Reason: {reason}",
                        self.attempts
                    )));
                }
                Tick::Cancelled => return Err(self.cancelled()),
            };

            debug!(hostname = self.hostname, id = %self.id, attempt, "deleting server");
            self.attempts += 1;

            let outcome = tokio::select! {
                outcome = self.api.delete_server(self.id) => outcome,
                () = cancel.cancelled() => return Err(self.cancelled()),
            };

            match outcome {
                Ok(()) => {
                    self.transition(DeletionState::Deleted);
                    return Ok(self.state);
                }
                Err(err) if err.is_not_found() => {
                    self.transition(DeletionState::NotFound);
                    return Ok(self.state);
                }
                Err(err) if err.is_transient() => {
                    warn!(hostname = self.hostname, id = %self.id, attempt, error = %err, "delete rejected, retrying");
                    self.last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn cancelled(&self) -> Error {
        info!(hostname = self.hostname, id = %self.id, attempts = self.attempts, "deletion cancelled");
        Error::Cancelled(format!(
            "waiting for the server {} to be deleted",
            describe(self.hostname, self.id)
        ))
    }
}

/// Wait for a server to boot with a fresh [`BootPoller`].
///
/// # Errors
///
/// See [`BootPoller::run`].
pub async fn wait_for_boot<A: ServerApi + ?Sized>(
    api: &A,
    id: &ServerId,
    hostname: &str,
    policy: WaitPolicy,
    cancel: &mut CancelSignal,
) -> Result<Server> {
    BootPoller::new(api, id, hostname, policy).run(cancel).await
}

/// Delete a server with a fresh [`DeletionRetrier`].
///
/// # Errors
///
/// See [`DeletionRetrier::run`].
pub async fn delete_until_gone<A: ServerApi + ?Sized>(
    api: &A,
    id: &ServerId,
    hostname: &str,
    policy: WaitPolicy,
    cancel: &mut CancelSignal,
) -> Result<DeletionState> {
    DeletionRetrier::new(api, id, hostname, policy)
        .run(cancel)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockServerApi;
    use clouddk_core::wait::CancelHandle;
    use reqwest::StatusCode;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    fn server(booted: bool) -> Server {
        serde_json::from_value(json!({
            "identifier": "42",
            "hostname": "web01",
            "booted": booted
        }))
        .unwrap()
    }

    fn id() -> ServerId {
        ServerId::parse_str("42").unwrap()
    }

    fn server_error() -> Error {
        Error::from_status(StatusCode::INTERNAL_SERVER_ERROR, "locked".to_string())
    }

    #[tokio::test(start_paused = true)]
    async fn boot_confirmed_on_third_read() {
        let mut api = MockServerApi::new();
        let mut calls = 0;
        api.expect_get_server().times(3).returning(move |_| {
            calls += 1;
            Ok(server(calls == 3))
        });

        let id = id();
        let start = Instant::now();
        let mut poller = BootPoller::new(&api, &id, "web01", WaitPolicy::default());
        let booted = poller.run(&mut CancelSignal::never()).await.unwrap();

        assert!(booted.booted);
        assert_eq!(poller.reads(), 3);
        assert_eq!(poller.state(), BootState::Ready);
        assert!(Instant::now() - start >= Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn already_booted_is_single_read() {
        let mut api = MockServerApi::new();
        api.expect_get_server()
            .times(1)
            .returning(|_| Ok(server(true)));

        let server = wait_for_boot(&api, &id(), "web01", WaitPolicy::default(), &mut CancelSignal::never())
            .await
            .unwrap();
        assert!(server.booted);
    }

    #[tokio::test(start_paused = true)]
    async fn boot_times_out_at_deadline() {
        let reads = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&reads);
        let mut api = MockServerApi::new();
        api.expect_get_server().returning(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(server(false))
        });

        let id = id();
        let start = Instant::now();
        let mut poller = BootPoller::new(&api, &id, "web01", WaitPolicy::default());
        let err = poller.run(&mut CancelSignal::never()).await.unwrap_err();

        assert!(matches!(err, Error::TimedOut(_)));
        assert_eq!(
            err.to_string(),
            "The server 'web01' (id: 42) seems to be unable to boot"
        );
        assert_eq!(poller.state(), BootState::TimedOut);
        let reads = reads.load(Ordering::SeqCst);
        assert!(reads > 0 && reads <= 60, "unexpected read count {reads}");
        let elapsed = Instant::now() - start;
        assert!(elapsed >= Duration::from_secs(600) && elapsed < Duration::from_secs(601));
    }

    #[tokio::test(start_paused = true)]
    async fn read_error_fails_without_retry() {
        let mut api = MockServerApi::new();
        api.expect_get_server()
            .times(1)
            .returning(|_| Err(server_error()));

        let id = id();
        let mut poller = BootPoller::new(&api, &id, "web01", WaitPolicy::default());
        let err = poller.run(&mut CancelSignal::never()).await.unwrap_err();

        assert_eq!(err.status(), Some(500));
        assert_eq!(poller.state(), BootState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_boot_wait() {
        let mut api = MockServerApi::new();
        api.expect_get_server().returning(|_| Ok(server(false)));

        let (handle, mut cancel) = CancelHandle::pair();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(15)).await;
            handle.cancel();
        });

        let id = id();
        let mut poller = BootPoller::new(&api, &id, "web01", WaitPolicy::default());
        let err = poller.run(&mut cancel).await.unwrap_err();

        assert!(matches!(err, Error::Cancelled(_)));
        assert_eq!(poller.state(), BootState::Booting);
        assert_eq!(poller.reads(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_of_missing_server_succeeds_immediately() {
        let mut api = MockServerApi::new();
        api.expect_delete_server()
            .times(1)
            .returning(|_| Err(Error::NotFound("gone".to_string())));

        let id = id();
        let mut retrier = DeletionRetrier::new(&api, &id, "web01", WaitPolicy::default());
        let state = retrier.run(&mut CancelSignal::never()).await.unwrap();

        assert_eq!(state, DeletionState::NotFound);
        assert!(state.is_gone());
        assert_eq!(retrier.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_retries_through_server_errors() {
        let mut api = MockServerApi::new();
        let mut calls = 0;
        api.expect_delete_server().times(3).returning(move |_| {
            calls += 1;
            if calls < 3 {
                Err(server_error())
            } else {
                Ok(())
            }
        });

        let id = id();
        let mut retrier = DeletionRetrier::new(&api, &id, "web01", WaitPolicy::default());
        let state = retrier.run(&mut CancelSignal::never()).await.unwrap();

        assert_eq!(state, DeletionState::Deleted);
        assert_eq!(retrier.attempts(), 3);
        assert_eq!(retrier.last_status(), Some(500));
    }

    #[tokio::test(start_paused = true)]
    async fn delete_transport_error_is_fatal() {
        let mut api = MockServerApi::new();
        api.expect_delete_server()
            .times(1)
            .returning(|_| Err(Error::Transport("connection reset".to_string())));

        let err = delete_until_gone(&api, &id(), "web01", WaitPolicy::default(), &mut CancelSignal::never())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn delete_timeout_reports_last_status() {
        let mut api = MockServerApi::new();
        api.expect_delete_server()
            .returning(|_| Err(Error::from_status(StatusCode::CONFLICT, String::new())));

        let policy = WaitPolicy::default().with_max_wait(Duration::from_secs(30));
        let id = id();
        let mut retrier = DeletionRetrier::new(&api, &id, "web01", policy);
        let err = retrier.run(&mut CancelSignal::never()).await.unwrap_err();

        assert!(matches!(err, Error::TimedOut(_)));
        assert!(err.to_string().contains("The API responded with HTTP 409 Conflict"));
        assert_eq!(retrier.state(), DeletionState::TimedOut);
        assert_eq!(retrier.attempts(), 3);
        assert_eq!(retrier.last_status(), Some(409));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_deletion_retries() {
        let mut api = MockServerApi::new();
        api.expect_delete_server().returning(|_| Err(server_error()));

        let (handle, mut cancel) = CancelHandle::pair();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(15)).await;
            handle.cancel();
        });

        let id = id();
        let mut retrier = DeletionRetrier::new(&api, &id, "web01", WaitPolicy::default());
        let err = retrier.run(&mut cancel).await.unwrap_err();

        assert!(matches!(err, Error::Cancelled(_)));
        assert_ne!(err.error_code(), "TIMED_OUT");
        assert_eq!(retrier.attempts(), 2);
        assert_eq!(retrier.state(), DeletionState::Pending);
        assert_eq!(retrier.last_status(), Some(500));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_in_flight_delete() {
        let api = StallingDelete::default();
        let (handle, mut cancel) = CancelHandle::pair();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(12)).await;
            handle.cancel();
        });

        let id = id();
        let start = Instant::now();
        let mut retrier = DeletionRetrier::new(&api, &id, "web01", WaitPolicy::default());
        let err = retrier.run(&mut cancel).await.unwrap_err();

        assert!(matches!(err, Error::Cancelled(_)));
        assert_eq!(retrier.attempts(), 2);
        assert_eq!(api.deletes.load(Ordering::SeqCst), 2);
        let elapsed = Instant::now() - start;
        assert!(elapsed >= Duration::from_secs(12) && elapsed < Duration::from_secs(13));
    }

    /// Rejects the first delete and never answers the ones after it.
    #[derive(Default)]
    struct StallingDelete {
        deletes: AtomicU32,
    }

    #[async_trait::async_trait]
    impl ServerApi for StallingDelete {
        async fn create_server(&self, _: &crate::models::CreateServerRequest) -> Result<Server> {
            unreachable!("create is not used")
        }

        async fn get_server(&self, _: &ServerId) -> Result<Server> {
            unreachable!("read is not used")
        }

        async fn update_server(
            &self,
            _: &ServerId,
            _: &crate::models::UpdateServerRequest,
        ) -> Result<Server> {
            unreachable!("update is not used")
        }

        async fn delete_server(&self, _: &ServerId) -> Result<()> {
            if self.deletes.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(server_error());
            }
            std::future::pending().await
        }
    }
}
