//! Create, read, update and delete for a single server resource.
//!
//! [`ServerLifecycle`] holds no per-resource state: every call works on the
//! caller's [`DeclaredState`] and runs its own deadline clock, so one instance
//! can serve many resources concurrently.

use crate::client::{ServerApi, ServersClient};
use crate::provision::{BootPoller, DeletionRetrier, DeletionState};
use crate::state::{build_create_payload, build_update_payload, DeclaredState};
use crate::Result;
use clouddk_core::config::ClientSettings;
use clouddk_core::id::ServerId;
use clouddk_core::wait::{CancelSignal, WaitPolicy};
use clouddk_core::Error;
use std::sync::Arc;
use tracing::{debug, info};

/// Result of reading a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// The server exists and the record was refreshed
    Present,
    /// The server is gone and the record's identity was cleared
    Absent,
}

/// Lifecycle operations for server resources.
#[derive(Clone)]
pub struct ServerLifecycle {
    api: Arc<dyn ServerApi>,
    policy: WaitPolicy,
}

impl std::fmt::Debug for ServerLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerLifecycle")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

fn require_id(state: &DeclaredState, operation: &str) -> Result<ServerId> {
    state.id.clone().ok_or_else(|| {
        Error::InvalidRequest(format!(
            "cannot {operation} {} without an identifier",
            state.display_name()
        ))
    })
}

impl ServerLifecycle {
    /// Create a lifecycle over an HTTP client.
    #[must_use]
    pub fn new(client: ServersClient, policy: WaitPolicy) -> Self {
        Self::with_api(Arc::new(client), policy)
    }

    /// Build the HTTP client and wait policy from settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are invalid.
    pub fn from_settings(settings: ClientSettings) -> Result<Self> {
        let policy = settings.wait.policy();
        Ok(Self::new(ServersClient::new(settings)?, policy))
    }

    /// Create a lifecycle over any [`ServerApi`] implementation.
    #[must_use]
    pub fn with_api(api: Arc<dyn ServerApi>, policy: WaitPolicy) -> Self {
        Self { api, policy }
    }

    /// Replace the wait policy.
    #[must_use]
    pub fn with_policy(mut self, policy: WaitPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Wait policy used for boot confirmation and deletion.
    #[must_use]
    pub const fn policy(&self) -> WaitPolicy {
        self.policy
    }

    /// Create the server described by `state` and wait until it boots.
    ///
    /// The identity is recorded as soon as the API accepts the create, so a
    /// server that fails to boot can still be read or deleted afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if `state` already has an identity,
    /// [`Error::ValidationError`] if a required input is empty, the wrapped API
    /// error if the create fails, and [`Error::TimedOut`] or
    /// [`Error::Cancelled`] if the server does not boot in time.
    pub async fn create(&self, state: &mut DeclaredState, cancel: &mut CancelSignal) -> Result<()> {
        if let Some(id) = &state.id {
            return Err(Error::InvalidRequest(format!(
                "the server '{}' already exists with id {id}",
                state.hostname
            )));
        }
        let request = build_create_payload(state)?;

        info!(hostname = %state.hostname, "creating server");
        let server = self
            .api
            .create_server(&request)
            .await
            .map_err(|err| err.during("create the server", state.display_name()))?;
        state.refresh(&server);

        if state.booted {
            return Ok(());
        }

        let id = require_id(state, "wait for")?;
        let hostname = state.hostname.clone();
        let mut poller = BootPoller::new(self.api.as_ref(), &id, &hostname, self.policy);
        match poller.run(cancel).await {
            Ok(server) => {
                state.refresh(&server);
                Ok(())
            }
            Err(err @ (Error::TimedOut(_) | Error::Cancelled(_))) => Err(err),
            Err(err) => Err(err.during("create the server", state.display_name())),
        }
    }

    /// Refresh `state` from the API.
    ///
    /// A missing server is not an error: the identity is cleared and
    /// [`Presence::Absent`] is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] without an identity, otherwise the
    /// wrapped API error.
    pub async fn read(&self, state: &mut DeclaredState) -> Result<Presence> {
        let id = require_id(state, "read")?;
        debug!(id = %id, "reading server");

        match self.api.get_server(&id).await {
            Ok(server) => {
                state.refresh(&server);
                Ok(Presence::Present)
            }
            Err(err) if err.is_not_found() => {
                info!(id = %id, hostname = %state.hostname, "server no longer exists");
                state.clear_identity();
                Ok(Presence::Absent)
            }
            Err(err) => Err(err.during("read the server", state.display_name())),
        }
    }

    /// Push the mutable attributes (`hostname`, `label`) and refresh `state`.
    ///
    /// The identity is never changed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] without an identity, otherwise the
    /// wrapped API error.
    pub async fn update(&self, state: &mut DeclaredState) -> Result<()> {
        let id = require_id(state, "update")?;
        let request = build_update_payload(state);

        info!(id = %id, hostname = %request.hostname, "updating server");
        let server = self
            .api
            .update_server(&id, &request)
            .await
            .map_err(|err| err.during("update the server", state.display_name()))?;

        state.refresh(&server);
        Ok(())
    }

    /// Delete the server and clear the identity once it is gone.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] without an identity, the wrapped
    /// timeout or fatal error otherwise. The identity is kept on failure.
    pub async fn delete(
        &self,
        state: &mut DeclaredState,
        cancel: &mut CancelSignal,
    ) -> Result<DeletionState> {
        let id = require_id(state, "delete")?;
        info!(id = %id, hostname = %state.hostname, "deleting server");

        let outcome = DeletionRetrier::new(self.api.as_ref(), &id, &state.hostname, self.policy)
            .run(cancel)
            .await;

        match outcome {
            Ok(gone) => {
                state.clear_identity();
                Ok(gone)
            }
            Err(err @ Error::Cancelled(_)) => Err(err),
            Err(err) => Err(err.during("delete the server", state.display_name())),
        }
    }
}
