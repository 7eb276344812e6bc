//! Session-expiry interception for backend clients.
//!
//! [`AuthRecovery::wrap`] turns any backend into one whose operations, on a
//! session-expired response, record the current location, navigate to the
//! authentication entry point and then return the original error unchanged.

use crate::backend::{ChatBackend, DirectoryBackend, RawResponse, TransportError};
use crate::config::ClientSettings;
use crate::message::{AssistantChatMessage, AssistantDescriptor, FileAttachment};
use crate::redirect::{Navigator, RedirectPolicy, RedirectStore};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AuthRecovery {
    expired_status: StatusCode,
    auth_url: String,
    policy: RedirectPolicy,
    store: Arc<dyn RedirectStore>,
    navigator: Arc<dyn Navigator>,
}

impl AuthRecovery {
    pub fn new(
        settings: &ClientSettings,
        store: Arc<dyn RedirectStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            expired_status: settings.session_expired_status,
            auth_url: settings.auth_url.to_string(),
            policy: RedirectPolicy::default(),
            store,
            navigator,
        }
    }

    pub fn with_policy(mut self, policy: RedirectPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn expired_status(&self) -> StatusCode {
        self.expired_status
    }

    pub fn is_session_expired(&self, err: &TransportError) -> bool {
        err.status() == Some(self.expired_status)
    }

    /// Run one backend operation, recovering from session expiry on its error path.
    pub async fn guard<T, F>(&self, operation: F) -> Result<T, TransportError>
    where
        F: Future<Output = Result<T, TransportError>>,
    {
        operation.await.inspect_err(|err| {
            if self.is_session_expired(err) {
                self.recover();
            }
        })
    }

    pub fn wrap<B>(&self, backend: B) -> WithAuthRecovery<B> {
        WithAuthRecovery {
            inner: backend,
            recovery: self.clone(),
        }
    }

    fn recover(&self) {
        let location = self.navigator.current_location();
        if let Err(err) = self.policy.record(&*self.store, &location) {
            warn!(%err, "failed to persist redirect path");
        }
        info!(return_to = %location, auth_url = %self.auth_url, "session expired, redirecting to sign-in");
        self.navigator.assign(&self.auth_url);
    }
}

/// A backend whose every operation runs under [`AuthRecovery::guard`].
#[derive(Clone)]
pub struct WithAuthRecovery<B> {
    inner: B,
    recovery: AuthRecovery,
}

impl<B> WithAuthRecovery<B> {
    pub fn inner(&self) -> &B {
        &self.inner
    }

    pub fn recovery(&self) -> &AuthRecovery {
        &self.recovery
    }
}

#[async_trait]
impl<B: ChatBackend> ChatBackend for WithAuthRecovery<B> {
    async fn send_plain(
        &self,
        message: &AssistantChatMessage,
        cancel: &CancellationToken,
    ) -> Result<RawResponse, TransportError> {
        self.recovery
            .guard(self.inner.send_plain(message, cancel))
            .await
    }

    async fn send_multipart(
        &self,
        message: &AssistantChatMessage,
        files: &[FileAttachment],
        cancel: &CancellationToken,
    ) -> Result<RawResponse, TransportError> {
        self.recovery
            .guard(self.inner.send_multipart(message, files, cancel))
            .await
    }
}

#[async_trait]
impl<B: DirectoryBackend> DirectoryBackend for WithAuthRecovery<B> {
    async fn list_assistants(&self) -> Result<Vec<AssistantDescriptor>, TransportError> {
        self.recovery.guard(self.inner.list_assistants()).await
    }
}
