use crate::navigator::TerminalNavigator;
use anyhow::Result;
use courier_core::{
    refresh_routes, AuthRecovery, CancellationToken, ChatEvent, ChatReply, ClientSettings,
    DirectoryError, DispatchError, Dispatcher, HttpBackend, OutgoingChatMessage, RedirectStore,
    RouteNode, StreamError, WithAuthRecovery,
};
use std::sync::Arc;
use tracing::warn;

#[derive(thiserror::Error, Debug)]
pub enum ChatError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Stream(#[from] StreamError),
}

impl ChatError {
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Dispatch(DispatchError::Cancelled) | Self::Stream(StreamError::Cancelled)
        )
    }
}

/// Backend clients for one run of the CLI, every call guarded by auth recovery.
pub struct CourierSession {
    settings: ClientSettings,
    dispatcher: Dispatcher<WithAuthRecovery<Arc<HttpBackend>>>,
    directory: WithAuthRecovery<Arc<HttpBackend>>,
    navigator: Arc<TerminalNavigator>,
    store: Arc<dyn RedirectStore>,
}

impl CourierSession {
    pub fn new(settings: ClientSettings, store: Arc<dyn RedirectStore>) -> Result<Self> {
        let backend = Arc::new(HttpBackend::new(&settings)?);
        let navigator = Arc::new(TerminalNavigator::new("/"));
        let recovery = AuthRecovery::new(&settings, store.clone(), navigator.clone());
        Ok(Self {
            dispatcher: Dispatcher::guarded(backend.clone(), &recovery),
            directory: recovery.wrap(backend),
            settings,
            navigator,
            store,
        })
    }

    pub fn navigator(&self) -> &TerminalNavigator {
        &self.navigator
    }

    pub fn stored_redirect(&self) -> Option<String> {
        self.store.get()
    }

    /// Static routes merged with the assistants the backend currently lists.
    pub async fn routes(&self) -> Result<Vec<RouteNode>, DirectoryError> {
        self.navigator.enter("/");
        refresh_routes(&self.directory, &self.settings.routes).await
    }

    /// Static routes alone, for when the directory cannot be reached.
    pub fn static_routes(&self) -> &[RouteNode] {
        &self.settings.routes
    }

    /// Send one message, invoking `on_event` for each event as it arrives.
    pub async fn chat<F>(
        &self,
        message: &OutgoingChatMessage,
        cancel: CancellationToken,
        mut on_event: F,
    ) -> Result<ChatReply, ChatError>
    where
        F: FnMut(&ChatEvent),
    {
        self.navigator
            .enter(format!("/assistants/{}", message.assistant_name));
        let mut events = self.dispatcher.dispatch(message, cancel).await?;
        let mut reply = ChatReply::default();
        while let Some(event) = events.next_event().await {
            let event = event.inspect_err(|err| {
                if !matches!(err, StreamError::Cancelled) {
                    warn!(%err, "reply stream ended early");
                }
            })?;
            on_event(&event);
            reply.push(event);
        }
        Ok(reply)
    }
}
