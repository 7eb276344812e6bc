use super::{first_chunk, ByteStream, ChatBackend, DirectoryBackend, RawResponse, TransportError};
use crate::config::ClientSettings;
use crate::message::{AssistantChatMessage, AssistantDescriptor, FileAttachment};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

/// reqwest-backed client for the assistant chat and directory endpoints.
///
/// `request_timeout` bounds connecting for every call and the whole exchange for
/// directory listings. Chat streams have no overall deadline; they end on
/// cancellation.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    chat_url: Url,
    multipart_url: Url,
    directory_url: Url,
    directory_timeout: Duration,
}

impl HttpBackend {
    pub fn new(settings: &ClientSettings) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(settings.request_timeout)
            .build()?;
        Ok(Self::with_client(client, settings))
    }

    pub fn with_client(client: Client, settings: &ClientSettings) -> Self {
        Self {
            client,
            chat_url: settings.chat_url.clone(),
            multipart_url: settings.multipart_url.clone(),
            directory_url: settings.directory_url.clone(),
            directory_timeout: settings.request_timeout,
        }
    }

    async fn execute(
        &self,
        request: RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<RawResponse, TransportError> {
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(TransportError::Aborted),
            response = request.send() => response?,
        };

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status { status, body });
        }

        let body = match response.content_length() {
            Some(0) => None,
            _ => {
                let stream: ByteStream = response
                    .bytes_stream()
                    .map(|chunk| chunk.map_err(TransportError::from))
                    .boxed();
                first_chunk(stream, cancel).await?
            }
        };
        Ok(RawResponse::new(status, body))
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn send_plain(
        &self,
        message: &AssistantChatMessage,
        cancel: &CancellationToken,
    ) -> Result<RawResponse, TransportError> {
        debug!(url = %self.chat_url, "posting chat message");
        let request = self.client.post(self.chat_url.clone()).json(message);
        self.execute(request, cancel).await
    }

    async fn send_multipart(
        &self,
        message: &AssistantChatMessage,
        files: &[FileAttachment],
        cancel: &CancellationToken,
    ) -> Result<RawResponse, TransportError> {
        debug!(url = %self.multipart_url, files = files.len(), "posting multipart chat message");
        let payload = serde_json::to_string(message)?;
        let mut form = Form::new().part("message", Part::text(payload).mime_str("application/json")?);
        for file in files {
            let part = Part::bytes(file.data().to_vec())
                .file_name(file.name().to_owned())
                .mime_str(file.mime_type())?;
            form = form.part("files", part);
        }
        let request = self.client.post(self.multipart_url.clone()).multipart(form);
        self.execute(request, cancel).await
    }
}

#[async_trait]
impl DirectoryBackend for HttpBackend {
    async fn list_assistants(&self) -> Result<Vec<AssistantDescriptor>, TransportError> {
        debug!(url = %self.directory_url, "listing assistants");
        let response = self
            .client
            .get(self.directory_url.clone())
            .timeout(self.directory_timeout)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status { status, body });
        }
        Ok(response.json().await?)
    }
}
