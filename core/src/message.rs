use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A file handed to the dispatcher alongside a chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttachment {
    name: String,
    mime_type: String,
    data: Bytes,
}

impl FileAttachment {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingChatMessage {
    pub assistant_name: String,
    pub message: String,
    pub files: Vec<FileAttachment>,
}

impl OutgoingChatMessage {
    pub fn new(assistant_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            assistant_name: assistant_name.into(),
            message: message.into(),
            files: Vec::new(),
        }
    }

    pub fn with_file(mut self, file: FileAttachment) -> Self {
        self.files.push(file);
        self
    }

    pub fn with_files(mut self, files: impl IntoIterator<Item = FileAttachment>) -> Self {
        self.files.extend(files);
        self
    }

    pub fn has_files(&self) -> bool {
        !self.files.is_empty()
    }

    /// The message fields as they travel on the wire, without attachments.
    pub fn to_wire(&self) -> AssistantChatMessage {
        AssistantChatMessage {
            message: self.message.clone(),
            assistant_name: self.assistant_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantChatMessage {
    pub message: String,
    pub assistant_name: String,
}

/// An assistant advertised by the backend directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantDescriptor {
    pub name: String,
    pub display_name: String,
}

impl AssistantDescriptor {
    pub fn new(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
        }
    }

    pub fn route_path(&self) -> String {
        format!("assistants/{}", self.name)
    }
}
