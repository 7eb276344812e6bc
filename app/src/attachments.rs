use anyhow::{Context, Result};
use courier_core::FileAttachment;
use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// `PATH` or `PATH=MIME` as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileArg {
    pub path: PathBuf,
    pub mime_type: String,
}

impl FromStr for FileArg {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (path, mime_type) = match value.rsplit_once('=') {
            Some((path, mime)) if mime.contains('/') => (path, mime.trim()),
            _ => (value, DEFAULT_MIME_TYPE),
        };
        if path.trim().is_empty() {
            return Err("attachment path cannot be empty".to_string());
        }
        Ok(Self {
            path: PathBuf::from(path),
            mime_type: mime_type.to_string(),
        })
    }
}

impl FileArg {
    pub async fn load(&self) -> Result<FileAttachment> {
        let data = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("failed to read attachment {}", self.path.display()))?;
        let name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string());
        Ok(FileAttachment::new(name, self.mime_type.clone(), data))
    }
}

pub async fn load_all(args: &[FileArg]) -> Result<Vec<FileAttachment>> {
    let mut files = Vec::with_capacity(args.len());
    for arg in args {
        files.push(arg.load().await?);
    }
    Ok(files)
}
