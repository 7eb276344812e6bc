//! Return-path storage and the navigation primitive used during session recovery.

use parking_lot::RwLock;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::form_urlencoded;

/// Persisted "where to go after re-authentication" value.
pub trait RedirectStore: Send + Sync {
    fn get(&self) -> Option<String>;
    fn set(&self, path: &str) -> io::Result<()>;

    /// Store `path` only when nothing is stored yet, as one atomic step.
    /// Returns whether the value was written.
    fn set_if_absent(&self, path: &str) -> io::Result<bool>;
}

/// Which return path survives when several failures record one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedirectPolicy {
    #[default]
    LastWriteWins,
    FirstWriteWins,
}

impl RedirectPolicy {
    /// Record `path` in `store` under this policy; returns whether it was written.
    pub fn record(self, store: &dyn RedirectStore, path: &str) -> io::Result<bool> {
        match self {
            Self::LastWriteWins => store.set(path).map(|()| true),
            Self::FirstWriteWins => store.set_if_absent(path),
        }
    }
}

/// Performs browser-style navigation and reports the current location.
pub trait Navigator: Send + Sync {
    fn current_location(&self) -> String;
    fn assign(&self, url: &str);
}

#[derive(Clone, Default)]
pub struct MemoryRedirectStore {
    value: Arc<RwLock<Option<String>>>,
}

impl MemoryRedirectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RedirectStore for MemoryRedirectStore {
    fn get(&self) -> Option<String> {
        self.value.read().clone()
    }

    fn set(&self, path: &str) -> io::Result<()> {
        *self.value.write() = Some(path.to_owned());
        Ok(())
    }

    fn set_if_absent(&self, path: &str) -> io::Result<bool> {
        let mut value = self.value.write();
        if value.is_some() {
            return Ok(false);
        }
        *value = Some(path.to_owned());
        Ok(true)
    }
}

/// Keeps the return path as one `key=value` record of a `; `-separated cookie file.
///
/// Values are form-url-encoded so `;` and `=` in a path survive the round trip.
/// Records under other keys are left as they are.
#[derive(Clone)]
pub struct CookieRedirectStore {
    path: PathBuf,
    key: String,
    lock: Arc<RwLock<()>>,
}

impl CookieRedirectStore {
    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
            lock: Arc::new(RwLock::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(&self, contents: &str) -> Option<String> {
        records(contents)
            .find(|(name, _)| *name == self.key)
            .map(|(_, value)| decode(value))
    }

    fn read_raw(&self) -> String {
        fs::read_to_string(&self.path).unwrap_or_default()
    }

    fn write_raw(&self, contents: &str, path: &str) -> io::Result<()> {
        let encoded: String = form_urlencoded::byte_serialize(path.as_bytes()).collect();
        let mut written = false;
        let mut lines: Vec<String> = records(contents)
            .map(|(name, value)| {
                if name == self.key {
                    written = true;
                    format!("{name}={encoded}")
                } else {
                    format!("{name}={value}")
                }
            })
            .collect();
        if !written {
            lines.push(format!("{}={encoded}", self.key));
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, lines.join("; "))
    }
}

fn records(contents: &str) -> impl Iterator<Item = (&str, &str)> {
    contents
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
}

fn decode(value: &str) -> String {
    form_urlencoded::parse(value.as_bytes())
        .next()
        .map(|(decoded, _)| decoded.into_owned())
        .unwrap_or_default()
}

impl RedirectStore for CookieRedirectStore {
    fn get(&self) -> Option<String> {
        let _guard = self.lock.read();
        let contents = fs::read_to_string(&self.path).ok()?;
        self.parse(&contents)
    }

    fn set(&self, path: &str) -> io::Result<()> {
        let _guard = self.lock.write();
        let contents = self.read_raw();
        self.write_raw(&contents, path)
    }

    fn set_if_absent(&self, path: &str) -> io::Result<bool> {
        let _guard = self.lock.write();
        let contents = self.read_raw();
        if self.parse(&contents).is_some() {
            return Ok(false);
        }
        self.write_raw(&contents, path)?;
        Ok(true)
    }
}

/// Navigator that only remembers where it was sent; useful for headless callers.
#[derive(Clone, Default)]
pub struct RecordingNavigator {
    location: Arc<RwLock<String>>,
    visits: Arc<RwLock<Vec<String>>>,
}

impl RecordingNavigator {
    pub fn at(location: impl Into<String>) -> Self {
        Self {
            location: Arc::new(RwLock::new(location.into())),
            visits: Arc::default(),
        }
    }

    pub fn set_location(&self, location: impl Into<String>) {
        *self.location.write() = location.into();
    }

    pub fn visits(&self) -> Vec<String> {
        self.visits.read().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn current_location(&self) -> String {
        self.location.read().clone()
    }

    fn assign(&self, url: &str) {
        self.visits.write().push(url.to_owned());
    }
}
