use courier_core::Navigator;
use parking_lot::RwLock;
use tracing::info;

/// The terminal stand-in for browser navigation: tracks the view the user is
/// on and tells them where to sign in when the session lapses.
#[derive(Default)]
pub struct TerminalNavigator {
    location: RwLock<String>,
    pending_sign_in: RwLock<Option<String>>,
}

impl TerminalNavigator {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: RwLock::new(location.into()),
            pending_sign_in: RwLock::new(None),
        }
    }

    pub fn enter(&self, location: impl Into<String>) {
        *self.location.write() = location.into();
    }

    /// Sign-in URL requested by the most recent session expiry, if any.
    pub fn pending_sign_in(&self) -> Option<String> {
        self.pending_sign_in.read().clone()
    }
}

impl Navigator for TerminalNavigator {
    fn current_location(&self) -> String {
        self.location.read().clone()
    }

    fn assign(&self, url: &str) {
        info!(%url, "navigation requested");
        eprintln!("Your session has expired. Sign in at {url} and run the command again.");
        *self.pending_sign_in.write() = Some(url.to_owned());
    }
}
