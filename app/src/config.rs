use anyhow::{anyhow, Result};
use courier_core::{ClientSettings, ConfigError};
use directories::BaseDirs;
use std::path::{Path, PathBuf};

/// Load client settings from an explicit file or the default search path.
pub fn load_settings(explicit: Option<&Path>) -> Result<ClientSettings> {
    let loaded = match explicit {
        Some(path) => ClientSettings::load_from(path),
        None => ClientSettings::load(),
    };
    loaded.map_err(|err: ConfigError| anyhow!(err.user_message()))
}

/// File holding the return-path cookie between runs.
pub fn cookie_path() -> PathBuf {
    match BaseDirs::new() {
        Some(base) => base.data_local_dir().join("courier").join("cookies"),
        None => PathBuf::from(".courier-cookies"),
    }
}
