//! # Layered Configuration
//!
//! Loads up to three JSON files from one directory, later files overriding
//! earlier ones:
//!
//! 1. `config.global.json`
//! 2. `<app>.common.json`
//! 3. `<app>.<mode>.json` (only when a running mode is given)
//!
//! Every file is optional. The merged result is flattened into `Section:Key`
//! pairs, which [`PollerConfig::from_options`] understands.

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use config::{ext::*, *};

use crate::configs::config_poller::PollerConfig;
use crate::errors::PollerError;

const CONFIG_GLOBAL_NAME: &str = "config.global.json";

/// Environment variable that overrides the configuration directory.
pub const CONFIGS_LOCATION: &str = "CONFIGS_LOCATION";

/// Resolves the configuration directory: `CONFIGS_LOCATION` if set, otherwise
/// `fallback`.
pub fn config_dir(fallback: &Path) -> PathBuf {
    env::var(CONFIGS_LOCATION)
        .map(PathBuf::from)
        .unwrap_or_else(|_| fallback.to_path_buf())
}

/// Returns the path as a string if the file exists, or an empty string, which
/// the builder treats as an absent optional file.
fn existing(path: PathBuf) -> String {
    if path.is_file() {
        path.to_string_lossy().to_string()
    } else {
        String::new()
    }
}

/// # Load Options
///
/// Merges the layered JSON files for `app` (and `mode`, if any) found in
/// `dir` into a flat key/value map.
pub fn load_options(
    dir: &Path,
    app: &str,
    mode: Option<&str>,
) -> Result<BTreeMap<String, String>, PollerError> {
    let global_file = existing(dir.join(CONFIG_GLOBAL_NAME));
    let common_file = existing(dir.join(format!("{}.common.json", app)));
    let mode_file = match mode {
        Some(mode) => existing(dir.join(format!("{}.{}.json", app, mode))),
        None => String::new(),
    };

    let config_data: Box<dyn ConfigurationRoot> = DefaultConfigurationBuilder::new()
        .add_json_file(&global_file.is().optional())
        .add_json_file(&common_file.is().optional())
        .add_json_file(&mode_file.is().optional())
        .build()
        .map_err(|e| PollerError::ConfigLoad(format!("{:?}", e)))?;

    let mut options: BTreeMap<String, String> = BTreeMap::new();
    for (key, value) in config_data.iter(None) {
        options.insert(key.to_string(), value.to_string());
    }

    log::debug!("Loaded {} configuration option(s) from {}", options.len(), dir.display());
    Ok(options)
}

impl PollerConfig {
    /// Loads the layered files for `app` from `dir` and reads the `Poller`
    /// section out of them.
    pub fn load(dir: &Path, app: &str, mode: Option<&str>) -> Result<Self, PollerError> {
        let options = load_options(dir, app, mode)?;
        Self::from_options(&options)
    }
}
