// Copyright (c) 2025 Chatmark Project. All rights reserved.
// Released under the GPL-3.0 license as described in the file LICENSE.

pub mod profiles;
pub mod render;

use camino::Utf8PathBuf;
use chatmark::{config, ProfileRegistry};
use eyre::{eyre, WrapErr};

/// The built-in profiles, overlaid with those of the configuration file
/// when one is given or found in the working directory.
pub fn load_registry(config_path: Option<Utf8PathBuf>) -> eyre::Result<ProfileRegistry> {
    let mut registry = ProfileRegistry::builtin()?;
    if let Some(path) = config::find_config(config_path)? {
        let content = std::fs::read_to_string(&path)
            .wrap_err_with(|| eyre!("failed to read configuration file `{}`", path))?;
        let config = config::parse_config(&content)
            .wrap_err_with(|| eyre!("invalid configuration file `{}`", path))?;
        log::debug!("loaded {} profiles from `{}`", config.profiles.len(), path);
        registry.merge(config);
    }
    Ok(registry)
}
