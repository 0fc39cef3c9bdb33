// Copyright (c) 2025 Chatmark Project. All rights reserved.
// Released under the GPL-3.0 license as described in the file LICENSE.

pub mod profile;
pub mod registry;
pub mod rules;
pub mod typeset;

use camino::Utf8PathBuf;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use profile::{sort_by_priority, DelimiterPattern, Hook, Hooks, RendererConfig};
pub use registry::ProfileRegistry;
pub use rules::MarkdownRules;
pub use typeset::TypesetOptions;

pub const DEFAULT_CONFIG_PATH: &str = "./Chatmark.toml";

/// The on-disk configuration: an optional replacement for the default
/// profile plus named profiles.
#[derive(Deserialize, Debug, Default, Serialize)]
pub struct Config {
    #[serde(default)]
    pub default: Option<RendererConfig>,

    #[serde(default)]
    pub profiles: IndexMap<String, RendererConfig>,
}

/// Resolve the configuration file to use.
///
/// An explicitly given path must exist. Without one, [`DEFAULT_CONFIG_PATH`]
/// is used when present and `None` is returned otherwise.
pub fn find_config(toml_file: Option<Utf8PathBuf>) -> eyre::Result<Option<Utf8PathBuf>> {
    match toml_file {
        Some(toml_file) => {
            if !toml_file.exists() {
                return Err(eyre::eyre!("cannot find configuration file: {}", toml_file));
            }
            Ok(Some(toml_file))
        }
        None => {
            let toml_file = Utf8PathBuf::from(DEFAULT_CONFIG_PATH);
            Ok(toml_file.exists().then_some(toml_file))
        }
    }
}

pub fn parse_config(config: &str) -> eyre::Result<Config> {
    let config: Config =
        toml::from_str(config).map_err(|e| eyre::eyre!("failed to parse config file: {}", e))?;
    Ok(config)
}
