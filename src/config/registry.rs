// Copyright (c) 2025 Chatmark Project. All rights reserved.
// Released under the GPL-3.0 license as described in the file LICENSE.

use indexmap::IndexMap;
use serde::Serialize;

use super::{parse_config, Config, RendererConfig};

pub const BUILTIN_PROFILES: &str = include_str!("../include/profiles.toml");

/// Maps model identifiers to renderer configurations.
///
/// Lookups never fail: unknown or absent identifiers resolve to the default
/// profile.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileRegistry {
    default: RendererConfig,
    profiles: IndexMap<String, RendererConfig>,
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::builtin().unwrap_or_else(|err| {
            log::warn!("ignoring built-in profiles: {err:#}");
            Self::empty()
        })
    }
}

impl ProfileRegistry {
    /// A registry holding only the default profile.
    pub fn empty() -> Self {
        Self {
            default: RendererConfig::default(),
            profiles: IndexMap::new(),
        }
    }

    /// The default profile plus the embedded built-in profiles.
    pub fn builtin() -> eyre::Result<Self> {
        let mut registry = Self::empty();
        registry.merge(parse_config(BUILTIN_PROFILES)?);
        Ok(registry)
    }

    /// Add the profiles of `config`, replacing any with the same name.
    pub fn merge(&mut self, config: Config) {
        if let Some(default) = config.default {
            self.default = default;
        }
        for (name, profile) in config.profiles {
            self.insert(&name, profile);
        }
    }

    pub fn insert(&mut self, name: &str, profile: RendererConfig) {
        self.profiles.insert(name.to_lowercase(), profile);
    }

    pub fn default_profile(&self) -> &RendererConfig {
        &self.default
    }

    pub fn set_default(&mut self, profile: RendererConfig) {
        self.default = profile;
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    /// Resolve `identifier`: exact match, then the longest profile name that
    /// prefixes it up to a separator, then the default.
    pub fn get(&self, identifier: Option<&str>) -> &RendererConfig {
        identifier
            .and_then(|id| self.lookup(id))
            .unwrap_or(&self.default)
    }

    fn lookup(&self, identifier: &str) -> Option<&RendererConfig> {
        let identifier = identifier.trim().to_lowercase();
        if identifier.is_empty() {
            return None;
        }
        if let Some(profile) = self.profiles.get(&identifier) {
            return Some(profile);
        }
        // `vendor/model` identifiers are looked up by their model part too.
        let model = identifier.rsplit('/').next().unwrap_or(&identifier);
        self.profiles
            .iter()
            .filter(|(name, _)| is_prefix_of(name, &identifier) || is_prefix_of(name, model))
            .max_by_key(|(name, _)| name.len())
            .map(|(_, profile)| profile)
    }
}

fn is_prefix_of(name: &str, identifier: &str) -> bool {
    identifier.strip_prefix(name).is_some_and(|rest| {
        rest.is_empty() || rest.starts_with(['-', '_', '/', ':', '.'])
    })
}
