// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment-based layered config loading.
//!
//! Merge order (later overrides earlier): compiled defaults,
//! `/etc/sift/sift.toml`, `~/.config/sift/sift.toml`, `./sift.toml`,
//! then `SIFT_*` environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::SiftConfig;

/// Config sections, in the order their env prefixes are tried.
const SECTIONS: &[&str] = &[
    "engine",
    "analyzer",
    "retrieval",
    "sufficiency",
    "expansion",
    "memory",
    "cache",
    "learning",
    "parameters",
    "storage",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
pub fn load_config() -> Result<SiftConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<SiftConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SiftConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<SiftConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SiftConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The full layered Figment, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(SiftConfig::default()))
        .merge(Toml::file("/etc/sift/sift.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("sift/sift.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("sift.toml"))
        .merge(env_provider())
}

/// Env provider with explicit section mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `SIFT_CACHE_CONTEXT_TTL_SECS` must map to
/// `cache.context_ttl_secs`, not `cache.context.ttl.secs`.
fn env_provider() -> Env {
    Env::prefixed("SIFT_").map(|key| map_env_key(key.as_str()).into())
}

/// Map a lowercased, prefix-stripped env key to its dotted config path.
pub fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
