/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Router configuration: a TOML file plus `SCHEMESHELL_*` environment
//! overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use log::warn;
use register_protocol::ResponseKind;
use serde::Deserialize;

use crate::runtime::protocols::router::RouterOptions;
use crate::runtime::protocols::upstream::UpstreamOptions;

pub const ENV_CONFIG: &str = "SCHEMESHELL_CONFIG";
pub const ENV_MAX_REDIRECTS: &str = "SCHEMESHELL_MAX_REDIRECTS";
pub const ENV_UPSTREAM_TIMEOUT_MS: &str = "SCHEMESHELL_UPSTREAM_TIMEOUT_MS";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse router config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("route '{scheme}': {reason}")]
    InvalidRoute { scheme: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouterConfig {
    pub max_redirects: usize,
    pub upstream_timeout_ms: u64,
    pub user_agent: Option<String>,
    pub system_proxy: bool,
    #[serde(rename = "route")]
    pub routes: Vec<RouteConfig>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        let upstream = UpstreamOptions::default();
        Self {
            max_redirects: upstream.max_redirects,
            upstream_timeout_ms: upstream.timeout.as_millis() as u64,
            user_agent: None,
            system_proxy: upstream.system_proxy,
            routes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteMode {
    #[default]
    Register,
    Intercept,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    String,
    Buffer,
    File,
    Http,
    Stream,
}

impl From<RouteKind> for ResponseKind {
    fn from(kind: RouteKind) -> Self {
        match kind {
            RouteKind::String => Self::String,
            RouteKind::Buffer => Self::Buffer,
            RouteKind::File => Self::File,
            RouteKind::Http => Self::Http,
            RouteKind::Stream => Self::Stream,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    pub scheme: String,
    #[serde(default)]
    pub mode: RouteMode,
    pub kind: RouteKind,
    pub body: Option<String>,
    pub mime_type: Option<String>,
    pub path: Option<PathBuf>,
    pub root: Option<PathBuf>,
    pub upstream: Option<String>,
}

impl RouterConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads `path`; relative route paths resolve against its directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_relative_paths(base);
        }
        Ok(config)
    }

    /// Config from `path`, else `$SCHEMESHELL_CONFIG`, else defaults; then
    /// environment overrides.
    pub fn discover(path: Option<&Path>) -> Result<Self, ConfigError> {
        let from_env = env::var_os(ENV_CONFIG).map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::load(&path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(value) = env_number(ENV_MAX_REDIRECTS) {
            self.max_redirects = value as usize;
        }
        if let Some(value) = env_number(ENV_UPSTREAM_TIMEOUT_MS) {
            self.upstream_timeout_ms = value;
        }
    }

    pub fn router_options(&self) -> RouterOptions {
        let mut upstream = UpstreamOptions {
            timeout: Duration::from_millis(self.upstream_timeout_ms),
            max_redirects: self.max_redirects,
            system_proxy: self.system_proxy,
            ..UpstreamOptions::default()
        };
        if let Some(user_agent) = &self.user_agent {
            upstream.user_agent = user_agent.clone();
        }
        RouterOptions {
            max_redirects: self.max_redirects,
            upstream,
        }
    }

    fn resolve_relative_paths(&mut self, base: &Path) {
        for route in &mut self.routes {
            for path in [&mut route.root, &mut route.path].into_iter().flatten() {
                if path.is_relative() {
                    *path = base.join(&*path);
                }
            }
        }
    }
}

fn env_number(key: &str) -> Option<u64> {
    let value = env::var(key).ok()?;
    match value.trim().parse() {
        Ok(number) => Some(number),
        Err(_) => {
            warn!("{key} invalid ('{value}'); keeping configured value");
            None
        }
    }
}
