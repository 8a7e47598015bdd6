/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Scheme registration table.
//!
//! Holds at most one `Registered` and one `Intercepted` entry per scheme.
//! Lookups prefer interceptions so an intercept can shadow a registered or
//! built-in scheme. The table is generic over the handler type so the router
//! can store trait objects while tests store plain tags.

use std::collections::HashMap;
use std::fmt;

/// Schemes the host network layer handles without any registration.
pub const BUILTIN_SCHEMES: [&str; 4] = ["about", "file", "http", "https"];

/// How a scheme claim was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemeMode {
    /// Claims a scheme nobody handles yet.
    Registered,
    /// Overrides built-in or previously registered handling.
    Intercepted,
}

/// Response shape a handler promises to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    String,
    Buffer,
    File,
    Http,
    Stream,
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Buffer => "buffer",
            Self::File => "file",
            Self::Http => "http",
            Self::Stream => "stream",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("scheme '{0}' is already registered")]
    AlreadyRegistered(String),
    #[error("scheme '{0}' is already intercepted")]
    AlreadyIntercepted(String),
    #[error("scheme '{0}' has no {1:?} handler")]
    NotFound(String, SchemeMode),
    #[error("'{0}' is not a valid URL scheme")]
    InvalidScheme(String),
}

#[derive(Debug, Clone)]
pub struct SchemeRegistration<H> {
    pub scheme: String,
    pub mode: SchemeMode,
    pub kind: ResponseKind,
    pub handler: H,
}

#[derive(Debug, Clone)]
pub struct SchemeTable<H> {
    registered: HashMap<String, SchemeRegistration<H>>,
    intercepted: HashMap<String, SchemeRegistration<H>>,
}

impl<H> SchemeTable<H> {
    pub fn new() -> Self {
        Self {
            registered: HashMap::new(),
            intercepted: HashMap::new(),
        }
    }

    pub fn insert(
        &mut self,
        mode: SchemeMode,
        scheme: &str,
        kind: ResponseKind,
        handler: H,
    ) -> Result<(), RegistrationError> {
        let scheme = normalize_scheme(scheme)?;
        match mode {
            SchemeMode::Registered => {
                if is_builtin_scheme(&scheme) || self.registered.contains_key(&scheme) {
                    return Err(RegistrationError::AlreadyRegistered(scheme));
                }
            }
            SchemeMode::Intercepted => {
                if self.intercepted.contains_key(&scheme) {
                    return Err(RegistrationError::AlreadyIntercepted(scheme));
                }
            }
        }

        log::debug!("register-protocol: {mode:?} '{scheme}' as {kind}");
        let registration = SchemeRegistration {
            scheme: scheme.clone(),
            mode,
            kind,
            handler,
        };
        self.entries_mut(mode).insert(scheme, registration);
        Ok(())
    }

    pub fn remove(
        &mut self,
        mode: SchemeMode,
        scheme: &str,
    ) -> Result<SchemeRegistration<H>, RegistrationError> {
        let scheme = normalize_scheme(scheme)?;
        self.entries_mut(mode)
            .remove(&scheme)
            .ok_or(RegistrationError::NotFound(scheme, mode))
    }

    /// Active registration for `scheme`, interceptions first.
    pub fn lookup(&self, scheme: &str) -> Option<&SchemeRegistration<H>> {
        let scheme = scheme.to_ascii_lowercase();
        self.intercepted
            .get(&scheme)
            .or_else(|| self.registered.get(&scheme))
    }

    pub fn contains(&self, mode: SchemeMode, scheme: &str) -> bool {
        self.entries(mode).contains_key(&scheme.to_ascii_lowercase())
    }

    pub fn is_handled(&self, scheme: &str) -> bool {
        is_builtin_scheme(scheme)
            || self.contains(SchemeMode::Registered, scheme)
            || self.contains(SchemeMode::Intercepted, scheme)
    }

    /// Sorted scheme names claimed under `mode`.
    pub fn schemes(&self, mode: SchemeMode) -> Vec<String> {
        let mut schemes: Vec<String> = self.entries(mode).keys().cloned().collect();
        schemes.sort();
        schemes
    }

    pub fn clear(&mut self) {
        self.registered.clear();
        self.intercepted.clear();
    }

    pub fn len(&self) -> usize {
        self.registered.len() + self.intercepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self, mode: SchemeMode) -> &HashMap<String, SchemeRegistration<H>> {
        match mode {
            SchemeMode::Registered => &self.registered,
            SchemeMode::Intercepted => &self.intercepted,
        }
    }

    fn entries_mut(&mut self, mode: SchemeMode) -> &mut HashMap<String, SchemeRegistration<H>> {
        match mode {
            SchemeMode::Registered => &mut self.registered,
            SchemeMode::Intercepted => &mut self.intercepted,
        }
    }
}

impl<H> Default for SchemeTable<H> {
    fn default() -> Self {
        Self::new()
    }
}

pub fn is_builtin_scheme(scheme: &str) -> bool {
    BUILTIN_SCHEMES
        .iter()
        .any(|builtin| builtin.eq_ignore_ascii_case(scheme))
}

/// Lowercases `scheme` after checking RFC 3986 scheme syntax.
pub fn normalize_scheme(scheme: &str) -> Result<String, RegistrationError> {
    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|first| first.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !valid {
        return Err(RegistrationError::InvalidScheme(scheme.to_string()));
    }
    Ok(scheme.to_ascii_lowercase())
}
