/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Custom URL scheme request router.
//!
//! Applications claim schemes with [`SchemeRouter::register`] or override
//! existing ones with [`SchemeRouter::intercept`]. Each matching request is
//! handed to the handler together with a single-shot [`Responder`]; the
//! router translates whatever the handler answers into a [`ProtocolResponse`]
//! or a [`NetworkError`].

pub mod runtime;
pub mod shell;

pub use register_protocol::{
    BUILTIN_SCHEMES, RegistrationError, ResponseKind, SchemeMode,
};
pub use runtime::protocols::error::NetworkError;
pub use runtime::protocols::request::{ProtocolRequest, UploadData};
pub use runtime::protocols::responder::Responder;
pub use runtime::protocols::response::{
    DescribedResponse, FileResponse, HandlerResponse, HttpDelegation, ProtocolResponse,
    ResponseBody, StreamResponse, UpstreamSession,
};
pub use runtime::protocols::router::{RouterOptions, SchemeHandler, SchemeRouter};
pub use runtime::protocols::service::RouterService;
pub use runtime::protocols::stream::{ChunkReceiver, ChunkSender, stream_channel};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Installs the global `tracing` subscriber.
///
/// `log` records emitted by the router are bridged into the same subscriber.
pub fn init_tracing(filter: Option<&str>) {
    use tracing_subscriber::EnvFilter;

    let filter = filter
        .map(str::to_owned)
        .or_else(|| std::env::var("SCHEMESHELL_TRACING_FILTER").ok())
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
    if let Err(e) = result {
        eprintln!("tracing subscriber already installed: {e}");
    }
}
