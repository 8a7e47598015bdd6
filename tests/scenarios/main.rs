mod registration;
mod responses;
mod streaming;
mod upstream;

use schemeshell::{RouterOptions, SchemeRouter, VERSION};

/// Router whose upstream client ignores proxy environment variables, so
/// loopback servers stay reachable from sandboxed runners.
pub(crate) fn local_router() -> SchemeRouter {
    let mut options = RouterOptions::default();
    options.upstream.system_proxy = false;
    SchemeRouter::new(options).expect("router")
}

#[test]
fn scenarios_binary_smoke_runs() {
    assert!(!VERSION.is_empty());
}
