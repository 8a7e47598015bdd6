/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! `tower::Service` face of the router, for hosts that compose their
//! network stack out of services.

use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use tower::Service;

use super::error::NetworkError;
use super::request::ProtocolRequest;
use super::response::ProtocolResponse;
use super::router::SchemeRouter;

#[derive(Debug, Clone)]
pub struct RouterService {
    router: SchemeRouter,
}

impl RouterService {
    pub fn new(router: SchemeRouter) -> Self {
        Self { router }
    }

    pub fn router(&self) -> &SchemeRouter {
        &self.router
    }
}

impl Service<ProtocolRequest> for RouterService {
    type Response = ProtocolResponse;
    type Error = NetworkError;
    type Future = BoxFuture<'static, Result<ProtocolResponse, NetworkError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: ProtocolRequest) -> Self::Future {
        let router = self.router.clone();
        Box::pin(async move { router.dispatch(request).await })
    }
}

impl From<SchemeRouter> for RouterService {
    fn from(router: SchemeRouter) -> Self {
        Self::new(router)
    }
}
