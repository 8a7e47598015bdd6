/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Single-shot completion handle given to scheme handlers.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::response::HandlerResponse;

/// Completes one request.
///
/// Clones share the same slot: whichever clone answers first wins and every
/// later answer is dropped with a debug log. Dropping all clones without
/// answering fails the request; keeping one alive without answering leaves
/// the request pending.
#[derive(Debug, Clone)]
pub struct Responder {
    slot: Arc<Mutex<Option<oneshot::Sender<HandlerResponse>>>>,
    url: Arc<str>,
}

impl Responder {
    pub(crate) fn channel(url: &str) -> (Self, oneshot::Receiver<HandlerResponse>) {
        let (tx, rx) = oneshot::channel();
        let responder = Self {
            slot: Arc::new(Mutex::new(Some(tx))),
            url: Arc::from(url),
        };
        (responder, rx)
    }

    /// Delivers the handler's answer. Returns `false` when the request was
    /// already answered or the router stopped waiting for it.
    pub fn respond(&self, response: impl Into<HandlerResponse>) -> bool {
        let Some(tx) = self.slot.lock().take() else {
            log::debug!("protocol: ignoring repeated completion for {}", self.url);
            return false;
        };
        if tx.send(response.into()).is_err() {
            log::debug!("protocol: completion for {} arrived after the request was dropped", self.url);
            return false;
        }
        true
    }

    pub fn is_completed(&self) -> bool {
        self.slot.lock().is_none()
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}
