/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Channel-tagged diagnostic events emitted by the router.
//!
//! Events go to whichever `crossbeam-channel` sender the router was built
//! with; a router without a sink emits nothing.

use std::collections::BTreeMap;

use crossbeam_channel::{Receiver, Sender};

pub const CHANNEL_PROTOCOL_SCHEME_REGISTERED: &str = "protocol.scheme.registered";
pub const CHANNEL_PROTOCOL_SCHEME_INTERCEPTED: &str = "protocol.scheme.intercepted";
pub const CHANNEL_PROTOCOL_SCHEME_UNREGISTERED: &str = "protocol.scheme.unregistered";
pub const CHANNEL_PROTOCOL_SCHEME_UNINTERCEPTED: &str = "protocol.scheme.unintercepted";
pub const CHANNEL_PROTOCOL_REQUEST_DISPATCHED: &str = "protocol.request.dispatched";
pub const CHANNEL_PROTOCOL_REQUEST_FALLTHROUGH: &str = "protocol.request.fallthrough";
pub const CHANNEL_PROTOCOL_REQUEST_REDIRECTED: &str = "protocol.request.redirected";
pub const CHANNEL_PROTOCOL_REQUEST_COMPLETED: &str = "protocol.request.completed";
pub const CHANNEL_PROTOCOL_REQUEST_FAILED: &str = "protocol.request.failed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticEvent {
    MessageSent {
        channel_id: &'static str,
        byte_len: usize,
    },
    MessageReceived {
        channel_id: &'static str,
        latency_us: u64,
    },
}

impl DiagnosticEvent {
    pub fn channel_id(&self) -> &'static str {
        match self {
            Self::MessageSent { channel_id, .. } | Self::MessageReceived { channel_id, .. } => {
                channel_id
            }
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct DiagnosticsSink {
    tx: Sender<DiagnosticEvent>,
}

impl DiagnosticsSink {
    pub(crate) fn new(tx: Sender<DiagnosticEvent>) -> Self {
        Self { tx }
    }

    pub(crate) fn emit(&self, event: DiagnosticEvent) {
        // A disconnected receiver only means nobody is watching.
        let _ = self.tx.send(event);
    }
}

pub(crate) fn emit_event(sink: Option<&DiagnosticsSink>, event: DiagnosticEvent) {
    if let Some(sink) = sink {
        sink.emit(event);
    }
}

/// Drains `rx` without blocking and counts events per channel.
pub fn channel_counts(rx: &Receiver<DiagnosticEvent>) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for event in rx.try_iter() {
        *counts.entry(event.channel_id()).or_insert(0) += 1;
    }
    counts
}
