/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Ordered chunk channel backing stream responses.
//!
//! The producer half stays with the handler and may push chunks at any pace;
//! the consumer half travels inside the response. Dropping the producer, or
//! calling [`ChunkSender::end`], terminates the body.

use bytes::Bytes;
use futures_util::stream::{self, BoxStream, StreamExt};
use tokio::sync::mpsc;

use super::error::NetworkError;

type Chunk = Result<Bytes, NetworkError>;

pub fn stream_channel() -> (ChunkSender, ChunkReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChunkSender { tx }, ChunkReceiver { rx })
}

/// Producer half of a streamed body. There is exactly one per stream, so
/// ending or dropping it always finishes the body.
#[derive(Debug)]
pub struct ChunkSender {
    tx: mpsc::UnboundedSender<Chunk>,
}

impl ChunkSender {
    /// Queues one chunk. Returns `false` once the consumer is gone.
    pub fn push(&self, chunk: impl Into<Bytes>) -> bool {
        self.tx.send(Ok(chunk.into())).is_ok()
    }

    /// Fails the body mid-stream; the consumer sees `StreamAborted`.
    pub fn abort(self, reason: impl Into<String>) {
        let _ = self.tx.send(Err(NetworkError::StreamAborted(reason.into())));
    }

    /// Finishes the body; the consumer sees end-of-stream after the chunks
    /// already pushed.
    pub fn end(self) {}

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug)]
pub struct ChunkReceiver {
    rx: mpsc::UnboundedReceiver<Chunk>,
}

impl ChunkReceiver {
    pub async fn next_chunk(&mut self) -> Option<Chunk> {
        self.rx.recv().await
    }

    pub(crate) fn into_stream(self) -> BoxStream<'static, Chunk> {
        stream::unfold(self, |mut receiver| async move {
            receiver.rx.recv().await.map(|chunk| (chunk, receiver))
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn chunks_arrive_in_push_order() {
        let (tx, mut rx) = stream_channel();
        tokio::spawn(async move {
            for part in ["val", "ar ", "morghulis"] {
                tokio::task::yield_now().await;
                tx.push(part);
            }
            tx.end();
        });

        let mut seen = Vec::new();
        while let Some(chunk) = rx.next_chunk().await {
            seen.push(chunk.expect("chunk"));
        }
        assert_eq!(seen, vec!["val", "ar ", "morghulis"]);
    }

    #[tokio::test]
    async fn abort_surfaces_stream_error() {
        let (tx, mut rx) = stream_channel();
        tx.push("partial");
        tx.abort("producer crashed");

        assert_eq!(rx.next_chunk().await, Some(Ok(Bytes::from_static(b"partial"))));
        assert_eq!(
            rx.next_chunk().await,
            Some(Err(NetworkError::StreamAborted("producer crashed".to_string())))
        );
        assert_eq!(rx.next_chunk().await, None);
    }

    #[tokio::test]
    async fn end_finishes_body_after_pending_chunks() {
        let (tx, mut rx) = stream_channel();
        tx.push("last");
        tx.end();

        assert_eq!(rx.next_chunk().await, Some(Ok(Bytes::from_static(b"last"))));
        assert_eq!(rx.next_chunk().await, None);
    }

    #[test]
    fn push_reports_closed_consumer() {
        let (tx, rx) = stream_channel();
        drop(rx);
        assert!(tx.is_closed());
        assert!(!tx.push("late"));
    }
}
