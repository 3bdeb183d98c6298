//! Byte-counting cutoff for relayed image bodies.

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Bytes;
use futures_util::Stream;
use thiserror::Error;

use super::fetch::{BodyStream, BoxError};

#[derive(Debug, Error)]
#[error("relayed body exceeded {limit} bytes")]
pub struct BodyTooLarge {
    pub limit: u64,
}

/// Passes chunks through untouched, holding at most one chunk at a time, and
/// ends the stream with [`BodyTooLarge`] once more than `limit` bytes have
/// gone by. Without a limit it only counts.
pub struct LimitedBody {
    inner: BodyStream,
    limit: Option<u64>,
    relayed: u64,
    done: bool,
}

impl LimitedBody {
    pub fn new(inner: BodyStream, limit: Option<u64>) -> Self {
        Self {
            inner,
            limit,
            relayed: 0,
            done: false,
        }
    }

    /// Bytes handed downstream so far.
    pub fn relayed(&self) -> u64 {
        self.relayed
    }
}

impl Stream for LimitedBody {
    type Item = Result<Bytes, BoxError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.relayed += chunk.len() as u64;
                if let Some(limit) = this.limit {
                    if this.relayed > limit {
                        this.done = true;
                        tracing::warn!(limit, "Image body exceeded size ceiling; aborting relay");
                        return Poll::Ready(Some(Err(Box::new(BodyTooLarge { limit }))));
                    }
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.done = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
