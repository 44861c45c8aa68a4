//! Streaming body for one-time downloads.

use bytes::Bytes;
use futures_util::Stream;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info, warn};

use crate::registry::{CodeRegistry, ShareEntry};
use crate::storage::FileStorage;

const CHUNK_SIZE: usize = 64 * 1024;

/// Holds the download lease on a share code.
///
/// Dropping the guard without retiring it releases the lease, leaving the
/// code valid for another attempt.
pub(crate) struct LeaseGuard {
    registry: CodeRegistry,
    storage: FileStorage,
    code: String,
    stored_name: String,
    settled: bool,
}

impl LeaseGuard {
    pub(crate) fn new(registry: CodeRegistry, storage: FileStorage, entry: &ShareEntry) -> Self {
        Self {
            registry,
            storage,
            code: entry.code.clone(),
            stored_name: entry.stored_name.clone(),
            settled: false,
        }
    }

    /// Removes the registry entry now and the backing file shortly after,
    /// so lookups observe not-found before the file disappears.
    pub(crate) fn retire(mut self) {
        self.settled = true;
        self.registry.remove_share(&self.code, &self.stored_name);
        schedule_removal(self.storage.clone(), self.stored_name.clone(), self.code.clone());
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        if !self.settled {
            self.registry.release_share(&self.code, &self.stored_name);
            debug!(code = %self.code, "Download lease released, share code still valid");
        }
    }
}

fn schedule_removal(storage: FileStorage, stored_name: String, code: String) {
    let remove = async move {
        if let Err(e) = storage.remove(&stored_name).await {
            warn!(code = %code, stored_name = %stored_name, "Failed to delete downloaded file: {}", e);
        }
    };

    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(remove);
        }
        Err(_) => warn!("No runtime available to delete file, leaving it for the sweeper"),
    }
}

/// File contents for a leased share.
///
/// The share is consumed as soon as the recorded size has been produced.
/// Servers stop polling a body once its `Content-Length` is satisfied, and
/// never poll an empty one, so completion cannot wait for end of file.
/// Dropping the stream any earlier releases the lease instead.
pub struct DownloadStream {
    inner: ReaderStream<File>,
    expected: u64,
    sent: u64,
    code: String,
    lease: Option<LeaseGuard>,
    finished: bool,
}

impl DownloadStream {
    pub(crate) fn new(file: File, entry: &ShareEntry, lease: LeaseGuard) -> Self {
        Self {
            inner: ReaderStream::with_capacity(file, CHUNK_SIZE),
            expected: entry.size,
            sent: 0,
            code: entry.code.clone(),
            lease: Some(lease),
            finished: false,
        }
    }

    fn fail(&mut self, err: io::Error) -> Poll<Option<io::Result<Bytes>>> {
        error!(
            code = %self.code,
            sent = self.sent,
            expected = self.expected,
            "Download stream failed: {}",
            err
        );
        // Releases the lease; the code stays valid.
        self.lease.take();
        self.finished = true;
        Poll::Ready(Some(Err(err)))
    }

    fn complete(&mut self) {
        if let Some(lease) = self.lease.take() {
            info!(code = %self.code, size = self.sent, "Download completed, share consumed");
            lease.retire();
        }
    }
}

impl Drop for DownloadStream {
    fn drop(&mut self) {
        if self.sent == self.expected {
            self.complete();
        }
    }
}

impl Stream for DownloadStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if this.finished {
            return Poll::Ready(None);
        }

        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.sent += chunk.len() as u64;
                if this.sent > this.expected {
                    return this.fail(io::Error::other("stored file is larger than recorded size"));
                }
                if this.sent == this.expected {
                    this.complete();
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => this.fail(e),
            Poll::Ready(None) => {
                if this.sent != this.expected {
                    return this.fail(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "stored file is shorter than recorded size",
                    ));
                }
                this.finished = true;
                this.complete();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
