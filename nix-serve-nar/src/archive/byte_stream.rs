// SPDX-License-Identifier: MIT

use std::io::{self, Write};
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::Stream;
use tokio::sync::mpsc;

use super::dumper::dump;

/// Default chunk size for yielded Bytes (64 KiB).
const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Number of chunks buffered between the dumper and the consumer.
const CHANNEL_CAPACITY: usize = 2;

/// A blocking [`Write`] that collects bytes into [`Bytes`] chunks and sends
/// them through a bounded mpsc channel.
///
/// Sending blocks while the channel is full, so a slow consumer throttles
/// the file system reads. Once the receiver is gone every write fails with
/// [`io::ErrorKind::BrokenPipe`].
struct ChannelWriter {
    sender: mpsc::Sender<io::Result<Bytes>>,
    buffer: BytesMut,
    chunk_size: usize,
}

impl ChannelWriter {
    fn new(sender: mpsc::Sender<io::Result<Bytes>>, chunk_size: usize) -> Self {
        Self {
            sender,
            buffer: BytesMut::with_capacity(chunk_size),
            chunk_size,
        }
    }

    fn emit_chunk(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let chunk = std::mem::replace(&mut self.buffer, BytesMut::with_capacity(self.chunk_size));
        self.sender
            .blocking_send(Ok(chunk.freeze()))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "NAR consumer went away"))
    }

    /// Hand `err` to the consumer after whatever was already produced.
    fn fail(mut self, path: &std::path::Path, err: io::Error) {
        if self.sender.is_closed() {
            tracing::debug!("Stopped archiving {}: consumer went away", path.display());
            return;
        }
        if self.emit_chunk().is_ok() {
            // A failed send means the consumer left in the meantime.
            let _ = self.sender.blocking_send(Err(err));
        }
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.buffer.len() >= self.chunk_size {
            self.emit_chunk()?;
        }
        let n = buf.len().min(self.chunk_size - self.buffer.len());
        self.buffer.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.emit_chunk()
    }
}

/// A [`Stream`] of [`Bytes`] chunks containing NAR-encoded data.
///
/// The archive is produced on the blocking thread pool and handed over
/// through a bounded channel, so at most [`CHANNEL_CAPACITY`] chunks are
/// buffered no matter how slow the consumer is. An error while reading the
/// path is yielded as the final item. Dropping the stream stops the
/// producer at its next send, which releases any file it has open.
pub struct NarByteStream {
    rx: mpsc::Receiver<io::Result<Bytes>>,
}

impl NarByteStream {
    /// Create a new `NarByteStream` for the given filesystem path.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(path: PathBuf) -> Self {
        Self::with_chunk_size(path, DEFAULT_CHUNK_SIZE)
    }

    /// Create a new `NarByteStream` with a custom output chunk size.
    pub fn with_chunk_size(path: PathBuf, chunk_size: usize) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        tokio::task::spawn_blocking(move || {
            let mut writer = ChannelWriter::new(tx, chunk_size.max(1));
            match dump(&path, &mut writer).and_then(|()| writer.flush()) {
                Ok(()) => tracing::trace!("Finished archiving {}", path.display()),
                Err(e) => writer.fail(&path, e),
            }
        });

        Self { rx }
    }
}

impl Stream for NarByteStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
