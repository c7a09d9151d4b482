//! Bitwise-complement stream obfuscation
//!
//! `XorStream` wraps a byte stream and complements (`!b`, i.e. XOR 0xFF) every
//! byte in both directions. The transform is its own inverse and carries no
//! key: both ends only need to agree that the mode is active, which is what
//! the private SOCKS5 method `0x81` negotiates.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Complement every byte of `buf` in place
#[inline]
pub fn complement_in_place(buf: &mut [u8]) {
    for b in buf.iter_mut() {
        *b = !*b;
    }
}

/// Return a complemented copy of `data`
#[must_use]
pub fn complement(data: &[u8]) -> Vec<u8> {
    data.iter().map(|b| !b).collect()
}

/// Stream decorator that complements all bytes read and written
#[derive(Debug)]
pub struct XorStream<S> {
    inner: S,
    /// Scratch space for the complemented copy of the caller's write buffer
    scratch: Vec<u8>,
}

impl<S> XorStream<S> {
    /// Wrap a stream
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            scratch: Vec::new(),
        }
    }

    /// Get a reference to the wrapped stream
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Unwrap the stream
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for XorStream<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        match Pin::new(&mut self.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                complement_in_place(&mut buf.filled_mut()[before..]);
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for XorStream<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = &mut *self;
        // Rebuilt on every poll: a Pending write is retried with the same buffer.
        this.scratch.clear();
        this.scratch.extend(buf.iter().map(|b| !b));
        Pin::new(&mut this.inner).poll_write(cx, &this.scratch)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
