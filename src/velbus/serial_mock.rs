//! Mock bus port for testing
//!
//! This module provides an in-memory port that can stand in for the serial
//! line or the TCP socket, so the listener and the dispatcher can be tested
//! without a Velbus interface attached.
//!
//! Unlike a plain buffer, reads park until data is queued or the receive side
//! is closed, which is how a real port behaves while the bus is quiet.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

#[derive(Default)]
struct MockState {
    /// Data written to the port (outgoing)
    tx: Vec<u8>,
    /// Data to be read from the port (incoming)
    rx: VecDeque<u8>,
    /// Simulated error for the next read
    next_read_error: Option<io::Error>,
    /// Simulated error for the next write
    next_write_error: Option<io::Error>,
    /// Once set and drained, reads report end of stream
    rx_closed: bool,
    /// Largest number of bytes accepted per write call
    write_chunk: Option<usize>,
    read_waker: Option<Waker>,
    write_calls: usize,
}

/// Mock port that simulates bidirectional communication.
///
/// Clones share the same buffers, so a test keeps one clone while the bus
/// manager owns the other.
#[derive(Clone, Default)]
pub struct MockBusPort {
    state: Arc<Mutex<MockState>>,
}

impl MockBusPort {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wake_reader(state: &mut MockState) {
        if let Some(waker) = state.read_waker.take() {
            waker.wake();
        }
    }

    /// Queue data to be read from the port
    pub fn queue_rx_data(&self, data: &[u8]) {
        let mut state = self.lock();
        state.rx.extend(data);
        Self::wake_reader(&mut state);
    }

    /// Get data that was written to the port
    pub fn get_tx_data(&self) -> Vec<u8> {
        self.lock().tx.clone()
    }

    /// Take and clear the data written so far
    pub fn take_tx_data(&self) -> Vec<u8> {
        std::mem::take(&mut self.lock().tx)
    }

    /// Number of bytes still waiting to be read
    pub fn pending_rx(&self) -> usize {
        self.lock().rx.len()
    }

    /// Number of `poll_write` calls that accepted data
    pub fn write_calls(&self) -> usize {
        self.lock().write_calls
    }

    /// Simulate the remote end hanging up once queued data has been read
    pub fn close_rx(&self) {
        let mut state = self.lock();
        state.rx_closed = true;
        Self::wake_reader(&mut state);
    }

    /// Set an error to be returned by the next read
    pub fn set_next_read_error(&self, error: io::Error) {
        let mut state = self.lock();
        state.next_read_error = Some(error);
        Self::wake_reader(&mut state);
    }

    /// Set an error to be returned by the next write
    pub fn set_next_write_error(&self, error: io::Error) {
        self.lock().next_write_error = Some(error);
    }

    /// Accept at most `chunk` bytes per write call, forcing callers to loop
    pub fn set_write_chunk(&self, chunk: usize) {
        self.lock().write_chunk = Some(chunk.max(1));
    }
}

impl AsyncRead for MockBusPort {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let mut state = self.lock();

        if let Some(error) = state.next_read_error.take() {
            return Poll::Ready(Err(error));
        }

        let available = state.rx.len().min(buf.remaining());
        if available > 0 {
            let data: Vec<u8> = state.rx.drain(..available).collect();
            buf.put_slice(&data);
            return Poll::Ready(Ok(()));
        }

        if state.rx_closed {
            return Poll::Ready(Ok(()));
        }

        state.read_waker = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl AsyncWrite for MockBusPort {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut state = self.lock();

        if let Some(error) = state.next_write_error.take() {
            return Poll::Ready(Err(error));
        }

        let n = state.write_chunk.map_or(buf.len(), |chunk| chunk.min(buf.len()));
        state.tx.extend_from_slice(&buf[..n]);
        state.write_calls += 1;
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
