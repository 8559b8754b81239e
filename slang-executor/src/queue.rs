//! Frame queue backing primitive ports.
//!
//! Each primitive in-port (and each out-port that is pulled directly,
//! such as the root operator's out-port) owns one queue. The default mode
//! is a synchronous handoff: the pusher blocks until a consumer has taken
//! the frame. `bufferize` switches to an unbounded FIFO.
//!
//! A queue has a single producer (the port's one incoming source) and a
//! single consumer (the owning operator's worker or the host harness).

use crate::port::Frame;
use parking_lot::Mutex;
use slang_core::{Result, SlangError};
use std::collections::VecDeque;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct State {
    items: VecDeque<Frame>,
    buffered: bool,
    cancelled: bool,
}

/// An async FIFO of frames with optional synchronous handoff.
#[derive(Debug, Default)]
pub(crate) struct FrameQueue {
    state: Mutex<State>,
    /// Signalled when a frame becomes available or the queue is cancelled.
    readable: Notify,
    /// Signalled when a frame has been taken or the queue is cancelled.
    consumed: Notify,
}

impl FrameQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Switch from synchronous handoff to an unbounded FIFO.
    pub(crate) fn bufferize(&self) {
        let mut state = self.state.lock();
        state.buffered = true;
        // A pusher may be parked waiting for its frame to be taken.
        drop(state);
        self.consumed.notify_one();
    }

    /// Wake all blocked parties with a cancellation error.
    ///
    /// Buffered frames remain pullable; once drained, `recv` reports
    /// cancellation as well.
    pub(crate) fn cancel(&self) {
        self.state.lock().cancelled = true;
        self.readable.notify_one();
        self.consumed.notify_one();
    }

    /// Enqueue a frame.
    ///
    /// In handoff mode this resolves only after a consumer has taken the
    /// frame.
    pub(crate) async fn send(&self, frame: Frame) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.cancelled {
                return Err(SlangError::Cancelled);
            }
            state.items.push_back(frame);
        }
        self.readable.notify_one();

        loop {
            {
                let state = self.state.lock();
                if state.buffered || state.items.is_empty() {
                    return Ok(());
                }
                if state.cancelled {
                    return Err(SlangError::Cancelled);
                }
            }
            self.consumed.notified().await;
        }
    }

    /// Dequeue the next frame, blocking while the queue is empty.
    pub(crate) async fn recv(&self) -> Result<Frame> {
        loop {
            {
                let mut state = self.state.lock();
                if let Some(frame) = state.items.pop_front() {
                    drop(state);
                    self.consumed.notify_one();
                    return Ok(frame);
                }
                if state.cancelled {
                    return Err(SlangError::Cancelled);
                }
            }
            self.readable.notified().await;
        }
    }

    /// Inspect the next frame without taking it.
    pub(crate) async fn peek(&self) -> Result<Frame> {
        loop {
            {
                let state = self.state.lock();
                if let Some(frame) = state.items.front() {
                    return Ok(frame.clone());
                }
                if state.cancelled {
                    return Err(SlangError::Cancelled);
                }
            }
            self.readable.notified().await;
        }
    }
}
