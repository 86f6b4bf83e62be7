//! Mock channel for testing.
//!
//! Captures sent envelopes and tracks open/close transitions so lifecycle
//! tests can assert on exactly what crossed the channel.

use super::{Channel, ChannelError};
use async_trait::async_trait;
use preview_types::Envelope;
use std::sync::{Arc, Mutex};

/// Mock channel for testing.
///
/// Clones share state, so a test can hand one handle to the router or
/// connection manager and keep another for verification.
#[derive(Debug, Default)]
pub struct MockChannel {
    inner: Arc<Mutex<MockChannelInner>>,
}

#[derive(Debug, Default)]
struct MockChannelInner {
    open: bool,
    opened_address: Option<String>,
    open_count: u32,
    close_count: u32,
    sent_frames: Vec<Vec<u8>>,
    fail_next_open: Option<String>,
    fail_next_send: Option<String>,
}

impl MockChannel {
    /// Create a new mock channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock channel that is already open.
    pub fn open_now() -> Self {
        let channel = Self::default();
        channel.inner.lock().unwrap().open = true;
        channel
    }

    /// Get all raw frames that were sent.
    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.inner.lock().unwrap().sent_frames.clone()
    }

    /// Decode all sent frames as envelopes.
    pub fn sent_envelopes(&self) -> Vec<Envelope> {
        self.sent_frames()
            .iter()
            .map(|frame| Envelope::from_bytes(frame).expect("sent frame was not an envelope"))
            .collect()
    }

    /// Decode the most recently sent envelope.
    pub fn last_envelope(&self) -> Option<Envelope> {
        self.sent_frames()
            .last()
            .map(|frame| Envelope::from_bytes(frame).expect("sent frame was not an envelope"))
    }

    /// The address passed to the last `open()`.
    pub fn opened_address(&self) -> Option<String> {
        self.inner.lock().unwrap().opened_address.clone()
    }

    /// How many times the channel was opened.
    pub fn open_count(&self) -> u32 {
        self.inner.lock().unwrap().open_count
    }

    /// How many times the channel transitioned from open to closed.
    pub fn close_count(&self) -> u32 {
        self.inner.lock().unwrap().close_count
    }

    /// Cause the next `open()` to fail with the given error.
    pub fn fail_next_open(&self, error: &str) {
        self.inner.lock().unwrap().fail_next_open = Some(error.to_string());
    }

    /// Cause the next `send()` to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        self.inner.lock().unwrap().fail_next_send = Some(error.to_string());
    }

    /// Clear all state.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        *inner = MockChannelInner::default();
    }
}

impl Clone for MockChannel {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl Channel for MockChannel {
    async fn open(&self, address: &str) -> Result<(), ChannelError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(error) = inner.fail_next_open.take() {
            return Err(ChannelError::OpenFailed(error));
        }

        inner.open = true;
        inner.open_count += 1;
        inner.opened_address = Some(address.to_string());
        Ok(())
    }

    async fn send(&self, data: &[u8]) -> Result<(), ChannelError> {
        let mut inner = self.inner.lock().unwrap();

        if !inner.open {
            return Err(ChannelError::NotOpen);
        }

        if let Some(error) = inner.fail_next_send.take() {
            return Err(ChannelError::SendFailed(error));
        }

        inner.sent_frames.push(data.to_vec());
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.inner.lock().unwrap().open
    }

    async fn close(&self) -> Result<(), ChannelError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.open {
            inner.open = false;
            inner.close_count += 1;
        }
        Ok(())
    }
}
