//! Network collaborators.
//!
//! The transport itself (WebSocket client, HTTP upload) lives outside this
//! crate. These traits are what the pipeline needs from it.

use alloc::sync::Arc;
use core::fmt::Debug;
use core::sync::atomic::{AtomicBool, Ordering};

/// Text frame sent once a voice session's audio has been fully flushed.
pub const EOS_MESSAGE: &str = r#"{"signal":"EOS"}"#;

/// Outbound half of the voice link.
///
/// Shared between the streaming task and whoever owns the connection, so
/// every method takes `&self`.
pub trait NetworkTransport {
    type Error: Debug;

    fn send_binary(&self, bytes: &[u8]) -> Result<(), Self::Error>;

    fn send_text(&self, text: &str) -> Result<(), Self::Error>;

    fn is_connected(&self) -> bool;
}

/// Uploads a captured JPEG frame.
pub trait ImageUploader {
    type Error: Debug;

    fn upload_image(&mut self, jpeg: &[u8]) -> Result<(), Self::Error>;
}

/// Link status published by the arbiter and read by the streaming task.
#[derive(Debug, Clone, Default)]
pub struct LinkState(Arc<AtomicBool>);

impl LinkState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, up: bool) {
        self.0.store(up, Ordering::Release);
    }

    pub fn is_up(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_state_is_shared_between_clones() {
        let a = LinkState::new();
        let b = a.clone();
        assert!(!b.is_up());
        a.set(true);
        assert!(b.is_up());
    }
}
