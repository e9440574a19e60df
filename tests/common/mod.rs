//! Integration test common infrastructure.
//!
//! Provides a scripted in-process chat server and small async helpers for
//! waiting on events.

pub mod server;

use std::time::Duration;

use tokio::sync::mpsc;

#[allow(unused_imports)]
pub use server::MockServer;

/// Default wait for anything a test expects to happen.
#[allow(dead_code)]
pub const WAIT: Duration = Duration::from_secs(3);

/// Receive one event or panic after [`WAIT`].
#[allow(dead_code)]
pub async fn recv<T>(rx: &mut mpsc::Receiver<T>) -> T {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Assert nothing arrives within `window`.
#[allow(dead_code)]
pub async fn assert_quiet<T: std::fmt::Debug>(rx: &mut mpsc::Receiver<T>, window: Duration) {
    if let Ok(Some(event)) = tokio::time::timeout(window, rx.recv()).await {
        panic!("unexpected event: {event:?}");
    }
}
