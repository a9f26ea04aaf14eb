//! Socket abstraction for the resilient transport.
//!
//! The transport only needs a duplex byte stream it can open, write,
//! read close notifications from, and shut down. The trait keeps the
//! reconnect machinery testable against a scripted mock.

use crate::error::{Result, VoicegateError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

/// Something read from the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// Payload received from the remote side.
    Data(Vec<u8>),
    /// The connection ended. `clean` means an orderly shutdown that
    /// should not trigger a reconnect.
    Closed { clean: bool },
}

/// A connected duplex byte stream.
#[async_trait]
pub trait DuplexSocket: Send {
    /// Sends one payload to the peer.
    async fn send(&mut self, payload: &[u8]) -> Result<()>;

    /// Waits for the next event from the peer.
    async fn recv(&mut self) -> Result<SocketEvent>;

    /// Sends a keep-alive probe.
    async fn ping(&mut self) -> Result<()>;

    /// Shuts the connection down.
    async fn close(&mut self) -> Result<()>;
}

/// Opens new connections. One factory outlives many sockets.
#[async_trait]
pub trait SocketFactory: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn DuplexSocket>>;
}

/// Scripted socket factory for testing the transport.
#[derive(Clone, Default)]
pub struct MockSocketFactory {
    inner: Arc<MockFactoryState>,
}

#[derive(Default)]
struct MockFactoryState {
    connect_failures: AtomicU32,
    connect_attempts: AtomicU32,
    pings: AtomicUsize,
    sent: Mutex<Vec<Vec<u8>>>,
    send_budgets: Mutex<VecDeque<usize>>,
    live_events: Mutex<Option<mpsc::UnboundedSender<SocketEvent>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockSocketFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the first `count` connect calls to fail.
    pub fn with_connect_failures(self, count: u32) -> Self {
        self.inner.connect_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Configure per-connection send budgets: connection N accepts
    /// `budgets[N]` sends and fails every send after that. Connections
    /// without a budget accept unlimited sends.
    pub fn with_send_budgets(self, budgets: Vec<usize>) -> Self {
        *lock(&self.inner.send_budgets) = budgets.into();
        self
    }

    /// Deliver a payload to whatever socket is currently live.
    pub fn push_incoming(&self, payload: Vec<u8>) {
        if let Some(sender) = lock(&self.inner.live_events).as_ref() {
            let _ = sender.send(SocketEvent::Data(payload));
        }
    }

    /// Close the live socket from the remote side.
    pub fn close_remote(&self, clean: bool) {
        if let Some(sender) = lock(&self.inner.live_events).take() {
            let _ = sender.send(SocketEvent::Closed { clean });
        }
    }

    pub fn connect_attempts(&self) -> u32 {
        self.inner.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn ping_count(&self) -> usize {
        self.inner.pings.load(Ordering::SeqCst)
    }

    /// Every payload sent across all connections, in order.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        lock(&self.inner.sent).clone()
    }
}

#[async_trait]
impl SocketFactory for MockSocketFactory {
    async fn connect(&self) -> Result<Box<dyn DuplexSocket>> {
        self.inner.connect_attempts.fetch_add(1, Ordering::SeqCst);

        let remaining = self.inner.connect_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.inner
                .connect_failures
                .store(remaining - 1, Ordering::SeqCst);
            return Err(VoicegateError::TransientNetwork {
                message: "mock connect refused".to_string(),
            });
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        *lock(&self.inner.live_events) = Some(event_tx);

        let budget = lock(&self.inner.send_budgets)
            .pop_front()
            .unwrap_or(usize::MAX);

        Ok(Box::new(MockSocket {
            factory: Arc::clone(&self.inner),
            events: event_rx,
            sends_remaining: budget,
            closed: false,
        }))
    }
}

struct MockSocket {
    factory: Arc<MockFactoryState>,
    events: mpsc::UnboundedReceiver<SocketEvent>,
    sends_remaining: usize,
    closed: bool,
}

#[async_trait]
impl DuplexSocket for MockSocket {
    async fn send(&mut self, payload: &[u8]) -> Result<()> {
        if self.closed || self.sends_remaining == 0 {
            return Err(VoicegateError::TransientNetwork {
                message: "mock send failed".to_string(),
            });
        }
        self.sends_remaining -= 1;
        lock(&self.factory.sent).push(payload.to_vec());
        Ok(())
    }

    async fn recv(&mut self) -> Result<SocketEvent> {
        if self.closed {
            return Ok(SocketEvent::Closed { clean: true });
        }
        match self.events.recv().await {
            Some(event) => Ok(event),
            None => Ok(SocketEvent::Closed { clean: false }),
        }
    }

    async fn ping(&mut self) -> Result<()> {
        if self.closed {
            return Err(VoicegateError::TransientNetwork {
                message: "mock ping on closed socket".to_string(),
            });
        }
        self.factory.pings.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_connect_and_send() {
        let factory = MockSocketFactory::new();
        let mut socket = factory.connect().await.unwrap();

        socket.send(&[1, 2, 3]).await.unwrap();
        socket.send(&[4]).await.unwrap();

        assert_eq!(factory.connect_attempts(), 1);
        assert_eq!(factory.sent(), vec![vec![1, 2, 3], vec![4]]);
    }

    #[tokio::test]
    async fn test_mock_connect_failures_then_success() {
        let factory = MockSocketFactory::new().with_connect_failures(2);

        assert!(factory.connect().await.is_err());
        assert!(factory.connect().await.is_err());
        assert!(factory.connect().await.is_ok());
        assert_eq!(factory.connect_attempts(), 3);
    }

    #[tokio::test]
    async fn test_mock_send_budget_exhaustion() {
        let factory = MockSocketFactory::new().with_send_budgets(vec![2]);
        let mut socket = factory.connect().await.unwrap();

        assert!(socket.send(&[1]).await.is_ok());
        assert!(socket.send(&[2]).await.is_ok());
        assert!(socket.send(&[3]).await.is_err());
        assert_eq!(factory.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_remote_close_delivery() {
        let factory = MockSocketFactory::new();
        let mut socket = factory.connect().await.unwrap();

        factory.push_incoming(vec![9]);
        factory.close_remote(true);

        assert_eq!(socket.recv().await.unwrap(), SocketEvent::Data(vec![9]));
        assert_eq!(
            socket.recv().await.unwrap(),
            SocketEvent::Closed { clean: true }
        );
    }

    #[tokio::test]
    async fn test_mock_ping_counted() {
        let factory = MockSocketFactory::new();
        let mut socket = factory.connect().await.unwrap();

        socket.ping().await.unwrap();
        socket.ping().await.unwrap();
        assert_eq!(factory.ping_count(), 2);
    }
}
