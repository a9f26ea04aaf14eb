//! Resilient transport actor.
//!
//! Owns one socket at a time and keeps it alive across failures:
//! circuit-breaker-gated dialing, exponential backoff with jitter
//! between attempts, a bounded priority backlog flushed on reconnect,
//! and periodic keep-alive probes. A clean remote close parks the
//! transport instead of reconnecting; the next send wakes it up.

use crate::config::TransportConfig;
use crate::error::VoicegateError;
use crate::transport::backoff::BackoffPolicy;
use crate::transport::breaker::CircuitBreaker;
use crate::transport::queue::{MessagePriority, PriorityQueue, QueuedMessage};
use crate::transport::socket::{DuplexSocket, SocketEvent, SocketFactory};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Where the transport currently stands with its peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// Requests accepted by the transport actor.
#[derive(Debug)]
pub enum TransportCommand {
    /// Transmit a payload, queueing it if the link is down.
    Send {
        payload: Vec<u8>,
        priority: MessagePriority,
    },
    /// Drain any queued backlog over the live connection.
    Flush,
    /// Close the connection and stop the actor.
    Close,
}

/// Notifications emitted by the transport actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    /// The connection dropped. `clean` closes do not reconnect.
    Disconnected { clean: bool },
    /// A reconnect is scheduled after `delay`.
    Reconnecting { attempt: u32, delay: Duration },
    /// Retries are exhausted; the actor has stopped.
    Failed,
    /// Payload received from the peer.
    Received(Vec<u8>),
    /// The backlog was full and this message's tier lost its oldest entry.
    QueueDropped { priority: MessagePriority },
}

enum Established {
    Socket(Box<dyn DuplexSocket>),
    Shutdown,
}

enum Session {
    Reconnect,
    Parked,
    Shutdown,
}

/// Connection-maintaining wrapper around a [`SocketFactory`].
pub struct ResilientTransport<F: SocketFactory> {
    factory: F,
    breaker: CircuitBreaker,
    backoff: BackoffPolicy,
    queue: PriorityQueue,
    keep_alive: Duration,
    max_retries: u32,
    channel_buffer: usize,
    attempt: u32,
    state: ConnectionState,
}

impl<F: SocketFactory> ResilientTransport<F> {
    pub fn new(factory: F) -> Self {
        Self::with_config(factory, TransportConfig::default())
    }

    pub fn with_config(factory: F, config: TransportConfig) -> Self {
        Self {
            factory,
            breaker: CircuitBreaker::new(
                config.failure_threshold,
                Duration::from_millis(config.recovery_timeout_ms),
            ),
            backoff: BackoffPolicy {
                base: Duration::from_millis(config.backoff_base_ms),
                max: Duration::from_millis(config.backoff_max_ms),
                multiplier: config.backoff_multiplier,
                jitter: Duration::from_millis(config.backoff_jitter_ms),
            },
            queue: PriorityQueue::new(config.queue_capacity),
            keep_alive: Duration::from_millis(config.keep_alive_interval_ms.max(1)),
            max_retries: config.max_retries,
            channel_buffer: config.channel_buffer_size.max(1),
            attempt: 0,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Spawns the actor onto the current runtime, with command and
    /// event channels sized from `channel_buffer_size`.
    pub fn start(
        self,
    ) -> (
        mpsc::Sender<TransportCommand>,
        mpsc::Receiver<TransportEvent>,
        tokio::task::JoinHandle<()>,
    )
    where
        F: 'static,
    {
        let (command_tx, command_rx) = mpsc::channel(self.channel_buffer);
        let (event_tx, event_rx) = mpsc::channel(self.channel_buffer);
        let handle = tokio::spawn(self.run(command_rx, event_tx));
        (command_tx, event_rx, handle)
    }

    /// Runs the actor until the command channel closes, a `Close`
    /// arrives, or retries are exhausted.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<TransportCommand>,
        events: mpsc::Sender<TransportEvent>,
    ) {
        loop {
            let socket = match self.establish(&mut commands, &events).await {
                Established::Socket(socket) => socket,
                Established::Shutdown => return,
            };

            match self.drive_connected(socket, &mut commands, &events).await {
                Session::Reconnect => {}
                Session::Parked => {
                    if !self.wait_for_work(&mut commands, &events).await {
                        return;
                    }
                }
                Session::Shutdown => return,
            }
        }
    }

    /// Dials until connected, honoring the breaker and backoff
    /// schedule. Commands arriving meanwhile are queued.
    async fn establish(
        &mut self,
        commands: &mut mpsc::Receiver<TransportCommand>,
        events: &mpsc::Sender<TransportEvent>,
    ) -> Established {
        loop {
            self.state = ConnectionState::Connecting;

            if let Err(VoicegateError::CircuitOpen { retry_after_ms }) = self.breaker.try_acquire()
            {
                debug!(retry_after_ms, "circuit open, holding off connect");
                let hold = Duration::from_millis(retry_after_ms.max(1));
                if !self.wait_out(hold, commands, events).await {
                    return Established::Shutdown;
                }
                continue;
            }

            match self.factory.connect().await {
                Ok(mut socket) => {
                    self.breaker.record_success();
                    self.attempt = 0;
                    self.state = ConnectionState::Connected;
                    debug!(queued = self.queue.len(), "connected");
                    if events.send(TransportEvent::Connected).await.is_err() {
                        return Established::Shutdown;
                    }
                    if self.flush_backlog(socket.as_mut(), events).await {
                        return Established::Socket(socket);
                    }
                    // Flush failure: backlog was demoted and requeued,
                    // fall through to the retry path.
                    let _ = socket.close().await;
                    let _ = events
                        .send(TransportEvent::Disconnected { clean: false })
                        .await;
                }
                Err(error) => {
                    warn!(error = %error, attempt = self.attempt + 1, "connect failed");
                }
            }

            self.breaker.record_failure();
            self.attempt += 1;
            if self.attempt > self.max_retries {
                self.state = ConnectionState::Failed;
                let _ = events.send(TransportEvent::Failed).await;
                return Established::Shutdown;
            }

            let delay = self.backoff.delay_for_attempt(self.attempt - 1);
            if events
                .send(TransportEvent::Reconnecting {
                    attempt: self.attempt,
                    delay,
                })
                .await
                .is_err()
            {
                return Established::Shutdown;
            }
            if !self.wait_out(delay, commands, events).await {
                return Established::Shutdown;
            }
        }
    }

    /// Services one live connection until it drops or the actor is told
    /// to stop.
    async fn drive_connected(
        &mut self,
        mut socket: Box<dyn DuplexSocket>,
        commands: &mut mpsc::Receiver<TransportCommand>,
        events: &mpsc::Sender<TransportEvent>,
    ) -> Session {
        let mut keep_alive = tokio::time::interval(self.keep_alive);
        keep_alive.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // Consume the immediate first tick.
        keep_alive.tick().await;

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(TransportCommand::Send { payload, priority }) => {
                        if let Err(error) = socket.send(&payload).await {
                            warn!(error = %error, "send failed, queueing payload");
                            self.enqueue(QueuedMessage::new(payload, priority), events)
                                .await;
                            let _ = socket.close().await;
                            self.breaker.record_failure();
                            let _ = events
                                .send(TransportEvent::Disconnected { clean: false })
                                .await;
                            return Session::Reconnect;
                        }
                    }
                    Some(TransportCommand::Flush) => {
                        if !self.flush_backlog(socket.as_mut(), events).await {
                            let _ = socket.close().await;
                            self.breaker.record_failure();
                            let _ = events
                                .send(TransportEvent::Disconnected { clean: false })
                                .await;
                            return Session::Reconnect;
                        }
                    }
                    Some(TransportCommand::Close) | None => {
                        let _ = socket.close().await;
                        self.state = ConnectionState::Disconnected;
                        let _ = events
                            .send(TransportEvent::Disconnected { clean: true })
                            .await;
                        return Session::Shutdown;
                    }
                },
                received = socket.recv() => match received {
                    Ok(SocketEvent::Data(payload)) => {
                        if events
                            .send(TransportEvent::Received(payload))
                            .await
                            .is_err()
                        {
                            return Session::Shutdown;
                        }
                    }
                    Ok(SocketEvent::Closed { clean: true }) => {
                        debug!("remote closed cleanly, parking");
                        self.state = ConnectionState::Disconnected;
                        let _ = events
                            .send(TransportEvent::Disconnected { clean: true })
                            .await;
                        return Session::Parked;
                    }
                    Ok(SocketEvent::Closed { clean: false }) | Err(_) => {
                        self.breaker.record_failure();
                        let _ = events
                            .send(TransportEvent::Disconnected { clean: false })
                            .await;
                        return Session::Reconnect;
                    }
                },
                _ = keep_alive.tick() => {
                    if let Err(error) = socket.ping().await {
                        warn!(error = %error, "keep-alive ping failed");
                    }
                }
            }
        }
    }

    /// Drains the backlog over a live socket, highest priority first.
    /// On a mid-flush failure the unsent remainder is demoted to Low
    /// and requeued for the next connection.
    async fn flush_backlog(
        &mut self,
        socket: &mut dyn DuplexSocket,
        events: &mpsc::Sender<TransportEvent>,
    ) -> bool {
        while let Some(message) = self.queue.pop() {
            if let Err(error) = socket.send(&message.payload).await {
                warn!(error = %error, remaining = self.queue.len() + 1, "backlog flush interrupted");
                let mut unsent = vec![message.demoted()];
                while let Some(pending) = self.queue.pop() {
                    unsent.push(pending.demoted());
                }
                for pending in unsent {
                    self.enqueue(pending, events).await;
                }
                return false;
            }
        }
        true
    }

    /// Waits for a send command after a clean close. Returns false on
    /// shutdown.
    async fn wait_for_work(
        &mut self,
        commands: &mut mpsc::Receiver<TransportCommand>,
        events: &mpsc::Sender<TransportEvent>,
    ) -> bool {
        self.state = ConnectionState::Disconnected;
        loop {
            match commands.recv().await {
                Some(TransportCommand::Send { payload, priority }) => {
                    self.enqueue(QueuedMessage::new(payload, priority), events)
                        .await;
                    return true;
                }
                Some(TransportCommand::Flush) => {
                    if !self.queue.is_empty() {
                        return true;
                    }
                }
                Some(TransportCommand::Close) | None => return false,
            }
        }
    }

    /// Sleeps for `delay` while still accepting commands. Returns
    /// false on shutdown.
    async fn wait_out(
        &mut self,
        delay: Duration,
        commands: &mut mpsc::Receiver<TransportCommand>,
        events: &mpsc::Sender<TransportEvent>,
    ) -> bool {
        let deadline = tokio::time::sleep(delay);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                _ = &mut deadline => return true,
                command = commands.recv() => match command {
                    Some(TransportCommand::Send { payload, priority }) => {
                        self.enqueue(QueuedMessage::new(payload, priority), events)
                            .await;
                    }
                    Some(TransportCommand::Flush) => {}
                    Some(TransportCommand::Close) | None => return false,
                },
            }
        }
    }

    async fn enqueue(&mut self, message: QueuedMessage, events: &mpsc::Sender<TransportEvent>) {
        if let Some(dropped) = self.queue.push(message) {
            debug!(
                priority = ?dropped.priority,
                age_ms = dropped.enqueued_at.elapsed().as_millis() as u64,
                "backlog full, dropped oldest"
            );
            let _ = events
                .send(TransportEvent::QueueDropped {
                    priority: dropped.priority,
                })
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::socket::MockSocketFactory;
    use tokio::task::JoinHandle;
    use tokio::time::timeout;

    fn test_config() -> TransportConfig {
        TransportConfig {
            failure_threshold: 100,
            recovery_timeout_ms: 50,
            backoff_base_ms: 5,
            backoff_max_ms: 100,
            backoff_multiplier: 2.0,
            backoff_jitter_ms: 0,
            max_retries: 5,
            keep_alive_interval_ms: 10_000,
            queue_capacity: 16,
            channel_buffer_size: 16,
        }
    }

    fn spawn(
        factory: MockSocketFactory,
        config: TransportConfig,
    ) -> (
        mpsc::Sender<TransportCommand>,
        mpsc::Receiver<TransportEvent>,
        JoinHandle<()>,
    ) {
        ResilientTransport::with_config(factory, config).start()
    }

    async fn next_event(events: &mut mpsc::Receiver<TransportEvent>) -> TransportEvent {
        timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("timed out waiting for transport event")
            .expect("event channel closed")
    }

    async fn wait_for_sent(factory: &MockSocketFactory, count: usize) -> Vec<Vec<u8>> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let sent = factory.sent();
            if sent.len() >= count {
                return sent;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {} sends, got {:?}",
                count,
                sent
            );
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    #[tokio::test]
    async fn test_connects_and_sends() {
        let factory = MockSocketFactory::new();
        let (commands, mut events, _handle) = spawn(factory.clone(), test_config());

        assert_eq!(next_event(&mut events).await, TransportEvent::Connected);

        commands
            .send(TransportCommand::Send {
                payload: vec![1, 2, 3],
                priority: MessagePriority::Normal,
            })
            .await
            .unwrap();

        assert_eq!(wait_for_sent(&factory, 1).await, vec![vec![1, 2, 3]]);
    }

    #[tokio::test]
    async fn test_retries_with_backoff_until_connected() {
        let factory = MockSocketFactory::new().with_connect_failures(2);
        let (_commands, mut events, _handle) = spawn(factory.clone(), test_config());

        assert!(matches!(
            next_event(&mut events).await,
            TransportEvent::Reconnecting { attempt: 1, .. }
        ));
        assert!(matches!(
            next_event(&mut events).await,
            TransportEvent::Reconnecting { attempt: 2, .. }
        ));
        assert_eq!(next_event(&mut events).await, TransportEvent::Connected);
        assert_eq!(factory.connect_attempts(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_emit_failed() {
        let factory = MockSocketFactory::new().with_connect_failures(10);
        let mut config = test_config();
        config.max_retries = 2;
        config.backoff_base_ms = 1;
        let (_commands, mut events, handle) = spawn(factory.clone(), config);

        assert!(matches!(
            next_event(&mut events).await,
            TransportEvent::Reconnecting { attempt: 1, .. }
        ));
        assert!(matches!(
            next_event(&mut events).await,
            TransportEvent::Reconnecting { attempt: 2, .. }
        ));
        assert_eq!(next_event(&mut events).await, TransportEvent::Failed);

        timeout(Duration::from_secs(1), handle)
            .await
            .expect("actor should stop after Failed")
            .unwrap();
        assert_eq!(factory.connect_attempts(), 3);
    }

    #[tokio::test]
    async fn test_backlog_flushed_in_priority_order() {
        let factory = MockSocketFactory::new().with_connect_failures(1);
        let mut config = test_config();
        config.backoff_base_ms = 100;
        let (commands, mut events, _handle) = spawn(factory.clone(), config);

        assert!(matches!(
            next_event(&mut events).await,
            TransportEvent::Reconnecting { attempt: 1, .. }
        ));

        // Queued while the link is down, out of priority order.
        for (byte, priority) in [
            (1u8, MessagePriority::Low),
            (2, MessagePriority::High),
            (3, MessagePriority::Normal),
        ] {
            commands
                .send(TransportCommand::Send {
                    payload: vec![byte],
                    priority,
                })
                .await
                .unwrap();
        }

        assert_eq!(next_event(&mut events).await, TransportEvent::Connected);
        assert_eq!(
            wait_for_sent(&factory, 3).await,
            vec![vec![2], vec![3], vec![1]]
        );
    }

    #[tokio::test]
    async fn test_interrupted_flush_demotes_remainder() {
        // First connect fails so the backlog builds; the next socket
        // accepts one send then breaks mid-flush.
        let factory = MockSocketFactory::new()
            .with_connect_failures(1)
            .with_send_budgets(vec![1]);
        let mut config = test_config();
        config.backoff_base_ms = 100;
        let (commands, mut events, _handle) = spawn(factory.clone(), config);

        assert!(matches!(
            next_event(&mut events).await,
            TransportEvent::Reconnecting { attempt: 1, .. }
        ));
        for (byte, priority) in [
            (1u8, MessagePriority::High),
            (2, MessagePriority::High),
            (3, MessagePriority::Normal),
        ] {
            commands
                .send(TransportCommand::Send {
                    payload: vec![byte],
                    priority,
                })
                .await
                .unwrap();
        }

        assert_eq!(next_event(&mut events).await, TransportEvent::Connected);
        assert_eq!(
            next_event(&mut events).await,
            TransportEvent::Disconnected { clean: false }
        );
        assert!(matches!(
            next_event(&mut events).await,
            TransportEvent::Reconnecting { .. }
        ));

        // The unsent remainder [2, 3] was demoted to Low. A fresh
        // Normal send during the backoff must now outrank it.
        commands
            .send(TransportCommand::Send {
                payload: vec![4],
                priority: MessagePriority::Normal,
            })
            .await
            .unwrap();

        assert_eq!(next_event(&mut events).await, TransportEvent::Connected);
        assert_eq!(
            wait_for_sent(&factory, 4).await,
            vec![vec![1], vec![4], vec![2], vec![3]]
        );
    }

    #[tokio::test]
    async fn test_clean_remote_close_does_not_reconnect() {
        let factory = MockSocketFactory::new();
        let (commands, mut events, handle) = spawn(factory.clone(), test_config());

        assert_eq!(next_event(&mut events).await, TransportEvent::Connected);
        factory.close_remote(true);
        assert_eq!(
            next_event(&mut events).await,
            TransportEvent::Disconnected { clean: true }
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(factory.connect_attempts(), 1);

        commands.send(TransportCommand::Close).await.unwrap();
        timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_send_after_clean_close_reconnects() {
        let factory = MockSocketFactory::new();
        let (commands, mut events, _handle) = spawn(factory.clone(), test_config());

        assert_eq!(next_event(&mut events).await, TransportEvent::Connected);
        factory.close_remote(true);
        assert_eq!(
            next_event(&mut events).await,
            TransportEvent::Disconnected { clean: true }
        );

        commands
            .send(TransportCommand::Send {
                payload: vec![7],
                priority: MessagePriority::High,
            })
            .await
            .unwrap();

        assert_eq!(next_event(&mut events).await, TransportEvent::Connected);
        assert_eq!(wait_for_sent(&factory, 1).await, vec![vec![7]]);
        assert_eq!(factory.connect_attempts(), 2);
    }

    #[tokio::test]
    async fn test_dirty_remote_close_reconnects() {
        let factory = MockSocketFactory::new();
        let (_commands, mut events, _handle) = spawn(factory.clone(), test_config());

        assert_eq!(next_event(&mut events).await, TransportEvent::Connected);
        factory.close_remote(false);
        assert_eq!(
            next_event(&mut events).await,
            TransportEvent::Disconnected { clean: false }
        );
        assert_eq!(next_event(&mut events).await, TransportEvent::Connected);
        assert_eq!(factory.connect_attempts(), 2);
    }

    #[tokio::test]
    async fn test_close_command_shuts_down_cleanly() {
        let factory = MockSocketFactory::new();
        let (commands, mut events, handle) = spawn(factory.clone(), test_config());

        assert_eq!(next_event(&mut events).await, TransportEvent::Connected);
        commands.send(TransportCommand::Close).await.unwrap();
        assert_eq!(
            next_event(&mut events).await,
            TransportEvent::Disconnected { clean: true }
        );
        timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_received_payloads_forwarded() {
        let factory = MockSocketFactory::new();
        let (_commands, mut events, _handle) = spawn(factory.clone(), test_config());

        assert_eq!(next_event(&mut events).await, TransportEvent::Connected);
        factory.push_incoming(vec![42, 43]);
        assert_eq!(
            next_event(&mut events).await,
            TransportEvent::Received(vec![42, 43])
        );
    }

    #[tokio::test]
    async fn test_keep_alive_pings_while_connected() {
        let factory = MockSocketFactory::new();
        let mut config = test_config();
        config.keep_alive_interval_ms = 10;
        let (_commands, mut events, _handle) = spawn(factory.clone(), config);

        assert_eq!(next_event(&mut events).await, TransportEvent::Connected);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(factory.ping_count() >= 2);
    }

    #[tokio::test]
    async fn test_full_backlog_drops_oldest_low() {
        let factory = MockSocketFactory::new().with_connect_failures(1);
        let mut config = test_config();
        config.backoff_base_ms = 100;
        config.queue_capacity = 2;
        let (commands, mut events, _handle) = spawn(factory.clone(), config);

        assert!(matches!(
            next_event(&mut events).await,
            TransportEvent::Reconnecting { attempt: 1, .. }
        ));
        for byte in [1u8, 2, 3] {
            commands
                .send(TransportCommand::Send {
                    payload: vec![byte],
                    priority: MessagePriority::Low,
                })
                .await
                .unwrap();
        }

        assert_eq!(
            next_event(&mut events).await,
            TransportEvent::QueueDropped {
                priority: MessagePriority::Low
            }
        );
        assert_eq!(next_event(&mut events).await, TransportEvent::Connected);
        assert_eq!(wait_for_sent(&factory, 2).await, vec![vec![2], vec![3]]);
    }

    #[tokio::test]
    async fn test_breaker_gates_dialing_after_threshold() {
        let factory = MockSocketFactory::new().with_connect_failures(2);
        let mut config = test_config();
        config.failure_threshold = 1;
        config.recovery_timeout_ms = 30;
        config.backoff_base_ms = 1;
        config.max_retries = 10;
        let (_commands, mut events, _handle) = spawn(factory.clone(), config);

        let started = tokio::time::Instant::now();
        loop {
            if next_event(&mut events).await == TransportEvent::Connected {
                break;
            }
        }
        // Two failures, each opening the breaker for 30ms before the
        // next dial is allowed through.
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(factory.connect_attempts(), 3);
    }

    #[tokio::test]
    async fn test_zero_keep_alive_interval_does_not_kill_actor() {
        // validate() rejects this config; the actor clamps it anyway so
        // a caller that skipped validation gets pings, not a panic.
        let factory = MockSocketFactory::new();
        let mut config = test_config();
        config.keep_alive_interval_ms = 0;
        let (commands, mut events, handle) = spawn(factory.clone(), config);

        assert_eq!(next_event(&mut events).await, TransportEvent::Connected);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!handle.is_finished());

        commands
            .send(TransportCommand::Send {
                payload: vec![5],
                priority: MessagePriority::Normal,
            })
            .await
            .unwrap();
        assert_eq!(wait_for_sent(&factory, 1).await, vec![vec![5]]);
    }

    #[test]
    fn test_new_transport_starts_disconnected() {
        let transport = ResilientTransport::new(MockSocketFactory::new());
        assert_eq!(transport.state(), ConnectionState::Disconnected);
        assert_eq!(transport.queued(), 0);
    }
}
