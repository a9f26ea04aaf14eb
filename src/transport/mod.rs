//! Connection resilience: circuit breaker, backoff, priority backlog,
//! and the actor that ties them to a socket.

pub mod backoff;
pub mod breaker;
pub mod queue;
pub mod resilient;
pub mod socket;

pub use backoff::BackoffPolicy;
pub use breaker::{BreakerState, CircuitBreaker};
pub use queue::{MessagePriority, PriorityQueue, QueuedMessage};
pub use resilient::{ConnectionState, ResilientTransport, TransportCommand, TransportEvent};
pub use socket::{DuplexSocket, MockSocketFactory, SocketEvent, SocketFactory};
