//! Session coordinator
//!
//! The coordinator holds the single published stream and every transport and
//! consumer hanging off it. Connections talk to it through typed operations;
//! it talks to the engine through [`MediaEngine`](crate::engine::MediaEngine)
//! and to peers through per-connection notification sinks.
//!
//! # Architecture
//!
//! ```text
//!                       Arc<SessionCoordinator<E>>
//!                     ┌──────────────────────────────┐
//!                     │ connections: HashMap<Conn,   │
//!                     │   ConnectionState>           │
//!                     │ transports: HashMap<Id,      │
//!                     │   Transport { state, .. }>   │
//!                     │ producer: Option<Producer>   │
//!                     │ consumers: HashMap<Id, ..>   │
//!                     │ broadcaster                  │
//!                     └──────────────┬───────────────┘
//!                                    │
//!         ┌──────────────────────────┼──────────────────────────┐
//!         │                          │                          │
//!         ▼                          ▼                          ▼
//!    [Publisher]               [Subscriber]               [Subscriber]
//!    publish()                 consume()                  ◄── newProducer
//!         │                          │
//!         └──► engine.produce()      └──► engine.consume() (paused)
//! ```
//!
//! # Teardown
//!
//! Engine objects are closed outside the state lock, after the registry has
//! already forgotten them. A producer going away takes every consumer that
//! depends on it along, and each affected subscriber gets `consumerClosed`.

pub mod broadcast;
pub mod entry;
pub mod store;

pub use broadcast::{Broadcaster, NotificationSink};
pub use entry::{ConsumerEntry, CoordinatorStats, ProducerEntry};
pub use store::{SessionCoordinator, TransportOptions};
