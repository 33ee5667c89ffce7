//! # Shared Bus - In-process notification bus
//!
//! A broadcast channel shared by a cell agent's or registry's internal
//! subsystems, carrying the Peers listener events (§4.8) and the
//! control-plane's internal wakeup triggers. It is not a wire protocol:
//! every publisher and subscriber lives in the same process, so there is
//! no envelope, no authentication, and no replay concern to guard against.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{EventFilter, EventTopic, UvnEvent};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, EventSubscriber, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before the slowest one starts
/// missing events (reported via `RecvError::Lagged`).
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
