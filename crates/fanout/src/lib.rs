//! Realtime fan-out of committed state changes.
//!
//! Engines build a [`RealtimeEvent`] after their unit of work commits and
//! hand it to [`FanOut::emit`], which works out the audiences and pushes
//! the event through the configured [`Publisher`]. Publishing is best
//! effort: failures are logged and counted, never returned.

pub mod audience;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod hub;
pub mod publisher;

pub use audience::Audience;
pub use dispatch::FanOut;
pub use error::{FanoutError, Result};
pub use event::{EventName, ItemSnapshot, OrderSnapshot, Payload, RealtimeEvent, ReservationSnapshot};
pub use hub::{BroadcastHub, Envelope, Subscription};
pub use publisher::{NoopPublisher, Publisher, RecordingPublisher};
