pub mod event;
pub mod id;

pub use event::{EventName, OutboundEvent};
