//! Reusable processing behaviors shared by processors.

pub mod catch_event;

pub use catch_event::{CatchEventBehavior, CatchEventSubscriptions};
