//! # Event subscribers for the jobvisor runtime.
//!
//! This module provides the [`Subscribe`] trait and the [`SubscriberSet`]
//! fan-out used by the dispatcher to deliver lifecycle events to user hooks.
//!
//! ## Architecture
//! ```text
//! Job stages ── publish(Event) ──► Bus ──► dispatcher listener ──► SubscriberSet::emit(&Event)
//!                                                              ┌─────────┼─────────┐
//!                                                              ▼         ▼         ▼
//!                                                           metrics    audit    custom
//! ```

mod set;
mod subscribe;

pub(crate) use set::panic_message;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
