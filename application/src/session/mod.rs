//! Conversation session control.
//!
//! - [`guard::SessionConcurrencyGuard`] - single-flight generation per session with cancellation

pub mod guard;
