//! Conversational session domain.
//!
//! - [`entities::ConversationSession`] - one client conversation
//! - [`entities::SessionId`] - session identifier
//! - [`entities::SessionMode`] - an operating mode the client can select

pub mod entities;
