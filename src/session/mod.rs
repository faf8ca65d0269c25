//! Conversation state.
//!
//! A [`Conversation`] is the ordered list of [`Message`]s exchanged in one
//! chat session. Each controller owns its own conversation, so independent
//! sessions (and tests) never share state.
//!
//! # Example
//!
//! ```rust
//! use streamchat::session::{Conversation, Role};
//!
//! let mut conversation = Conversation::new();
//! conversation.push_user("Hello!");
//!
//! assert_eq!(conversation.len(), 1);
//! assert_eq!(conversation.messages()[0].role, Role::User);
//! ```

mod conversation;

pub use conversation::{Conversation, Message, Role};
