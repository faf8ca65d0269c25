//! streamchat
//!
//! A terminal chat client. It keeps the conversation in memory, posts it to
//! a chat-completion endpoint, and renders the streamed plain-text reply as
//! it arrives.
//!
//! # Architecture
//!
//! - **Controller**: submits input, owns the conversation, drives rendering
//! - **Transport**: one streaming HTTP POST per submission
//! - **Decoding**: incremental UTF-8 over arbitrary chunk boundaries
//! - **Surfaces**: interactive raw-mode terminal or plain line mode
//!
//! # Modules
//!
//! - [`client`]: transport trait, HTTP implementation, stream decoding
//! - [`config`]: CLI and layered configuration
//! - [`controller`]: the chat view controller
//! - [`error`]: error taxonomy
//! - [`session`]: messages and the conversation
//! - [`ui`]: surface trait and its terminal and plain implementations

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]

pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod session;
pub mod ui;

pub use controller::{ChatController, SubmitOutcome};
pub use error::{ChatError, Result};
