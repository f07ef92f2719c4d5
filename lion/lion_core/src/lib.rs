//! # Lion Core
//!
//! `lion_core` provides the vocabulary shared by the Lion actor crates:
//! error types, strongly-typed identifiers, and structured logging helpers.
//!
//! ## Crate Structure
//!
//! - **error**: Error taxonomy for actors, mailboxes and configuration
//! - **id**: Strongly-typed identifier types
//! - **utils**: Log levels and field formatting
//! - **macros**: The `log_event!` structured logging macro

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod error;
pub mod id;
pub mod macros;
pub mod utils;

pub use error::{ActorError, ConfigError, Error, MailboxError, Result};
pub use id::{ActorId, TimerId};
pub use utils::LogLevel;

#[doc(hidden)]
pub use log as __log;
