//! Error types for the Lion actor core.
//!
//! Mailboxes, supervisors and FSM actors report routine conditions through
//! their return values (`bool`, `Option`, `Directive`). The types here cover
//! what is left: the cause carried by a child failure report, the reason an
//! enqueue was refused, and configuration problems.
//!
//! The root error type, `Error`, wraps each subsystem error so callers can
//! use `?` uniformly at the top level.

use thiserror::Error;

/// Root error type for the Lion actor core.
#[derive(Debug, Error)]
pub enum Error {
    /// An actor failed while processing a message
    #[error("Actor error: {0}")]
    Actor(#[from] ActorError),

    /// Mailbox rejected an operation
    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Failure raised by an actor while handling a message.
///
/// The variants are the failure classes a supervisor's decider reasons
/// about. Anything that does not fit a known class goes through `Other`
/// and is escalated by the default deciders.
#[derive(Debug, Error)]
pub enum ActorError {
    /// A message carried a value the actor rejects
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A message had a shape the actor cannot interpret
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// The actor referenced state or a field that does not exist
    #[error("missing field: {0}")]
    MissingField(String),

    /// Transient runtime failure; the actor's state may be corrupt
    #[error("runtime failure: {0}")]
    Runtime(String),

    /// The actor panicked while processing a message
    #[error("actor panicked: {0}")]
    Panicked(String),

    /// Unrecoverable failure
    #[error("fatal failure: {0}")]
    Fatal(String),

    /// Any other failure
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ActorError {
    /// Short, stable name of the failure class, suitable for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::TypeMismatch(_) => "type_mismatch",
            Self::MissingField(_) => "missing_field",
            Self::Runtime(_) => "runtime",
            Self::Panicked(_) => "panicked",
            Self::Fatal(_) => "fatal",
            Self::Other(_) => "other",
        }
    }
}

/// Reason a mailbox refused an envelope.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxError {
    /// The mailbox is full (bounded capacity reached)
    #[error("mailbox is full")]
    Full,
    /// The mailbox has been closed or the actor is stopped
    #[error("mailbox is closed")]
    Closed,
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("failed to read configuration {path}: {source}")]
    Io {
        /// Path that was being read
        path: String,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// The configuration text could not be parsed
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// The configuration parsed but holds invalid values
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Result type alias using the root error type.
pub type Result<T> = std::result::Result<T, Error>;
