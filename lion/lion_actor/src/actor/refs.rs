//! Actor references.
//!
//! An `ActorRef` is the identity under which an actor is known to its
//! senders and supervisor. Addressing and delivery live in the runtime; here
//! the reference is only compared, hashed and displayed.

use lion_core::id::ActorId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Opaque handle identifying one actor.
#[derive(Clone)]
pub struct ActorRef {
    id: ActorId,
    name: Arc<str>,
}

impl ActorRef {
    /// Create a reference for a freshly spawned actor with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(ActorId::new(), name)
    }

    /// Create a reference for an actor whose id is already known.
    pub fn with_id(id: ActorId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: Arc::from(name.into()),
        }
    }

    /// Unique id of the actor.
    pub fn id(&self) -> ActorId {
        self.id
    }

    /// Human readable name of the actor.
    pub fn name(&self) -> &str {
        &self.name
    }
}

// Identity is the id alone; two refs with the same id but different
// display names still denote the same actor.
impl PartialEq for ActorRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ActorRef {}

impl Hash for ActorRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id.short())
    }
}

impl fmt::Debug for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorRef")
            .field("name", &self.name)
            .field("id", &self.id)
            .finish()
    }
}
