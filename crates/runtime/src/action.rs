//! Action identity and type-erased sharing.
//!
//! An action is any plain value that describes something that happened or
//! should happen ("deal 6 damage to the goblin"). The concrete Rust type is the
//! action's *kind*: handlers are registered per type and the dispatcher routes
//! by [`ActionKind`], so new kinds never require touching the core.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Upcasting helpers used to recover the concrete type behind `dyn Action`.
///
/// Implemented for every eligible type; never implement it by hand.
pub trait AsAny: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A resolvable event.
///
/// Implementors only need `Debug`; the name defaults to the unqualified type
/// name and is used for logging and events.
pub trait Action: AsAny + fmt::Debug {
    fn name(&self) -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }
}

impl dyn Action {
    /// Returns the kind of this action (its concrete type).
    pub fn kind(&self) -> ActionKind {
        ActionKind {
            id: AsAny::as_any(self).type_id(),
            name: self.name(),
        }
    }

    pub fn is<A: Action>(&self) -> bool {
        AsAny::as_any(self).is::<A>()
    }

    pub fn downcast_ref<A: Action>(&self) -> Option<&A> {
        AsAny::as_any(self).downcast_ref::<A>()
    }

    /// Recovers the concrete `Arc<A>`, or `None` when the kind differs.
    pub fn downcast_arc<A: Action>(self: Arc<Self>) -> Option<Arc<A>> {
        AsAny::into_any_arc(self).downcast::<A>().ok()
    }
}

/// Stable discriminant for an action type.
///
/// Equality and hashing use only the type id; the name is carried for logs.
#[derive(Clone, Copy)]
pub struct ActionKind {
    id: TypeId,
    name: &'static str,
}

impl ActionKind {
    pub fn of<A: Action>() -> Self {
        Self {
            id: TypeId::of::<A>(),
            name: short_type_name(std::any::type_name::<A>()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ActionKind {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ActionKind {}

impl Hash for ActionKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActionKind({})", self.name)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Strips module paths: `game_battle::actions::DealDamage` -> `DealDamage`.
///
/// Generic arguments are left intact, only the outer path is trimmed.
fn short_type_name(full: &'static str) -> &'static str {
    let head = full.split('<').next().unwrap_or(full);
    match head.rfind("::") {
        Some(idx) => &full[idx + 2..],
        None => full,
    }
}
