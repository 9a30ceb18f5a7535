//! Battle rule violations.
//!
//! These surface as handler errors (logged and contained by the dispatcher)
//! or from [`Battle`](crate::Battle) entry points.

use runtime::DispatchError;
use thiserror::Error;

use crate::battlefield::CombatantId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BattleError {
    #[error("unknown combatant {0}")]
    UnknownCombatant(CombatantId),

    #[error("{id} has {available} mana but needs {required}")]
    InsufficientMana {
        id: CombatantId,
        required: u32,
        available: u32,
    },

    #[error("{caster} has no card at index {index}")]
    UnknownCard { caster: CombatantId, index: usize },

    #[error("{caster} holds no {card} in hand")]
    CardNotInHand { caster: CombatantId, card: String },

    #[error("{0} cannot act: it is down")]
    Down(CombatantId),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}
