pub mod guard;
pub mod session;
pub mod tokens;

pub use guard::{can_delete, can_edit, guard, GuardDecision};
pub use session::{SessionPhase, SessionState, SessionStore};
pub use tokens::TokenHolder;
