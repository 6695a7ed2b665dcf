//! Request lifecycle state machine
//!
//! Pure transitions: given the current state and an event, produce the next
//! state and the effects the runtime must carry out.

mod effect;
mod event;
mod state;
mod transition;


pub use effect::Effect;
pub use event::Event;
pub use state::{Lifecycle, SessionContext};
pub use transition::{transition, TransitionError, TransitionResult};
