pub mod event;
pub mod pending;
pub mod reactor;
pub mod scheduler;
pub mod state;
pub mod view;

pub use event::*;
pub use reactor::SessionController;
pub use scheduler::{SideEffect, SuggestionRequest};
pub use state::{SessionState, StateDelta};
pub use view::SessionView;
