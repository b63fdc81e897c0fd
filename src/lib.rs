//! Dialog runtime
//!
//! Multi-turn conversational dialogs driven by a per-conversation stack of
//! waterfall dialogs, with intent routing for messages no dialog claims.

pub mod config;
pub mod dialog;
pub mod dialogs;
pub mod error;
pub mod router;
pub mod services;
pub mod state;
pub mod turn;

#[cfg(test)]
pub mod testing;

pub use config::RouterConfig;
pub use error::DialogError;
pub use router::{TurnAction, TurnOutcome, TurnRouter};
pub use turn::{Activity, OutboundMessage};
