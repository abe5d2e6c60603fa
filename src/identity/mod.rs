//! Identity and session management for the admin panel.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod session;
mod provider;

pub use principal::Principal;
pub use session::{Session, SessionToken, SessionManager};
pub use provider::{SessionOracle, LocalSessionOracle, SignInRequest};
