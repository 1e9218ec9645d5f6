// Authentication against the ScapeCloud identity provider
//
// The session manager owns the only mutable state in the crate

pub mod firebase_client;
pub mod session;

pub use firebase_client::{IdentityClient, TokenGrant};
pub use session::{LogoutReason, RefreshPolicy, Session, SessionEvent, SessionManager};
