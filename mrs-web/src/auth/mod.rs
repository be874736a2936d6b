//! Email/password authentication and sessions

pub mod password;
pub mod session;

pub use session::{AuthUser, MaybeAuthUser, SESSION_COOKIE};
