//! Types related to [`SessionConfig`][crate::SessionConfig].
mod cookie;
mod insecure;
mod signing;
mod state;

pub use cookie::{SessionCookieConfig, SessionCookieKind};
pub use insecure::InsecureConfig;
pub use signing::{CookieSigningConfig, SigningAlgorithm};
pub use state::SessionStateConfig;
