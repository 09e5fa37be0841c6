pub mod base;
pub mod userinfo;

// Re-export from base.rs so we can do "use crate::authenticators::*;"
pub use base::{create_authenticator, Authenticator, AuthenticatorConfig, Authenticators};
pub use userinfo::{UserInfoAuthenticator, UserInfoConfig};
