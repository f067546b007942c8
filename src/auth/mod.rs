//! Authentication module for the DevMarket client
//!
//! This module handles login/registration against the auth service,
//! form validation, and persistence of the bearer token.

mod service;
pub mod token;
mod validation;

pub use service::{AuthResponse, AuthService};
pub use token::{peek_claims, Claims, FileTokenStore, MemoryTokenStore, TokenStore};
pub use validation::{LoginForm, RegisterForm};
