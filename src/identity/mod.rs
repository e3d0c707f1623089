//! Identification subsystem.
//!
//! # Data Flow
//! ```text
//! ?jid=<token> or x-jid header
//!     → controller.rs (IdentifiableController wraps the real controller)
//!     → token.rs (claims: identifiers + expiry)
//!     → signing.rs (keccak256 digest check)
//! ```

pub mod controller;
pub mod signing;
pub mod token;

pub use controller::IdentifiableController;
pub use signing::{MessageVerifier, VerifyError};
pub use token::{TokenError, TokenIdentifier};
