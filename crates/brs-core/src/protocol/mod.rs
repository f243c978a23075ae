//! Wire-level details of the simulator's HTTP services.
//!
//! - **`ecp`** – ECP endpoint paths, key actions and literal-character keys.
//! - **`digest`** – RFC 2617 Digest challenge parsing and response
//!   computation (`qop=auth` subset) for the web installer.

pub mod digest;
pub mod ecp;

pub use digest::{Authorization, DigestAuthenticator, DigestChallenge, DigestError};
pub use ecp::KeyAction;
