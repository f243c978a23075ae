//! Infrastructure layer: network clients for the simulator's services.
//!
//! **Dependency rule**: this layer may depend on `application` and `brs_core`,
//! but MUST NOT be imported by the `application` layer.
//!
//! # Sub-modules
//!
//! - **`ecp`** – stateless HTTP client for key events, launches and queries.
//! - **`installer`** – Digest-authenticated client for package installs and
//!   screenshots.
//! - **`console`** – persistent TCP session to the debug console with
//!   reconnection and a bounded line buffer.
//! - **`http`** – deadline-bounded request helper shared by the two HTTP clients.

pub mod console;
pub mod ecp;
pub mod http;
pub mod installer;

pub use console::{ConnectionState, ConsoleClient, ConsoleOptions};
pub use ecp::RemoteControlClient;
pub use installer::{ImageFormat, InstallerClient, Screenshot};
