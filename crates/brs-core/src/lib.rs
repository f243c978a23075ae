//! # brs-core
//!
//! Shared building blocks for the BRS remote clients: configuration, the HTTP
//! Digest authentication math, remote-control key naming, and the debug
//! console line buffer.
//!
//! This crate performs no network I/O.  Everything here is a pure function or
//! a small in-memory state machine, which keeps it easy to test without a
//! running simulator.
//!
//! # Architecture overview
//!
//! A BrightScript simulator exposes three network services:
//!
//! - **ECP** (External Control Protocol): an unauthenticated HTTP API that
//!   accepts remote-control key events and answers device/app queries.
//! - **Web installer**: an HTTP API protected by Digest authentication that
//!   side-loads channel packages and saves screenshots.
//! - **Debug console**: a raw TCP text stream carrying `print` output and the
//!   BrightScript micro-debugger prompt.
//!
//! The modules of this crate map onto those services:
//!
//! - **`config`** – Where the services live and the default timings.
//! - **`protocol`** – ECP paths and key names, and the Digest challenge /
//!   response computation used by the installer.
//! - **`console`** – Reassembly of the console's unframed text stream into
//!   complete lines.

pub mod config;
pub mod console;
pub mod protocol;

pub use config::{ConfigError, SimulatorConfig};
pub use console::buffer::{strip_ansi, LineBuffer, MAX_BUFFER_LINES};
pub use protocol::digest::{
    Authorization, CnonceSource, DigestAuthenticator, DigestChallenge, DigestCredentials,
    DigestError, NonceCounter, RandomCnonce, DEV_USERNAME,
};
pub use protocol::ecp::{literal_key, KeyAction, RemoteKey};
