//! brs-remote library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does brs-remote do? (for beginners)
//!
//! A BrightScript simulator exposes three network services while it runs a
//! channel:
//!
//! 1. **ECP** (External Control Protocol, port 8060): plain HTTP.  Every
//!    remote-control button is a `POST /keypress/{key}` and device state is
//!    available as XML under `/query/...`.
//! 2. **Web installer** (port 8888 by default): HTTP protected by Digest
//!    authentication.  It accepts channel packages as multipart uploads and
//!    can save a screenshot of the running channel.
//! 3. **Debug console** (port 8085): a raw TCP text stream carrying the
//!    channel's `print` output and accepting debugger commands.
//!
//! This crate provides one client per service plus a few use cases built on
//! top of them (key sequences, typing text, a combined status report).

/// Application layer: use cases and the traits they drive.
pub mod application;

/// Error type shared by all clients.
pub mod error;

/// Infrastructure layer: the HTTP and TCP clients.
pub mod infrastructure;

pub use error::ClientError;
