//! Application layer use cases built on top of the simulator clients.
//!
//! # What use cases are there?
//!
//! - **`navigation`** – Presses a sequence of remote keys, or types text one
//!   literal character at a time.  Keys go through a [`navigation::KeySender`]
//!   trait object, which `RemoteControlClient` implements and tests mock.
//!
//! - **`status`** – Probes the three simulator services concurrently and
//!   renders an UP / DOWN report with a hint for each service that is down.
//!
//! - **`catalog`** – Turns the XML bodies of the ECP query endpoints into
//!   typed values.

pub mod catalog;
pub mod navigation;
pub mod status;
