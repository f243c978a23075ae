//! Debug console text handling.
//!
//! The console is an unframed TCP text stream, so the client has to rebuild
//! lines itself.  [`buffer::LineBuffer`] does that reassembly and keeps a
//! bounded history of complete lines.

pub mod buffer;
