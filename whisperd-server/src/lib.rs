//! HTTP transcription server over the native Whisper library
//!
//! Library target exposing the HTTP surface; the `whisperd` binary wires it
//! to a live transcription session.

pub mod api;
pub mod args;
pub mod error;
pub mod resources;
pub mod state;
