//! Safe bindings to the GPU-accelerated Whisper transcription library
//!
//! The native library is a single shared object exposing a handful of flat
//! entry points plus COM-style objects: every object is a pointer to a
//! virtual-dispatch table of method slots, reference counted through
//! `AddRef`/`Release`, with methods returning HRESULT status codes. This
//! crate owns the entire crossing: it loads the library once per process,
//! resolves the entry points, mirrors the fixed-layout structures the library
//! expects, and wraps every acquired native reference in a guard that
//! releases it exactly once.
//!
//! ## Quick Start
//!
//! ```no_run
//! use whisperd_native::Session;
//!
//! let mut session = Session::initialize("ggml-medium.bin", "english")?;
//! let audio = std::fs::read("clip.wav")?;
//! let text = session.transcribe_bytes(&audio)?;
//! println!("{text}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Threading
//!
//! A [`Session`] (and the [`ExecutionContext`] inside it) is not safe for
//! concurrent use: a transcription run mutates buffers inside the native
//! session object. All transcription methods take `&mut self`, so exclusive
//! access is enforced by the borrow checker; callers sharing a session across
//! threads must serialize the full decode-run-extract span behind one lock.
//! Native calls block the calling thread for the entire inference duration.

mod com;
pub mod context;
pub mod error;
pub mod lang;
pub mod library;
mod logger;
pub mod media;
pub mod model;
pub mod params;
pub mod result;
pub mod session;
pub mod status;
pub mod version;
mod wide;

#[cfg(test)]
pub(crate) mod mock;

pub use context::{ExecutionContext, ResultFlags, SamplingStrategy};
pub use error::{NativeError, Result};
pub use library::NativeLibrary;
pub use media::{AudioBuffer, AudioReader, MediaFoundation};
pub use model::{GpuModelFlags, Model, ModelImplementation, ModelSetup};
pub use params::{CallbackOutcome, FullParams, ParamFlags};
pub use result::{ResultSet, Segment, Token};
pub use session::Session;
pub use status::Outcome;
pub use version::LibraryVersion;
