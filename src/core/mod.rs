//! # Core Runtime
//!
//! The coordination primitives everything else is built on. Nothing in here
//! knows about documents or audio.
//!
//! ```text
//!     ┌──────────────┐   callbacks    ┌──────────────┐
//!     │ AsyncResult  │ ─────────────▶ │  WorkerPool  │ ◀── deferred events
//!     └──────────────┘                └──────────────┘
//!
//!     ┌──────────────┐   iterate() at a fixed rate
//!     │  FrameLoop   │ ─────────────▶ input, audio engines
//!     └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`pool`]: bounded worker pool (tokio runtime)
//! - [`future`]: `AsyncResult`, a one-shot completion with callbacks
//! - [`frame_loop`]: the dedicated fixed-rate thread and its engines
//! - [`config`]: layered configuration

pub mod config;
pub mod frame_loop;
pub mod future;
pub mod pool;

pub use frame_loop::{Engine, FrameLoop, RunningLoop, StopHandle};
pub use future::{AsyncResult, FutureError, Outcome, State};
pub use pool::WorkerPool;
