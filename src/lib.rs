//! Mixtide - backend-agnostic model of controllable audio streams.
//!
//! Mixtide models what a mixer application controls about an audio stream
//! (multi-channel volume, mute, balance, fade, capability flags, switchable
//! ports and peak level monitoring) without tying itself to a particular
//! sound system. The connection layer of a concrete sound system feeds the
//! model with [`backend::StreamSnapshot`]s and executes the commands of the
//! [`backend::Backend`] trait; applications read attributes synchronously,
//! watch them for changes and mutate them through capability-gated async
//! requests.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mixtide::{Backend, StreamRegistry};
//!
//! # async fn example(backend: Arc<dyn Backend>, snapshot: mixtide::StreamSnapshot) {
//! let mut registry = StreamRegistry::new(backend);
//!
//! // Snapshots from the connection layer populate the model.
//! let stream = registry.apply(&snapshot);
//!
//! // Synchronous reads, reactive watches, gated async mutators.
//! println!("{} at {}", stream.name.get(), stream.aggregate_volume());
//! let _ = stream.set_mute(true).await;
//! # }
//! ```

/// Sound-system command surface and snapshot types.
pub mod backend;

/// Pure balance and fade computation.
pub mod balance;

/// Channel positions and channel maps.
pub mod channel;

/// Crate error types.
pub mod error;

/// Stream capability flags.
pub mod flags;

/// Peak level monitoring attachment.
pub mod monitor;

/// Switchable stream ports.
pub mod port;

/// Reactive attribute cells.
pub mod property;

/// Index-addressed stream arena and its events.
pub mod registry;

/// Stream aggregate and snapshot application.
pub mod stream;

/// Volume constants, conversions and vectors.
pub mod volume;

pub use backend::*;
pub use channel::*;
pub use error::*;
pub use flags::*;
pub use monitor::*;
pub use port::*;
pub use property::*;
pub use registry::*;
pub use stream::*;
pub use volume::*;
