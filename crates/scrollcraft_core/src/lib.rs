//! Scrollcraft Core
//!
//! This crate provides the foundational primitives for the Scrollcraft
//! scroll-animation runtime:
//!
//! - **Host Capability**: The [`DomHost`] trait abstracts every geometry read
//!   and write the runtime performs, so the engine never touches a real DOM
//!   directly and can run headless.
//! - **Typed Events**: Scene lifecycle events ([`SceneEvent`]) with
//!   subscription handles instead of stringly-typed event names.
//! - **Headless Host**: [`HeadlessDom`], an in-memory host implementation
//!   used by the test suites and available for host-less integration tests.
//!
//! # Example
//!
//! ```rust
//! use scrollcraft_core::events::{EventEmitter, EventKind, SceneEvent};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let mut emitter = EventEmitter::new();
//! let seen = Rc::new(Cell::new(0u32));
//!
//! let counter = Rc::clone(&seen);
//! let id = emitter.on(EventKind::Add, Rc::new(move |_| {
//!     counter.set(counter.get() + 1);
//! }));
//!
//! emitter.emit(&SceneEvent::Add);
//! assert_eq!(seen.get(), 1);
//!
//! emitter.off(id);
//! emitter.emit(&SceneEvent::Add);
//! assert_eq!(seen.get(), 1);
//! ```

pub mod dom;
pub mod error;
pub mod events;
pub mod headless;

pub use dom::{
    Axis, BoxSizing, CssPosition, DomHost, NodeHandle, OffsetSpace, ScrollContainer, SharedHost,
    SizeMode, StyleProperty, StyleSnapshot, StyleValue,
};
pub use error::{Result, StageError};
pub use events::{
    EventCallback, EventEmitter, EventKind, ListenerId, OptionField, ProgressInfo, SceneEvent,
    SceneState, ScrollDirection, ShiftReason,
};
pub use headless::HeadlessDom;
