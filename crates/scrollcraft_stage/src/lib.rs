//! Scrollcraft Stage
//!
//! The scroll-synchronized animation runtime: scenes map a scroll window to
//! a progress value in `[0, 1]` and announce edge crossings as typed
//! events; pins hold an element visually still while its scene is active;
//! the stage tracks a scroll container and drives all of it frame by frame.
//!
//! # Architecture
//!
//! - [`StageHandle`] — the scroll tracker and update scheduler. Owns every
//!   scene, coalesces container events into single frames, and defers
//!   consumer callbacks so they can re-enter the runtime.
//! - [`SceneHandle`] — per-scene facade: options, progress, listeners,
//!   pinning.
//! - [`options`] — typed configuration with degrade-to-default validation.
//!
//! The runtime is host-agnostic: all geometry goes through the
//! [`DomHost`](scrollcraft_core::DomHost) capability from
//! `scrollcraft_core`, and the whole stack runs headless against
//! [`HeadlessDom`](scrollcraft_core::HeadlessDom).

pub mod options;
pub mod stage;

mod pin;
mod scene;

pub use options::{Duration, PinSettings, SceneOptions, TriggerHook};
pub use stage::{
    ContainerEvent, SceneHandle, SceneId, ScrollHandler, ScrollSource, ScrollTarget, StageHandle,
    StageInfo, StageOptions, WakeCallback,
};

// Core vocabulary, re-exported so most embedders need a single import.
pub use scrollcraft_core::{
    Axis, EventCallback, EventKind, ListenerId, NodeHandle, OptionField, ProgressInfo, Result,
    SceneEvent, SceneState, ScrollContainer, ScrollDirection, SharedHost, ShiftReason, StageError,
};
