//! Scene and pin configuration
//!
//! Options are closed, typed structs with `Default` impls. Validation is a
//! pure function from raw options to usable options: invalid values log a
//! warning and degrade to the field's default, they never abort. Anything
//! that passes validation cannot fail later.

use scrollcraft_core::NodeHandle;
use std::rc::Rc;

/// How long a scene's scroll window is, in scroll pixels.
#[derive(Clone)]
pub enum Duration {
    /// A fixed pixel length. Zero makes the scene a threshold trigger with
    /// no `After` state.
    Fixed(f64),
    /// A percentage of the container's size along the scroll axis,
    /// re-resolved on every refresh.
    Percent(f64),
    /// A callback producing the pixel length, re-invoked on every refresh.
    Dynamic(Rc<dyn Fn() -> f64>),
}

impl Duration {
    /// Resolve to pixels against the current container size.
    pub fn resolve(&self, container_size: f64) -> f64 {
        match self {
            Duration::Fixed(v) => *v,
            Duration::Percent(p) => container_size * p / 100.0,
            Duration::Dynamic(f) => f(),
        }
    }

    /// Whether the resolved value can drift and must be re-resolved on
    /// refresh.
    pub fn needs_refresh(&self) -> bool {
        !matches!(self, Duration::Fixed(_))
    }
}

impl Default for Duration {
    fn default() -> Self {
        Duration::Fixed(0.0)
    }
}

impl From<f64> for Duration {
    fn from(v: f64) -> Self {
        Duration::Fixed(v)
    }
}

impl std::fmt::Debug for Duration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Duration::Fixed(v) => f.debug_tuple("Fixed").field(v).finish(),
            Duration::Percent(p) => f.debug_tuple("Percent").field(p).finish(),
            Duration::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl PartialEq for Duration {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Duration::Fixed(a), Duration::Fixed(b)) => a == b,
            (Duration::Percent(a), Duration::Percent(b)) => a == b,
            // Callbacks compare by identity.
            (Duration::Dynamic(a), Duration::Dynamic(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Where in the container's viewport the trigger sits, as a fraction of the
/// container size measured from the end of the scroll direction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TriggerHook {
    /// `1.0` — trigger when the element enters the viewport.
    OnEnter,
    /// `0.5` — trigger at the viewport center.
    OnCenter,
    /// `0.0` — trigger when the element would leave the viewport.
    OnLeave,
    /// An explicit fraction in `[0, 1]`.
    Fraction(f64),
}

impl TriggerHook {
    pub fn fraction(self) -> f64 {
        match self {
            TriggerHook::OnEnter => 1.0,
            TriggerHook::OnCenter => 0.5,
            TriggerHook::OnLeave => 0.0,
            TriggerHook::Fraction(f) => f,
        }
    }
}

impl Default for TriggerHook {
    fn default() -> Self {
        TriggerHook::OnCenter
    }
}

/// Configuration of a single scene.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneOptions {
    pub duration: Duration,
    /// Pixel offset added to the trigger position.
    pub offset: f64,
    /// Element whose position defines the scene start. Without one the
    /// scene starts at the container origin plus `offset`.
    pub trigger_element: Option<NodeHandle>,
    pub trigger_hook: TriggerHook,
    /// Whether progress moves backwards when scrolling back. Disabling
    /// makes forward progress sticky.
    pub reverse: bool,
}

impl Default for SceneOptions {
    fn default() -> Self {
        Self {
            duration: Duration::default(),
            offset: 0.0,
            trigger_element: None,
            trigger_hook: TriggerHook::default(),
            reverse: true,
        }
    }
}

impl SceneOptions {
    /// Validate every field, degrading invalid values to defaults with a
    /// logged warning.
    pub fn validated(self) -> Self {
        Self {
            duration: validate_duration(self.duration),
            offset: validate_offset(self.offset),
            trigger_element: self.trigger_element,
            trigger_hook: validate_trigger_hook(self.trigger_hook),
            reverse: self.reverse,
        }
    }
}

pub(crate) fn validate_duration(duration: Duration) -> Duration {
    match duration {
        Duration::Fixed(v) if !v.is_finite() || v < 0.0 => {
            tracing::warn!(value = v, "invalid fixed duration, falling back to 0");
            Duration::Fixed(0.0)
        }
        Duration::Percent(p) if !p.is_finite() || p < 0.0 => {
            tracing::warn!(value = p, "invalid percentage duration, falling back to 0");
            Duration::Fixed(0.0)
        }
        other => other,
    }
}

/// Clamp a resolved duration to something the window arithmetic can use.
pub(crate) fn sanitize_resolved_duration(value: f64) -> f64 {
    if !value.is_finite() || value < 0.0 {
        tracing::warn!(value, "resolved duration is not a usable length, using 0");
        0.0
    } else {
        value
    }
}

pub(crate) fn validate_offset(offset: f64) -> f64 {
    if offset.is_finite() {
        offset
    } else {
        tracing::warn!(value = offset, "invalid offset, falling back to 0");
        0.0
    }
}

pub(crate) fn validate_trigger_hook(hook: TriggerHook) -> TriggerHook {
    if let TriggerHook::Fraction(f) = hook {
        if f.is_nan() {
            tracing::warn!("trigger hook is NaN, falling back to center");
            return TriggerHook::default();
        }
        if !(0.0..=1.0).contains(&f) {
            let clamped = f.clamp(0.0, 1.0);
            tracing::warn!(value = f, clamped, "trigger hook outside [0, 1], clamping");
            return TriggerHook::Fraction(clamped);
        }
    }
    hook
}

/// Configuration of a scene pin.
#[derive(Clone, Debug, PartialEq)]
pub struct PinSettings {
    /// Whether content after the pinned element is pushed down for the pin
    /// duration. `None` means "default" (enabled for in-flow elements);
    /// `Some` records an explicit choice, which matters for the
    /// zero-duration warning.
    pub push_followers: Option<bool>,
    /// Class name written onto the generated spacer element.
    pub spacer_class: String,
}

impl Default for PinSettings {
    fn default() -> Self {
        Self {
            push_followers: None,
            spacer_class: "scrollcraft-pin-spacer".to_owned(),
        }
    }
}
