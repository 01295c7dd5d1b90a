//! Typed scene lifecycle events
//!
//! Scenes communicate exclusively through the events in this module: the
//! progress state machine emits them, the pin engine consumes a subset of
//! them, and application code subscribes to them to drive visual effects.
//!
//! Subscriptions are keyed by [`EventKind`] and return a [`ListenerId`]
//! handle; disposing the handle removes exactly that subscription. This
//! replaces stringly-typed `"event.namespace"` registration with something
//! the compiler can check.
//!
//! # Ordering
//!
//! Event order within one progress update is part of the contract:
//! `Enter` → (`Start` | `End`) → `Progress` → (`Start` | `End`) → `Leave`.
//! Consumers may rely on `Enter`/`Start` firing exactly once per entry and
//! `End`/`Leave` exactly once per exit.

use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use std::rc::Rc;

/// Progress state of a scene relative to its scroll window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SceneState {
    /// Scroll position is before the window start.
    Before,
    /// Scroll position is inside the window (or past the trigger, for
    /// zero-duration scenes).
    During,
    /// Scroll position is past the window end. Unreachable for
    /// zero-duration scenes.
    After,
}

/// Direction of the last observed scroll delta.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScrollDirection {
    Forward,
    Reverse,
    /// Only at initialization and immediately after a resize.
    Paused,
}

/// Discriminant for subscribing to scene events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Enter,
    Start,
    Progress,
    End,
    Leave,
    Change,
    Shift,
    Update,
    Add,
    Remove,
    Destroy,
}

/// Snapshot carried by progress-bearing events, captured at emission time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProgressInfo {
    /// Progress in `[0, 1]`.
    pub progress: f64,
    /// State after the update.
    pub state: SceneState,
    /// Scroll direction at the time of the update.
    pub direction: ScrollDirection,
}

/// Why a scene's scroll window moved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShiftReason {
    Duration,
    Offset,
    TriggerHook,
    TriggerElementPosition,
    ContainerResize,
}

/// Which configuration field changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OptionField {
    Duration,
    Offset,
    TriggerElement,
    TriggerHook,
    Reverse,
}

/// A scene lifecycle event.
#[derive(Clone, Debug, PartialEq)]
pub enum SceneEvent {
    /// The scroll position entered the scene window.
    Enter(ProgressInfo),
    /// The window start edge was crossed (in either direction).
    Start(ProgressInfo),
    /// Progress changed.
    Progress(ProgressInfo),
    /// The window end edge was crossed (in either direction).
    End(ProgressInfo),
    /// The scroll position left the scene window.
    Leave(ProgressInfo),
    /// A configuration field changed.
    Change(OptionField),
    /// The scroll window moved and derived geometry must be recomputed.
    Shift(ShiftReason),
    /// Fired before each immediate progress recomputation.
    Update {
        start: f64,
        end: f64,
        scroll_pos: f64,
    },
    /// The scene was attached to a stage.
    Add,
    /// The scene was detached from its stage.
    Remove,
    /// The scene is being destroyed. `reset` asks effect owners to restore
    /// the page to its pre-scene visual state.
    Destroy { reset: bool },
}

impl SceneEvent {
    /// The subscription key for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            SceneEvent::Enter(_) => EventKind::Enter,
            SceneEvent::Start(_) => EventKind::Start,
            SceneEvent::Progress(_) => EventKind::Progress,
            SceneEvent::End(_) => EventKind::End,
            SceneEvent::Leave(_) => EventKind::Leave,
            SceneEvent::Change(_) => EventKind::Change,
            SceneEvent::Shift(_) => EventKind::Shift,
            SceneEvent::Update { .. } => EventKind::Update,
            SceneEvent::Add => EventKind::Add,
            SceneEvent::Remove => EventKind::Remove,
            SceneEvent::Destroy { .. } => EventKind::Destroy,
        }
    }

    /// Progress snapshot, for the event kinds that carry one.
    pub fn progress_info(&self) -> Option<ProgressInfo> {
        match self {
            SceneEvent::Enter(info)
            | SceneEvent::Start(info)
            | SceneEvent::Progress(info)
            | SceneEvent::End(info)
            | SceneEvent::Leave(info) => Some(*info),
            _ => None,
        }
    }
}

/// Callback invoked with an event reference.
///
/// Uses `Rc` since the runtime is single-threaded.
pub type EventCallback = Rc<dyn Fn(&SceneEvent)>;

new_key_type! {
    /// Handle to a registered event listener.
    pub struct ListenerId;
}

struct Listener {
    kind: EventKind,
    callback: EventCallback,
}

/// Per-scene event registry.
#[derive(Default)]
pub struct EventEmitter {
    listeners: SlotMap<ListenerId, Listener>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for one event kind.
    pub fn on(&mut self, kind: EventKind, callback: EventCallback) -> ListenerId {
        self.listeners.insert(Listener { kind, callback })
    }

    /// Remove a single listener. Returns whether it existed.
    pub fn off(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id).is_some()
    }

    /// Remove every listener for one kind.
    pub fn clear_kind(&mut self, kind: EventKind) {
        self.listeners.retain(|_, l| l.kind != kind);
    }

    /// Remove all listeners.
    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Clone the callbacks registered for `kind`.
    ///
    /// The stage dispatches through this so callbacks run after internal
    /// borrows are released, letting them re-enter the runtime.
    pub fn callbacks_for(&self, kind: EventKind) -> SmallVec<[EventCallback; 4]> {
        self.listeners
            .values()
            .filter(|l| l.kind == kind)
            .map(|l| Rc::clone(&l.callback))
            .collect()
    }

    /// Dispatch an event synchronously to its listeners.
    pub fn emit(&self, event: &SceneEvent) {
        let kind = event.kind();
        tracing::trace!(?kind, "scene event fired");
        for listener in self.listeners.values() {
            if listener.kind == kind {
                (listener.callback)(event);
            }
        }
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
