//! Scroll stage: tracker and update scheduler
//!
//! The stage owns every scene in a slotmap arena and mediates between the
//! host (scroll/resize notifications in, geometry reads and writes out) and
//! the scenes (progress updates, pin maintenance, event dispatch).
//!
//! # Architecture
//!
//! [`StageHandle`] is a cheap cloneable handle around `Rc<RefCell<StageInner>>`;
//! [`SceneHandle`] is a per-scene facade carrying the stage handle plus its
//! [`SceneId`]. Scene mutations produce [`SceneEvent`]s which the stage
//! routes twice: internal reactions (window recompute, re-sorting, pin
//! maintenance, scheduling) run synchronously, while consumer callbacks are
//! queued and flushed only after every internal borrow is released — a
//! callback may therefore freely re-enter the runtime.
//!
//! # Frame contract
//!
//! Container events coalesce into at most one pending frame. When a frame
//! becomes pending the wake callback fires exactly once; the host is
//! expected to call [`StageHandle::run_frame`] on its next animation frame.
//!
//! # Example
//!
//! ```rust
//! use scrollcraft_core::{Axis, HeadlessDom, ScrollContainer, SharedHost};
//! use scrollcraft_stage::{ContainerEvent, SceneOptions, StageHandle, StageOptions};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let dom = Rc::new(RefCell::new(HeadlessDom::new()));
//! let host: SharedHost = dom.clone();
//! let stage = StageHandle::new(host, StageOptions::default()).unwrap();
//!
//! let scene = stage.add_scene(SceneOptions {
//!     duration: 100.0.into(),
//!     offset: 200.0,
//!     ..Default::default()
//! });
//!
//! dom.borrow_mut()
//!     .scroll_to(ScrollContainer::Document, Axis::Vertical, 250.0);
//! stage.handle_container_event(ContainerEvent::Scroll);
//! stage.run_frame();
//! assert_eq!(scene.progress(), 0.5);
//! ```

use crate::options::{sanitize_resolved_duration, PinSettings, SceneOptions};
use crate::pin::{PinContext, PinEngine};
use crate::scene::{Scene, StageCtx, UpdateAction};
use scrollcraft_core::{
    Axis, DomHost, EventCallback, EventKind, ListenerId, NodeHandle, OffsetSpace, OptionField,
    Result, SceneEvent, SceneState, ScrollContainer, ScrollDirection, SharedHost, ShiftReason,
    StageError,
};
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;
use std::time::Instant;

new_key_type! {
    /// Handle to a scene in the stage arena.
    pub struct SceneId;
}

/// Notification from the tracked scroll container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerEvent {
    Scroll,
    Resize,
}

/// Stage configuration.
#[derive(Clone, Debug)]
pub struct StageOptions {
    pub container: ScrollContainer,
    pub axis: Axis,
    /// Throttle for [`StageHandle::tick`] refreshes. Zero disables periodic
    /// refresh entirely.
    pub refresh_interval: std::time::Duration,
}

impl Default for StageOptions {
    fn default() -> Self {
        Self {
            container: ScrollContainer::Document,
            axis: Axis::Vertical,
            refresh_interval: std::time::Duration::from_millis(100),
        }
    }
}

/// Snapshot of the stage's tracking state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StageInfo {
    /// Container size along the scroll axis.
    pub size: f64,
    pub axis: Axis,
    pub scroll_pos: f64,
    pub direction: ScrollDirection,
    pub is_document: bool,
}

/// Target for [`StageHandle::scroll_to`].
#[derive(Clone, Copy, Debug)]
pub enum ScrollTarget {
    /// An absolute scroll position.
    Position(f64),
    /// The start of a scene's scroll window.
    Scene(SceneId),
    /// An element's position (spacer-aware: a pinned element resolves to
    /// its spacer).
    Element(NodeHandle),
}

/// Invoked once when a frame becomes pending. `Rc` since the runtime is
/// single-threaded.
pub type WakeCallback = Rc<dyn Fn()>;

/// Override for applying a scroll position (animated scrolling).
pub type ScrollHandler = Rc<dyn Fn(&mut dyn DomHost, ScrollContainer, Axis, f64)>;

/// Override for reading the scroll position (transform-based scrollers).
pub type ScrollSource = Rc<dyn Fn(&dyn DomHost, ScrollContainer, Axis) -> f64>;

/// Scenes waiting for the next frame.
enum Pending {
    None,
    All,
    Some(Vec<SceneId>),
}

/// A consumer dispatch captured at emission time. Callbacks are cloned when
/// the event is queued, so listeners registered at that moment receive it
/// even if the scene is gone by flush time.
struct QueuedDispatch {
    event: SceneEvent,
    callbacks: SmallVec<[EventCallback; 4]>,
}

struct StageInner {
    host: SharedHost,
    container: ScrollContainer,
    axis: Axis,
    refresh_interval: std::time::Duration,
    enabled: bool,
    /// Committed scroll position (as of the last frame).
    scroll_pos: f64,
    direction: ScrollDirection,
    /// Cached container size along the scroll axis.
    viewport_size: f64,
    scenes: SlotMap<SceneId, Scene>,
    /// Scene ids sorted ascending by window start.
    order: Vec<SceneId>,
    pending: Pending,
    frame_requested: bool,
    wake: Option<WakeCallback>,
    wake_pending: bool,
    scroll_handler: Option<ScrollHandler>,
    scroll_source: Option<ScrollSource>,
    last_refresh: Option<Instant>,
    queued: Vec<QueuedDispatch>,
}

impl StageInner {
    fn ctx(&self) -> StageCtx {
        StageCtx {
            container: self.container,
            axis: self.axis,
            container_size: self.viewport_size,
            scroll_pos: self.scroll_pos,
            direction: self.direction,
        }
    }

    fn read_scroll(&self) -> f64 {
        let host = self.host.borrow();
        match &self.scroll_source {
            Some(source) => source(&*host, self.container, self.axis),
            None => host.scroll_position(self.container, self.axis),
        }
    }

    // --- scheduling ---

    fn request_frame(&mut self) {
        if !self.frame_requested {
            self.frame_requested = true;
            self.wake_pending = true;
        }
    }

    fn schedule_all(&mut self) {
        self.pending = Pending::All;
        self.request_frame();
    }

    fn schedule_scene(&mut self, id: SceneId) {
        match &mut self.pending {
            Pending::All => {}
            Pending::None => self.pending = Pending::Some(vec![id]),
            Pending::Some(list) => {
                if !list.contains(&id) {
                    list.push(id);
                }
            }
        }
        self.request_frame();
    }

    fn handle_container_event(&mut self, event: ContainerEvent) {
        match event {
            ContainerEvent::Resize => self.on_resize(),
            ContainerEvent::Scroll => self.schedule_all(),
        }
    }

    fn on_resize(&mut self) {
        self.viewport_size = self
            .host
            .borrow()
            .container_size(self.container, self.axis);
        self.direction = ScrollDirection::Paused;
        tracing::debug!(size = self.viewport_size, "container resized");
        // A moved hook point moves every hook-dependent window.
        for id in self.order.clone() {
            let hooked = self
                .scenes
                .get(id)
                .map(|s| s.options.trigger_hook.fraction() > 0.0)
                .unwrap_or(false);
            if hooked {
                self.route_events(id, vec![SceneEvent::Shift(ShiftReason::ContainerResize)]);
            }
        }
        self.relative_spacer_pass();
        self.schedule_all();
    }

    /// Auxiliary pin maintenance for document-level events when the tracked
    /// container is nested: the container itself moves under the viewport.
    fn handle_document_event(&mut self, event: ContainerEvent) {
        if !self.container.is_document() {
            self.pins_in_container_pass();
        }
        if event == ContainerEvent::Resize {
            self.relative_spacer_pass();
        }
    }

    fn run_frame(&mut self) {
        self.frame_requested = false;
        if !self.enabled {
            return;
        }
        let new_pos = self.read_scroll();
        let delta = new_pos - self.scroll_pos;
        if delta != 0.0 {
            self.direction = if delta > 0.0 {
                ScrollDirection::Forward
            } else {
                ScrollDirection::Reverse
            };
        }
        self.scroll_pos = new_pos;

        let pending = std::mem::replace(&mut self.pending, Pending::None);
        let mut ids: Vec<SceneId> = match pending {
            Pending::None => return,
            Pending::All => self.order.clone(),
            // Filtering the sorted order keeps ascending-start processing
            // and drops duplicates.
            Pending::Some(list) => self
                .order
                .iter()
                .copied()
                .filter(|id| list.contains(id))
                .collect(),
        };
        if self.direction == ScrollDirection::Reverse {
            ids.reverse();
        }
        tracing::trace!(scenes = ids.len(), scroll_pos = new_pos, "running frame");
        for id in ids {
            self.update_scene_immediate(id);
        }
    }

    fn update_scene_immediate(&mut self, id: SceneId) {
        let ctx = self.ctx();
        let mut out = Vec::new();
        let action = match self.scenes.get_mut(id) {
            Some(scene) => scene.update_immediate(&ctx, &mut out),
            None => return,
        };
        self.route_events(id, out);
        match action {
            UpdateAction::PinRefresh => self.pin_update_state(id, false),
            UpdateAction::ForceUnpin => self.pin_update_state(id, true),
            UpdateAction::None => {}
        }
    }

    // --- event routing ---

    fn route_events(&mut self, id: SceneId, events: Vec<SceneEvent>) {
        for event in events {
            let callbacks = self
                .scenes
                .get(id)
                .map(|s| s.emitter.callbacks_for(event.kind()))
                .unwrap_or_default();
            if !callbacks.is_empty() {
                self.queued.push(QueuedDispatch {
                    event: event.clone(),
                    callbacks,
                });
            }
            self.route_internal(id, &event);
        }
    }

    fn route_internal(&mut self, id: SceneId, event: &SceneEvent) {
        match event {
            SceneEvent::Change(OptionField::TriggerElement) => {
                self.refresh_trigger_position(id, false);
            }
            SceneEvent::Change(OptionField::Reverse) => self.schedule_scene(id),
            SceneEvent::Shift(reason) => {
                let ctx = self.ctx();
                if let Some(scene) = self.scenes.get_mut(id) {
                    scene.update_scroll_offset(&ctx);
                }
                self.resort();
                self.schedule_scene(id);
                let needs_pin_state = self
                    .scenes
                    .get(id)
                    .map(|s| {
                        (s.state == SceneState::After && *reason == ShiftReason::Duration)
                            || (s.state == SceneState::During && s.resolved_duration == 0.0)
                    })
                    .unwrap_or(false);
                if needs_pin_state {
                    self.pin_update_state(id, false);
                }
                if *reason == ShiftReason::Duration {
                    self.pin_update_dimensions(id);
                }
            }
            SceneEvent::Progress(_) => self.pin_update_state(id, false),
            SceneEvent::Add => self.pin_update_dimensions(id),
            _ => {}
        }
    }

    fn resort(&mut self) {
        let StageInner { order, scenes, .. } = self;
        order.sort_by(|&a, &b| {
            let sa = scenes.get(a).map(|s| s.window.start).unwrap_or(f64::MAX);
            let sb = scenes.get(b).map(|s| s.window.start).unwrap_or(f64::MAX);
            sa.partial_cmp(&sb).unwrap_or(Ordering::Equal)
        });
    }

    fn refresh_trigger_position(&mut self, id: SceneId, suppress: bool) {
        let ctx = self.ctx();
        let host = Rc::clone(&self.host);
        let mut out = Vec::new();
        if let Some(scene) = self.scenes.get_mut(id) {
            scene.update_trigger_element_position(&ctx, &*host.borrow(), suppress, &mut out);
        }
        self.route_events(id, out);
    }

    // --- pin plumbing ---

    fn pin_ctx(&self, id: SceneId) -> Option<PinContext> {
        let scene = self.scenes.get(id)?;
        scene.pin.as_ref()?;
        Some(PinContext {
            axis: self.axis,
            state: scene.state,
            progress: scene.progress,
            duration: scene.resolved_duration,
            window_start: scene.window.start,
            reverse: scene.options.reverse,
            scroll_pos: self.scroll_pos,
        })
    }

    fn pin_update_state(&mut self, id: SceneId, force_unpin: bool) {
        let Some(pctx) = self.pin_ctx(id) else { return };
        let host = Rc::clone(&self.host);
        if let Some(pin) = self.scenes.get(id).and_then(|s| s.pin.as_ref()) {
            pin.update_state(&pctx, &mut *host.borrow_mut(), force_unpin);
        }
    }

    fn pin_update_dimensions(&mut self, id: SceneId) {
        let Some(pctx) = self.pin_ctx(id) else { return };
        let host = Rc::clone(&self.host);
        if let Some(pin) = self.scenes.get(id).and_then(|s| s.pin.as_ref()) {
            pin.update_dimensions(&pctx, &mut *host.borrow_mut());
        }
    }

    /// Reposition active pins while the (nested) container moves.
    fn pins_in_container_pass(&mut self) {
        for id in self.order.clone() {
            let active = self
                .scenes
                .get(id)
                .map(|s| s.state == SceneState::During && s.pin.is_some())
                .unwrap_or(false);
            if active {
                self.pin_update_state(id, false);
            }
        }
    }

    /// Re-size relatively-sized spacers after a window resize.
    fn relative_spacer_pass(&mut self) {
        let host = Rc::clone(&self.host);
        for id in self.order.clone() {
            let stale = self
                .scenes
                .get(id)
                .filter(|s| s.state == SceneState::During)
                .and_then(|s| s.pin.as_ref())
                .map(|pin| pin.needs_relative_resize(&*host.borrow()))
                .unwrap_or(false);
            if stale {
                self.pin_update_dimensions(id);
            }
        }
    }

    fn set_pin(&mut self, id: SceneId, element: NodeHandle, settings: PinSettings) {
        let existing = self
            .scenes
            .get(id)
            .and_then(|s| s.pin.as_ref().map(|p| p.element()));
        match existing {
            // Same element: nothing to do, styles stay captured once.
            Some(e) if e == element => return,
            Some(_) => self.remove_pin(id, true),
            None => {}
        }
        let duration = match self.scenes.get(id) {
            Some(scene) => scene.resolved_duration,
            None => return,
        };
        let host = Rc::clone(&self.host);
        let pin = PinEngine::install(&mut *host.borrow_mut(), element, &settings, duration);
        if let Some(pin) = pin {
            if let Some(scene) = self.scenes.get_mut(id) {
                scene.pin = Some(pin);
            }
            self.pin_update_state(id, false);
            self.pin_update_dimensions(id);
        }
    }

    fn remove_pin(&mut self, id: SceneId, restore: bool) {
        let Some(pctx) = self.pin_ctx(id) else { return };
        let host = Rc::clone(&self.host);
        if let Some(scene) = self.scenes.get_mut(id) {
            if let Some(pin) = scene.pin.take() {
                let mut h = host.borrow_mut();
                if pctx.state == SceneState::During {
                    pin.update_state(&pctx, &mut *h, true);
                }
                pin.remove(&mut *h, restore);
            }
        }
    }

    // --- scene lifecycle ---

    fn add_scene(&mut self, options: SceneOptions) -> SceneId {
        let options = options.validated();
        let resolved = sanitize_resolved_duration(options.duration.resolve(self.viewport_size));
        let id = self.scenes.insert(Scene::new(options, resolved));
        self.order.push(id);
        // Initial geometry without Shift noise.
        self.refresh_trigger_position(id, true);
        let ctx = self.ctx();
        if let Some(scene) = self.scenes.get_mut(id) {
            scene.update_scroll_offset(&ctx);
        }
        self.resort();
        self.route_events(id, vec![SceneEvent::Add]);
        self.schedule_scene(id);
        tracing::debug!(?id, "scene added");
        id
    }

    fn remove_scene(&mut self, id: SceneId) {
        if !self.scenes.contains_key(id) {
            return;
        }
        self.route_events(id, vec![SceneEvent::Remove]);
        self.remove_pin(id, true);
        self.drop_scene(id);
    }

    fn destroy_scene(&mut self, id: SceneId, reset: bool) {
        let Some(scene) = self.scenes.get_mut(id) else {
            return;
        };
        scene.enabled = false;
        self.route_events(id, vec![SceneEvent::Destroy { reset }]);
        self.remove_pin(id, reset);
        if let Some(scene) = self.scenes.get_mut(id) {
            scene.emitter.clear();
        }
        self.drop_scene(id);
    }

    fn drop_scene(&mut self, id: SceneId) {
        self.order.retain(|&s| s != id);
        if let Pending::Some(list) = &mut self.pending {
            list.retain(|&s| s != id);
        }
        self.scenes.remove(id);
    }

    // --- refresh ---

    fn tick(&mut self) {
        if self.refresh_interval.is_zero() {
            return;
        }
        let now = Instant::now();
        if let Some(last) = self.last_refresh {
            if now.duration_since(last) < self.refresh_interval {
                return;
            }
        }
        self.last_refresh = Some(now);
        self.refresh_all();
    }

    fn refresh_all(&mut self) {
        // Nested containers fire no resize events; detect stale size here.
        if !self.container.is_document() {
            let live = self
                .host
                .borrow()
                .container_size(self.container, self.axis);
            if live != self.viewport_size {
                self.on_resize();
            }
        }
        for id in self.order.clone() {
            self.refresh_scene(id);
        }
    }

    fn refresh_scene(&mut self, id: SceneId) {
        let size = self.viewport_size;
        let mut out = Vec::new();
        if let Some(scene) = self.scenes.get_mut(id) {
            scene.refresh_duration(size, &mut out);
        }
        self.route_events(id, out);
        self.refresh_trigger_position(id, false);
    }

    // --- whole-stage operations ---

    fn update(&mut self, immediate: bool) {
        self.on_resize();
        if immediate {
            self.run_frame();
            // The frame just ran; only a re-request from within it still
            // needs a wake.
            if !self.frame_requested {
                self.wake_pending = false;
            }
        }
    }

    fn set_enabled(&mut self, enabled: bool) {
        if enabled == self.enabled {
            return;
        }
        self.enabled = enabled;
        if enabled {
            self.schedule_all();
        }
    }

    fn info(&self) -> StageInfo {
        StageInfo {
            size: self.viewport_size,
            axis: self.axis,
            scroll_pos: self.scroll_pos,
            direction: self.direction,
            is_document: self.container.is_document(),
        }
    }

    fn scroll_to(&mut self, target: ScrollTarget) {
        let pos = match target {
            ScrollTarget::Position(p) => Some(p),
            ScrollTarget::Scene(id) => self.scenes.get(id).map(|s| s.window.start),
            ScrollTarget::Element(node) => {
                let host = self.host.borrow();
                if !host.in_document(node) {
                    tracing::warn!("cannot scroll to an element outside the document");
                    None
                } else {
                    // A pinned element sits at the viewport, not in flow;
                    // its spacer holds the flow position.
                    let mut node = node;
                    while host
                        .parent(node)
                        .map(|p| host.is_spacer(p))
                        .unwrap_or(false)
                    {
                        match host.parent(node) {
                            Some(p) => node = p,
                            None => break,
                        }
                    }
                    let elem = host.offset(node, OffsetSpace::Document, self.axis);
                    let container = host.container_offset(self.container, self.axis);
                    Some(elem - container)
                }
            }
        };
        let Some(pos) = pos else { return };
        let host = Rc::clone(&self.host);
        match &self.scroll_handler {
            Some(handler) => handler(&mut *host.borrow_mut(), self.container, self.axis, pos),
            None => host
                .borrow_mut()
                .set_scroll_position(self.container, self.axis, pos),
        }
    }
}

/// Cloneable handle to a stage.
pub struct StageHandle {
    inner: Rc<RefCell<StageInner>>,
}

impl Clone for StageHandle {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl StageHandle {
    /// Create a stage tracking `options.container` through `host`.
    ///
    /// Fails with [`StageError::InvalidContainer`] when an element container
    /// does not resolve to a live node.
    pub fn new(host: SharedHost, options: StageOptions) -> Result<Self> {
        let (scroll_pos, viewport_size) = {
            let h = host.borrow();
            if let ScrollContainer::Element(node) = options.container {
                if !h.in_document(node) {
                    return Err(StageError::InvalidContainer);
                }
            }
            (
                h.scroll_position(options.container, options.axis),
                h.container_size(options.container, options.axis),
            )
        };
        tracing::debug!(container = ?options.container, axis = ?options.axis, "stage created");
        Ok(Self {
            inner: Rc::new(RefCell::new(StageInner {
                host,
                container: options.container,
                axis: options.axis,
                refresh_interval: options.refresh_interval,
                enabled: true,
                scroll_pos,
                direction: ScrollDirection::Paused,
                viewport_size,
                scenes: SlotMap::with_key(),
                order: Vec::new(),
                pending: Pending::None,
                frame_requested: false,
                wake: None,
                wake_pending: false,
                scroll_handler: None,
                scroll_source: None,
                last_refresh: None,
                queued: Vec::new(),
            })),
        })
    }

    /// Run `f` against the inner state, then flush queued consumer events
    /// and wakes with no borrow held.
    fn with_inner<R>(&self, f: impl FnOnce(&mut StageInner) -> R) -> R {
        let result = f(&mut *self.inner.borrow_mut());
        self.flush();
        result
    }

    fn flush(&self) {
        enum Item {
            Event(SceneEvent, SmallVec<[EventCallback; 4]>),
            Wake(WakeCallback),
        }
        loop {
            let item = {
                let mut inner = self.inner.borrow_mut();
                if !inner.queued.is_empty() {
                    let dispatch = inner.queued.remove(0);
                    Some(Item::Event(dispatch.event, dispatch.callbacks))
                } else if inner.wake_pending {
                    inner.wake_pending = false;
                    inner.wake.clone().map(Item::Wake)
                } else {
                    None
                }
            };
            match item {
                Some(Item::Event(event, callbacks)) => {
                    for callback in callbacks {
                        callback(&event);
                    }
                }
                Some(Item::Wake(wake)) => wake(),
                None => break,
            }
        }
    }

    /// Add a scene and return its facade handle.
    pub fn add_scene(&self, options: SceneOptions) -> SceneHandle {
        let id = self.with_inner(|inner| inner.add_scene(options));
        SceneHandle {
            stage: self.clone(),
            id,
        }
    }

    /// Notify the stage of a container scroll or resize.
    pub fn handle_container_event(&self, event: ContainerEvent) {
        self.with_inner(|inner| inner.handle_container_event(event));
    }

    /// Notify the stage of a document-level scroll or resize. Only relevant
    /// when the tracked container is a nested element.
    pub fn handle_document_event(&self, event: ContainerEvent) {
        self.with_inner(|inner| inner.handle_document_event(event));
    }

    /// Process the pending frame: commit the scroll position and update the
    /// dirty scenes in window order (reversed while scrolling backwards).
    pub fn run_frame(&self) {
        self.with_inner(|inner| inner.run_frame());
    }

    /// Whether a frame is pending.
    pub fn frame_requested(&self) -> bool {
        self.inner.borrow().frame_requested
    }

    /// Treat the whole stage as resize-dirtied; with `immediate` the frame
    /// runs before returning.
    pub fn update(&self, immediate: bool) {
        self.with_inner(|inner| inner.update(immediate));
    }

    /// Periodic refresh entry point, self-throttled by the configured
    /// refresh interval. Re-resolves dynamic durations and trigger element
    /// positions.
    pub fn tick(&self) {
        self.with_inner(|inner| inner.tick());
    }

    /// Force a refresh regardless of the throttle.
    pub fn refresh(&self) {
        self.with_inner(|inner| inner.refresh_all());
    }

    pub fn enabled(&self) -> bool {
        self.inner.borrow().enabled
    }

    /// Enable or disable frame processing.
    pub fn set_enabled(&self, enabled: bool) {
        self.with_inner(|inner| inner.set_enabled(enabled));
    }

    pub fn info(&self) -> StageInfo {
        self.inner.borrow().info()
    }

    /// Scene ids in tracking order (ascending window start).
    pub fn scenes_in_order(&self) -> Vec<SceneId> {
        self.inner.borrow().order.clone()
    }

    /// Scroll the container, through the scroll handler when one is set.
    pub fn scroll_to(&self, target: ScrollTarget) {
        self.with_inner(|inner| inner.scroll_to(target));
    }

    /// Override how scroll positions are applied (e.g. animated scrolling).
    pub fn set_scroll_handler(&self, handler: Option<ScrollHandler>) {
        self.inner.borrow_mut().scroll_handler = handler;
    }

    /// Override how the scroll position is read (e.g. transform-based
    /// scrolling). The change takes effect on the next frame.
    pub fn set_scroll_source(&self, source: Option<ScrollSource>) {
        self.with_inner(|inner| {
            inner.scroll_source = source;
            inner.schedule_all();
        });
    }

    /// Install the wake callback fired once whenever a frame becomes
    /// pending.
    pub fn set_wake_callback(&self, wake: Option<WakeCallback>) {
        self.inner.borrow_mut().wake = wake;
    }

    /// Destroy every scene and clear all stage state. With `reset_scenes`
    /// pinned elements are restored to their pre-pin styles.
    pub fn destroy(&self, reset_scenes: bool) {
        self.with_inner(|inner| {
            for id in inner.order.clone() {
                inner.destroy_scene(id, reset_scenes);
            }
            inner.pending = Pending::None;
            inner.frame_requested = false;
            inner.wake = None;
            inner.scroll_handler = None;
            inner.scroll_source = None;
            tracing::debug!("stage destroyed");
        });
    }
}

impl std::fmt::Debug for StageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("StageHandle")
            .field("scenes", &inner.order.len())
            .field("scroll_pos", &inner.scroll_pos)
            .field("direction", &inner.direction)
            .finish()
    }
}

/// Facade handle to one scene in a stage.
///
/// Cheap to clone; all state lives in the stage arena. Calls against a
/// removed scene log a warning and return defaults.
pub struct SceneHandle {
    stage: StageHandle,
    id: SceneId,
}

impl Clone for SceneHandle {
    fn clone(&self) -> Self {
        Self {
            stage: self.stage.clone(),
            id: self.id,
        }
    }
}

impl SceneHandle {
    pub fn id(&self) -> SceneId {
        self.id
    }

    fn read<R>(&self, default: R, f: impl FnOnce(&Scene) -> R) -> R {
        let inner = self.stage.inner.borrow();
        match inner.scenes.get(self.id) {
            Some(scene) => f(scene),
            None => {
                tracing::warn!("scene no longer exists");
                default
            }
        }
    }

    fn mutate(&self, f: impl FnOnce(&mut Scene, &mut Vec<SceneEvent>)) {
        self.stage.with_inner(|inner| {
            let mut out = Vec::new();
            if let Some(scene) = inner.scenes.get_mut(self.id) {
                f(scene, &mut out);
            }
            inner.route_events(self.id, out);
        });
    }

    // --- state ---

    pub fn progress(&self) -> f64 {
        self.read(0.0, |s| s.progress)
    }

    pub fn state(&self) -> SceneState {
        self.read(SceneState::Before, |s| s.state)
    }

    /// Scroll position where the scene window starts.
    pub fn start_position(&self) -> f64 {
        self.read(0.0, |s| s.window.start)
    }

    /// Scroll position where the scene window ends.
    pub fn end_position(&self) -> f64 {
        self.read(0.0, |s| s.window.end)
    }

    /// The scroll position the scene triggers at.
    pub fn trigger_position(&self) -> f64 {
        let inner = self.stage.inner.borrow();
        match inner.scenes.get(self.id) {
            Some(scene) => scene.trigger_position(inner.viewport_size),
            None => {
                tracing::warn!("scene no longer exists");
                0.0
            }
        }
    }

    /// Drive progress manually (e.g. for seeking). Uses the stage's current
    /// scroll direction for the event snapshots.
    pub fn set_progress(&self, progress: f64) {
        self.stage.with_inner(|inner| {
            let direction = inner.direction;
            let mut out = Vec::new();
            let outcome = match inner.scenes.get_mut(self.id) {
                Some(scene) => scene.set_progress(progress, direction, &mut out),
                None => return,
            };
            inner.route_events(self.id, out);
            if outcome == crate::scene::ProgressOutcome::PinOnly {
                inner.pin_update_state(self.id, false);
            }
        });
    }

    // --- options ---

    /// Resolved duration in pixels.
    pub fn duration(&self) -> f64 {
        self.read(0.0, |s| s.resolved_duration)
    }

    pub fn set_duration(&self, duration: crate::options::Duration) {
        let size = self.stage.inner.borrow().viewport_size;
        self.mutate(|scene, out| scene.set_duration(duration, size, out));
    }

    pub fn offset(&self) -> f64 {
        self.read(0.0, |s| s.options.offset)
    }

    pub fn set_offset(&self, offset: f64) {
        self.mutate(|scene, out| scene.set_offset(offset, out));
    }

    pub fn trigger_hook(&self) -> crate::options::TriggerHook {
        self.read(crate::options::TriggerHook::default(), |s| {
            s.options.trigger_hook
        })
    }

    pub fn set_trigger_hook(&self, hook: crate::options::TriggerHook) {
        self.mutate(|scene, out| scene.set_trigger_hook(hook, out));
    }

    pub fn trigger_element(&self) -> Option<NodeHandle> {
        self.read(None, |s| s.options.trigger_element)
    }

    pub fn set_trigger_element(&self, element: Option<NodeHandle>) {
        self.mutate(|scene, out| scene.set_trigger_element(element, out));
    }

    pub fn reverse(&self) -> bool {
        self.read(true, |s| s.options.reverse)
    }

    pub fn set_reverse(&self, reverse: bool) {
        self.mutate(|scene, out| scene.set_reverse(reverse, out));
    }

    pub fn enabled(&self) -> bool {
        self.read(false, |s| s.enabled)
    }

    /// Enable or disable the scene. Disabling settles immediately so a
    /// pinned element is not left hanging fixed.
    pub fn set_enabled(&self, enabled: bool) {
        self.stage.with_inner(|inner| {
            let changed = match inner.scenes.get_mut(self.id) {
                Some(scene) => {
                    let changed = scene.enabled != enabled;
                    scene.enabled = enabled;
                    changed
                }
                None => false,
            };
            if changed {
                inner.update_scene_immediate(self.id);
            }
        });
    }

    // --- updates ---

    /// Recompute progress from the current scroll position, either right
    /// now or on the next frame.
    pub fn update(&self, immediate: bool) {
        self.stage.with_inner(|inner| {
            if immediate {
                inner.update_scene_immediate(self.id);
            } else {
                inner.schedule_scene(self.id);
            }
        });
    }

    /// Re-resolve dynamic duration and trigger element position.
    pub fn refresh(&self) {
        self.stage.with_inner(|inner| inner.refresh_scene(self.id));
    }

    // --- listeners ---

    pub fn on(&self, kind: EventKind, callback: EventCallback) -> ListenerId {
        let mut inner = self.stage.inner.borrow_mut();
        match inner.scenes.get_mut(self.id) {
            Some(scene) => scene.emitter.on(kind, callback),
            None => {
                tracing::warn!("scene no longer exists");
                ListenerId::default()
            }
        }
    }

    pub fn off(&self, listener: ListenerId) -> bool {
        let mut inner = self.stage.inner.borrow_mut();
        inner
            .scenes
            .get_mut(self.id)
            .map(|scene| scene.emitter.off(listener))
            .unwrap_or(false)
    }

    pub fn clear_listeners(&self) {
        if let Some(scene) = self.stage.inner.borrow_mut().scenes.get_mut(self.id) {
            scene.emitter.clear();
        }
    }

    // --- pinning ---

    /// Pin `element` for the scene duration.
    pub fn set_pin(&self, element: NodeHandle, settings: PinSettings) {
        self.stage
            .with_inner(|inner| inner.set_pin(self.id, element, settings));
    }

    /// Remove the pin. With `reset` the spacer is removed and the element's
    /// inline styles restored; without it the element keeps its current
    /// visual state.
    pub fn remove_pin(&self, reset: bool) {
        self.stage
            .with_inner(|inner| inner.remove_pin(self.id, reset));
    }

    /// The spacer element of the active pin, if any.
    pub fn pin_spacer(&self) -> Option<NodeHandle> {
        self.read(None, |s| s.pin.as_ref().map(|p| p.spacer()))
    }

    // --- lifecycle ---

    /// Detach the scene from the stage, tearing down its pin.
    pub fn remove(&self) {
        self.stage.with_inner(|inner| inner.remove_scene(self.id));
    }

    /// Destroy the scene. With `reset` pinned elements are restored to
    /// their pre-pin styles; without it the page keeps its current visual
    /// state.
    pub fn destroy(&self, reset: bool) {
        self.stage
            .with_inner(|inner| inner.destroy_scene(self.id, reset));
    }
}

impl std::fmt::Debug for SceneHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneHandle").field("id", &self.id).finish()
    }
}
