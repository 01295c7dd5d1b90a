//! Scene progress state machine
//!
//! A [`Scene`] owns the configuration, the current progress/state pair, the
//! cached scroll window, and its listener registry. It is deliberately
//! host-blind: every method either works on plain numbers handed over by the
//! stage (a [`StageCtx`] snapshot) or takes a `&dyn DomHost` for the one
//! operation that reads geometry (trigger element resolution). Mutations
//! never call listeners directly — they append [`SceneEvent`]s to an output
//! buffer, and the stage routes those after its own borrows are released.
//!
//! # State machine
//!
//! ```text
//!            p >= threshold            p >= 1
//!   Before ----------------> During ----------> After
//!      ^                        |                 |
//!      +------ p < 0 -----------+<---- p < 1 -----+   (reverse enabled)
//! ```
//!
//! Zero-duration scenes clamp progress to exactly `0.0` or `1.0` and never
//! reach `After`.

use crate::options::{sanitize_resolved_duration, SceneOptions};
use scrollcraft_core::{
    Axis, DomHost, EventEmitter, OffsetSpace, OptionField, ProgressInfo, SceneEvent, SceneState,
    ScrollContainer, ScrollDirection, ShiftReason,
};

use crate::pin::PinEngine;

/// Stage-side values a scene computation needs, copied out of the stage so
/// the scene can be borrowed mutably while the stage stays readable.
#[derive(Clone, Copy, Debug)]
pub(crate) struct StageCtx {
    pub container: ScrollContainer,
    pub axis: Axis,
    /// Container size along the scroll axis.
    pub container_size: f64,
    /// Committed scroll position.
    pub scroll_pos: f64,
    pub direction: ScrollDirection,
}

/// The scroll window a scene reacts to, in container scroll coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct Window {
    pub start: f64,
    pub end: f64,
}

/// Result of a progress computation, telling the stage what follow-up the
/// pin engine needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ProgressOutcome {
    /// Nothing moved.
    Unchanged,
    /// Progress changed; events were appended.
    Changed,
    /// Progress held (reverse disabled) but the pinned element must be
    /// repositioned against the new scroll position.
    PinOnly,
}

/// Result of an immediate update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum UpdateAction {
    None,
    /// Reposition the pin.
    PinRefresh,
    /// The scene is disabled but still holds a pinned element in place;
    /// release it where it stands.
    ForceUnpin,
}

pub(crate) struct Scene {
    pub options: SceneOptions,
    /// Pixel duration after resolving percentage/dynamic values.
    pub resolved_duration: f64,
    pub state: SceneState,
    pub progress: f64,
    pub window: Window,
    /// Cached scroll-coordinate position of the trigger element (zero when
    /// no element is configured).
    pub trigger_pos: f64,
    pub enabled: bool,
    pub emitter: EventEmitter,
    pub pin: Option<PinEngine>,
}

impl Scene {
    pub fn new(options: SceneOptions, resolved_duration: f64) -> Self {
        Self {
            options,
            resolved_duration,
            state: SceneState::Before,
            progress: 0.0,
            window: Window::default(),
            trigger_pos: 0.0,
            enabled: true,
            emitter: EventEmitter::new(),
            pin: None,
        }
    }

    /// The scroll position the scene triggers at: the configured offset plus
    /// either the trigger element's position or the hook point within the
    /// container.
    pub fn trigger_position(&self, container_size: f64) -> f64 {
        let base = if self.options.trigger_element.is_some() {
            self.trigger_pos
        } else {
            container_size * self.options.trigger_hook.fraction()
        };
        self.options.offset + base
    }

    /// Recompute the scroll window from the cached trigger position.
    ///
    /// The hook fraction shifts the window only when a trigger element is
    /// set; without one the scene starts at the container origin plus
    /// offset, and the hook only affects where `trigger_position` reports.
    pub fn update_scroll_offset(&mut self, ctx: &StageCtx) {
        let mut start = self.trigger_pos + self.options.offset;
        if self.options.trigger_element.is_some() {
            start -= ctx.container_size * self.options.trigger_hook.fraction();
        }
        self.window = Window {
            start,
            end: start + self.resolved_duration,
        };
    }

    /// Drive the state machine to a new raw progress value.
    ///
    /// `p` may lie outside `[0, 1]`; the window edges are crossed when it
    /// does. With `reverse` disabled, progress only ever moves forward — a
    /// backward scroll through an active window keeps the progress but
    /// still asks for a pin reposition so the element tracks the page.
    pub fn set_progress(
        &mut self,
        p: f64,
        direction: ScrollDirection,
        out: &mut Vec<SceneEvent>,
    ) -> ProgressOutcome {
        let old_state = self.state;
        let reverse_or_forward = self.options.reverse || p >= self.progress;
        let mut changed = false;
        let mut pin_only = false;

        if self.resolved_duration == 0.0 {
            // Threshold trigger: progress is exactly 0 or 1, After is
            // unreachable.
            let new = if p < 1.0 && reverse_or_forward { 0.0 } else { 1.0 };
            self.state = if new == 1.0 {
                SceneState::During
            } else {
                SceneState::Before
            };
            changed = new != self.progress;
            self.progress = new;
        } else if p < 0.0 && self.state != SceneState::Before && reverse_or_forward {
            self.progress = 0.0;
            self.state = SceneState::Before;
            changed = true;
        } else if (0.0..1.0).contains(&p) && reverse_or_forward {
            self.progress = p;
            self.state = SceneState::During;
            changed = true;
        } else if p >= 1.0 && self.state != SceneState::After {
            self.progress = 1.0;
            self.state = SceneState::After;
            changed = true;
        } else if self.state == SceneState::During && !reverse_or_forward {
            pin_only = true;
        }

        if !changed {
            return if pin_only {
                ProgressOutcome::PinOnly
            } else {
                ProgressOutcome::Unchanged
            };
        }

        let info = ProgressInfo {
            progress: self.progress,
            state: self.state,
            direction,
        };
        let state_changed = old_state != self.state;
        if state_changed && old_state != SceneState::During {
            out.push(SceneEvent::Enter(info));
            out.push(if old_state == SceneState::Before {
                SceneEvent::Start(info)
            } else {
                SceneEvent::End(info)
            });
        }
        out.push(SceneEvent::Progress(info));
        if state_changed && self.state != SceneState::During {
            out.push(if self.state == SceneState::Before {
                SceneEvent::Start(info)
            } else {
                SceneEvent::End(info)
            });
            out.push(SceneEvent::Leave(info));
        }
        ProgressOutcome::Changed
    }

    /// Recompute progress from the current scroll position.
    pub fn update_immediate(&mut self, ctx: &StageCtx, out: &mut Vec<SceneEvent>) -> UpdateAction {
        if !self.enabled {
            // A disabled scene must not keep holding an element fixed.
            if self.pin.is_some() && self.state == SceneState::During {
                return UpdateAction::ForceUnpin;
            }
            return UpdateAction::None;
        }
        out.push(SceneEvent::Update {
            start: self.window.start,
            end: self.window.end,
            scroll_pos: ctx.scroll_pos,
        });
        let p = if self.resolved_duration > 0.0 {
            (ctx.scroll_pos - self.window.start) / self.resolved_duration
        } else if ctx.scroll_pos >= self.window.start {
            1.0
        } else {
            0.0
        };
        match self.set_progress(p, ctx.direction, out) {
            // A real change emits Progress, which already reaches the pin;
            // only the silent sticky case needs an explicit reposition.
            ProgressOutcome::PinOnly => UpdateAction::PinRefresh,
            ProgressOutcome::Changed | ProgressOutcome::Unchanged => UpdateAction::None,
        }
    }

    /// Re-resolve a percentage or dynamic duration against the current
    /// container size. Emits `Change(Duration)` and `Shift(Duration)` when
    /// the resolved value moved.
    pub fn refresh_duration(&mut self, container_size: f64, out: &mut Vec<SceneEvent>) {
        if !self.options.duration.needs_refresh() {
            return;
        }
        let new = sanitize_resolved_duration(self.options.duration.resolve(container_size));
        if new != self.resolved_duration {
            self.resolved_duration = new;
            out.push(SceneEvent::Change(OptionField::Duration));
            out.push(SceneEvent::Shift(ShiftReason::Duration));
        }
    }

    /// Re-derive the trigger element's position in container scroll
    /// coordinates. Emits `Shift(TriggerElementPosition)` when it moved
    /// (unless `suppress`), and drops the element with a `Change` when it
    /// left the document.
    pub fn update_trigger_element_position(
        &mut self,
        ctx: &StageCtx,
        host: &dyn DomHost,
        suppress: bool,
        out: &mut Vec<SceneEvent>,
    ) {
        if self.options.trigger_element.is_none() && self.trigger_pos == 0.0 {
            return;
        }
        let mut pos = 0.0;
        if let Some(mut element) = self.options.trigger_element {
            if !host.in_document(element) {
                tracing::warn!("trigger element removed from document, dropping it");
                self.options.trigger_element = None;
                out.push(SceneEvent::Change(OptionField::TriggerElement));
            } else {
                // Measure the spacer when the trigger element is pinned, so
                // the scene tracks the element's in-flow position.
                while host
                    .parent(element)
                    .map(|p| host.is_spacer(p))
                    .unwrap_or(false)
                {
                    match host.parent(element) {
                        Some(p) => element = p,
                        None => break,
                    }
                }
                let mut container_offset = host.container_offset(ctx.container, ctx.axis);
                if !ctx.container.is_document() {
                    container_offset -= host.scroll_position(ctx.container, ctx.axis);
                }
                pos = host.offset(element, OffsetSpace::Document, ctx.axis) - container_offset;
            }
        }
        if pos != self.trigger_pos {
            self.trigger_pos = pos;
            if !suppress {
                out.push(SceneEvent::Shift(ShiftReason::TriggerElementPosition));
            }
        }
    }

    // --- option setters ---
    // Each validates, records the change, and emits Shift for fields that
    // move the scroll window. Routing (window recompute, re-sort,
    // scheduling) happens in the stage.

    pub fn set_duration(
        &mut self,
        duration: crate::options::Duration,
        container_size: f64,
        out: &mut Vec<SceneEvent>,
    ) {
        let duration = crate::options::validate_duration(duration);
        if duration == self.options.duration {
            return;
        }
        self.options.duration = duration;
        self.resolved_duration =
            sanitize_resolved_duration(self.options.duration.resolve(container_size));
        out.push(SceneEvent::Change(OptionField::Duration));
        out.push(SceneEvent::Shift(ShiftReason::Duration));
    }

    pub fn set_offset(&mut self, offset: f64, out: &mut Vec<SceneEvent>) {
        let offset = crate::options::validate_offset(offset);
        if offset == self.options.offset {
            return;
        }
        self.options.offset = offset;
        out.push(SceneEvent::Change(OptionField::Offset));
        out.push(SceneEvent::Shift(ShiftReason::Offset));
    }

    pub fn set_trigger_hook(
        &mut self,
        hook: crate::options::TriggerHook,
        out: &mut Vec<SceneEvent>,
    ) {
        let hook = crate::options::validate_trigger_hook(hook);
        if hook == self.options.trigger_hook {
            return;
        }
        self.options.trigger_hook = hook;
        out.push(SceneEvent::Change(OptionField::TriggerHook));
        out.push(SceneEvent::Shift(ShiftReason::TriggerHook));
    }

    pub fn set_trigger_element(
        &mut self,
        element: Option<scrollcraft_core::NodeHandle>,
        out: &mut Vec<SceneEvent>,
    ) {
        if element == self.options.trigger_element {
            return;
        }
        self.options.trigger_element = element;
        out.push(SceneEvent::Change(OptionField::TriggerElement));
    }

    pub fn set_reverse(&mut self, reverse: bool, out: &mut Vec<SceneEvent>) {
        if reverse == self.options.reverse {
            return;
        }
        self.options.reverse = reverse;
        out.push(SceneEvent::Change(OptionField::Reverse));
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("state", &self.state)
            .field("progress", &self.progress)
            .field("window", &self.window)
            .field("duration", &self.resolved_duration)
            .field("enabled", &self.enabled)
            .field("pinned", &self.pin.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{Duration, TriggerHook};
    use scrollcraft_core::EventKind;

    fn scene(duration: f64, reverse: bool) -> Scene {
        Scene::new(
            SceneOptions {
                duration: Duration::Fixed(duration),
                reverse,
                ..Default::default()
            },
            duration,
        )
    }

    fn kinds(events: &[SceneEvent]) -> Vec<EventKind> {
        events.iter().map(|e| e.kind()).collect()
    }

    #[test]
    fn test_zero_duration_progress_is_exactly_zero_or_one() {
        let mut s = scene(0.0, true);
        let mut out = Vec::new();

        for p in [-0.3, 0.0, 0.4, 0.999] {
            s.set_progress(p, ScrollDirection::Forward, &mut out);
            assert_eq!(s.progress, 0.0, "p = {p}");
            assert_eq!(s.state, SceneState::Before);
        }
        for p in [1.0, 2.5, 100.0] {
            s.set_progress(p, ScrollDirection::Forward, &mut out);
            assert_eq!(s.progress, 1.0, "p = {p}");
            assert_eq!(s.state, SceneState::During);
        }
        // After is unreachable without a duration.
        s.set_progress(50.0, ScrollDirection::Forward, &mut out);
        assert_eq!(s.state, SceneState::During);
    }

    #[test]
    fn test_zero_duration_change_detection_uses_clamped_value() {
        let mut s = scene(0.0, true);
        let mut out = Vec::new();

        assert_eq!(
            s.set_progress(0.4, ScrollDirection::Forward, &mut out),
            ProgressOutcome::Unchanged
        );
        assert!(out.is_empty());

        assert_eq!(
            s.set_progress(1.2, ScrollDirection::Forward, &mut out),
            ProgressOutcome::Changed
        );
        out.clear();
        // Still clamped to 1: different raw value, same progress.
        assert_eq!(
            s.set_progress(3.0, ScrollDirection::Forward, &mut out),
            ProgressOutcome::Unchanged
        );
    }

    #[test]
    fn test_event_order_through_full_traversal() {
        // Walk a 100px scene 0.0 -> 0.5 -> 1.0 -> 1.1 and back below 0.
        let mut s = scene(100.0, true);
        let mut out = Vec::new();

        s.set_progress(0.0, ScrollDirection::Forward, &mut out);
        assert_eq!(
            kinds(&out),
            [EventKind::Enter, EventKind::Start, EventKind::Progress]
        );
        assert_eq!(s.state, SceneState::During);

        out.clear();
        s.set_progress(0.5, ScrollDirection::Forward, &mut out);
        assert_eq!(kinds(&out), [EventKind::Progress]);

        out.clear();
        s.set_progress(1.0, ScrollDirection::Forward, &mut out);
        assert_eq!(
            kinds(&out),
            [EventKind::Progress, EventKind::End, EventKind::Leave]
        );
        assert_eq!(s.state, SceneState::After);

        out.clear();
        // Past the end while already After: nothing.
        s.set_progress(1.1, ScrollDirection::Forward, &mut out);
        assert!(out.is_empty());

        out.clear();
        // Re-entering from past the end.
        s.set_progress(0.5, ScrollDirection::Reverse, &mut out);
        assert_eq!(
            kinds(&out),
            [EventKind::Enter, EventKind::End, EventKind::Progress]
        );

        out.clear();
        // Leaving through the start edge.
        s.set_progress(-0.1, ScrollDirection::Reverse, &mut out);
        assert_eq!(
            kinds(&out),
            [EventKind::Progress, EventKind::Start, EventKind::Leave]
        );
        assert_eq!(s.state, SceneState::Before);
        assert_eq!(s.progress, 0.0);
    }

    #[test]
    fn test_progress_events_carry_snapshot() {
        let mut s = scene(100.0, true);
        let mut out = Vec::new();
        s.set_progress(0.25, ScrollDirection::Forward, &mut out);

        for event in &out {
            let info = event.progress_info().unwrap();
            assert_eq!(info.progress, 0.25);
            assert_eq!(info.state, SceneState::During);
            assert_eq!(info.direction, ScrollDirection::Forward);
        }
    }

    #[test]
    fn test_reverse_disabled_progress_is_sticky() {
        let mut s = scene(100.0, false);
        let mut out = Vec::new();
        s.set_progress(0.7, ScrollDirection::Forward, &mut out);
        assert_eq!(s.progress, 0.7);
        assert_eq!(s.state, SceneState::During);

        out.clear();
        let outcome = s.set_progress(0.3, ScrollDirection::Reverse, &mut out);
        // Progress holds, no events, but the pin must be repositioned.
        assert_eq!(outcome, ProgressOutcome::PinOnly);
        assert_eq!(s.progress, 0.7);
        assert_eq!(s.state, SceneState::During);
        assert!(out.is_empty());

        out.clear();
        // Forward movement resumes normally.
        assert_eq!(
            s.set_progress(0.8, ScrollDirection::Forward, &mut out),
            ProgressOutcome::Changed
        );
        assert_eq!(s.progress, 0.8);
    }

    #[test]
    fn test_window_length_equals_duration() {
        let ctx = StageCtx {
            container: ScrollContainer::Document,
            axis: Axis::Vertical,
            container_size: 800.0,
            scroll_pos: 0.0,
            direction: ScrollDirection::Paused,
        };
        let mut s = scene(250.0, true);
        s.options.offset = 40.0;
        s.update_scroll_offset(&ctx);
        assert_eq!(s.window.start, 40.0);
        assert_eq!(s.window.end - s.window.start, 250.0);

        let mut out = Vec::new();
        s.set_duration(Duration::Fixed(100.0), ctx.container_size, &mut out);
        s.update_scroll_offset(&ctx);
        assert_eq!(s.window.end - s.window.start, 100.0);
        assert_eq!(
            kinds(&out),
            [EventKind::Change, EventKind::Shift]
        );
    }

    #[test]
    fn test_hook_shifts_window_only_with_trigger_element() {
        let ctx = StageCtx {
            container: ScrollContainer::Document,
            axis: Axis::Vertical,
            container_size: 800.0,
            scroll_pos: 0.0,
            direction: ScrollDirection::Paused,
        };
        // No element: hook affects the reported trigger position, not the
        // window start.
        let mut s = scene(100.0, true);
        s.options.trigger_hook = TriggerHook::OnCenter;
        s.update_scroll_offset(&ctx);
        assert_eq!(s.window.start, 0.0);
        assert_eq!(s.trigger_position(ctx.container_size), 400.0);

        // With an element at 600: window starts hook-adjusted.
        s.options.trigger_element = Some(scrollcraft_core::NodeHandle::from_raw(1));
        s.trigger_pos = 600.0;
        s.update_scroll_offset(&ctx);
        assert_eq!(s.window.start, 600.0 - 800.0 * 0.5);
        assert_eq!(s.trigger_position(ctx.container_size), 600.0);
    }

    #[test]
    fn test_immediate_update_emits_update_then_progress() {
        let mut s = scene(100.0, true);
        let ctx = StageCtx {
            container: ScrollContainer::Document,
            axis: Axis::Vertical,
            container_size: 800.0,
            scroll_pos: 50.0,
            direction: ScrollDirection::Forward,
        };
        s.update_scroll_offset(&ctx);
        let mut out = Vec::new();
        let action = s.update_immediate(&ctx, &mut out);
        assert_eq!(action, UpdateAction::None);
        assert_eq!(
            kinds(&out),
            [
                EventKind::Update,
                EventKind::Enter,
                EventKind::Start,
                EventKind::Progress
            ]
        );
        assert_eq!(s.progress, 0.5);
        match out[0] {
            SceneEvent::Update { start, end, scroll_pos } => {
                assert_eq!(start, 0.0);
                assert_eq!(end, 100.0);
                assert_eq!(scroll_pos, 50.0);
            }
            _ => panic!("first event must be Update"),
        }
    }

    #[test]
    fn test_sticky_progress_still_requests_pin_refresh() {
        let mut s = scene(100.0, false);
        let mut ctx = StageCtx {
            container: ScrollContainer::Document,
            axis: Axis::Vertical,
            container_size: 800.0,
            scroll_pos: 70.0,
            direction: ScrollDirection::Forward,
        };
        s.update_scroll_offset(&ctx);
        let mut out = Vec::new();
        s.update_immediate(&ctx, &mut out);
        assert_eq!(s.progress, 0.7);

        // Scrolling back: progress holds but the pinned element must be
        // repositioned against the new scroll position.
        ctx.scroll_pos = 30.0;
        ctx.direction = ScrollDirection::Reverse;
        out.clear();
        assert_eq!(s.update_immediate(&ctx, &mut out), UpdateAction::PinRefresh);
        assert_eq!(s.progress, 0.7);
        assert_eq!(kinds(&out), [EventKind::Update]);
    }

    #[test]
    fn test_disabled_scene_skips_updates() {
        let mut s = scene(100.0, true);
        s.enabled = false;
        let ctx = StageCtx {
            container: ScrollContainer::Document,
            axis: Axis::Vertical,
            container_size: 800.0,
            scroll_pos: 50.0,
            direction: ScrollDirection::Forward,
        };
        let mut out = Vec::new();
        assert_eq!(s.update_immediate(&ctx, &mut out), UpdateAction::None);
        assert!(out.is_empty());
        assert_eq!(s.progress, 0.0);
    }

    #[test]
    fn test_percentage_duration_refresh() {
        let mut s = Scene::new(
            SceneOptions {
                duration: Duration::Percent(50.0),
                ..Default::default()
            },
            500.0,
        );
        let mut out = Vec::new();

        // Same container size: no change, no events.
        s.refresh_duration(1000.0, &mut out);
        assert!(out.is_empty());
        assert_eq!(s.resolved_duration, 500.0);

        // Container grew: re-resolve and announce the moved window.
        s.refresh_duration(1200.0, &mut out);
        assert_eq!(s.resolved_duration, 600.0);
        assert_eq!(
            out,
            [
                SceneEvent::Change(OptionField::Duration),
                SceneEvent::Shift(ShiftReason::Duration)
            ]
        );
    }
}
