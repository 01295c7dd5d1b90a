//! Pin/spacer engine
//!
//! Pinning holds an element visually still while its scene is active. The
//! engine wraps the element in a generated spacer that preserves the
//! document flow, then toggles the element between its natural positioning
//! and `position: fixed` as the scene enters and leaves its window.
//!
//! The pin target is always the spacer's first child rather than the pinned
//! element itself: when a pinned element is pinned again by a second scene
//! the spacers nest, and the outer scene must move the inner spacer as a
//! unit.
//!
//! All geometry goes through [`DomHost`]; the engine holds no document
//! state beyond the node handles and the inline-style snapshot it restores
//! on teardown.

use crate::options::PinSettings;
use scrollcraft_core::{
    Axis, BoxSizing, CssPosition, DomHost, NodeHandle, OffsetSpace, SceneState, SizeMode,
    StyleProperty, StyleSnapshot, StyleValue,
};

const BOUNDS_PROPS: [StyleProperty; 8] = [
    StyleProperty::Top,
    StyleProperty::Left,
    StyleProperty::Bottom,
    StyleProperty::Right,
    StyleProperty::MarginTop,
    StyleProperty::MarginRight,
    StyleProperty::MarginBottom,
    StyleProperty::MarginLeft,
];

const MARGIN_PROPS: [StyleProperty; 4] = [
    StyleProperty::MarginTop,
    StyleProperty::MarginRight,
    StyleProperty::MarginBottom,
    StyleProperty::MarginLeft,
];

/// Scene- and stage-side values a pin computation needs, copied out by the
/// stage before calling in.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PinContext {
    pub axis: Axis,
    pub state: SceneState,
    pub progress: f64,
    pub duration: f64,
    pub window_start: f64,
    pub reverse: bool,
    pub scroll_pos: f64,
}

#[derive(Debug)]
pub(crate) struct PinEngine {
    element: NodeHandle,
    spacer: NodeHandle,
    /// Whether the element participates in document flow (not absolutely
    /// positioned).
    in_flow: bool,
    push_followers: bool,
    /// Element width is declared as a percentage.
    rel_width: bool,
    /// Element height is declared as a percentage.
    rel_height: bool,
    /// Block element with auto width: spans the full line, so the spacer
    /// must too.
    auto_full_width: bool,
    /// Inline styles as they were before pinning, restored on teardown.
    snapshot: StyleSnapshot,
}

impl PinEngine {
    /// Wrap `element` in a spacer and prepare it for pinning.
    ///
    /// Returns `None` (with an error log) when the element cannot be
    /// pinned: fixed-position elements scroll with nothing, and detached
    /// elements have no flow position to preserve.
    pub fn install(
        host: &mut dyn DomHost,
        element: NodeHandle,
        settings: &PinSettings,
        duration: f64,
    ) -> Option<Self> {
        if !host.in_document(element) {
            tracing::error!("cannot pin an element that is not in the document");
            return None;
        }
        if host.computed_position(element) == CssPosition::Fixed {
            tracing::error!("cannot pin a fixed-position element");
            return None;
        }

        let in_flow = host.computed_position(element) != CssPosition::Absolute;
        let mut push_followers = settings.push_followers.unwrap_or(true);
        if push_followers && !in_flow {
            tracing::warn!("disabling push_followers: absolutely positioned elements push nothing");
            push_followers = false;
        }
        if duration == 0.0 && settings.push_followers == Some(true) {
            tracing::warn!("push_followers has no effect on a zero-duration scene");
        }

        let declared_width = host.declared_size(element, Axis::Horizontal);
        let declared_height = host.declared_size(element, Axis::Vertical);
        let rel_width = declared_width.is_percent();
        let rel_height = declared_height.is_percent();
        let auto_full_width =
            declared_width == StyleValue::Auto && in_flow && host.collapses_margins(element);

        // Captured before any style writes so teardown restores exactly the
        // author's inline state.
        let snapshot = host.snapshot_inline(element);

        let spacer = host.insert_spacer_before(element, &settings.spacer_class);
        for prop in BOUNDS_PROPS {
            let value = host.style(element, prop);
            host.set_style(spacer, prop, value);
        }
        host.set_position(
            spacer,
            if in_flow {
                CssPosition::Relative
            } else {
                CssPosition::Absolute
            },
        );
        host.set_box_sizing(spacer, BoxSizing::ContentBox);
        if !in_flow {
            // Out-of-flow spacers take no size from content; freeze the
            // element's current box.
            let w = host.size(element, Axis::Horizontal, SizeMode::Outer);
            let h = host.size(element, Axis::Vertical, SizeMode::Outer);
            host.set_style(spacer, StyleProperty::Width, StyleValue::Px(w));
            host.set_style(spacer, StyleProperty::Height, StyleValue::Px(h));
        }
        if rel_width {
            host.set_style(spacer, StyleProperty::Width, declared_width);
        }
        if rel_height {
            host.set_style(spacer, StyleProperty::Height, declared_height);
        }

        host.reparent(element, spacer);
        host.set_position(
            element,
            if in_flow {
                CssPosition::Relative
            } else {
                CssPosition::Absolute
            },
        );
        for prop in BOUNDS_PROPS {
            host.set_style(element, prop, StyleValue::Auto);
        }
        if rel_width || auto_full_width {
            // Percentage sizing now resolves against the spacer; include
            // borders/padding so the box does not grow.
            host.set_box_sizing(element, BoxSizing::BorderBox);
        }

        tracing::debug!(in_flow, push_followers, "pin installed");
        Some(Self {
            element,
            spacer,
            in_flow,
            push_followers,
            rel_width,
            rel_height,
            auto_full_width,
            snapshot,
        })
    }

    pub fn element(&self) -> NodeHandle {
        self.element
    }

    pub fn spacer(&self) -> NodeHandle {
        self.spacer
    }

    fn pin_target(&self, host: &dyn DomHost) -> NodeHandle {
        host.first_child(self.spacer).unwrap_or(self.element)
    }

    /// Move the pin target into or out of the fixed state for the current
    /// scroll position.
    pub fn update_state(&self, ctx: &PinContext, host: &mut dyn DomHost, force_unpin: bool) {
        let pin_target = self.pin_target(host);
        if ctx.state == SceneState::During && !force_unpin {
            if host.computed_position(pin_target) != CssPosition::Fixed {
                host.set_position(pin_target, CssPosition::Fixed);
                self.update_dimensions(ctx, host);
            }
            let spacer_lead = host.offset(self.spacer, OffsetSpace::Viewport, ctx.axis);
            let spacer_cross = host.offset(self.spacer, OffsetSpace::Viewport, ctx.axis.cross());
            // With reverse enabled the element tracks the scroll position
            // exactly; without it progress may lag the scroll, so the
            // committed progress decides (rounded to avoid jitter).
            let scroll_distance = if ctx.reverse || ctx.duration == 0.0 {
                ctx.scroll_pos - ctx.window_start
            } else {
                (ctx.progress * ctx.duration * 10.0).round() / 10.0
            };
            host.set_style(
                pin_target,
                ctx.axis.leading_edge(),
                StyleValue::Px(spacer_lead + scroll_distance),
            );
            host.set_style(
                pin_target,
                ctx.axis.cross().leading_edge(),
                StyleValue::Px(spacer_cross),
            );
        } else {
            let new_position = if self.in_flow {
                CssPosition::Relative
            } else {
                CssPosition::Absolute
            };
            let mut change = host.computed_position(pin_target) != new_position;
            host.set_position(pin_target, new_position);
            host.set_style(pin_target, ctx.axis.leading_edge(), StyleValue::Px(0.0));
            host.set_style(
                pin_target,
                ctx.axis.cross().leading_edge(),
                StyleValue::Px(0.0),
            );
            if !self.push_followers {
                // Without followers the spacer keeps no room; park the
                // element at its travelled distance.
                host.set_style(
                    pin_target,
                    ctx.axis.leading_edge(),
                    StyleValue::Px(ctx.duration * ctx.progress),
                );
            } else if ctx.duration > 0.0 {
                // Settled past an edge but the spacer padding still holds
                // the mid-scene value: dimensions are stale.
                let leading = host.style(self.spacer, ctx.axis.leading_padding()).px_or_zero();
                let trailing = host
                    .style(self.spacer, ctx.axis.trailing_padding())
                    .px_or_zero();
                if (ctx.state == SceneState::After && leading == 0.0)
                    || (ctx.state == SceneState::Before && trailing == 0.0)
                {
                    change = true;
                }
            }
            if change {
                self.update_dimensions(ctx, host);
            }
        }
    }

    /// Recompute spacer and element sizing for the current progress.
    ///
    /// Only in-flow pins reserve space; out-of-flow spacers were frozen at
    /// install time.
    pub fn update_dimensions(&self, ctx: &PinContext, host: &mut dyn DomHost) {
        if !self.in_flow {
            return;
        }
        let during = ctx.state == SceneState::During;
        let vertical = ctx.axis == Axis::Vertical;
        let pin_target = self.pin_target(host);

        if self.rel_width || self.auto_full_width {
            if during {
                let w = host.size(self.spacer, Axis::Horizontal, SizeMode::Inner);
                host.set_style(self.element, StyleProperty::Width, StyleValue::Px(w));
            } else {
                host.set_style(self.element, StyleProperty::Width, StyleValue::Percent(100.0));
            }
        } else {
            // Cross-axis pins measure the target (which may be a nested
            // spacer); scroll-axis pins measure the element itself.
            let subject = if vertical { self.element } else { pin_target };
            let min_width = host.size(subject, Axis::Horizontal, SizeMode::OuterWithMargin);
            host.set_style(self.spacer, StyleProperty::MinWidth, StyleValue::Px(min_width));
            host.set_style(
                self.spacer,
                StyleProperty::Width,
                if during {
                    StyleValue::Px(min_width)
                } else {
                    StyleValue::Auto
                },
            );
        }

        if self.rel_height {
            if during {
                let spacer_h = host.size(self.spacer, Axis::Vertical, SizeMode::Inner);
                let reserved = if self.push_followers { ctx.duration } else { 0.0 };
                host.set_style(
                    self.element,
                    StyleProperty::Height,
                    StyleValue::Px(spacer_h - reserved),
                );
            } else {
                host.set_style(self.element, StyleProperty::Height, StyleValue::Percent(100.0));
            }
        } else {
            let subject = if vertical { pin_target } else { self.element };
            let mode = if host.collapses_margins(self.spacer) {
                SizeMode::Outer
            } else {
                SizeMode::OuterWithMargin
            };
            let min_height = host.size(subject, Axis::Vertical, mode);
            host.set_style(
                self.spacer,
                StyleProperty::MinHeight,
                StyleValue::Px(min_height),
            );
            host.set_style(
                self.spacer,
                StyleProperty::Height,
                if during {
                    StyleValue::Px(min_height)
                } else {
                    StyleValue::Auto
                },
            );
        }

        if self.push_followers {
            host.set_style(
                self.spacer,
                ctx.axis.leading_padding(),
                StyleValue::Px(ctx.duration * ctx.progress),
            );
            host.set_style(
                self.spacer,
                ctx.axis.trailing_padding(),
                StyleValue::Px(ctx.duration * (1.0 - ctx.progress)),
            );
        }
    }

    /// Whether a window resize invalidated a relatively-sized spacer.
    pub fn needs_relative_resize(&self, host: &dyn DomHost) -> bool {
        let Some(parent) = host.parent(self.spacer) else {
            return false;
        };
        ((self.rel_width || self.auto_full_width)
            && host.viewport_size(Axis::Horizontal)
                != host.size(parent, Axis::Horizontal, SizeMode::Inner))
            || (self.rel_height
                && host.viewport_size(Axis::Vertical)
                    != host.size(parent, Axis::Vertical, SizeMode::Inner))
    }

    /// Tear the pin down.
    ///
    /// With `restore` the spacer is removed and the element's inline styles
    /// are put back; without it the element merely settles in place (used
    /// when the scene stays attached and may pin again). The caller settles
    /// an active pin via `update_state(.., true)` first.
    pub fn remove(self, host: &mut dyn DomHost, restore: bool) {
        if !restore {
            return;
        }
        let pin_target = self.pin_target(host);
        if pin_target != self.element && host.is_spacer(pin_target) {
            // Cascaded pin: the outer spacer's margins belong to the inner
            // spacer once the outer one goes away.
            for prop in MARGIN_PROPS {
                let value = host.style(self.spacer, prop);
                host.set_style(pin_target, prop, value);
            }
        }
        host.insert_before(pin_target, self.spacer);
        host.remove_node(self.spacer);
        let inside_spacer = host
            .parent(self.element)
            .map(|p| host.is_spacer(p))
            .unwrap_or(false);
        if !inside_spacer {
            host.restore_inline(self.element, &self.snapshot);
        }
        tracing::debug!("pin removed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{PinSettings, SceneOptions};
    use crate::stage::{ContainerEvent, SceneHandle, StageHandle, StageOptions};
    use scrollcraft_core::{HeadlessDom, ScrollContainer, SharedHost};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Fixture {
        dom: Rc<RefCell<HeadlessDom>>,
        stage: StageHandle,
        parent: NodeHandle,
        element: NodeHandle,
    }

    /// Enable runtime traces via `RUST_LOG` when debugging a test.
    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    /// An 800px viewport with a 100x300 block at document offset 200 inside
    /// a plain parent.
    fn fixture(options: SceneOptions) -> (Fixture, SceneHandle) {
        init_tracing();
        let dom = Rc::new(RefCell::new(HeadlessDom::new()));
        let (parent, element) = {
            let mut d = dom.borrow_mut();
            let parent = d.add_node(None);
            let element = d.add_node(Some(parent));
            d.set_doc_offset(element, Axis::Vertical, 200.0);
            d.set_size(element, Axis::Vertical, 100.0);
            d.set_size(element, Axis::Horizontal, 300.0);
            (parent, element)
        };
        let host: SharedHost = dom.clone();
        let stage = StageHandle::new(host, StageOptions::default()).unwrap();
        let scene = stage.add_scene(options);
        stage.run_frame();
        (
            Fixture {
                dom,
                stage,
                parent,
                element,
            },
            scene,
        )
    }

    fn window_scene() -> SceneOptions {
        SceneOptions {
            offset: 150.0,
            duration: 100.0.into(),
            ..Default::default()
        }
    }

    fn scroll(f: &Fixture, pos: f64) {
        f.dom
            .borrow_mut()
            .scroll_to(ScrollContainer::Document, Axis::Vertical, pos);
        f.stage.handle_container_event(ContainerEvent::Scroll);
        f.stage.run_frame();
    }

    #[test]
    fn test_pin_wraps_element_in_single_spacer() {
        let (f, scene) = fixture(window_scene());
        scene.set_pin(f.element, PinSettings::default());
        let spacer = scene.pin_spacer().unwrap();
        {
            let d = f.dom.borrow();
            assert!(d.is_spacer(spacer));
            assert_eq!(d.class_of(spacer), Some("scrollcraft-pin-spacer"));
            assert_eq!(d.children_of(f.parent), vec![spacer]);
            assert_eq!(d.first_child(spacer), Some(f.element));
            assert_eq!(d.spacer_count(), 1);
        }

        // Pinning the same element again is a no-op.
        scene.set_pin(f.element, PinSettings::default());
        scene.set_pin(f.element, PinSettings::default());
        assert_eq!(f.dom.borrow().spacer_count(), 1);
        assert_eq!(scene.pin_spacer(), Some(spacer));
    }

    #[test]
    fn test_pin_fixes_element_inside_window() {
        let (f, scene) = fixture(window_scene());
        scene.set_pin(f.element, PinSettings::default());
        let spacer = scene.pin_spacer().unwrap();

        scroll(&f, 200.0); // halfway through the 150..250 window
        assert_eq!(scene.progress(), 0.5);
        let d = f.dom.borrow();
        assert_eq!(d.inline_position(f.element), Some(CssPosition::Fixed));
        // Spacer viewport offset (200 - 200) plus 50px into the window.
        assert_eq!(
            d.inline_style(f.element, StyleProperty::Top),
            Some(StyleValue::Px(50.0))
        );
        assert_eq!(
            d.inline_style(f.element, StyleProperty::Left),
            Some(StyleValue::Px(0.0))
        );
        // push_followers splits the duration across the spacer paddings.
        assert_eq!(
            d.inline_style(spacer, StyleProperty::PaddingTop),
            Some(StyleValue::Px(50.0))
        );
        assert_eq!(
            d.inline_style(spacer, StyleProperty::PaddingBottom),
            Some(StyleValue::Px(50.0))
        );
    }

    #[test]
    fn test_pin_releases_after_window_and_restores_on_removal() {
        let (f, scene) = fixture(window_scene());
        f.dom
            .borrow_mut()
            .set_style(f.element, StyleProperty::MarginTop, StyleValue::Px(7.0));
        scene.set_pin(f.element, PinSettings::default());
        let spacer = scene.pin_spacer().unwrap();

        scroll(&f, 200.0);
        scroll(&f, 300.0); // past the window
        {
            let d = f.dom.borrow();
            assert_eq!(d.inline_position(f.element), Some(CssPosition::Relative));
            assert_eq!(
                d.inline_style(f.element, StyleProperty::Top),
                Some(StyleValue::Px(0.0))
            );
            // Settled: all reserved space sits before the element.
            assert_eq!(
                d.inline_style(spacer, StyleProperty::PaddingTop),
                Some(StyleValue::Px(100.0))
            );
            assert_eq!(
                d.inline_style(spacer, StyleProperty::PaddingBottom),
                Some(StyleValue::Px(0.0))
            );
        }

        scene.remove_pin(true);
        let d = f.dom.borrow();
        assert_eq!(d.spacer_count(), 0);
        assert_eq!(d.children_of(f.parent), vec![f.element]);
        assert_eq!(d.inline_position(f.element), None);
        assert_eq!(
            d.inline_style(f.element, StyleProperty::MarginTop),
            Some(StyleValue::Px(7.0))
        );
        assert_eq!(d.inline_style(f.element, StyleProperty::Top), None);
    }

    #[test]
    fn test_pin_rejects_fixed_position_elements() {
        let (f, scene) = fixture(window_scene());
        f.dom
            .borrow_mut()
            .set_base_position(f.element, CssPosition::Fixed);
        scene.set_pin(f.element, PinSettings::default());
        assert_eq!(scene.pin_spacer(), None);
        assert_eq!(f.dom.borrow().spacer_count(), 0);
    }

    #[test]
    fn test_absolute_element_disables_push_followers() {
        let (f, scene) = fixture(window_scene());
        f.dom
            .borrow_mut()
            .set_base_position(f.element, CssPosition::Absolute);
        scene.set_pin(
            f.element,
            PinSettings {
                push_followers: Some(true),
                ..Default::default()
            },
        );
        let spacer = scene.pin_spacer().unwrap();
        {
            let d = f.dom.borrow();
            // Out-of-flow spacer takes no size from content: frozen box.
            assert_eq!(d.inline_position(spacer), Some(CssPosition::Absolute));
            assert_eq!(
                d.inline_style(spacer, StyleProperty::Width),
                Some(StyleValue::Px(300.0))
            );
            assert_eq!(
                d.inline_style(spacer, StyleProperty::Height),
                Some(StyleValue::Px(100.0))
            );
            // push_followers was force-disabled.
            assert_eq!(d.inline_style(spacer, StyleProperty::PaddingTop), None);
        }

        scroll(&f, 250.0);
        scroll(&f, 300.0);
        // Released past the window: absolute positioning plus full travel.
        let d = f.dom.borrow();
        assert_eq!(d.inline_position(f.element), Some(CssPosition::Absolute));
        assert_eq!(
            d.inline_style(f.element, StyleProperty::Top),
            Some(StyleValue::Px(100.0))
        );
    }

    #[test]
    fn test_reverse_disabled_pin_tracks_backward_scroll() {
        let (f, scene) = fixture(SceneOptions {
            reverse: false,
            ..window_scene()
        });
        scene.set_pin(f.element, PinSettings::default());

        scroll(&f, 220.0);
        assert_eq!(scene.progress(), 0.7);
        assert_eq!(
            f.dom.borrow().inline_style(f.element, StyleProperty::Top),
            // Spacer viewport offset (200 - 220) + committed 70px travel.
            Some(StyleValue::Px(50.0))
        );

        scroll(&f, 180.0);
        // Progress is sticky, but the fixed element follows the page.
        assert_eq!(scene.progress(), 0.7);
        assert_eq!(scene.state(), SceneState::During);
        assert_eq!(
            f.dom.borrow().inline_style(f.element, StyleProperty::Top),
            // Spacer viewport offset (200 - 180) + committed 70px travel.
            Some(StyleValue::Px(90.0))
        );
    }

    #[test]
    fn test_relative_width_transfers_to_the_pinned_element() {
        let (f, scene) = fixture(window_scene());
        {
            let mut d = f.dom.borrow_mut();
            d.set_size(f.parent, Axis::Horizontal, 400.0);
            d.set_declared_size(f.element, Axis::Horizontal, StyleValue::Percent(100.0));
        }
        scene.set_pin(f.element, PinSettings::default());
        let spacer = scene.pin_spacer().unwrap();
        {
            let d = f.dom.borrow();
            // The spacer takes over the percentage sizing.
            assert_eq!(
                d.inline_style(spacer, StyleProperty::Width),
                Some(StyleValue::Percent(100.0))
            );
            assert_eq!(d.inline_box_sizing(f.element), Some(BoxSizing::BorderBox));
        }

        scroll(&f, 200.0);
        // Fixed elements resolve percentages against the viewport, so the
        // spacer's resolved width is frozen onto the element.
        assert_eq!(
            f.dom.borrow().inline_style(f.element, StyleProperty::Width),
            Some(StyleValue::Px(400.0))
        );

        // The parent grew while pinned: a window resize re-derives it.
        f.dom.borrow_mut().set_size(f.parent, Axis::Horizontal, 500.0);
        f.stage.handle_document_event(ContainerEvent::Resize);
        assert_eq!(
            f.dom.borrow().inline_style(f.element, StyleProperty::Width),
            Some(StyleValue::Px(500.0))
        );

        scroll(&f, 300.0);
        // Released: back to tracking the spacer relatively.
        assert_eq!(
            f.dom.borrow().inline_style(f.element, StyleProperty::Width),
            Some(StyleValue::Percent(100.0))
        );
    }

    #[test]
    fn test_relative_height_subtracts_the_push_reservation() {
        let (f, scene) = fixture(window_scene());
        {
            let mut d = f.dom.borrow_mut();
            d.set_size(f.parent, Axis::Vertical, 600.0);
            d.set_declared_size(f.element, Axis::Vertical, StyleValue::Percent(100.0));
        }
        scene.set_pin(f.element, PinSettings::default());
        let spacer = scene.pin_spacer().unwrap();
        assert_eq!(
            f.dom.borrow().inline_style(spacer, StyleProperty::Height),
            Some(StyleValue::Percent(100.0))
        );

        scroll(&f, 200.0);
        // The spacer resolves to the parent's 600px; the scroll distance
        // reserved for followers comes out of the element.
        assert_eq!(
            f.dom.borrow().inline_style(f.element, StyleProperty::Height),
            Some(StyleValue::Px(500.0))
        );

        scroll(&f, 300.0);
        assert_eq!(
            f.dom.borrow().inline_style(f.element, StyleProperty::Height),
            Some(StyleValue::Percent(100.0))
        );
    }

    #[test]
    fn test_fixed_width_element_reserves_min_width_on_the_spacer() {
        let (f, scene) = fixture(window_scene());
        f.dom
            .borrow_mut()
            .set_declared_size(f.element, Axis::Horizontal, StyleValue::Px(300.0));
        scene.set_pin(f.element, PinSettings::default());
        let spacer = scene.pin_spacer().unwrap();
        {
            let mut d = f.dom.borrow_mut();
            // A non-collapsing spacer must reserve the element's margins.
            d.set_collapses_margins(spacer, false);
            d.set_style(f.element, StyleProperty::MarginBottom, StyleValue::Px(10.0));
        }

        scroll(&f, 200.0);
        {
            let d = f.dom.borrow();
            assert_eq!(
                d.inline_style(spacer, StyleProperty::MinWidth),
                Some(StyleValue::Px(300.0))
            );
            assert_eq!(
                d.inline_style(spacer, StyleProperty::Width),
                Some(StyleValue::Px(300.0))
            );
            assert_eq!(
                d.inline_style(spacer, StyleProperty::MinHeight),
                Some(StyleValue::Px(110.0))
            );
            // No sizing transfer for a fixed-size element.
            assert_eq!(d.inline_style(f.element, StyleProperty::Width), None);
            assert_eq!(d.inline_box_sizing(f.element), None);
        }

        scroll(&f, 300.0);
        // Released: the spacer width floats again, the minimum stays.
        assert_eq!(
            f.dom.borrow().inline_style(spacer, StyleProperty::Width),
            Some(StyleValue::Auto)
        );
    }

    #[test]
    fn test_document_scroll_repositions_pins_in_a_nested_container() {
        init_tracing();
        let dom = Rc::new(RefCell::new(HeadlessDom::new()));
        let (pane, element) = {
            let mut d = dom.borrow_mut();
            let pane = d.add_node(None);
            d.set_size(pane, Axis::Vertical, 400.0);
            d.set_doc_offset(pane, Axis::Vertical, 100.0);
            let element = d.add_node(Some(pane));
            d.set_doc_offset(element, Axis::Vertical, 130.0);
            d.set_size(element, Axis::Vertical, 50.0);
            (pane, element)
        };
        let host: SharedHost = dom.clone();
        let stage = StageHandle::new(
            host,
            StageOptions {
                container: ScrollContainer::Element(pane),
                ..Default::default()
            },
        )
        .unwrap();
        let scene = stage.add_scene(SceneOptions {
            offset: 100.0,
            duration: 100.0.into(),
            ..Default::default()
        });
        scene.set_pin(element, PinSettings::default());

        dom.borrow_mut()
            .scroll_to(ScrollContainer::Element(pane), Axis::Vertical, 150.0);
        stage.handle_container_event(ContainerEvent::Scroll);
        stage.run_frame();
        assert_eq!(scene.progress(), 0.5);
        assert_eq!(
            dom.borrow().inline_style(element, StyleProperty::Top),
            // Spacer viewport offset (130) plus 50px into the window.
            Some(StyleValue::Px(180.0))
        );

        // The page scrolls under the nested container: the fixed element
        // follows even though the container's own scroll did not change.
        dom.borrow_mut()
            .scroll_to(ScrollContainer::Document, Axis::Vertical, 40.0);
        stage.handle_document_event(ContainerEvent::Scroll);
        assert_eq!(scene.progress(), 0.5);
        assert_eq!(
            dom.borrow().inline_style(element, StyleProperty::Top),
            Some(StyleValue::Px(140.0))
        );
    }

    #[test]
    fn test_cascaded_pin_removal_migrates_margins() {
        let (f, scene_a) = fixture(window_scene());
        let scene_b = f.stage.add_scene(SceneOptions {
            offset: 400.0,
            duration: 50.0.into(),
            ..Default::default()
        });

        scene_a.set_pin(f.element, PinSettings::default());
        let spacer_a = scene_a.pin_spacer().unwrap();
        f.dom
            .borrow_mut()
            .set_style(spacer_a, StyleProperty::MarginTop, StyleValue::Px(11.0));

        scene_b.set_pin(f.element, PinSettings::default());
        let spacer_b = scene_b.pin_spacer().unwrap();
        {
            let d = f.dom.borrow();
            assert_eq!(d.first_child(spacer_a), Some(spacer_b));
            assert_eq!(d.first_child(spacer_b), Some(f.element));
            assert_eq!(d.spacer_count(), 2);
        }

        scene_a.remove_pin(true);
        let d = f.dom.borrow();
        assert_eq!(d.spacer_count(), 1);
        assert_eq!(
            d.inline_style(spacer_b, StyleProperty::MarginTop),
            Some(StyleValue::Px(11.0))
        );
        // The element stays wrapped by the surviving pin.
        assert_eq!(d.children_of(f.parent), vec![spacer_b]);
        assert_eq!(d.inline_position(f.element), Some(CssPosition::Relative));
    }

    #[test]
    fn test_disabling_a_scene_releases_its_pin() {
        let (f, scene) = fixture(window_scene());
        scene.set_pin(f.element, PinSettings::default());
        scroll(&f, 200.0);
        assert_eq!(
            f.dom.borrow().inline_position(f.element),
            Some(CssPosition::Fixed)
        );

        scene.set_enabled(false);
        assert_eq!(
            f.dom.borrow().inline_position(f.element),
            Some(CssPosition::Relative)
        );
    }

    #[test]
    fn test_replacing_the_pinned_element_tears_down_the_old_pin() {
        let (f, scene) = fixture(window_scene());
        let other = {
            let mut d = f.dom.borrow_mut();
            let other = d.add_node(Some(f.parent));
            d.set_doc_offset(other, Axis::Vertical, 320.0);
            d.set_size(other, Axis::Vertical, 60.0);
            other
        };
        scene.set_pin(f.element, PinSettings::default());
        scene.set_pin(other, PinSettings::default());

        let d = f.dom.borrow();
        assert_eq!(d.spacer_count(), 1);
        assert_eq!(d.first_child(scene.pin_spacer().unwrap()), Some(other));
        // The first element is back in flow with its styles restored.
        assert_eq!(d.inline_position(f.element), None);
    }
}
