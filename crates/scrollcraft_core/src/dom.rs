//! Host geometry capability
//!
//! The runtime never touches a document directly. Every geometry read
//! (offsets, sizes, computed styles, scroll positions) and every geometry
//! write (style mutation, spacer insertion, reparenting) goes through the
//! [`DomHost`] trait, which the embedding host implements over its actual
//! page model. The [`HeadlessDom`](crate::headless::HeadlessDom) implements
//! the same trait over an in-memory node arena for tests.
//!
//! # Contract
//!
//! `DomHost` implementations must not call back into the runtime from inside
//! a trait method: the runtime may hold its own state borrowed while a host
//! method runs. Host methods are expected to be synchronous and cheap.

use std::cell::RefCell;
use std::rc::Rc;

/// The tracked scroll axis.
///
/// Offsets, sizes and paddings are frequently queried "along the scroll
/// axis"; the helpers on this type map an axis to the style properties that
/// matter for it so the engines stay axis-generic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Track vertical scrolling (top offsets, heights).
    Vertical,
    /// Track horizontal scrolling (left offsets, widths).
    Horizontal,
}

impl Axis {
    /// The other axis.
    pub fn cross(self) -> Axis {
        match self {
            Axis::Vertical => Axis::Horizontal,
            Axis::Horizontal => Axis::Vertical,
        }
    }

    /// The box edge a fixed-position offset is written to on this axis.
    pub fn leading_edge(self) -> StyleProperty {
        match self {
            Axis::Vertical => StyleProperty::Top,
            Axis::Horizontal => StyleProperty::Left,
        }
    }

    /// Spacer padding on the side already scrolled past.
    pub fn leading_padding(self) -> StyleProperty {
        match self {
            Axis::Vertical => StyleProperty::PaddingTop,
            Axis::Horizontal => StyleProperty::PaddingLeft,
        }
    }

    /// Spacer padding on the side still to come.
    pub fn trailing_padding(self) -> StyleProperty {
        match self {
            Axis::Vertical => StyleProperty::PaddingBottom,
            Axis::Horizontal => StyleProperty::PaddingRight,
        }
    }
}

/// Opaque handle to a host document node.
///
/// Handles are minted by the host; the runtime only stores and compares
/// them. The raw value is host-defined (the headless host packs a slotmap
/// key into it).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeHandle(u64);

impl NodeHandle {
    /// Construct from a raw host-defined value.
    pub fn from_raw(raw: u64) -> Self {
        NodeHandle(raw)
    }

    /// The raw host-defined value.
    pub fn to_raw(self) -> u64 {
        self.0
    }
}

/// The scroll container a stage tracks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScrollContainer {
    /// The document root (window scrolling).
    Document,
    /// A nested scrollable element.
    Element(NodeHandle),
}

impl ScrollContainer {
    /// Whether this container is the document root.
    pub fn is_document(self) -> bool {
        matches!(self, ScrollContainer::Document)
    }
}

/// Computed positioning scheme of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CssPosition {
    Static,
    Relative,
    Absolute,
    Fixed,
}

/// Box sizing scheme.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoxSizing {
    ContentBox,
    BorderBox,
}

/// Style properties the runtime reads and writes.
///
/// This is deliberately the minimal vocabulary the pin/spacer engine needs,
/// not a general CSS model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StyleProperty {
    Top,
    Left,
    Bottom,
    Right,
    MarginTop,
    MarginRight,
    MarginBottom,
    MarginLeft,
    Width,
    Height,
    MinWidth,
    MinHeight,
    PaddingTop,
    PaddingRight,
    PaddingBottom,
    PaddingLeft,
}

/// A length value for a style property.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StyleValue {
    /// Absolute pixels.
    Px(f64),
    /// Percentage of the containing box.
    Percent(f64),
    /// No explicit value; the host's layout decides.
    Auto,
}

impl StyleValue {
    /// Pixel magnitude, treating `Percent` and `Auto` as zero.
    pub fn px_or_zero(self) -> f64 {
        match self {
            StyleValue::Px(v) => v,
            StyleValue::Percent(_) | StyleValue::Auto => 0.0,
        }
    }

    /// Whether this is a percentage value.
    pub fn is_percent(self) -> bool {
        matches!(self, StyleValue::Percent(_))
    }
}

/// Coordinate space for [`DomHost::offset`] queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OffsetSpace {
    /// Relative to the document origin.
    Document,
    /// Relative to the visual viewport (what `position: fixed` positions
    /// against).
    Viewport,
}

/// Which box a [`DomHost::size`] query measures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SizeMode {
    /// Content box only.
    Inner,
    /// Border box.
    Outer,
    /// Border box plus margins.
    OuterWithMargin,
}

/// Inline style state captured before pinning and restored on unpin.
///
/// Hosts fill this from the element's *inline* styles (not computed values)
/// so restoring puts back exactly what the page author wrote, including the
/// absence of a value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StyleSnapshot {
    /// Inline `position`, if one was set.
    pub position: Option<CssPosition>,
    /// Inline `box-sizing`, if one was set.
    pub box_sizing: Option<BoxSizing>,
    /// Inline values for the properties the pin engine overwrites. `None`
    /// means the property had no inline value and must be cleared on
    /// restore.
    pub values: Vec<(StyleProperty, Option<StyleValue>)>,
}

/// Capability interface the runtime is constructed over.
///
/// Split conceptually into container reads (scroll tracking), node reads
/// (trigger/pin geometry) and node writes (the pin/spacer engine). A host
/// for a real page maps these onto `getBoundingClientRect`-style queries and
/// inline style mutation; the headless host maps them onto its node arena.
pub trait DomHost {
    // --- container reads ---

    /// Current scroll position of the container along `axis`.
    fn scroll_position(&self, container: ScrollContainer, axis: Axis) -> f64;

    /// Scroll the container to an absolute position along `axis`.
    fn set_scroll_position(&mut self, container: ScrollContainer, axis: Axis, pos: f64);

    /// Visible size of the container along `axis` (viewport height for
    /// vertical document scrolling).
    fn container_size(&self, container: ScrollContainer, axis: Axis) -> f64;

    /// Document-space offset of the container itself. Zero for the document.
    fn container_offset(&self, container: ScrollContainer, axis: Axis) -> f64;

    /// Size of the visual viewport (the window), independent of the tracked
    /// container.
    fn viewport_size(&self, axis: Axis) -> f64;

    // --- node reads ---

    /// Whether the node is still attached to the document.
    fn in_document(&self, node: NodeHandle) -> bool;

    /// Parent node, if any.
    fn parent(&self, node: NodeHandle) -> Option<NodeHandle>;

    /// First child in flow order, if any.
    fn first_child(&self, node: NodeHandle) -> Option<NodeHandle>;

    /// Offset of the node's border box in the given space along `axis`.
    fn offset(&self, node: NodeHandle, space: OffsetSpace, axis: Axis) -> f64;

    /// Measured size of the node along `axis`.
    fn size(&self, node: NodeHandle, axis: Axis, mode: SizeMode) -> f64;

    /// Computed positioning scheme.
    fn computed_position(&self, node: NodeHandle) -> CssPosition;

    /// The *declared* (stylesheet) size along `axis`, used to detect
    /// percentage-based and auto sizing before the pin engine rewrites it.
    fn declared_size(&self, node: NodeHandle, axis: Axis) -> StyleValue;

    /// Whether the node's display type collapses margins with its children
    /// (block-ish display values).
    fn collapses_margins(&self, node: NodeHandle) -> bool;

    /// Computed value of a single style property.
    fn style(&self, node: NodeHandle, prop: StyleProperty) -> StyleValue;

    /// Whether the node is a pin spacer created by this runtime.
    fn is_spacer(&self, node: NodeHandle) -> bool;

    // --- node writes ---

    /// Create a spacer element, insert it as `node`'s previous sibling, mark
    /// it as a spacer and tag it with `class_name`. Returns the new node.
    fn insert_spacer_before(&mut self, node: NodeHandle, class_name: &str) -> NodeHandle;

    /// Move `node` directly before `reference` under `reference`'s parent.
    fn insert_before(&mut self, node: NodeHandle, reference: NodeHandle);

    /// Move `child` to be the last child of `new_parent`.
    fn reparent(&mut self, child: NodeHandle, new_parent: NodeHandle);

    /// Detach `node` (and its subtree) from the document.
    fn remove_node(&mut self, node: NodeHandle);

    /// Write an inline style value.
    fn set_style(&mut self, node: NodeHandle, prop: StyleProperty, value: StyleValue);

    /// Write the inline `position`.
    fn set_position(&mut self, node: NodeHandle, position: CssPosition);

    /// Write the inline `box-sizing`.
    fn set_box_sizing(&mut self, node: NodeHandle, sizing: BoxSizing);

    /// Capture the inline styles the pin engine is about to overwrite.
    fn snapshot_inline(&self, node: NodeHandle) -> StyleSnapshot;

    /// Restore a previously captured snapshot.
    fn restore_inline(&mut self, node: NodeHandle, snapshot: &StyleSnapshot);
}

/// Shared, single-threaded host handle the runtime holds.
pub type SharedHost = Rc<RefCell<dyn DomHost>>;
