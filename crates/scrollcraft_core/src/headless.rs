//! In-memory host for headless testing
//!
//! [`HeadlessDom`] implements [`DomHost`] over a slotmap node arena with
//! explicit geometry: tests place nodes at document offsets, give them
//! sizes, and scroll the document (or a nested container) directly. There
//! is no layout engine — offsets and sizes are whatever the test sets,
//! plus the inline styles the runtime writes (an inline pixel width
//! overrides the stored size, percentage sizes resolve against the parent,
//! paddings and margins contribute to outer size queries).
//!
//! Viewport-space offsets are document offsets minus the document scroll
//! position, which is what `position: fixed` math needs.

use crate::dom::{
    Axis, BoxSizing, CssPosition, DomHost, NodeHandle, OffsetSpace, ScrollContainer, SizeMode,
    StyleProperty, StyleSnapshot, StyleValue,
};
use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    struct NodeKey;
}

fn idx(axis: Axis) -> usize {
    match axis {
        Axis::Vertical => 0,
        Axis::Horizontal => 1,
    }
}

/// Inline properties the pin engine overwrites on a pinned element; these
/// are what a snapshot captures.
const CAPTURED_PROPS: [StyleProperty; 10] = [
    StyleProperty::Top,
    StyleProperty::Left,
    StyleProperty::Bottom,
    StyleProperty::Right,
    StyleProperty::MarginTop,
    StyleProperty::MarginRight,
    StyleProperty::MarginBottom,
    StyleProperty::MarginLeft,
    StyleProperty::Width,
    StyleProperty::Height,
];

struct NodeData {
    parent: Option<NodeKey>,
    children: Vec<NodeKey>,
    attached: bool,
    spacer: bool,
    class: Option<String>,
    /// Document-space offset: `[top, left]`.
    doc_offset: [f64; 2],
    /// Measured size: `[height, width]`.
    size: [f64; 2],
    /// Scroll position when used as a nested container.
    scroll: [f64; 2],
    /// Declared (stylesheet) size: `[height, width]`.
    declared: [StyleValue; 2],
    /// Base (stylesheet) positioning scheme.
    base_position: CssPosition,
    inline_position: Option<CssPosition>,
    inline_box_sizing: Option<BoxSizing>,
    styles: FxHashMap<StyleProperty, StyleValue>,
    collapses_margins: bool,
}

impl NodeData {
    fn new() -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            attached: true,
            spacer: false,
            class: None,
            doc_offset: [0.0, 0.0],
            size: [0.0, 0.0],
            scroll: [0.0, 0.0],
            declared: [StyleValue::Auto, StyleValue::Auto],
            base_position: CssPosition::Static,
            inline_position: None,
            inline_box_sizing: None,
            styles: FxHashMap::default(),
            collapses_margins: true,
        }
    }
}

/// An in-memory [`DomHost`].
pub struct HeadlessDom {
    nodes: SlotMap<NodeKey, NodeData>,
    /// Document scroll position: `[vertical, horizontal]`.
    doc_scroll: [f64; 2],
    /// Window size: `[height, width]`.
    viewport: [f64; 2],
}

impl Default for HeadlessDom {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDom {
    /// Create an empty document with an 800x1280 viewport.
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            doc_scroll: [0.0, 0.0],
            viewport: [800.0, 1280.0],
        }
    }

    fn key(handle: NodeHandle) -> NodeKey {
        NodeKey::from(slotmap::KeyData::from_ffi(handle.to_raw()))
    }

    fn handle(key: NodeKey) -> NodeHandle {
        NodeHandle::from_raw(key.0.as_ffi())
    }

    // --- test construction helpers ---

    /// Add a node, optionally under a parent (root-level otherwise).
    pub fn add_node(&mut self, parent: Option<NodeHandle>) -> NodeHandle {
        let key = self.nodes.insert(NodeData::new());
        if let Some(p) = parent {
            let pk = Self::key(p);
            self.nodes[key].parent = Some(pk);
            self.nodes[pk].children.push(key);
        }
        Self::handle(key)
    }

    /// Add a root-level block at a vertical document offset with a height.
    pub fn add_block(&mut self, top: f64, height: f64) -> NodeHandle {
        let h = self.add_node(None);
        self.set_doc_offset(h, Axis::Vertical, top);
        self.set_size(h, Axis::Vertical, height);
        h
    }

    pub fn set_viewport_size(&mut self, axis: Axis, size: f64) {
        self.viewport[idx(axis)] = size;
    }

    pub fn set_doc_offset(&mut self, node: NodeHandle, axis: Axis, offset: f64) {
        self.nodes[Self::key(node)].doc_offset[idx(axis)] = offset;
    }

    pub fn set_size(&mut self, node: NodeHandle, axis: Axis, size: f64) {
        self.nodes[Self::key(node)].size[idx(axis)] = size;
    }

    pub fn set_declared_size(&mut self, node: NodeHandle, axis: Axis, value: StyleValue) {
        self.nodes[Self::key(node)].declared[idx(axis)] = value;
    }

    pub fn set_base_position(&mut self, node: NodeHandle, position: CssPosition) {
        self.nodes[Self::key(node)].base_position = position;
    }

    pub fn set_collapses_margins(&mut self, node: NodeHandle, collapses: bool) {
        self.nodes[Self::key(node)].collapses_margins = collapses;
    }

    /// Scroll a container (the document or a nested element).
    pub fn scroll_to(&mut self, container: ScrollContainer, axis: Axis, pos: f64) {
        self.set_scroll_position(container, axis, pos);
    }

    // --- test inspection helpers ---

    pub fn children_of(&self, node: NodeHandle) -> Vec<NodeHandle> {
        self.nodes[Self::key(node)]
            .children
            .iter()
            .map(|&k| Self::handle(k))
            .collect()
    }

    pub fn class_of(&self, node: NodeHandle) -> Option<&str> {
        self.nodes[Self::key(node)].class.as_deref()
    }

    pub fn inline_style(&self, node: NodeHandle, prop: StyleProperty) -> Option<StyleValue> {
        self.nodes[Self::key(node)].styles.get(&prop).copied()
    }

    pub fn inline_position(&self, node: NodeHandle) -> Option<CssPosition> {
        self.nodes[Self::key(node)].inline_position
    }

    pub fn inline_box_sizing(&self, node: NodeHandle) -> Option<BoxSizing> {
        self.nodes[Self::key(node)].inline_box_sizing
    }

    /// Number of spacer nodes still attached to the document.
    pub fn spacer_count(&self) -> usize {
        self.nodes
            .values()
            .filter(|n| n.spacer && n.attached)
            .count()
    }

    fn detach_subtree(&mut self, key: NodeKey) {
        self.nodes[key].attached = false;
        let children = self.nodes[key].children.clone();
        for child in children {
            self.detach_subtree(child);
        }
    }

    fn measured(&self, key: NodeKey, axis: Axis) -> f64 {
        let node = &self.nodes[key];
        let prop = match axis {
            Axis::Vertical => StyleProperty::Height,
            Axis::Horizontal => StyleProperty::Width,
        };
        match node.styles.get(&prop) {
            Some(StyleValue::Px(v)) => *v,
            Some(StyleValue::Percent(p)) => {
                let parent_size = node
                    .parent
                    .map(|pk| self.measured(pk, axis))
                    .unwrap_or(self.viewport[idx(axis)]);
                parent_size * p / 100.0
            }
            Some(StyleValue::Auto) | None => node.size[idx(axis)],
        }
    }

    fn style_px(&self, key: NodeKey, prop: StyleProperty) -> f64 {
        self.nodes[key]
            .styles
            .get(&prop)
            .copied()
            .unwrap_or(StyleValue::Auto)
            .px_or_zero()
    }
}

impl DomHost for HeadlessDom {
    fn scroll_position(&self, container: ScrollContainer, axis: Axis) -> f64 {
        match container {
            ScrollContainer::Document => self.doc_scroll[idx(axis)],
            ScrollContainer::Element(h) => self.nodes[Self::key(h)].scroll[idx(axis)],
        }
    }

    fn set_scroll_position(&mut self, container: ScrollContainer, axis: Axis, pos: f64) {
        match container {
            ScrollContainer::Document => self.doc_scroll[idx(axis)] = pos,
            ScrollContainer::Element(h) => {
                self.nodes[Self::key(h)].scroll[idx(axis)] = pos;
            }
        }
    }

    fn container_size(&self, container: ScrollContainer, axis: Axis) -> f64 {
        match container {
            ScrollContainer::Document => self.viewport[idx(axis)],
            ScrollContainer::Element(h) => self.measured(Self::key(h), axis),
        }
    }

    fn container_offset(&self, container: ScrollContainer, axis: Axis) -> f64 {
        match container {
            ScrollContainer::Document => 0.0,
            ScrollContainer::Element(h) => self.nodes[Self::key(h)].doc_offset[idx(axis)],
        }
    }

    fn viewport_size(&self, axis: Axis) -> f64 {
        self.viewport[idx(axis)]
    }

    fn in_document(&self, node: NodeHandle) -> bool {
        self.nodes
            .get(Self::key(node))
            .map(|n| n.attached)
            .unwrap_or(false)
    }

    fn parent(&self, node: NodeHandle) -> Option<NodeHandle> {
        self.nodes[Self::key(node)].parent.map(Self::handle)
    }

    fn first_child(&self, node: NodeHandle) -> Option<NodeHandle> {
        self.nodes[Self::key(node)]
            .children
            .first()
            .copied()
            .map(Self::handle)
    }

    fn offset(&self, node: NodeHandle, space: OffsetSpace, axis: Axis) -> f64 {
        let doc = self.nodes[Self::key(node)].doc_offset[idx(axis)];
        match space {
            OffsetSpace::Document => doc,
            OffsetSpace::Viewport => doc - self.doc_scroll[idx(axis)],
        }
    }

    fn size(&self, node: NodeHandle, axis: Axis, mode: SizeMode) -> f64 {
        let key = Self::key(node);
        let inner = self.measured(key, axis);
        let (lead_pad, trail_pad, lead_margin, trail_margin) = match axis {
            Axis::Vertical => (
                StyleProperty::PaddingTop,
                StyleProperty::PaddingBottom,
                StyleProperty::MarginTop,
                StyleProperty::MarginBottom,
            ),
            Axis::Horizontal => (
                StyleProperty::PaddingLeft,
                StyleProperty::PaddingRight,
                StyleProperty::MarginLeft,
                StyleProperty::MarginRight,
            ),
        };
        match mode {
            SizeMode::Inner => inner,
            SizeMode::Outer => inner + self.style_px(key, lead_pad) + self.style_px(key, trail_pad),
            SizeMode::OuterWithMargin => {
                inner
                    + self.style_px(key, lead_pad)
                    + self.style_px(key, trail_pad)
                    + self.style_px(key, lead_margin)
                    + self.style_px(key, trail_margin)
            }
        }
    }

    fn computed_position(&self, node: NodeHandle) -> CssPosition {
        let data = &self.nodes[Self::key(node)];
        data.inline_position.unwrap_or(data.base_position)
    }

    fn declared_size(&self, node: NodeHandle, axis: Axis) -> StyleValue {
        self.nodes[Self::key(node)].declared[idx(axis)]
    }

    fn collapses_margins(&self, node: NodeHandle) -> bool {
        self.nodes[Self::key(node)].collapses_margins
    }

    fn style(&self, node: NodeHandle, prop: StyleProperty) -> StyleValue {
        let key = Self::key(node);
        if let Some(v) = self.nodes[key].styles.get(&prop) {
            return *v;
        }
        match prop {
            StyleProperty::Width => StyleValue::Px(self.measured(key, Axis::Horizontal)),
            StyleProperty::Height => StyleValue::Px(self.measured(key, Axis::Vertical)),
            _ => StyleValue::Px(0.0),
        }
    }

    fn is_spacer(&self, node: NodeHandle) -> bool {
        self.nodes
            .get(Self::key(node))
            .map(|n| n.spacer)
            .unwrap_or(false)
    }

    fn insert_spacer_before(&mut self, node: NodeHandle, class_name: &str) -> NodeHandle {
        let node_key = Self::key(node);
        let parent = self.nodes[node_key].parent;
        let doc_offset = self.nodes[node_key].doc_offset;
        let attached = self.nodes[node_key].attached;

        let spacer_key = self.nodes.insert(NodeData::new());
        {
            let spacer = &mut self.nodes[spacer_key];
            spacer.spacer = true;
            spacer.class = Some(class_name.to_owned());
            spacer.parent = parent;
            spacer.doc_offset = doc_offset;
            spacer.attached = attached;
        }
        if let Some(pk) = parent {
            let pos = self.nodes[pk]
                .children
                .iter()
                .position(|&k| k == node_key)
                .unwrap_or(self.nodes[pk].children.len());
            self.nodes[pk].children.insert(pos, spacer_key);
        }
        Self::handle(spacer_key)
    }

    fn insert_before(&mut self, node: NodeHandle, reference: NodeHandle) {
        let node_key = Self::key(node);
        let ref_key = Self::key(reference);
        if let Some(old_parent) = self.nodes[node_key].parent {
            self.nodes[old_parent].children.retain(|&k| k != node_key);
        }
        let new_parent = self.nodes[ref_key].parent;
        self.nodes[node_key].parent = new_parent;
        self.nodes[node_key].attached = self.nodes[ref_key].attached;
        if let Some(pk) = new_parent {
            let pos = self.nodes[pk]
                .children
                .iter()
                .position(|&k| k == ref_key)
                .unwrap_or(self.nodes[pk].children.len());
            self.nodes[pk].children.insert(pos, node_key);
        }
    }

    fn reparent(&mut self, child: NodeHandle, new_parent: NodeHandle) {
        let child_key = Self::key(child);
        let parent_key = Self::key(new_parent);
        if let Some(old_parent) = self.nodes[child_key].parent {
            self.nodes[old_parent].children.retain(|&k| k != child_key);
        }
        self.nodes[child_key].parent = Some(parent_key);
        self.nodes[child_key].attached = self.nodes[parent_key].attached;
        self.nodes[parent_key].children.push(child_key);
    }

    fn remove_node(&mut self, node: NodeHandle) {
        let key = Self::key(node);
        if let Some(parent) = self.nodes[key].parent {
            self.nodes[parent].children.retain(|&k| k != key);
        }
        self.nodes[key].parent = None;
        self.detach_subtree(key);
    }

    fn set_style(&mut self, node: NodeHandle, prop: StyleProperty, value: StyleValue) {
        self.nodes[Self::key(node)].styles.insert(prop, value);
    }

    fn set_position(&mut self, node: NodeHandle, position: CssPosition) {
        self.nodes[Self::key(node)].inline_position = Some(position);
    }

    fn set_box_sizing(&mut self, node: NodeHandle, sizing: BoxSizing) {
        self.nodes[Self::key(node)].inline_box_sizing = Some(sizing);
    }

    fn snapshot_inline(&self, node: NodeHandle) -> StyleSnapshot {
        let data = &self.nodes[Self::key(node)];
        StyleSnapshot {
            position: data.inline_position,
            box_sizing: data.inline_box_sizing,
            values: CAPTURED_PROPS
                .iter()
                .map(|&prop| (prop, data.styles.get(&prop).copied()))
                .collect(),
        }
    }

    fn restore_inline(&mut self, node: NodeHandle, snapshot: &StyleSnapshot) {
        let data = &mut self.nodes[Self::key(node)];
        data.inline_position = snapshot.position;
        data.inline_box_sizing = snapshot.box_sizing;
        for (prop, value) in &snapshot.values {
            match value {
                Some(v) => {
                    data.styles.insert(*prop, *v);
                }
                None => {
                    data.styles.remove(prop);
                }
            }
        }
    }
}
