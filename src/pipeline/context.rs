//! The authoritative scene graph owned by one pipeline.
//!
//! [`RenderContext`] owns every render node of a pipeline instance in a
//! [`RenderNodeMap`] arena, plus the root node (id `0`) that display and root
//! nodes attach to. Commands are the only producers of mutations; every
//! operation here tolerates ids that no longer exist, since commands can
//! race with the destruction of their target.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use crate::command::Command;
use crate::common::{children, extract_pid, NodeId, NodeType, INVALID_NODE_ID};
use crate::transaction::{FollowType, PayloadEntry};

use super::animation::RenderAnimation;
use super::message::{MessageProcessor, PipelineMessage};
use super::node_map::RenderNodeMap;
use super::render_node::{DirtyFlags, RenderNode, RenderNodeKind};

pub struct RenderContext {
    nodes: RenderNodeMap,
    /// Nodes with attached animations, iterated in id order.
    animating_nodes: BTreeSet<NodeId>,
    /// Reference time newly attached animations start from.
    current_timestamp: u64,
    /// Timestamp of the transaction currently being applied.
    transaction_timestamp: u64,
    messages: MessageProcessor,
    upstream: Vec<PayloadEntry>,
    needs_render: bool,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderContext {
    pub fn new() -> Self {
        let mut nodes = RenderNodeMap::new();
        let mut root = RenderNode::new(INVALID_NODE_ID, RenderNodeKind::Base);
        root.set_on_tree_flag(true);
        nodes.insert(root);
        Self {
            nodes,
            animating_nodes: BTreeSet::new(),
            current_timestamp: 0,
            transaction_timestamp: 0,
            messages: MessageProcessor::default(),
            upstream: Vec::new(),
            needs_render: true,
        }
    }

    pub fn root_id(&self) -> NodeId {
        INVALID_NODE_ID
    }

    pub fn get(&self, id: NodeId) -> Option<&RenderNode> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut RenderNode> {
        self.nodes.get_mut(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(id)
    }

    /// Number of nodes, the root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &RenderNode> {
        self.nodes.iter()
    }

    /// Children of `id`, empty for unknown ids.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(id)
            .map(|node| node.children().to_vec())
            .unwrap_or_default()
    }

    /// Run `f` on a node if it exists. A missing node is an expected race,
    /// logged at debug level only.
    pub fn with_node_mut<R>(
        &mut self,
        id: NodeId,
        f: impl FnOnce(&mut RenderNode) -> R,
    ) -> Option<R> {
        match self.nodes.get_mut(id) {
            Some(node) => Some(f(node)),
            None => {
                log::debug!("render node {id} not found, command ignored");
                None
            }
        }
    }

    /// Register a freshly created node. The sentinel id and ids already in
    /// use are refused.
    pub fn register_node(&mut self, node: RenderNode) -> bool {
        let id = node.id();
        if id == INVALID_NODE_ID {
            log::warn!("refusing to register a render node with the reserved id 0");
            return false;
        }
        if !self.nodes.insert(node) {
            log::debug!("render node {id} already registered");
            return false;
        }
        true
    }

    /// Detach a node from its parent, orphan its children and drop it.
    pub fn destroy_node(&mut self, id: NodeId) {
        if id == INVALID_NODE_ID {
            return;
        }
        let Some(parent) = self.nodes.get(id).map(RenderNode::parent) else {
            log::debug!("destroy of unknown render node {id} ignored");
            return;
        };
        if let Some(parent) = parent {
            self.remove_child(parent, id);
        }
        self.clear_children(id);
        self.animating_nodes.remove(&id);
        self.nodes.remove(id);
        self.needs_render = true;
    }

    pub fn add_child(&mut self, parent_id: NodeId, child_id: NodeId, index: i32) {
        if !self.can_attach(parent_id, child_id) {
            return;
        }
        if let Some(prev_parent) = self.nodes.get(child_id).and_then(RenderNode::parent) {
            self.remove_child(prev_parent, child_id);
        }
        self.attach(parent_id, child_id, index);
    }

    /// Attach a child that stays listed under its previous parent as well,
    /// e.g. a window spanning several screens. The child's parent link moves
    /// to `parent_id`.
    pub fn add_cross_parent_child(&mut self, parent_id: NodeId, child_id: NodeId, index: i32) {
        if !self.can_attach(parent_id, child_id) {
            return;
        }
        self.attach(parent_id, child_id, index);
    }

    /// Move an existing child to `index`, counted before the child is taken
    /// out. A negative or out-of-range index moves it to the end.
    pub fn move_child(&mut self, parent_id: NodeId, child_id: NodeId, index: i32) {
        if self.nodes.get(child_id).and_then(RenderNode::parent) != Some(parent_id) {
            log::debug!("move of {child_id} ignored, not a child of {parent_id}");
            return;
        }
        let Some(parent) = self.nodes.get_mut(parent_id) else {
            return;
        };
        if !children::move_to(parent.children_mut(), child_id, index) {
            return;
        }
        parent.mark_dirty(DirtyFlags::CHILDREN);
        self.needs_render = true;
    }

    pub fn remove_child(&mut self, parent_id: NodeId, child_id: NodeId) {
        if !self.detach(parent_id, child_id) {
            return;
        }
        self.reset_parent(child_id);
    }

    /// Drop `child_id` from `parent_id`'s children and hand the child's parent
    /// link to `new_parent_id`.
    pub fn remove_cross_parent_child(
        &mut self,
        parent_id: NodeId,
        child_id: NodeId,
        new_parent_id: NodeId,
    ) {
        if !self.detach(parent_id, child_id) {
            return;
        }
        let new_parent = self.nodes.contains(new_parent_id).then_some(new_parent_id);
        if let Some(child) = self.nodes.get_mut(child_id) {
            child.set_parent(new_parent);
        }
        if new_parent.is_none() {
            self.set_is_on_tree(child_id, false);
        }
    }

    pub fn remove_from_tree(&mut self, child_id: NodeId) {
        match self.nodes.get(child_id).and_then(RenderNode::parent) {
            Some(parent) => self.remove_child(parent, child_id),
            None => log::debug!("remove_from_tree of detached node {child_id} ignored"),
        }
    }

    pub fn clear_children(&mut self, parent_id: NodeId) {
        let Some(parent) = self.nodes.get_mut(parent_id) else {
            return;
        };
        if parent.children().is_empty() {
            return;
        }
        let children = std::mem::take(parent.children_mut());
        parent.mark_dirty(DirtyFlags::CHILDREN);
        for child in children {
            // cross-parent children may already point at another parent
            if self.nodes.get(child).and_then(RenderNode::parent) == Some(parent_id) {
                self.reset_parent(child);
            }
        }
        self.needs_render = true;
    }

    /// Propagate the on-tree state to `id` and its whole subtree.
    ///
    /// Clearing the flag under a node that is already off the tree is a no-op.
    pub fn set_is_on_tree(&mut self, id: NodeId, on_tree: bool) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get_mut(current) else {
                continue;
            };
            if !on_tree && !node.is_on_tree() {
                continue;
            }
            node.set_on_tree_flag(on_tree);
            stack.extend(node.children().iter().copied());
        }
    }

    /// Children ordered by `position_z`; ties keep insertion order.
    pub fn sorted_children(&self, id: NodeId) -> Vec<NodeId> {
        let Some(node) = self.nodes.get(id) else {
            return Vec::new();
        };
        let mut children: Vec<(NodeId, f32)> = node
            .children()
            .iter()
            .filter_map(|&c| self.nodes.get(c).map(|n| (c, n.properties().position_z)))
            .collect();
        children.sort_by(|a, b| a.1.total_cmp(&b.1));
        children.into_iter().map(|(c, _)| c).collect()
    }

    pub fn mark_dirty(&mut self, id: NodeId, flags: DirtyFlags) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.mark_dirty(flags);
            self.needs_render = true;
        }
    }

    /// Whether anything changed since the last [`take_needs_render`](Self::take_needs_render).
    pub fn needs_render(&self) -> bool {
        self.needs_render
    }

    pub fn take_needs_render(&mut self) -> bool {
        std::mem::take(&mut self.needs_render)
    }

    pub fn request_render(&mut self) {
        self.needs_render = true;
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut RenderNodeMap {
        &mut self.nodes
    }

    // ------------------------------------------------------------------
    // Animations
    // ------------------------------------------------------------------

    pub fn current_timestamp(&self) -> u64 {
        self.current_timestamp
    }

    pub fn set_current_timestamp(&mut self, timestamp: u64) {
        self.current_timestamp = timestamp;
    }

    pub fn transaction_timestamp(&self) -> u64 {
        self.transaction_timestamp
    }

    pub fn set_transaction_timestamp(&mut self, timestamp: u64) {
        self.transaction_timestamp = timestamp;
    }

    /// Attach an animation to a node, starting at the current frame time.
    pub fn add_animation(&mut self, id: NodeId, animation: RenderAnimation) {
        let start = self.current_timestamp;
        let Some(node) = self.nodes.get_mut(id) else {
            log::debug!("animation {} for unknown node {id} dropped", animation.id);
            return;
        };
        let (animations, properties) = node.animations_and_properties_mut();
        if let Some(replaced) = animations.add(animation, properties, start) {
            self.post_animation_finished(id, replaced);
        }
        self.animating_nodes.insert(id);
    }

    /// Stop an animation, either at its end value or where it currently is,
    /// and notify its owner.
    pub fn finish_animation(&mut self, id: NodeId, animation: u64, jump_to_end: bool) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let (animations, properties) = node.animations_and_properties_mut();
        let removed = if jump_to_end {
            animations.finish(animation, properties)
        } else {
            animations.cancel(animation)
        };
        if removed {
            node.mark_dirty(DirtyFlags::PROPERTIES);
            self.needs_render = true;
            self.post_animation_finished(id, animation);
        }
    }

    pub fn pause_animation(&mut self, id: NodeId, animation: u64) {
        self.with_node_mut(id, |node| {
            node.animations_and_properties_mut().0.pause(animation);
        });
    }

    pub fn resume_animation(&mut self, id: NodeId, animation: u64) {
        let resumed = self
            .with_node_mut(id, |node| node.animations_and_properties_mut().0.resume(animation))
            .unwrap_or(false);
        if resumed {
            self.animating_nodes.insert(id);
        }
    }

    pub fn has_animations(&self) -> bool {
        !self.animating_nodes.is_empty()
    }

    /// Advance every animation to `timestamp`. Returns whether another frame
    /// is needed.
    pub fn animate(&mut self, timestamp: u64) -> bool {
        let mut need_next_frame = false;
        let ids: Vec<NodeId> = self.animating_nodes.iter().copied().collect();
        for id in ids {
            let Some(node) = self.nodes.get_mut(id) else {
                self.animating_nodes.remove(&id);
                continue;
            };
            let (animations, properties) = node.animations_and_properties_mut();
            let result = animations.animate(timestamp, properties);
            let idle = node.animations().is_empty();
            if result.changed {
                node.mark_dirty(DirtyFlags::PROPERTIES);
                self.needs_render = true;
            }
            for animation in result.finished {
                self.post_animation_finished(id, animation);
            }
            need_next_frame |= result.running;
            if idle {
                self.animating_nodes.remove(&id);
            }
        }
        need_next_frame
    }

    fn post_animation_finished(&mut self, node: NodeId, animation: u64) {
        self.messages.post(
            extract_pid(animation),
            PipelineMessage::AnimationFinished { node, animation },
        );
    }

    // ------------------------------------------------------------------
    // Outgoing traffic
    // ------------------------------------------------------------------

    pub fn post_message(&mut self, pid: u32, message: PipelineMessage) {
        self.messages.post(pid, message);
    }

    pub fn messages_mut(&mut self) -> &mut MessageProcessor {
        &mut self.messages
    }

    /// Queue a command for the next pipeline-origin transaction sent
    /// upstream. The receiver schedules it per `follow` against the buffers
    /// of `node`.
    pub fn send_upstream(&mut self, command: Box<dyn Command>, node: NodeId, follow: FollowType) {
        self.upstream.push((node, follow, command));
    }

    pub fn take_upstream(&mut self) -> Vec<PayloadEntry> {
        std::mem::take(&mut self.upstream)
    }

    // ------------------------------------------------------------------
    // Debugging
    // ------------------------------------------------------------------

    /// Text dump of the tree under the root, one line per node.
    pub fn dump_tree(&self) -> String {
        let mut out = String::new();
        let mut stack = vec![(self.root_id(), 0usize)];
        let mut visited = BTreeSet::new();
        while let Some((id, depth)) = stack.pop() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            if !visited.insert(id) {
                continue;
            }
            self.dump_node(node, depth, &mut out);
            for &child in node.children().iter().rev() {
                stack.push((child, depth + 1));
            }
        }
        out
    }

    fn dump_node(&self, node: &RenderNode, depth: usize, out: &mut String) {
        let _ = write!(
            out,
            "{}| {}[{}], is_on_tree: {}",
            "  ".repeat(depth),
            node.node_type().dump_name(),
            node.id(),
            node.is_on_tree() as u8
        );
        if let Some(surface) = node.surface() {
            let parent = node
                .parent()
                .map_or_else(|| "null".to_string(), |p| p.to_string());
            let _ = write!(
                out,
                ", has_buffer: {}, name [{}], parent [{}]",
                surface.buffer.is_some() as u8,
                surface.name,
                parent
            );
        }
        out.push_str(", children[");
        for child in node.children() {
            let _ = write!(out, "{child} ");
        }
        out.push_str("]\n");
    }

    // ------------------------------------------------------------------
    // Internal topology helpers
    // ------------------------------------------------------------------

    fn can_attach(&self, parent_id: NodeId, child_id: NodeId) -> bool {
        if child_id == parent_id || child_id == INVALID_NODE_ID {
            return false;
        }
        if !self.nodes.contains(parent_id) || !self.nodes.contains(child_id) {
            log::debug!("attach of {child_id} under {parent_id} ignored, node missing");
            return false;
        }
        if self.is_ancestor(child_id, parent_id) {
            log::warn!("attach of {child_id} under {parent_id} would create a cycle");
            return false;
        }
        true
    }

    /// `true` when `ancestor` is on the parent chain of `id`.
    fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = self.nodes.get(id).and_then(RenderNode::parent);
        let mut steps = 0;
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.nodes.len() {
                return false;
            }
            current = self.nodes.get(node).and_then(RenderNode::parent);
        }
        false
    }

    fn attach(&mut self, parent_id: NodeId, child_id: NodeId, index: i32) {
        let Some(parent) = self.nodes.get_mut(parent_id) else {
            return;
        };
        children::insert_at(parent.children_mut(), child_id, index);
        parent.mark_dirty(DirtyFlags::CHILDREN);
        let parent_on_tree = parent.is_on_tree();

        if let Some(child) = self.nodes.get_mut(child_id) {
            child.set_parent(Some(parent_id));
        }
        if parent_on_tree {
            self.set_is_on_tree(child_id, true);
        }
        self.needs_render = true;
    }

    /// Remove `child_id` from the child list of `parent_id`.
    fn detach(&mut self, parent_id: NodeId, child_id: NodeId) -> bool {
        let Some(parent) = self.nodes.get_mut(parent_id) else {
            return false;
        };
        let children = parent.children_mut();
        let Some(position) = children.iter().position(|&c| c == child_id) else {
            return false;
        };
        children.remove(position);
        parent.mark_dirty(DirtyFlags::CHILDREN);
        self.needs_render = true;
        true
    }

    fn reset_parent(&mut self, child_id: NodeId) {
        if let Some(child) = self.nodes.get_mut(child_id) {
            child.set_parent(None);
        }
        self.set_is_on_tree(child_id, false);
    }

    /// Ids of every surface node, in storage order.
    pub fn surface_ids(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.is_instance_of(NodeType::Surface))
            .map(RenderNode::id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::properties::PropertyUpdate;

    fn context_with(ids: &[NodeId]) -> RenderContext {
        let mut context = RenderContext::new();
        for &id in ids {
            context.register_node(RenderNode::new(id, RenderNodeKind::canvas()));
        }
        context
    }

    #[test]
    fn test_context_starts_with_root() {
        let context = RenderContext::new();
        assert_eq!(context.node_count(), 1);
        assert!(context.get(0).is_some_and(RenderNode::is_on_tree));
    }

    #[test]
    fn test_register_rejects_sentinel_and_duplicates() {
        let mut context = RenderContext::new();
        assert!(!context.register_node(RenderNode::new(0, RenderNodeKind::Rs)));
        assert!(context.register_node(RenderNode::new(5, RenderNodeKind::Rs)));
        assert!(!context.register_node(RenderNode::new(5, RenderNodeKind::Rs)));
    }

    #[test]
    fn test_add_child_index_semantics() {
        let mut context = context_with(&[1, 2, 3, 4]);
        context.add_child(1, 2, -1);
        context.add_child(1, 3, 100);
        context.add_child(1, 4, 0);
        assert_eq!(context.children(1), vec![4, 2, 3]);
        assert_eq!(context.get(4).and_then(RenderNode::parent), Some(1));
    }

    #[test]
    fn test_add_child_reparents() {
        let mut context = context_with(&[1, 2, 3]);
        context.add_child(1, 3, -1);
        context.add_child(2, 3, -1);
        assert!(context.children(1).is_empty());
        assert_eq!(context.children(2), vec![3]);
    }

    #[test]
    fn test_add_child_rejects_self_and_cycles() {
        let mut context = context_with(&[1, 2]);
        context.add_child(1, 1, -1);
        context.add_child(1, 2, -1);
        context.add_child(2, 1, -1);
        context.add_child(1, 0, -1);
        assert_eq!(context.children(1), vec![2]);
        assert!(context.children(2).is_empty());
    }

    #[test]
    fn test_on_tree_propagates() {
        let mut context = context_with(&[1, 2, 3]);
        context.add_child(2, 3, -1);
        context.add_child(1, 2, -1);
        assert!(!context.get(3).unwrap().is_on_tree());

        context.add_child(0, 1, -1);
        assert!(context.get(3).unwrap().is_on_tree());

        context.remove_from_tree(1);
        assert!(!context.get(1).unwrap().is_on_tree());
        assert!(!context.get(3).unwrap().is_on_tree());
    }

    #[test]
    fn test_move_child_positions() {
        let mut context = context_with(&[1, 10, 11, 12]);
        for c in [10, 11, 12] {
            context.add_child(1, c, -1);
        }
        context.move_child(1, 10, 2);
        assert_eq!(context.children(1), vec![11, 10, 12]);
        context.move_child(1, 12, 0);
        assert_eq!(context.children(1), vec![12, 11, 10]);
        context.move_child(1, 12, -1);
        assert_eq!(context.children(1), vec![11, 10, 12]);
    }

    #[test]
    fn test_move_child_requires_membership() {
        let mut context = context_with(&[1, 2, 3]);
        context.add_child(1, 2, -1);
        context.move_child(1, 3, 0);
        assert_eq!(context.children(1), vec![2]);
    }

    #[test]
    fn test_cross_parent_child() {
        let mut context = context_with(&[1, 2, 3]);
        context.add_child(1, 3, -1);
        context.add_cross_parent_child(2, 3, -1);
        assert_eq!(context.children(1), vec![3]);
        assert_eq!(context.children(2), vec![3]);
        assert_eq!(context.get(3).and_then(RenderNode::parent), Some(2));

        context.remove_cross_parent_child(2, 3, 1);
        assert!(context.children(2).is_empty());
        assert_eq!(context.get(3).and_then(RenderNode::parent), Some(1));
    }

    #[test]
    fn test_clear_children_resets_parents() {
        let mut context = context_with(&[1, 2, 3]);
        context.add_child(1, 2, -1);
        context.add_child(1, 3, -1);
        context.clear_children(1);
        assert!(context.children(1).is_empty());
        assert_eq!(context.get(2).and_then(RenderNode::parent), None);
    }

    #[test]
    fn test_destroy_detaches_and_orphans() {
        let mut context = context_with(&[1, 2, 3]);
        context.add_child(1, 2, -1);
        context.add_child(2, 3, -1);
        context.destroy_node(2);
        assert!(!context.contains(2));
        assert!(context.children(1).is_empty());
        assert_eq!(context.get(3).and_then(RenderNode::parent), None);

        // destroying twice or destroying the root is harmless
        context.destroy_node(2);
        context.destroy_node(0);
        assert!(context.contains(0));
    }

    #[test]
    fn test_sorted_children_is_stable_by_z() {
        let mut context = context_with(&[1, 2, 3, 4]);
        for c in [2, 3, 4] {
            context.add_child(1, c, -1);
        }
        context
            .get_mut(2)
            .unwrap()
            .properties_mut()
            .apply(&PropertyUpdate::PositionZ(5.0));
        assert_eq!(context.sorted_children(1), vec![3, 4, 2]);
    }

    #[test]
    fn test_dump_tree_format() {
        let mut context = context_with(&[7, 8]);
        context.add_child(0, 7, -1);
        context.add_child(7, 8, -1);
        let dump = context.dump_tree();
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines[0], "| BASE_NODE[0], is_on_tree: 1, children[7 ]");
        assert_eq!(lines[1], "  | CANVAS_NODE[7], is_on_tree: 1, children[8 ]");
        assert_eq!(lines[2], "    | CANVAS_NODE[8], is_on_tree: 1, children[]");
    }

    #[test]
    fn test_animation_finish_posts_message_to_owner() {
        let mut context = context_with(&[1]);
        let animation_id = crate::common::make_node_id(77, 1);
        context.add_animation(
            1,
            RenderAnimation::new(animation_id, PropertyUpdate::Alpha(0.0), 10),
        );
        assert!(context.has_animations());
        assert!(!context.animate(100));
        assert!(!context.has_animations());
        let outbox = context.messages_mut().take();
        assert_eq!(
            outbox.get(&77).map(Vec::as_slice),
            Some(
                &[PipelineMessage::AnimationFinished {
                    node: 1,
                    animation: animation_id
                }][..]
            )
        );
    }
}
