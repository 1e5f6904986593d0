//! Hierarchical transform graph with cached world matrices
//!
//! Nodes carry local position/rotation/scale and a lazily recomputed world
//! matrix. Writing any local transform (or reparenting) marks the node and
//! all descendants dirty; the next world-space read recomputes exactly the
//! dirty chain. Enable state is the conjunction of the node's own flag and
//! every ancestor's flag, evaluated on demand.

use std::collections::HashSet;

use slotmap::SlotMap;

use crate::foundation::math::{Mat4, Quat, Transform, Vec3};

slotmap::new_key_type! {
    /// Stable handle to a node in a [`SceneGraph`]
    pub struct NodeKey;
}

/// A single node of the transform hierarchy
#[derive(Debug, Clone)]
pub struct SceneNode {
    name: String,
    tags: HashSet<String>,
    parent: Option<NodeKey>,
    children: Vec<NodeKey>,
    local: Transform,
    world_matrix: Mat4,
    world_dirty: bool,
    enabled: bool,
    depth: u32,
}

impl SceneNode {
    fn new(name: impl Into<String>, parent: Option<NodeKey>, depth: u32) -> Self {
        Self {
            name: name.into(),
            tags: HashSet::new(),
            parent,
            children: Vec::new(),
            local: Transform::identity(),
            world_matrix: Mat4::identity(),
            world_dirty: true,
            enabled: true,
            depth,
        }
    }

    /// Node name (not required to be unique)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent handle, `None` for the root
    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    /// Child handles in insertion order
    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    /// The node's own enable flag (ignores ancestors)
    pub fn enabled_self(&self) -> bool {
        self.enabled
    }

    /// Depth in the hierarchy (root is 0), recomputed on reparent only
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// String tags attached to this node
    pub fn tags(&self) -> &HashSet<String> {
        &self.tags
    }

    /// Local TRS transform
    pub fn local_transform(&self) -> &Transform {
        &self.local
    }
}

/// Arena-indexed scene hierarchy
#[derive(Debug)]
pub struct SceneGraph {
    nodes: SlotMap<NodeKey, SceneNode>,
    root: NodeKey,
}

impl SceneGraph {
    /// Create a graph containing only a root node
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(SceneNode::new("root", None, 0));
        Self { nodes, root }
    }

    /// Handle of the root node
    pub fn root(&self) -> NodeKey {
        self.root
    }

    /// Number of nodes, including the root
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when only the root exists
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Immutable access to a node
    pub fn node(&self, key: NodeKey) -> Option<&SceneNode> {
        self.nodes.get(key)
    }

    /// Whether the key still refers to a live node
    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    // --- hierarchy mutation ---

    /// Create a new child under `parent`, appended to its child list
    ///
    /// Falls back to the root when `parent` is stale.
    pub fn add_child(&mut self, parent: NodeKey, name: impl Into<String>) -> NodeKey {
        let parent = if self.nodes.contains_key(parent) {
            parent
        } else {
            log::warn!("add_child: stale parent key, attaching to root");
            self.root
        };
        let depth = self.nodes[parent].depth + 1;
        let key = self.nodes.insert(SceneNode::new(name, Some(parent), depth));
        self.nodes[parent].children.push(key);
        key
    }

    /// Create a new child under `parent` at a specific position in its
    /// child list (clamped to the list length)
    pub fn insert_child(
        &mut self,
        parent: NodeKey,
        index: usize,
        name: impl Into<String>,
    ) -> NodeKey {
        let key = self.add_child(parent, name);
        let parent = self.nodes[key].parent.expect("new child always has a parent");
        let children = &mut self.nodes[parent].children;
        children.pop();
        let index = index.min(children.len());
        children.insert(index, key);
        key
    }

    /// Remove a node and its entire subtree, freeing all keys
    ///
    /// Removing the root or a stale key is a silent no-op.
    pub fn remove(&mut self, key: NodeKey) {
        if key == self.root || !self.nodes.contains_key(key) {
            return;
        }

        if let Some(parent) = self.nodes[key].parent {
            self.nodes[parent].children.retain(|&c| c != key);
        }

        for sub in self.collect_subtree(key) {
            self.nodes.remove(sub);
        }
    }

    /// Move a node (with its subtree) under a new parent
    ///
    /// Invalidates cached world transforms of the moved subtree and
    /// recomputes its depth counters. Returns false (no-op) when the move
    /// would create a cycle, target the root, or use stale keys.
    pub fn reparent(&mut self, key: NodeKey, new_parent: NodeKey) -> bool {
        if key == self.root
            || !self.nodes.contains_key(key)
            || !self.nodes.contains_key(new_parent)
        {
            return false;
        }

        // Reject cycles: the new parent must not live inside the subtree
        let subtree = self.collect_subtree(key);
        if subtree.contains(&new_parent) {
            log::warn!("reparent rejected: new parent is inside the moved subtree");
            return false;
        }

        if let Some(old_parent) = self.nodes[key].parent {
            self.nodes[old_parent].children.retain(|&c| c != key);
        }
        self.nodes[key].parent = Some(new_parent);
        self.nodes[new_parent].children.push(key);

        // Depth is recomputed on reparent only
        let base_depth = self.nodes[new_parent].depth + 1;
        let key_depth = self.nodes[key].depth;
        for sub in &subtree {
            let relative = self.nodes[*sub].depth - key_depth;
            self.nodes[*sub].depth = base_depth + relative;
        }

        self.mark_subtree_dirty(key);
        true
    }

    fn collect_subtree(&self, key: NodeKey) -> Vec<NodeKey> {
        let mut result = Vec::new();
        let mut stack = vec![key];
        while let Some(current) = stack.pop() {
            result.push(current);
            stack.extend_from_slice(&self.nodes[current].children);
        }
        result
    }

    fn mark_subtree_dirty(&mut self, key: NodeKey) {
        let mut stack = vec![key];
        while let Some(current) = stack.pop() {
            let node = &mut self.nodes[current];
            node.world_dirty = true;
            stack.extend_from_slice(&node.children);
        }
    }

    // --- local transform accessors ---

    /// Set local position; invalidates world transforms of the subtree
    pub fn set_local_position(&mut self, key: NodeKey, position: Vec3) {
        if self.nodes.contains_key(key) {
            self.nodes[key].local.position = position;
            self.mark_subtree_dirty(key);
        }
    }

    /// Set local rotation from a quaternion
    pub fn set_local_rotation(&mut self, key: NodeKey, rotation: Quat) {
        if self.nodes.contains_key(key) {
            self.nodes[key].local.rotation = rotation;
            self.mark_subtree_dirty(key);
        }
    }

    /// Set local rotation from Euler angles (radians, roll/pitch/yaw)
    pub fn set_local_euler_angles(&mut self, key: NodeKey, roll: f32, pitch: f32, yaw: f32) {
        self.set_local_rotation(key, Quat::from_euler_angles(roll, pitch, yaw));
    }

    /// Set local scale
    pub fn set_local_scale(&mut self, key: NodeKey, scale: Vec3) {
        if self.nodes.contains_key(key) {
            self.nodes[key].local.scale = scale;
            self.mark_subtree_dirty(key);
        }
    }

    /// Local position
    pub fn local_position(&self, key: NodeKey) -> Option<Vec3> {
        self.nodes.get(key).map(|n| n.local.position)
    }

    /// Local rotation quaternion
    pub fn local_rotation(&self, key: NodeKey) -> Option<Quat> {
        self.nodes.get(key).map(|n| n.local.rotation)
    }

    /// Local rotation as Euler angles (radians, roll/pitch/yaw)
    pub fn local_euler_angles(&self, key: NodeKey) -> Option<(f32, f32, f32)> {
        self.nodes.get(key).map(|n| n.local.rotation.euler_angles())
    }

    /// Local scale
    pub fn local_scale(&self, key: NodeKey) -> Option<Vec3> {
        self.nodes.get(key).map(|n| n.local.scale)
    }

    // --- world transform accessors ---

    /// World matrix of a node, recomputing the dirty ancestor chain lazily
    pub fn world_transform(&mut self, key: NodeKey) -> Option<Mat4> {
        if !self.nodes.contains_key(key) {
            return None;
        }
        self.update_world(key);
        Some(self.nodes[key].world_matrix)
    }

    /// World position (translation part of the world matrix)
    pub fn world_position(&mut self, key: NodeKey) -> Option<Vec3> {
        self.world_transform(key)
            .map(|m| Vec3::new(m.m14, m.m24, m.m34))
    }

    /// World rotation, decomposed from the world matrix
    pub fn world_rotation(&mut self, key: NodeKey) -> Option<Quat> {
        self.world_transform(key)
            .map(|m| Transform::from_matrix(m).rotation)
    }

    /// World scale, decomposed from the world matrix
    pub fn world_scale(&mut self, key: NodeKey) -> Option<Vec3> {
        self.world_transform(key)
            .map(|m| Transform::from_matrix(m).scale)
    }

    /// Set the world position by converting into the parent's space
    pub fn set_world_position(&mut self, key: NodeKey, position: Vec3) {
        let Some(parent) = self.nodes.get(key).and_then(SceneNode::parent) else {
            return;
        };
        let Some(parent_world) = self.world_transform(parent) else {
            return;
        };
        let Some(inverse) = parent_world.try_inverse() else {
            log::warn!("set_world_position: parent world matrix is singular");
            return;
        };
        let local = inverse.transform_point(&position.into());
        self.set_local_position(key, local.coords);
    }

    /// Set the world rotation by converting into the parent's space
    pub fn set_world_rotation(&mut self, key: NodeKey, rotation: Quat) {
        let Some(parent) = self.nodes.get(key).and_then(SceneNode::parent) else {
            return;
        };
        let Some(parent_rotation) = self.world_rotation(parent) else {
            return;
        };
        self.set_local_rotation(key, parent_rotation.inverse() * rotation);
    }

    /// Set the world scale by converting into the parent's space
    ///
    /// A zero parent scale axis has no local-space preimage; the call
    /// warns and leaves the node untouched.
    pub fn set_world_scale(&mut self, key: NodeKey, scale: Vec3) {
        let Some(parent) = self.nodes.get(key).and_then(SceneNode::parent) else {
            return;
        };
        let Some(parent_scale) = self.world_scale(parent) else {
            return;
        };
        if parent_scale.iter().any(|&s| s == 0.0) {
            log::warn!("set_world_scale: parent has a zero scale axis");
            return;
        }
        self.set_local_scale(key, scale.component_div(&parent_scale));
    }

    /// Recompute every dirty world matrix in one pass
    ///
    /// The renderer calls this at frame start so the cull pass can read
    /// world transforms without mutation.
    pub fn update_world_transforms(&mut self) {
        let mut stack = vec![self.root];
        while let Some(key) = stack.pop() {
            self.update_world(key);
            stack.extend_from_slice(&self.nodes[key].children);
        }
    }

    fn update_world(&mut self, key: NodeKey) {
        if !self.nodes[key].world_dirty {
            return;
        }

        // Walk up to the nearest clean ancestor, then recompute downward.
        // Invalidation always dirties whole subtrees, so a clean node's
        // cached matrix is trustworthy.
        let mut chain = vec![key];
        let mut cursor = key;
        while let Some(parent) = self.nodes[cursor].parent {
            if !self.nodes[parent].world_dirty {
                break;
            }
            chain.push(parent);
            cursor = parent;
        }

        for current in chain.into_iter().rev() {
            let parent_matrix = self.nodes[current]
                .parent
                .map_or_else(Mat4::identity, |p| self.nodes[p].world_matrix);
            let node = &mut self.nodes[current];
            node.world_matrix = parent_matrix * node.local.to_matrix();
            node.world_dirty = false;
        }
    }

    // --- enable state ---

    /// Set the node's own enable flag
    pub fn set_enabled(&mut self, key: NodeKey, enabled: bool) {
        if let Some(node) = self.nodes.get_mut(key) {
            node.enabled = enabled;
        }
    }

    /// Effective enable state: the AND of this node's flag and every
    /// ancestor's flag, evaluated on demand
    pub fn is_enabled_in_hierarchy(&self, key: NodeKey) -> bool {
        let mut cursor = Some(key);
        while let Some(current) = cursor {
            match self.nodes.get(current) {
                Some(node) if node.enabled => cursor = node.parent,
                _ => return false,
            }
        }
        true
    }

    // --- tags ---

    /// Attach a string tag to a node
    pub fn add_tag(&mut self, key: NodeKey, tag: impl Into<String>) {
        if let Some(node) = self.nodes.get_mut(key) {
            node.tags.insert(tag.into());
        }
    }

    /// Remove a tag; absent tags are a silent no-op
    pub fn remove_tag(&mut self, key: NodeKey, tag: &str) {
        if let Some(node) = self.nodes.get_mut(key) {
            node.tags.remove(tag);
        }
    }

    // --- search and traversal ---

    /// Depth-first preorder traversal from `start`
    pub fn traverse(&self, start: NodeKey, mut visitor: impl FnMut(NodeKey, &SceneNode)) {
        if !self.nodes.contains_key(start) {
            return;
        }
        let mut stack = vec![start];
        while let Some(key) = stack.pop() {
            let node = &self.nodes[key];
            visitor(key, node);
            // Reverse order keeps depth-first visitation in child order
            stack.extend(node.children.iter().rev());
        }
    }

    /// First node (depth-first from the root) matching a predicate
    pub fn find(&self, predicate: impl Fn(&SceneNode) -> bool) -> Option<NodeKey> {
        let mut found = None;
        self.traverse(self.root, |key, node| {
            if found.is_none() && predicate(node) {
                found = Some(key);
            }
        });
        found
    }

    /// First node with the given name
    pub fn find_by_name(&self, name: &str) -> Option<NodeKey> {
        self.find(|node| node.name == name)
    }

    /// Resolve a slash-separated path of names starting below the root
    ///
    /// `"vehicle/wheel_fl"` finds a root child named `vehicle`, then its
    /// child named `wheel_fl`. Returns `None` for any missing segment.
    pub fn find_by_path(&self, path: &str) -> Option<NodeKey> {
        let mut cursor = self.root;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            cursor = *self.nodes[cursor]
                .children
                .iter()
                .find(|&&child| self.nodes[child].name == segment)?;
        }
        if cursor == self.root {
            None
        } else {
            Some(cursor)
        }
    }

    /// All nodes carrying every one of the given tags
    pub fn find_by_tags(&self, tags: &[&str]) -> Vec<NodeKey> {
        let mut result = Vec::new();
        self.traverse(self.root, |key, node| {
            if tags.iter().all(|tag| node.tags.contains(*tag)) {
                result.push(key);
            }
        });
        result
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}
