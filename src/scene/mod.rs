//! Scene graph
//!
//! Nodes live in a generational arena and are addressed by [`NodeId`]. A node's parent is a
//! back-reference id, never an ownership edge. Components attached to nodes get an
//! engine-wide [`ObjectId`] that the pipeline uses to key per-object caches.

mod camera;
mod events;
mod light;
mod transform;

pub use camera::*;
pub use events::*;
pub use light::*;
pub use transform::*;

use slotmap::{new_key_type, SlotMap};

use crate::error::{RenderError, RenderResult};
use crate::resources::{MeshFilter, MeshRenderer};

new_key_type! {
    /// Id of a node in a [`Scene`]. Ids of removed nodes never resolve again.
    pub struct NodeId;
}

/// Engine-wide id of a component (camera, light, sub-mesh renderer, skybox)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub(crate) u64);

impl ObjectId {
    /// Id of a component that was never attached to a scene
    pub const INVALID: Self = Self(0);

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Layer mask for selective rendering.
///
/// A node is drawn by a camera, and lit by a light, only if their masks share a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerMask(pub u32);

impl LayerMask {
    /// Default layer (layer 0).
    pub const DEFAULT: Self = Self(1);

    /// All layers enabled.
    pub const ALL: Self = Self(u32::MAX);

    /// No layers enabled.
    pub const NONE: Self = Self(0);

    /// Creates a mask with a single layer enabled.
    #[inline]
    pub const fn layer(layer: u8) -> Self {
        Self(1 << (layer as u32 & 31))
    }

    #[inline]
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Adds a layer to this mask.
    #[inline]
    #[must_use]
    pub const fn with_layer(self, layer: u8) -> Self {
        Self(self.0 | (1 << (layer as u32 & 31)))
    }

    #[inline]
    pub const fn contains_layer(&self, layer: u8) -> bool {
        (self.0 & (1 << (layer as u32 & 31))) != 0
    }

    /// Checks if this mask shares at least one layer with another.
    #[inline]
    pub const fn intersects(&self, other: &LayerMask) -> bool {
        (self.0 & other.0) != 0
    }
}

impl Default for LayerMask {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Per-frame data the render pipeline stores on each visited node
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProcessingDescriptor {
    /// World transform: parent aggregate composed with the local transform
    pub aggregate: Transform,
    /// Whether `WillRender` was already sent this frame
    pub will_render_dispatched: bool,
}

/// A node of the scene graph
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    /// Transform relative to the parent
    pub transform: Transform,
    /// Inactive nodes and their whole subtree are skipped by the pipeline
    pub active: bool,
    /// Static nodes keep their cached shadow volumes between frames
    pub is_static: bool,
    pub layer_mask: LayerMask,
    pub camera: Option<Camera>,
    pub light: Option<Light>,
    pub renderer: Option<MeshRenderer>,
    pub mesh_filter: Option<MeshFilter>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) processing: ProcessingDescriptor,
}

impl SceneNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::IDENTITY,
            active: true,
            is_static: false,
            layer_mask: LayerMask::DEFAULT,
            camera: None,
            light: None,
            renderer: None,
            mesh_filter: None,
            parent: None,
            children: Vec::new(),
            processing: ProcessingDescriptor::default(),
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Data computed for this node by the last scene walk
    pub fn processing(&self) -> &ProcessingDescriptor {
        &self.processing
    }

    /// World transform computed by the last scene walk
    pub fn aggregate_transform(&self) -> Transform {
        self.processing.aggregate
    }
}

/// Scene graph with a single root node
#[derive(Debug)]
pub struct Scene {
    nodes: SlotMap<NodeId, SceneNode>,
    root: NodeId,
    next_object_id: u64,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(SceneNode::new("root"));
        Self {
            nodes,
            root,
            next_object_id: 1,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes, root included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
        self.nodes.iter()
    }

    /// Allocate a fresh component id. Ids are never reused.
    pub fn allocate_object_id(&mut self) -> ObjectId {
        let id = ObjectId(self.next_object_id);
        self.next_object_id += 1;
        id
    }

    /// Create a node under the root
    pub fn create_node(&mut self, name: impl Into<String>) -> NodeId {
        let root = self.root;
        self.insert_child(root, SceneNode::new(name))
    }

    /// Create a node under `parent`
    pub fn create_child(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
    ) -> RenderResult<NodeId> {
        if !self.nodes.contains_key(parent) {
            return Err(RenderError::InvalidNode(parent));
        }
        Ok(self.insert_child(parent, SceneNode::new(name)))
    }

    fn insert_child(&mut self, parent: NodeId, mut node: SceneNode) -> NodeId {
        node.parent = Some(parent);
        let id = self.nodes.insert(node);
        if let Some(parent) = self.nodes.get_mut(parent) {
            parent.children.push(id);
        }
        id
    }

    /// Move `child` (with its subtree) under `parent`
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> RenderResult<()> {
        if !self.nodes.contains_key(parent) {
            return Err(RenderError::InvalidNode(parent));
        }
        if !self.nodes.contains_key(child) || child == self.root {
            return Err(RenderError::InvalidNode(child));
        }
        // Refuse to hang a node below its own descendant
        let mut ancestor = Some(parent);
        while let Some(id) = ancestor {
            if id == child {
                return Err(RenderError::InvalidNode(child));
            }
            ancestor = self.nodes.get(id).and_then(|n| n.parent);
        }

        self.detach(child);
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(parent) = self.nodes.get_mut(parent) {
            parent.children.push(child);
        }
        Ok(())
    }

    fn detach(&mut self, child: NodeId) {
        let Some(old_parent) = self.nodes.get(child).and_then(|n| n.parent) else {
            return;
        };
        if let Some(parent) = self.nodes.get_mut(old_parent) {
            parent.children.retain(|&c| c != child);
        }
    }

    /// Remove a node and its whole subtree. The root cannot be removed.
    pub fn remove_node(&mut self, id: NodeId) -> RenderResult<()> {
        if id == self.root || !self.nodes.contains_key(id) {
            return Err(RenderError::InvalidNode(id));
        }
        self.detach(id);

        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(node) = self.nodes.remove(next) {
                pending.extend(node.children);
            }
        }
        Ok(())
    }

    /// Attach a camera, assigning ids to it and its skybox
    pub fn set_camera(&mut self, node: NodeId, mut camera: Camera) -> RenderResult<ObjectId> {
        if !self.nodes.contains_key(node) {
            return Err(RenderError::InvalidNode(node));
        }
        camera.id = self.allocate_object_id();
        if let Some(skybox) = camera.skybox.as_mut() {
            skybox.id = self.allocate_object_id();
        }
        let id = camera.id;
        if let Some(n) = self.nodes.get_mut(node) {
            n.camera = Some(camera);
        }
        Ok(id)
    }

    pub fn set_light(&mut self, node: NodeId, mut light: Light) -> RenderResult<ObjectId> {
        if !self.nodes.contains_key(node) {
            return Err(RenderError::InvalidNode(node));
        }
        light.id = self.allocate_object_id();
        let id = light.id;
        if let Some(n) = self.nodes.get_mut(node) {
            n.light = Some(light);
        }
        Ok(id)
    }

    /// Attach a renderer, assigning an id to each of its sub-renderers
    pub fn set_renderer(&mut self, node: NodeId, mut renderer: MeshRenderer) -> RenderResult<()> {
        if !self.nodes.contains_key(node) {
            return Err(RenderError::InvalidNode(node));
        }
        for sub in renderer.sub_renderers_mut() {
            sub.id = self.allocate_object_id();
        }
        if let Some(n) = self.nodes.get_mut(node) {
            n.renderer = Some(renderer);
        }
        Ok(())
    }

    pub fn set_mesh_filter(&mut self, node: NodeId, filter: MeshFilter) -> RenderResult<()> {
        let n = self
            .nodes
            .get_mut(node)
            .ok_or(RenderError::InvalidNode(node))?;
        n.mesh_filter = Some(filter);
        Ok(())
    }

    /// Attach a mesh filter together with its renderer
    pub fn set_mesh(
        &mut self,
        node: NodeId,
        filter: MeshFilter,
        renderer: MeshRenderer,
    ) -> RenderResult<()> {
        self.set_mesh_filter(node, filter)?;
        self.set_renderer(node, renderer)
    }

    /// Send `event` to every active node, depth-first from the root.
    ///
    /// Inactive nodes and their subtrees receive nothing.
    pub fn broadcast(&self, event: SceneEvent, dispatcher: &mut dyn EventDispatcher) {
        let mut pending = vec![self.root];
        while let Some(id) = pending.pop() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            if !node.active {
                continue;
            }
            dispatcher.dispatch(id, event);
            pending.extend(node.children.iter().rev());
        }
    }
}
