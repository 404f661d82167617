//! Per-material render queues
//!
//! Queue entries are rebuilt by every scene walk and never outlive the frame. The manager
//! keeps one queue per [`RenderQueueId`] and always yields them in ascending id order;
//! within a queue, entries keep the order they were added in.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::resources::{Material, Mesh, RenderQueueId, SubMesh};
use crate::scene::{LayerMask, NodeId, ObjectId, Transform};

/// One sub-mesh of one node, ready to draw
#[derive(Debug, Clone)]
pub struct RenderQueueEntry {
    pub node: NodeId,
    pub mesh: Arc<Mesh>,
    pub sub_mesh_index: usize,
    /// Id of the sub-mesh renderer drawing this entry
    pub renderer: ObjectId,
    pub material: Arc<Material>,
    pub cast_shadows: bool,
    pub receive_shadows: bool,
    pub use_back_set_shadow_volume: bool,
    pub is_static: bool,
    pub layer_mask: LayerMask,
    /// Node world transform at the time of the walk
    pub aggregate: Transform,
    /// Drawn at least once in the current render target pass
    pub rendered: bool,
}

impl RenderQueueEntry {
    pub fn sub_mesh(&self) -> Option<&SubMesh> {
        self.mesh.sub_mesh(self.sub_mesh_index)
    }
}

/// Entries sharing a render queue id, in insertion order
#[derive(Debug, Default)]
pub struct RenderQueue {
    entries: Vec<RenderQueueEntry>,
}

impl RenderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entry: RenderQueueEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[RenderQueueEntry] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [RenderQueueEntry] {
        &mut self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Render queues keyed by queue id
#[derive(Debug, Default)]
pub struct RenderQueueManager {
    queues: BTreeMap<RenderQueueId, RenderQueue>,
}

impl RenderQueueManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty every queue. Queues themselves are kept for reuse.
    pub fn clear_all_render_queues(&mut self) {
        for queue in self.queues.values_mut() {
            queue.clear();
        }
    }

    /// Get the queue for `id`, creating it if needed
    pub fn render_queue_for_id(&mut self, id: RenderQueueId) -> &mut RenderQueue {
        self.queues.entry(id).or_default()
    }

    /// Append an entry to the queue of its material
    pub fn add(&mut self, entry: RenderQueueEntry) {
        self.render_queue_for_id(entry.material.render_queue_id)
            .add(entry);
    }

    /// Every entry, by ascending queue id then insertion order
    pub fn iter(&self) -> impl Iterator<Item = &RenderQueueEntry> {
        self.queues.values().flat_map(|q| q.entries.iter())
    }

    /// Every entry, by ascending queue id then insertion order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RenderQueueEntry> {
        self.queues.values_mut().flat_map(|q| q.entries.iter_mut())
    }

    /// Non-empty queues with their ids, in ascending id order
    pub fn queues(&self) -> impl Iterator<Item = (RenderQueueId, &RenderQueue)> {
        self.queues
            .iter()
            .filter(|(_, q)| !q.is_empty())
            .map(|(&id, q)| (id, q))
    }

    /// Reset the "rendered at least once" flag of every entry
    pub fn clear_rendered_flags(&mut self) {
        for entry in self.iter_mut() {
            entry.rendered = false;
        }
    }

    /// Number of queues, empty ones included
    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Total number of entries across all queues
    pub fn entry_count(&self) -> usize {
        self.queues.values().map(RenderQueue::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use slotmap::SlotMap;

    fn entry(node: NodeId, queue: i32, order: usize) -> RenderQueueEntry {
        RenderQueueEntry {
            node,
            mesh: Arc::new(Mesh::cube(1.0)),
            sub_mesh_index: 0,
            renderer: ObjectId(order as u64 + 1),
            material: Arc::new(Material::new("m").with_render_queue(RenderQueueId(queue))),
            cast_shadows: false,
            receive_shadows: false,
            use_back_set_shadow_volume: false,
            is_static: false,
            layer_mask: LayerMask::DEFAULT,
            aggregate: Transform::IDENTITY,
            rendered: false,
        }
    }

    #[test]
    fn iteration_groups_by_ascending_id_then_insertion_order() {
        let mut nodes: SlotMap<NodeId, ()> = SlotMap::with_key();
        let node = nodes.insert(());
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for _ in 0..32 {
            let mut manager = RenderQueueManager::new();
            let queue_ids: Vec<i32> = (0..rng.gen_range(1..6))
                .map(|_| rng.gen_range(-10..5000))
                .collect();
            let count = rng.gen_range(0..64);
            let mut inserted = Vec::new();
            for order in 0..count {
                let queue = queue_ids[rng.gen_range(0..queue_ids.len())];
                manager.add(entry(node, queue, order));
                inserted.push((queue, order as u64 + 1));
            }

            // A stable sort by queue id is exactly the promised order
            inserted.sort_by_key(|&(queue, _)| queue);
            let visited: Vec<(i32, u64)> = manager
                .iter()
                .map(|e| (e.material.render_queue_id.0, e.renderer.raw()))
                .collect();
            assert_eq!(visited, inserted);
            assert_eq!(manager.entry_count(), count);
        }
    }

    #[test]
    fn clearing_keeps_queues_but_drops_entries() {
        let mut nodes: SlotMap<NodeId, ()> = SlotMap::with_key();
        let node = nodes.insert(());
        let mut manager = RenderQueueManager::new();
        manager.add(entry(node, 2000, 0));
        manager.add(entry(node, 3000, 1));

        manager.clear_all_render_queues();
        assert_eq!(manager.len(), 2);
        assert_eq!(manager.entry_count(), 0);
        assert_eq!(manager.queues().count(), 0);
    }

    #[test]
    fn rendered_flags_reset() {
        let mut nodes: SlotMap<NodeId, ()> = SlotMap::with_key();
        let node = nodes.insert(());
        let mut manager = RenderQueueManager::new();
        manager.add(entry(node, 2000, 0));
        manager.add(entry(node, 1000, 1));
        for e in manager.iter_mut() {
            e.rendered = true;
        }

        manager.clear_rendered_flags();
        assert!(manager.iter().all(|e| !e.rendered));
    }

    #[test]
    fn render_queue_for_id_creates_on_demand() {
        let mut manager = RenderQueueManager::new();
        assert!(manager.is_empty());
        assert!(manager.render_queue_for_id(RenderQueueId::OVERLAY).is_empty());
        assert_eq!(manager.len(), 1);
    }
}
