//! Lifecycle notifications sent to scene nodes

use super::NodeId;

/// Lifecycle event delivered to a scene node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneEvent {
    Awake,
    Start,
    Update,
    /// Sent once per frame, right before the node's first lit draw
    WillRender,
}

/// Receiver of scene node lifecycle events.
///
/// The render manager owns one and calls it during `render_scene`; the application decides
/// what a node does with the event.
pub trait EventDispatcher {
    fn dispatch(&mut self, node: NodeId, event: SceneEvent);
}

/// Dispatcher that queues events for the application to drain after the frame
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Vec<(NodeId, SceneEvent)>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[(NodeId, SceneEvent)] {
        &self.events
    }

    /// Take every queued event, oldest first
    pub fn drain(&mut self) -> impl Iterator<Item = (NodeId, SceneEvent)> + '_ {
        self.events.drain(..)
    }

    /// Number of queued `event`s addressed to `node`
    pub fn count(&self, node: NodeId, event: SceneEvent) -> usize {
        self.events
            .iter()
            .filter(|&&(n, e)| n == node && e == event)
            .count()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventDispatcher for EventQueue {
    fn dispatch(&mut self, node: NodeId, event: SceneEvent) {
        self.events.push((node, event));
    }
}

impl<D: EventDispatcher + ?Sized> EventDispatcher for &mut D {
    fn dispatch(&mut self, node: NodeId, event: SceneEvent) {
        (**self).dispatch(node, event);
    }
}
