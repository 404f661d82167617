//! LIFO of active render targets for nested offscreen passes

use crate::backend::{CubeFace, RenderBackend, RenderTargetHandle};

/// A render target as seen by the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackedTarget {
    /// The backend's default target
    Default,
    Offscreen(RenderTargetHandle, Option<CubeFace>),
}

/// Render target stack.
///
/// Every push activates the new target; every pop re-activates whatever was below it.
/// The bottom of the stack is always the default target.
#[derive(Debug, Default)]
pub struct RenderTargetStack {
    targets: Vec<StackedTarget>,
}

impl RenderTargetStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pushed targets
    pub fn depth(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Target draws currently go to
    pub fn current(&self) -> StackedTarget {
        self.targets
            .last()
            .copied()
            .unwrap_or(StackedTarget::Default)
    }

    pub fn push<B: RenderBackend + ?Sized>(&mut self, backend: &mut B, target: StackedTarget) {
        self.targets.push(target);
        activate(backend, target);
    }

    /// Pop the top target and restore the one below it
    pub fn pop<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) -> Option<StackedTarget> {
        let popped = self.targets.pop();
        debug_assert!(popped.is_some(), "render target stack underflow");
        if popped.is_none() {
            log::error!("Render target stack underflow");
        }
        activate(backend, self.current());
        popped
    }
}

fn activate<B: RenderBackend + ?Sized>(backend: &mut B, target: StackedTarget) {
    match target {
        StackedTarget::Default => backend.restore_default_render_target(),
        StackedTarget::Offscreen(handle, face) => backend.activate_render_target(handle, face),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{RecordingBackend, RenderTargetDescriptor};

    #[test]
    fn pop_restores_previous_target() {
        let mut backend = RecordingBackend::new();
        let outer = backend
            .create_render_target(&RenderTargetDescriptor::default())
            .unwrap()
            .handle;
        let inner = backend
            .create_render_target(&RenderTargetDescriptor::default())
            .unwrap()
            .handle;
        let mut stack = RenderTargetStack::new();

        stack.push(&mut backend, StackedTarget::Offscreen(outer, None));
        stack.push(
            &mut backend,
            StackedTarget::Offscreen(inner, Some(CubeFace::PositiveY)),
        );
        assert_eq!(
            backend.active_render_target(),
            Some((inner, Some(CubeFace::PositiveY)))
        );

        stack.pop(&mut backend);
        assert_eq!(backend.active_render_target(), Some((outer, None)));
        stack.pop(&mut backend);
        assert_eq!(backend.active_render_target(), None);
        assert!(stack.is_empty());
        assert_eq!(stack.current(), StackedTarget::Default);
    }
}
