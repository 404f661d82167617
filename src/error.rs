//! Render pipeline error types.

use thiserror::Error;

use crate::backend::BackendError;
use crate::scene::NodeId;

/// Errors produced while preparing or rendering a frame.
///
/// Most of these are not fatal: the pipeline logs them and skips the offending item so a
/// single broken asset never blanks the whole frame.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// A backend call failed.
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// A node id that no longer refers to a live scene node.
    #[error("invalid scene node {0:?}")]
    InvalidNode(NodeId),
    /// The node's mesh and renderer disagree on the number of sub-meshes.
    #[error("node {node:?} has {sub_meshes} sub-meshes but {sub_renderers} sub-renderers")]
    SubMeshMismatch {
        node: NodeId,
        sub_meshes: usize,
        sub_renderers: usize,
    },
    /// The node's renderer has no materials to draw with.
    #[error("node {0:?} renderer has no materials")]
    NoMaterials(NodeId),
    /// The node has a mesh filter but no renderer, or the reverse.
    #[error("node {0:?} is missing its renderer or mesh filter")]
    MissingRenderer(NodeId),
}

pub type RenderResult<T> = Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RenderError::from(BackendError::BufferCreationFailed("36 vertices".into()));
        assert_eq!(err.to_string(), "Failed to create buffer: 36 vertices");

        let err = RenderError::SubMeshMismatch {
            node: NodeId::default(),
            sub_meshes: 2,
            sub_renderers: 1,
        };
        assert!(err.to_string().contains("2 sub-meshes but 1 sub-renderers"));
    }
}
