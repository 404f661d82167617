//! Forward Engine - A forward rendering pipeline with stencil shadow volumes
//!
//! The pipeline walks a scene graph, sorts renderables into render queues, builds and
//! caches shadow volumes per (renderer, light) pair and issues every draw through the
//! [`RenderBackend`](backend::RenderBackend) trait.
//!
//! # Features
//! - Multi-pass forward lighting with additive or subtractive blending
//! - Stencil shadow volumes with static-pair caching
//! - Cube-map and offscreen camera targets
//! - Depth pre-pass, SSAO and skybox passes
//! - CPU skinning ahead of shadow volume extrusion
//! - Headless [`RecordingBackend`](backend::RecordingBackend) for tests and tooling

pub mod backend;
pub mod error;
pub mod pipeline;
pub mod resources;
pub mod scene;

pub use backend::{RecordingBackend, RenderBackend};
pub use error::{RenderError, RenderResult};
pub use pipeline::{ForwardRenderConfig, ForwardRenderManager};
pub use scene::{EventDispatcher, EventQueue, NodeId, Scene};
