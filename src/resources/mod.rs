//! Resources consumed by the render pipeline
//!
//! Meshes, materials and the renderer components that draw them.

mod material;
mod mesh;
mod renderer;
pub mod shadow_volume;

pub use material::*;
pub use mesh::*;
pub use renderer::*;
pub use shadow_volume::{ExtrusionParams, LightSource};
