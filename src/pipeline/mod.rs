//! Forward rendering pipeline
//!
//! Each camera renders its target in a fixed pass order:
//! 1. Ambient lights
//! 2. Depth pre-pass (optional)
//! 3. SSAO (optional, standard mode)
//! 4. Per light: shadow volumes into the stencil, then lit geometry
//! 5. SSAO (optional, outline mode)
//! 6. Unlit materials
//! 7. Skybox

mod config;
pub mod culling;
mod draw;
mod forward;
mod render_queue;
mod render_target_stack;
mod shadow_cache;
mod view;

pub use config::*;
pub use draw::*;
pub use forward::*;
pub use render_queue::*;
pub use render_target_stack::*;
pub use shadow_cache::*;
pub use view::*;
