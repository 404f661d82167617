//! Backend abstraction layer
//!
//! Provides the trait the forward pipeline draws through, the value types it exchanges with
//! a backend, and a headless recording implementation.

pub mod recording;
pub mod traits;
pub mod types;

pub use recording::*;
pub use traits::*;
pub use types::*;
