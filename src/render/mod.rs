//! Rendering of per-view source channels through an external renderer.

pub mod backend;
pub mod compositor;
pub mod naming;
pub mod process;
