//! Asset locations and the per-process session.

pub mod assets;

pub use assets::*;
