//! Pure Rust runtime for 2D cut-out skeletal rigs.
//!
//! Poses bones through their inheritance modes, solves IK and transform
//! constraints, resolves skins to attachments and turns the result into
//! clipped, renderer-agnostic triangle lists.

#![forbid(unsafe_code)]

mod atlas;
mod attachment;
mod bounds;
mod error;
mod geometry;
mod math;
mod model;
mod render;
mod runtime;
mod skin;

#[cfg(feature = "json")]
pub mod json;

pub use atlas::*;
pub use attachment::*;
pub use bounds::*;
pub use error::*;
pub use geometry::*;
pub use model::*;
pub use render::*;
pub use runtime::*;
pub use skin::*;

#[cfg(test)]
mod geometry_tests;



#[cfg(test)]
mod bounds_tests;
