mod bone;
mod ik;
mod skeleton;
mod transform;

pub use bone::*;
pub use ik::{IkConstraint, apply_ik_one, apply_ik_two};
pub use skeleton::*;
pub use transform::*;

#[cfg(test)]
mod bone_tests;


#[cfg(test)]
mod transform_constraint_tests;

#[cfg(test)]
mod skeleton_tests;
