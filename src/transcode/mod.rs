//! Whole-dataset conversions between the per-view, flattened and sphere-normalized layouts.

pub mod flatten;
pub mod normalize;
pub mod source;
