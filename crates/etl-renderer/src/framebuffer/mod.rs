//! Offscreen rendering: target layout, kernel weights and the passes that
//! take the scene from the offscreen set to the window.

pub mod offscreen;
pub mod postprocess;
pub mod weights;

pub use offscreen::OffscreenLayout;
pub use postprocess::{supersample_offsets, texture_lod_bias, PostProcessor};
pub use weights::{halton, ScalingWeights};
