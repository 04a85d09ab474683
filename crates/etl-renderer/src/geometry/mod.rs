//! Geometry batching
//!
//! The tessellator, the surface kinds that feed it, 2D quad builders and
//! the stage iterator that turns a finished batch into draws.

mod draw2d;
mod stage;
mod surface;
mod tess;

pub use draw2d::{push_poly_fan, push_rotated_quad, push_stretch_quad, PolyVert, StretchPic, QUAD_INDEXES};
pub use stage::StageIterator;
pub use surface::{add_quad_stamp, sprite_axes, PendingFlare, Surface, SurfaceContext, SurfaceVertex, QUAD_STAMP_INDEXES};
pub use tess::{BatchSink, Tessellator};
