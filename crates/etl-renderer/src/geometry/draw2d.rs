//! 2D drawing geometry
//!
//! Quad and fan builders for pics, rotated pics, gradients and polygons
//! drawn in screen space.

use etl_common::q_shared::M_TAU_F;

use super::tess::{BatchSink, Tessellator};

/// Triangle order of a screen-space quad (corners clockwise from top-left).
pub const QUAD_INDEXES: [u32; 6] = [3, 0, 2, 2, 0, 1];

/// Screen rectangle with texture coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StretchPic {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub s1: f32,
    pub t1: f32,
    pub s2: f32,
    pub t2: f32,
    /// Turns; only read by rotated pics.
    pub angle: f32,
    /// Bottom edge color; only read by gradient pics.
    pub gradient_color: [u8; 4],
}

/// Vertex of a 2D polygon.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PolyVert {
    pub xyz: [f32; 3],
    pub st: [f32; 2],
    pub modulate: [u8; 4],
}

/// Axis-aligned quad. `bottom` colors the two lower corners.
pub fn push_stretch_quad(
    tess: &mut Tessellator,
    sink: &mut dyn BatchSink,
    pic: &StretchPic,
    color: [u8; 4],
    bottom: [u8; 4],
) {
    tess.check_overflow(4, 6, sink);
    let base = tess.num_vertexes();

    tess.push_vertex([pic.x, pic.y, 0.0], [pic.s1, pic.t1], color);
    tess.push_vertex([pic.x + pic.w, pic.y, 0.0], [pic.s2, pic.t1], color);
    tess.push_vertex([pic.x + pic.w, pic.y + pic.h, 0.0], [pic.s2, pic.t2], bottom);
    tess.push_vertex([pic.x, pic.y + pic.h, 0.0], [pic.s1, pic.t2], bottom);

    tess.push_indexes(base, &QUAD_INDEXES);
}

/// Quad whose corners sit on an ellipse around (x, y), starting at
/// `angle` turns and advancing a quarter turn per corner.
pub fn push_rotated_quad(tess: &mut Tessellator, sink: &mut dyn BatchSink, pic: &StretchPic, color: [u8; 4]) {
    tess.check_overflow(4, 6, sink);
    let base = tess.num_vertexes();

    let st = [[pic.s1, pic.t1], [pic.s2, pic.t1], [pic.s2, pic.t2], [pic.s1, pic.t2]];
    for (k, st) in st.iter().enumerate() {
        let angle = pic.angle * M_TAU_F + k as f32 * 0.25 * M_TAU_F;
        tess.push_vertex(
            [pic.x + angle.cos() * pic.w, pic.y + angle.sin() * pic.h, 0.0],
            *st,
            color,
        );
    }

    tess.push_indexes(base, &QUAD_INDEXES);
}

/// Triangle fan with per-vertex colors.
pub fn push_poly_fan(tess: &mut Tessellator, sink: &mut dyn BatchSink, verts: &[PolyVert]) {
    if verts.len() < 3 {
        return;
    }
    tess.check_overflow(verts.len(), (verts.len() - 2) * 3, sink);
    let base = tess.num_vertexes();

    for i in 0..verts.len() as u32 - 2 {
        tess.push_indexes(base, &[0, i + 1, i + 2]);
    }
    for v in verts {
        tess.push_vertex([v.xyz[0], v.xyz[1], 0.0], v.st, v.modulate);
    }
}
