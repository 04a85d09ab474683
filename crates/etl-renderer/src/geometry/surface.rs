//! Surface kinds and how each appends itself to the current batch.

use etl_common::common::com_warning;
use etl_common::q_shared::*;

use crate::geometry::tess::{BatchSink, Tessellator};
use crate::tr_local::RefEntity;

/// Triangle order of a quad stamp.
pub const QUAD_STAMP_INDEXES: [u32; 6] = [0, 1, 3, 3, 1, 2];

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SurfaceVertex {
    pub xyz: Vec3,
    pub st: Vec2,
    pub color: [u8; 4],
}

/// Geometry referenced by a draw surface.
#[derive(Clone, Debug, PartialEq)]
pub enum Surface {
    /// Corrupt reference; warns when drawn.
    Bad,
    /// Placeholder that contributes nothing.
    Skip,
    /// Precomputed triangle soup (planar faces, meshes, triangle lists).
    Face { verts: Vec<SurfaceVertex>, indexes: Vec<u32> },
    /// Convex polygon drawn as a fan.
    Poly { verts: Vec<SurfaceVertex> },
    /// Camera-facing quad built from the current entity.
    Sprite,
    /// Light flare; queued for the flare pass.
    Flare { origin: Vec3, normal: Vec3, color: Vec3 },
}

/// A flare collected during the surface walk.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PendingFlare {
    pub origin: Vec3,
    pub normal: Vec3,
    pub color: Vec3,
    pub fog_num: usize,
}

/// Per-surface inputs besides the batch itself.
pub struct SurfaceContext<'a> {
    /// Entity being drawn, `None` for world surfaces.
    pub entity: Option<&'a RefEntity>,
    /// Camera axes.
    pub view_axis: [Vec3; 3],
    pub is_mirror: bool,
    pub flares: &'a mut Vec<PendingFlare>,
}

impl Surface {
    pub fn append(&self, tess: &mut Tessellator, sink: &mut dyn BatchSink, ctx: &mut SurfaceContext<'_>) {
        match self {
            Surface::Bad => com_warning("Bad surface tesselated.\n"),
            Surface::Skip => {}
            Surface::Face { verts, indexes } => {
                tess.check_overflow(verts.len(), indexes.len(), sink);
                let base = tess.num_vertexes();
                for v in verts {
                    tess.push_vertex(v.xyz, v.st, v.color);
                }
                tess.push_indexes(base, indexes);
            }
            Surface::Poly { verts } => {
                if verts.len() < 3 {
                    return;
                }
                tess.check_overflow(verts.len(), 3 * (verts.len() - 2), sink);
                let base = tess.num_vertexes();
                for i in 0..verts.len() - 2 {
                    tess.push_indexes(base, &[0, i as u32 + 1, i as u32 + 2]);
                }
                for v in verts {
                    tess.push_vertex(v.xyz, v.st, v.color);
                }
            }
            Surface::Sprite => {
                let Some(entity) = ctx.entity else {
                    return;
                };
                let (left, up) = sprite_axes(entity, &ctx.view_axis, ctx.is_mirror);
                add_quad_stamp(tess, sink, &entity.origin, &left, &up, entity.shader_rgba);
            }
            Surface::Flare { origin, normal, color } => {
                ctx.flares.push(PendingFlare {
                    origin: *origin,
                    normal: *normal,
                    color: *color,
                    fog_num: tess.fog_num,
                });
            }
        }
    }
}

/// Left and up half-extents of a sprite, rotated by the entity roll.
pub fn sprite_axes(entity: &RefEntity, view_axis: &[Vec3; 3], is_mirror: bool) -> (Vec3, Vec3) {
    let radius = entity.radius;
    let mut left;
    let up;

    if entity.rotation == 0.0 {
        left = vector_scale(&view_axis[1], radius);
        up = vector_scale(&view_axis[2], radius);
    } else {
        let ang = std::f32::consts::PI * entity.rotation / 180.0;
        let (s, c) = ang.sin_cos();

        left = vector_scale(&view_axis[1], c * radius);
        left = vector_ma(&left, -s * radius, &view_axis[2]);

        let u = vector_scale(&view_axis[2], c * radius);
        up = vector_ma(&u, s * radius, &view_axis[1]);
    }

    if is_mirror {
        left = vector_subtract(&VEC3_ORIGIN, &left);
    }

    (left, up)
}

/// Append a quad centered on `origin`.
pub fn add_quad_stamp(
    tess: &mut Tessellator,
    sink: &mut dyn BatchSink,
    origin: &Vec3,
    left: &Vec3,
    up: &Vec3,
    color: [u8; 4],
) {
    tess.check_overflow(4, 6, sink);
    let base = tess.num_vertexes();

    let ol = vector_add(origin, left);
    let or = vector_subtract(origin, left);
    tess.push_vertex(vector_add(&ol, up), [0.0, 0.0], color);
    tess.push_vertex(vector_add(&or, up), [1.0, 0.0], color);
    tess.push_vertex(vector_subtract(&or, up), [1.0, 1.0], color);
    tess.push_vertex(vector_subtract(&ol, up), [0.0, 1.0], color);

    tess.push_indexes(base, &QUAD_STAMP_INDEXES);
}
