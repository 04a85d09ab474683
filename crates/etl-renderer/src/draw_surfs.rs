//! Draw-surface dispatch
//!
//! Walks a sorted surface list, splitting it into batches on shader, fog,
//! dynamic-light or (non-mergable) entity changes and reloading the
//! entity transform and depth range only when the entity changes.

use std::sync::Arc;

use ash::vk;
use etl_common::common::com_warning;
use etl_common::q_shared::*;

use crate::backend::Backend;
use crate::device::{DrawBatch, GraphicsDevice, StencilTest};
use crate::geometry::{StageIterator, Surface, SurfaceContext};
use crate::sort_key::SortKey;
use crate::state_cache::StateBits;
use crate::tr_local::*;
use crate::tr_types::{same_shader, CullType, ShaderRef};

/// Multiplier applied to stenciled pixels by the shadow darkening pass.
const SHADOW_DARKEN: u8 = 153;

/// One entry of the front end's sorted list.
#[derive(Clone, Debug)]
pub struct DrawSurface {
    pub sort: SortKey,
    pub surface: Arc<Surface>,
}

impl DrawSurface {
    pub fn new(sort: SortKey, surface: Surface) -> Self {
        Self { sort, surface: Arc::new(surface) }
    }
}

/// Model transform for `entity` as seen from `view`.
pub fn rotate_for_entity(entity: &RefEntity, view: &ViewParms) -> Orientation {
    let axis = entity.axis;
    let origin = entity.origin;

    let gl_matrix: Mat4 = [
        axis[0][0], axis[0][1], axis[0][2], 0.0, //
        axis[1][0], axis[1][1], axis[1][2], 0.0, //
        axis[2][0], axis[2][1], axis[2][2], 0.0, //
        origin[0], origin[1], origin[2], 1.0,
    ];

    // viewer origin in entity space
    let delta = vector_subtract(&view.orientation.origin, &origin);
    let axis_length = if entity.non_normalized_axes {
        let len = vector_length(&axis[0]);
        if len == 0.0 {
            0.0
        } else {
            1.0 / len
        }
    } else {
        1.0
    };

    Orientation {
        origin,
        axis,
        view_origin: [
            dot_product(&delta, &axis[0]) * axis_length,
            dot_product(&delta, &axis[1]) * axis_length,
            dot_product(&delta, &axis[2]) * axis_length,
        ],
        model_matrix: mult_matrix(&gl_matrix, &view.world.model_matrix),
    }
}

/// Move dynamic light origins into the local space of `or`.
pub fn transform_dlights(dlights: &mut [DLight], or: &Orientation) {
    for dl in dlights {
        let temp = vector_subtract(&dl.origin, &or.origin);
        dl.transformed = [
            dot_product(&temp, &or.axis[0]),
            dot_product(&temp, &or.axis[1]),
            dot_product(&temp, &or.axis[2]),
        ];
    }
}

impl<D: GraphicsDevice> Backend<D> {
    /// Draw a sorted surface list for the current view.
    pub fn render_draw_surf_list(&mut self, draw_surfs: &[DrawSurface]) {
        let original_time = self.refdef.float_time;

        if !self.begin_drawing_view() {
            return;
        }

        self.current_entity = CurrentEntity::World;
        let mut old_entity: Option<usize> = None;
        let mut old_shader: Option<ShaderRef> = None;
        let mut old_fog: Option<usize> = None;
        let mut old_dlighted = false;
        let mut old_depth_range = false;
        let mut depth_range = false;
        let mut old_sort: Option<SortKey> = None;

        self.pc.c_surfaces += draw_surfs.len();

        for ds in draw_surfs {
            if old_sort == Some(ds.sort) {
                self.pc.c_fast_path += 1;
                self.append_surface(&ds.surface);
                continue;
            }
            old_sort = Some(ds.sort);
            self.pc.c_key_changes += 1;

            let parts = ds.sort.decompose();

            // entity-mergable shaders may batch across entities
            if let Some(shader) = self.shaders.sorted(parts.shader_index).cloned() {
                if !same_shader(Some(&shader), old_shader.as_ref())
                    || old_fog != Some(parts.fog_num)
                    || old_dlighted != parts.dlighted
                    || (old_entity != Some(parts.entity_num) && !shader.entity_mergable)
                {
                    if old_shader.is_some() {
                        self.end_surface();
                    }
                    self.begin_surface(shader.clone(), parts.fog_num, parts.dlighted);
                    old_shader = Some(shader);
                    old_fog = Some(parts.fog_num);
                    old_dlighted = parts.dlighted;
                }
            }

            if old_entity != Some(parts.entity_num) {
                depth_range = false;
                self.refdef.float_time = original_time;

                match self.refdef.entities.get(parts.entity_num) {
                    Some(ent) if parts.entity_num != ENTITYNUM_WORLD => {
                        self.current_entity = CurrentEntity::Ref(parts.entity_num);
                        self.orientation = rotate_for_entity(&ent.e, &self.view_parms);
                        depth_range = ent.e.renderfx.contains(RenderFx::DEPTHHACK);
                        if ent.need_dlights {
                            transform_dlights(&mut self.refdef.dlights, &self.orientation);
                        }
                    }
                    _ => {
                        if parts.entity_num != ENTITYNUM_WORLD {
                            com_warning(&format!(
                                "RB_RenderDrawSurfList: bad entity number {}\n",
                                parts.entity_num
                            ));
                        }
                        self.current_entity = CurrentEntity::World;
                        self.orientation = self.view_parms.world;
                        transform_dlights(&mut self.refdef.dlights, &self.orientation);
                    }
                }

                self.device.load_modelview(&self.orientation.model_matrix);

                if old_depth_range != depth_range {
                    let (near, far) = if depth_range { DEPTHHACK_RANGE } else { FULL_DEPTH_RANGE };
                    self.device.set_depth_range(near, far);
                    old_depth_range = depth_range;
                }

                old_entity = Some(parts.entity_num);
            }

            self.append_surface(&ds.surface);
        }

        if old_shader.is_some() {
            self.end_surface();
        }

        // back to the world modelview
        self.current_entity = CurrentEntity::World;
        self.refdef.float_time = original_time;
        self.orientation = self.view_parms.world;
        transform_dlights(&mut self.refdef.dlights, &self.orientation);

        self.device.load_modelview(&self.view_parms.world.model_matrix);
        if depth_range {
            self.device.set_depth_range(FULL_DEPTH_RANGE.0, FULL_DEPTH_RANGE.1);
        }

        self.run_deferred_effects();
    }

    fn begin_surface(&mut self, shader: ShaderRef, fog_num: usize, dlighted: bool) {
        if shader.is_sky {
            self.sky_rendered_this_view = true;
        }
        let shader_time = self.refdef.float_time - shader.time_offset as f64;
        self.tess.begin(shader, fog_num, dlighted, shader_time);
    }

    fn append_surface(&mut self, surface: &Surface) {
        let entity = match self.current_entity {
            CurrentEntity::Ref(num) => self.refdef.entities.get(num).map(|ent| &ent.e),
            _ => None,
        };
        let mut ctx = SurfaceContext {
            entity,
            view_axis: self.view_parms.orientation.axis,
            is_mirror: self.view_parms.is_mirror,
            flares: &mut self.flares,
        };
        let mut sink = StageIterator {
            device: &mut self.device,
            state: &mut self.state,
            images: &mut self.images,
            pc: &mut self.pc,
            frame_count: self.frame_count,
            no_bind: self.settings.no_bind != 0,
            is_mirror: self.view_parms.is_mirror,
        };
        surface.append(&mut self.tess, &mut sink, &mut ctx);
    }

    fn run_deferred_effects(&mut self) {
        if self.sky_rendered_this_view {
            self.effects.draw_sun(&mut self.device, &self.view_parms);
        }

        self.shadow_finish();

        self.effects.render_flares(&mut self.device, &self.view_parms, &self.flares);
        self.flares.clear();
    }

    /// Darken every pixel a stencil shadow volume touched.
    fn shadow_finish(&mut self) {
        if self.settings.shadows != 2 {
            return;
        }

        self.device.set_stencil_test(Some(StencilTest {
            op: vk::CompareOp::NOT_EQUAL,
            reference: 0,
            mask: 255,
        }));
        self.device.set_clip_plane(None);
        self.state.cull(&mut self.device, CullType::TwoSided, false);

        let white = Some(self.images.white_image);
        self.state.select_texture(&mut self.device, 0);
        self.state
            .bind(&mut self.device, &mut self.images, white, self.frame_count, false);

        self.device.load_modelview(&MAT4_IDENTITY);
        self.state.set_state(
            &mut self.device,
            StateBits::DEPTHMASK_TRUE | StateBits::SRCBLEND_DST_COLOR | StateBits::DSTBLEND_ZERO,
        );

        let gray = [SHADOW_DARKEN, SHADOW_DARKEN, SHADOW_DARKEN, 255];
        let xyz = [
            [-100.0, 100.0, -10.0, 1.0],
            [100.0, 100.0, -10.0, 1.0],
            [100.0, -100.0, -10.0, 1.0],
            [-100.0, -100.0, -10.0, 1.0],
        ];
        self.device.draw_indexed(&DrawBatch {
            xyz: &xyz,
            tex_coords: &[[0.0, 0.0]; 4],
            colors: &[gray; 4],
            indexes: &[0, 1, 2, 0, 2, 3],
        });

        self.device.set_stencil_test(None);
    }
}
