//! View setup
//!
//! Per-view clear policy, viewport/projection setup, the portal clip plane
//! and the 2D projection used by every screen-space command.

use etl_common::q_shared::*;

use crate::backend::Backend;
use crate::device::{ClearBits, GraphicsDevice, Rect};
use crate::settings::RenderSettings;
use crate::state_cache::{StateBits, GLS_DEFAULT};
use crate::tr_local::{FogMode, RdFlags, SceneState, ViewParms};

/// Loaded as the modelview before the portal clip plane so the plane is
/// specified in view space.
pub const FLIP_MATRIX: Mat4 = [
    0.0, 0.0, -1.0, 0.0, //
    -1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

const FASTSKY_GRAY: Vec4 = [0.05, 0.05, 0.05, 1.0];
const PORTAL_GRAY: Vec4 = [0.5, 0.5, 0.5, 1.0];

/// Settings that steer the clear policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClearPolicy {
    /// Overdraw measurement or stencil shadows need a clean stencil.
    pub stencil_only: bool,
    pub fast_sky: bool,
    pub portal_sky: bool,
}

impl ClearPolicy {
    pub fn from_settings(settings: &RenderSettings) -> Self {
        Self {
            stencil_only: settings.measure_overdraw != 0 || settings.shadows == 2,
            fast_sky: settings.fast_sky != 0,
            portal_sky: settings.portal_sky != 0,
        }
    }
}

/// Buffers to clear and the clear color to load (if any).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ClearDecision {
    pub bits: ClearBits,
    pub color: Option<Vec4>,
}

/// Flickering gray shown while a predicted teleport is pending.
pub fn hyperspace_color(time: i32) -> Vec4 {
    let c = (time & 255) as f32 / 255.0;
    [c, c, c, 1.0]
}

/// Decide what to clear for a view.
pub fn decide_clear(policy: &ClearPolicy, rdflags: RdFlags, time: i32, scene: &SceneState) -> ClearDecision {
    if rdflags.contains(RdFlags::HYPERSPACE) {
        return ClearDecision {
            bits: ClearBits::COLOR,
            color: Some(hyperspace_color(time)),
        };
    }

    let no_world = rdflags.contains(RdFlags::NOWORLDMODEL);
    let fog = &scene.fog;
    let mut bits = ClearBits::empty();
    let mut color = None;

    if policy.stencil_only {
        bits |= ClearBits::STENCIL;
    } else if let Some(fog_color) = scene.global_fog {
        bits |= ClearBits::DEPTH | ClearBits::COLOR;
        let light = scene.identity_light;
        color = Some([fog_color[0] * light, fog_color[1] * light, fog_color[2] * light, 1.0]);
    } else if scene.skybox_portal {
        bits |= ClearBits::DEPTH;

        if rdflags.contains(RdFlags::SKYBOXPORTAL) {
            if policy.fast_sky || no_world {
                bits |= ClearBits::COLOR;
                color = Some(if fog.portal_view.registered {
                    fog.portal_view.color
                } else if fog.active && fog.current.registered {
                    fog.current.color
                } else {
                    PORTAL_GRAY
                });
            } else if fog.portal_view.registered {
                color = Some(fog.portal_view.color);
                if fog.portal_view.clearscreen {
                    bits |= ClearBits::COLOR;
                }
            }
        } else if fog.active && fog.current.registered {
            if rdflags.contains(RdFlags::UNDERWATER) {
                if fog.current.mode == FogMode::Linear {
                    bits |= ClearBits::COLOR;
                }
            } else if !policy.portal_sky {
                bits |= ClearBits::COLOR;
            }
            color = Some(fog.current.color);
        } else if !policy.portal_sky {
            bits |= ClearBits::COLOR;
            color = Some(PORTAL_GRAY);
        }
    } else {
        bits |= ClearBits::DEPTH;

        if no_world {
            // color stays untouched
        } else if policy.fast_sky {
            bits |= ClearBits::COLOR;
            color = Some(if fog.current.registered { fog.current.color } else { FASTSKY_GRAY });
        } else if fog.current.registered {
            color = Some(fog.current.color);
            if fog.current.clearscreen {
                bits |= ClearBits::COLOR;
            }
        }
    }

    if no_world {
        bits.remove(ClearBits::COLOR);
    }

    ClearDecision { bits, color }
}

/// Portal plane in the camera frame, ready for the flip matrix.
pub fn portal_clip_plane(view: &ViewParms) -> [f64; 4] {
    let plane = &view.portal_plane;
    let or = &view.orientation;
    [
        dot_product(&or.axis[0], &plane.normal) as f64,
        dot_product(&or.axis[1], &plane.normal) as f64,
        dot_product(&or.axis[2], &plane.normal) as f64,
        (dot_product(&plane.normal, &or.origin) - plane.dist) as f64,
    ]
}

impl<D: GraphicsDevice> Backend<D> {
    fn set_viewport_and_scissor(&mut self) {
        let vp = &self.view_parms;
        let rect = Rect::new(vp.viewport_x, vp.viewport_y, vp.viewport_width, vp.viewport_height);
        self.device.load_projection(&vp.projection_matrix);
        self.device.set_viewport(rect);
        self.device.set_scissor(rect);
    }

    /// Prepare to draw the surfaces of the current view. Returns `false`
    /// when the view is in hyperspace and nothing else should be drawn.
    pub fn begin_drawing_view(&mut self) -> bool {
        if self.settings.finish == 1 && !self.state.finish_called {
            self.device.finish();
            self.state.finish_called = true;
        }
        if self.settings.finish == 0 {
            self.state.finish_called = true;
        }

        // 2D needs its projection reloaded after this
        self.projection_2d = false;

        self.set_viewport_and_scissor();

        // depth writes must be on for the depth clear
        self.state.set_state(&mut self.device, GLS_DEFAULT);

        let policy = ClearPolicy::from_settings(&self.settings);
        let decision = decide_clear(&policy, self.refdef.rdflags, self.refdef.time, &self.scene);
        if let Some(color) = decision.color {
            self.device.set_clear_color(color);
        }
        if !decision.bits.is_empty() {
            self.device.clear(decision.bits);
        }

        if self.refdef.rdflags.contains(RdFlags::HYPERSPACE) {
            self.is_hyperspace = true;
            return false;
        }
        self.is_hyperspace = false;

        self.state.invalidate_cull();
        self.sky_rendered_this_view = false;

        if self.view_parms.is_portal {
            let plane = portal_clip_plane(&self.view_parms);
            self.device.load_modelview(&FLIP_MATRIX);
            self.device.set_clip_plane(Some(plane));
        } else {
            self.device.set_clip_plane(None);
        }

        true
    }

    fn enter_2d(&mut self, width: u32, height: u32, state: StateBits) {
        self.projection_2d = true;

        let rect = Rect::sized(width as i32, height as i32);
        self.device.set_viewport(rect);
        self.device.set_scissor(rect);
        self.device.load_projection(&mat4_ortho(0.0, width as f32, height as f32, 0.0, 0.0, 1.0));
        self.device.load_modelview(&MAT4_IDENTITY);

        self.state.set_state(&mut self.device, state);

        self.device.set_cull(None);
        self.state.invalidate_cull();
        self.device.set_clip_plane(None);
    }

    /// Switch to the screen-space projection covering the whole window.
    pub fn set_gl_2d(&mut self) {
        self.enter_2d(
            self.config.vid_width,
            self.config.vid_height,
            StateBits::DEPTHTEST_DISABLE | StateBits::SRCBLEND_SRC_ALPHA | StateBits::DSTBLEND_ONE_MINUS_SRC_ALPHA,
        );

        // 2D time comes from the wall clock, not the scene
        self.refdef.time = self.milliseconds();
        self.refdef.float_time = self.refdef.time as f64 * 0.001;
    }

    /// 2D projection for a `width` x `height` target, blending off. Used
    /// by the full-screen post passes.
    pub fn set_2d_size(&mut self, width: u32, height: u32) {
        self.enter_2d(width, height, StateBits::DEPTHTEST_DISABLE);
    }
}
