//! Renderer tunables.
//!
//! The cvar table is sampled once per command buffer into a
//! `RenderSettings` snapshot. Values that feed cached derived state are
//! wrapped in `Tracked` so consumers can compare versions instead of values.

use etl_common::common::com_fatal;
use etl_common::cvar::{CvarContext, CvarHandle};
use etl_common::q_shared::{CvarFlags, CVAR_ARCHIVE, CVAR_CHEAT, CVAR_ZERO};

/// A setting value together with the modification count it was read at.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Tracked<T> {
    pub value: T,
    pub version: u32,
}

impl<T> Tracked<T> {
    pub const fn new(value: T, version: u32) -> Self {
        Self { value, version }
    }
}

/// Handles of every cvar the back end reads.
#[derive(Clone, Copy, Debug)]
pub struct RendererCvars {
    pub r_resolution_scale: CvarHandle,
    pub r_fbo_multisample: CvarHandle,
    pub r_fbo_fxaa: CvarHandle,
    pub r_supersample: CvarHandle,
    pub r_supersample_smoothness: CvarHandle,
    pub r_supersample_multiframe: CvarHandle,
    pub r_supersample_mode: CvarHandle,
    pub r_supersample_lod_fix: CvarHandle,
    pub r_simple_supersample: CvarHandle,
    pub r_high_quality_scaling: CvarHandle,
    pub r_high_quality_scaling_mode: CvarHandle,
    pub r_scaling_sample_radius: CvarHandle,
    pub r_scaling_sample_radius_multiplier: CvarHandle,
    pub r_resolution_scale_lod_fix: CvarHandle,
    pub r_finish: CvarHandle,
    pub r_clear: CvarHandle,
    pub r_measure_overdraw: CvarHandle,
    pub r_shadows: CvarHandle,
    pub r_fast_sky: CvarHandle,
    pub r_portal_sky: CvarHandle,
    pub r_no_bind: CvarHandle,
    pub r_show_images: CvarHandle,
    pub r_speeds: CvarHandle,
}

fn register(ctx: &mut CvarContext, name: &str, value: &str, flags: CvarFlags) -> CvarHandle {
    match ctx.get(name, value, flags) {
        Some(handle) => handle,
        None => com_fatal(&format!("R_Register: could not create {}", name)),
    }
}

impl RendererCvars {
    pub fn register(ctx: &mut CvarContext) -> Self {
        Self {
            r_resolution_scale: register(ctx, "r_resolutionScale", "1", CVAR_ARCHIVE),
            r_fbo_multisample: register(ctx, "r_fboMultisample", "0", CVAR_ARCHIVE),
            r_fbo_fxaa: register(ctx, "r_fboFxaa", "0", CVAR_ARCHIVE),
            r_supersample: register(ctx, "r_supersample", "0", CVAR_ARCHIVE),
            r_supersample_smoothness: register(ctx, "r_supersampleSmoothness", "1", CVAR_ARCHIVE),
            r_supersample_multiframe: register(ctx, "r_supersampleMultiframe", "1", CVAR_ARCHIVE),
            r_supersample_mode: register(ctx, "r_supersampleMode", "1", CVAR_ARCHIVE),
            r_supersample_lod_fix: register(ctx, "r_supersampleLodFix", "1", CVAR_ARCHIVE),
            r_simple_supersample: register(ctx, "r_simpleSupersample", "0", CVAR_ARCHIVE),
            r_high_quality_scaling: register(ctx, "r_highQualityScaling", "0", CVAR_ARCHIVE),
            r_high_quality_scaling_mode: register(ctx, "r_highQualityScalingMode", "0", CVAR_ARCHIVE),
            r_scaling_sample_radius: register(ctx, "r_scalingSampleRadius", "2", CVAR_ARCHIVE),
            r_scaling_sample_radius_multiplier: register(
                ctx,
                "r_scalingSampleRadiusMultiplier",
                "1",
                CVAR_ARCHIVE,
            ),
            r_resolution_scale_lod_fix: register(ctx, "r_resolutionScaleLodFix", "1", CVAR_ARCHIVE),
            r_finish: register(ctx, "r_finish", "0", CVAR_ARCHIVE),
            r_clear: register(ctx, "r_clear", "0", CVAR_CHEAT),
            r_measure_overdraw: register(ctx, "r_measureOverdraw", "0", CVAR_CHEAT),
            r_shadows: register(ctx, "r_shadows", "0", CVAR_ZERO),
            r_fast_sky: register(ctx, "r_fastSky", "0", CVAR_ARCHIVE),
            r_portal_sky: register(ctx, "r_portalSky", "1", CVAR_ZERO),
            r_no_bind: register(ctx, "r_noBind", "0", CVAR_CHEAT),
            r_show_images: register(ctx, "r_showImages", "0", CVAR_ZERO),
            r_speeds: register(ctx, "r_speeds", "0", CVAR_CHEAT),
        }
    }
}

/// One command buffer's worth of settings.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderSettings {
    // Tracked: feed offscreen buffers, LOD bias or weight tables
    pub resolution_scale: Tracked<f32>,
    pub fbo_multisample: Tracked<i32>,
    pub supersample: Tracked<i32>,
    pub supersample_smoothness: Tracked<f32>,
    pub supersample_multiframe: Tracked<i32>,
    pub supersample_mode: Tracked<i32>,
    pub supersample_lod_fix: Tracked<f32>,
    pub simple_supersample: Tracked<i32>,
    pub high_quality_scaling: Tracked<i32>,
    pub high_quality_scaling_mode: Tracked<i32>,
    pub scaling_sample_radius: Tracked<f32>,
    pub scaling_sample_radius_multiplier: Tracked<f32>,
    pub resolution_scale_lod_fix: Tracked<f32>,

    pub fbo_fxaa: i32,
    pub finish: i32,
    pub clear: i32,
    pub measure_overdraw: i32,
    pub shadows: i32,
    pub fast_sky: i32,
    pub portal_sky: i32,
    pub no_bind: i32,
    pub show_images: i32,
    pub speeds: i32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            resolution_scale: Tracked::new(1.0, 0),
            fbo_multisample: Tracked::new(0, 0),
            supersample: Tracked::new(0, 0),
            supersample_smoothness: Tracked::new(1.0, 0),
            supersample_multiframe: Tracked::new(1, 0),
            supersample_mode: Tracked::new(1, 0),
            supersample_lod_fix: Tracked::new(1.0, 0),
            simple_supersample: Tracked::new(0, 0),
            high_quality_scaling: Tracked::new(0, 0),
            high_quality_scaling_mode: Tracked::new(0, 0),
            scaling_sample_radius: Tracked::new(2.0, 0),
            scaling_sample_radius_multiplier: Tracked::new(1.0, 0),
            resolution_scale_lod_fix: Tracked::new(1.0, 0),
            fbo_fxaa: 0,
            finish: 0,
            clear: 0,
            measure_overdraw: 0,
            shadows: 0,
            fast_sky: 0,
            portal_sky: 1,
            no_bind: 0,
            show_images: 0,
            speeds: 0,
        }
    }
}

/// Number of tracked settings.
pub const NUM_TRACKED_SETTINGS: usize = 13;

impl RenderSettings {
    pub fn sample(ctx: &CvarContext, cvars: &RendererCvars) -> Self {
        let tf = |h: CvarHandle| {
            let var = ctx.cvar(h);
            Tracked::new(var.value, var.modification_count)
        };
        let ti = |h: CvarHandle| {
            let var = ctx.cvar(h);
            Tracked::new(var.integer, var.modification_count)
        };
        let int = |h: CvarHandle| ctx.cvar(h).integer;

        Self {
            resolution_scale: tf(cvars.r_resolution_scale),
            fbo_multisample: ti(cvars.r_fbo_multisample),
            supersample: ti(cvars.r_supersample),
            supersample_smoothness: tf(cvars.r_supersample_smoothness),
            supersample_multiframe: ti(cvars.r_supersample_multiframe),
            supersample_mode: ti(cvars.r_supersample_mode),
            supersample_lod_fix: tf(cvars.r_supersample_lod_fix),
            simple_supersample: ti(cvars.r_simple_supersample),
            high_quality_scaling: ti(cvars.r_high_quality_scaling),
            high_quality_scaling_mode: ti(cvars.r_high_quality_scaling_mode),
            scaling_sample_radius: tf(cvars.r_scaling_sample_radius),
            scaling_sample_radius_multiplier: tf(cvars.r_scaling_sample_radius_multiplier),
            resolution_scale_lod_fix: tf(cvars.r_resolution_scale_lod_fix),
            fbo_fxaa: int(cvars.r_fbo_fxaa),
            finish: int(cvars.r_finish),
            clear: int(cvars.r_clear),
            measure_overdraw: int(cvars.r_measure_overdraw),
            shadows: int(cvars.r_shadows),
            fast_sky: int(cvars.r_fast_sky),
            portal_sky: int(cvars.r_portal_sky),
            no_bind: int(cvars.r_no_bind),
            show_images: int(cvars.r_show_images),
            speeds: int(cvars.r_speeds),
        }
    }

    /// Versions of every tracked setting, in a fixed order.
    pub fn scaling_versions(&self) -> [u32; NUM_TRACKED_SETTINGS] {
        [
            self.resolution_scale.version,
            self.fbo_multisample.version,
            self.supersample.version,
            self.supersample_smoothness.version,
            self.supersample_multiframe.version,
            self.supersample_mode.version,
            self.supersample_lod_fix.version,
            self.simple_supersample.version,
            self.high_quality_scaling.version,
            self.high_quality_scaling_mode.version,
            self.scaling_sample_radius.version,
            self.scaling_sample_radius_multiplier.version,
            self.resolution_scale_lod_fix.version,
        ]
    }

    /// Offscreen rendering is needed for this view.
    pub fn use_offscreen(&self, refdef_y: i32) -> bool {
        (self.fbo_multisample.value != 0 || self.resolution_scale.value != 1.0 || self.supersample.value != 0)
            && refdef_y == 0
    }
}

// ============================================================
// Scaling interpretation
// ============================================================

/// `r_highQualityScaling` bits.
pub const HQ_CUSTOM_KERNEL: i32 = 1;
pub const HQ_INTEGER_PREPASS: i32 = 2;
pub const HQ_PRECALCED_WEIGHTS: i32 = 4;

/// Supersample resolve modes.
pub const SS_MODE_SMOOTH: i32 = 1;
pub const SS_MODE_QUALITY: i32 = 2;

/// Scaling settings after HQ snapping and mode demotion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EffectiveScaling {
    pub scale: f32,
    /// Integer part of `scale`.
    pub scale_int: i32,
    pub hq: i32,
    pub hq_mode: i32,
    pub supersample: i32,
    pub supersample_mode: i32,
    pub simple_supersample: bool,
}

impl EffectiveScaling {
    pub fn from_settings(s: &RenderSettings) -> Self {
        let mut scale = s.resolution_scale.value;
        let mut hq = s.high_quality_scaling.value;

        if hq & HQ_CUSTOM_KERNEL != 0 && hq & HQ_PRECALCED_WEIGHTS != 0 {
            if scale < 1.0 {
                hq = 0;
            } else if scale < 1.25 {
                scale = 1.0;
            } else if scale < 1.37 {
                hq &= !HQ_PRECALCED_WEIGHTS;
            } else if scale < 1.75 {
                scale = 1.5;
            } else if scale <= 1.8 {
                hq &= !HQ_PRECALCED_WEIGHTS;
            } else if scale < 2.35 {
                scale = 2.0;
            } else if scale < 2.67 {
                hq &= !HQ_PRECALCED_WEIGHTS;
            } else {
                scale = 3.0;
            }
        }

        let mut supersample_mode = s.supersample_mode.value;
        if scale > 1.0 && hq & HQ_PRECALCED_WEIGHTS != 0 && supersample_mode == SS_MODE_QUALITY {
            supersample_mode = 0;
        }

        Self {
            scale,
            scale_int: scale.trunc() as i32,
            hq,
            hq_mode: s.high_quality_scaling_mode.value,
            supersample: s.supersample.value.max(0),
            supersample_mode,
            simple_supersample: s.simple_supersample.value != 0,
        }
    }

    /// Render-target size multiplier.
    pub fn render_scale(&self) -> f32 {
        self.scale * if self.simple_supersample { 2.0 } else { 1.0 }
    }

    pub fn is_integer(&self) -> bool {
        self.scale == self.scale_int as f32
    }

    /// The scale pass reads the supersample targets itself, so the
    /// supersampled render skips its own resolve.
    pub fn resolves_in_scale_pass(&self) -> bool {
        let precalced = HQ_CUSTOM_KERNEL | HQ_PRECALCED_WEIGHTS;
        let integer_prepass = self.hq & HQ_INTEGER_PREPASS != 0 && self.scale_int >= 2 && self.is_integer();
        self.scale != 1.0
            && self.supersample > 0
            && self.supersample_mode == SS_MODE_QUALITY
            && self.hq & precalced == precalced
            && !integer_prepass
    }
}
