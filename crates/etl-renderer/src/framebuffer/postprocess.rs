//! Offscreen scene rendering and scaling
//!
//! When multisampling, resolution scaling or supersampling is on, the main
//! view renders into an offscreen set, optionally once per jittered
//! sub-pixel offset, and is then filtered down to the window.
//!
//! Derived state (target sizes, LOD bias, jitter sets, kernel weights) is
//! rebuilt only when the version of a tracked setting changes.

use ash::vk;
use etl_common::common::{com_dprintf, com_warning};
use etl_common::q_shared::*;
use rayon::prelude::*;

use super::offscreen::OffscreenLayout;
use super::weights::*;
use crate::backend::Backend;
use crate::device::{FilterPass, Framebuffer, FramebufferStatus, GraphicsDevice, Rect, ScaleProgram};
use crate::draw_surfs::DrawSurface;
use crate::settings::*;

/// Mip LOD bias for a scaling configuration.
///
/// Supersampling averages several samples per pixel, so textures can use
/// sharper mips; rendering above window resolution biases the other way.
pub fn texture_lod_bias(scaling: &EffectiveScaling, settings: &RenderSettings) -> f32 {
    let mut bias = 0.0;
    if scaling.supersample > 0 {
        bias = -((scaling.supersample as f32).ln() / 4.0f32.ln() * settings.supersample_lod_fix.value);
    }
    let lod_fix = settings.resolution_scale_lod_fix.value;
    if lod_fix != 0.0 && scaling.scale > 1.0 {
        bias += scaling.scale.ln() * lod_fix;
    }
    bias
}

/// Halton jitter offsets in [0, 1) for every multiframe slot.
///
/// The sequence index runs across slots so each slot gets distinct
/// offsets.
pub fn supersample_offsets(samples: usize, frames: usize) -> Vec<Vec<[f32; 2]>> {
    let mut count = 0u32;
    (0..frames)
        .map(|_| {
            (0..samples)
                .map(|_| {
                    let offset = [halton(count, 2), halton(count, 3)];
                    count += 1;
                    offset
                })
                .collect()
        })
        .collect()
}

/// Offscreen pipeline state that outlives a frame.
#[derive(Debug)]
pub struct PostProcessor {
    /// Setting versions the derived state was built from.
    seen_versions: Option<[u32; NUM_TRACKED_SETTINGS]>,
    pub scaling: EffectiveScaling,
    pub layout: OffscreenLayout,

    // ========================================================================
    // Supersampling
    // ========================================================================
    /// Halton offsets in [0, 1), per multiframe slot and sample.
    ss_offsets: Vec<Vec<[f32; 2]>>,
    /// Offsets recentred and scaled by the smoothness, in pixels.
    ss_jitters: Vec<Vec<[f32; 2]>>,
    /// Resolve weights per multiframe slot.
    ss_weights: Vec<Vec<f32>>,
    /// Multiframe slot used by the next supersampled frame.
    pub frame_slot: usize,

    // ========================================================================
    // Resolution scaling
    // ========================================================================
    scaling_weights: Option<ScalingWeights>,
    /// Weight table needs recomputing before its next use.
    weights_stale: bool,
    /// The scale pass has current uniforms on the device.
    weights_uploaded: bool,
    pub texture_lod_bias: f32,
    /// Extra scale applied by the filter passes.
    pub dynamic_scale: f32,

    pub reconfigure_count: u32,
    pub weight_recalc_count: u32,
}

impl Default for PostProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl PostProcessor {
    pub fn new() -> Self {
        Self {
            seen_versions: None,
            scaling: EffectiveScaling::from_settings(&RenderSettings::default()),
            layout: OffscreenLayout::default(),
            ss_offsets: Vec::new(),
            ss_jitters: Vec::new(),
            ss_weights: Vec::new(),
            frame_slot: 0,
            scaling_weights: None,
            weights_stale: true,
            weights_uploaded: false,
            texture_lod_bias: 0.0,
            dynamic_scale: 1.0,
            reconfigure_count: 0,
            weight_recalc_count: 0,
        }
    }

    pub fn is_stale(&self, settings: &RenderSettings) -> bool {
        self.seen_versions != Some(settings.scaling_versions())
    }

    pub fn scaling_weights(&self) -> Option<&ScalingWeights> {
        self.scaling_weights.as_ref()
    }

    fn multiframe(settings: &RenderSettings) -> usize {
        (settings.supersample_multiframe.value.max(1) as usize).min(MAX_SUPERSAMPLE_FRAMES)
    }

    /// Rebuild the jitter sets and their resolve weights.
    fn setup_supersample(&mut self, settings: &RenderSettings) {
        let samples = (self.scaling.supersample.max(0) as usize).min(MAX_SUPERSAMPLE_SAMPLES);
        let frames = Self::multiframe(settings);
        let smoothness = settings.supersample_smoothness.value;

        self.ss_offsets = supersample_offsets(samples, frames);
        self.ss_jitters = self
            .ss_offsets
            .iter()
            .map(|slot| {
                slot.iter()
                    .map(|off| [(off[0] - 0.5) * smoothness, (off[1] - 0.5) * smoothness])
                    .collect()
            })
            .collect();

        let radius = settings.scaling_sample_radius.value;
        self.ss_weights = self
            .ss_jitters
            .par_iter()
            .map(|jitters| supersample_weights(jitters, radius))
            .collect();

        if self.frame_slot >= frames {
            self.frame_slot = 0;
        }
    }

    /// Jitters the scaling weight table is built for.
    fn scaling_jitters(&self) -> Vec<[f32; 2]> {
        let num_jitters = (self.scaling.supersample.max(1) as usize).min(MAX_SUPERSAMPLE_FRAMES);
        match self.ss_jitters.first() {
            Some(first) if self.scaling.supersample > 0 => first.iter().take(num_jitters).copied().collect(),
            _ => vec![[0.0, 0.0]],
        }
    }
}

/// Windowed-sinc program for a sample radius.
fn lanczos_program(radius: f32) -> ScaleProgram {
    if radius == 2.0 {
        ScaleProgram::Lanczos2
    } else if radius == 2.5 {
        ScaleProgram::Lanczos2_5
    } else if radius == 3.0 {
        ScaleProgram::Lanczos3
    } else {
        ScaleProgram::Minify
    }
}

fn rect(size: [i32; 2]) -> Rect {
    Rect::sized(size[0], size[1])
}

fn size_u32(size: [i32; 2]) -> [u32; 2] {
    [size[0].max(0) as u32, size[1].max(0) as u32]
}

impl<D: GraphicsDevice> Backend<D> {
    /// Draw the current view, through the offscreen set when needed.
    pub fn draw_scene(&mut self, draw_surfs: &[DrawSurface]) {
        let offscreen = self.settings.use_offscreen(self.refdef.y);

        if offscreen {
            self.prepare_offscreen();
        }

        if offscreen && self.post.scaling.supersample != 0 {
            self.render_supersampled(draw_surfs);
        } else {
            self.render_draw_surf_list(draw_surfs);
        }

        if offscreen {
            self.utilize_offscreen();
        }
    }

    fn check_target(&mut self, framebuffer: Framebuffer) {
        if let FramebufferStatus::Incomplete(status) = self.device.check_framebuffer(framebuffer) {
            com_warning(&format!(
                "RB_DrawSurfs: framebuffer {:?} incomplete, status 0x{:x}\n",
                framebuffer, status
            ));
        }
    }

    /// Rebuild everything derived from the tracked settings.
    fn reconfigure_offscreen(&mut self) {
        let settings = &self.settings;
        let post = &mut self.post;

        post.scaling = EffectiveScaling::from_settings(settings);
        let multisample = self.config.select_multisample(settings.fbo_multisample.value);
        post.layout = OffscreenLayout::compute(&self.config, &post.scaling, multisample);
        post.layout.apply(&mut self.device);
        post.setup_supersample(settings);

        post.texture_lod_bias = texture_lod_bias(&post.scaling, settings);
        for (_, image) in self.images.iter().filter(|(_, img)| img.mipmap) {
            self.device.set_texture_lod_bias(image.texnum, post.texture_lod_bias);
        }

        post.weights_stale = true;
        post.weights_uploaded = false;
        post.seen_versions = Some(settings.scaling_versions());
        post.reconfigure_count += 1;

        com_dprintf(&format!(
            "offscreen: {}x{} scale {} samples {} supersample {} lod bias {:.3}\n",
            post.layout.render_size[0],
            post.layout.render_size[1],
            post.scaling.scale,
            multisample,
            post.scaling.supersample,
            post.texture_lod_bias
        ));
    }

    /// Reconfigure if stale, scale the viewport and bind the scene target.
    pub fn prepare_offscreen(&mut self) {
        if self.post.is_stale(&self.settings) {
            self.reconfigure_offscreen();
        }

        let scale = self.post.scaling.render_scale();
        self.view_parms.viewport_width = (self.view_parms.viewport_width as f32 * scale) as i32;
        self.view_parms.viewport_height = (self.view_parms.viewport_height as f32 * scale) as i32;

        self.device.bind_framebuffer(Framebuffer::Multisample);
        self.check_target(Framebuffer::Multisample);
    }

    /// Render the view once per jitter offset, then resolve the samples.
    fn render_supersampled(&mut self, draw_surfs: &[DrawSurface]) {
        let samples = (self.post.scaling.supersample.max(1) as usize).min(MAX_SUPERSAMPLE_SAMPLES);
        let slot = self.post.frame_slot;
        let smoothness = self.settings.supersample_smoothness.value;
        let vp = [self.view_parms.viewport_width, self.view_parms.viewport_height];
        let org_projection = self.view_parms.projection_matrix;

        for i in 0..samples {
            let offset = self
                .post
                .ss_offsets
                .get(slot)
                .and_then(|o| o.get(i))
                .copied()
                .unwrap_or([0.5, 0.5]);
            let shift = mat4_reset_translate(
                (offset[0] * 2.0 - 1.0) * smoothness / vp[0].max(1) as f32,
                (offset[1] * 2.0 - 1.0) * smoothness / vp[1].max(1) as f32,
                0.0,
            );
            self.view_parms.projection_matrix = mat4_mult(&shift, &org_projection);

            self.render_draw_surf_list(draw_surfs);

            self.device.blit(
                Framebuffer::Multisample,
                rect(vp),
                Framebuffer::Supersample(i as u8),
                rect(vp),
                vk::Filter::NEAREST,
            );
            self.device.bind_framebuffer(Framebuffer::Multisample);
        }
        self.view_parms.projection_matrix = org_projection;

        let scaling = self.post.scaling;
        if !scaling.resolves_in_scale_pass() {
            self.device.bind_framebuffer(Framebuffer::Resolved);
            let size = size_u32(vp);
            self.set_2d_size(size[0], size[1]);

            let jitters = self.post.ss_jitters.get(slot).cloned().unwrap_or_default();
            let (jitters, weights) = if scaling.supersample_mode == SS_MODE_QUALITY {
                (jitters, self.post.ss_weights.get(slot).cloned().unwrap_or_default())
            } else {
                let texel = [1.0 / vp[0].max(1) as f32, 1.0 / vp[1].max(1) as f32];
                (
                    jitters.iter().map(|j| [j[0] * texel[0], j[1] * texel[1]]).collect(),
                    Vec::new(),
                )
            };

            self.device.run_filter_pass(&FilterPass::SupersampleResolve {
                samples: samples as u32,
                mode: scaling.supersample_mode,
                radius: self.settings.scaling_sample_radius.value,
                texture_size: [vp[0] as f32, vp[1] as f32],
                jitters,
                weights,
            });
        }

        self.post.frame_slot = (slot + 1) % PostProcessor::multiframe(&self.settings);
    }

    /// Resolve, scale and antialias the offscreen scene onto the window.
    pub fn utilize_offscreen(&mut self) {
        let scaling = self.post.scaling;
        let vid = [self.config.vid_width as i32, self.config.vid_height as i32];
        let mut vp = [self.view_parms.viewport_width, self.view_parms.viewport_height];

        self.device.bind_framebuffer(Framebuffer::Resolved);

        if scaling.supersample <= 1 {
            self.device.blit(
                Framebuffer::Multisample,
                rect(vp),
                Framebuffer::Resolved,
                rect(vp),
                vk::Filter::NEAREST,
            );

            if scaling.simple_supersample {
                let half = [vp[0] / 2, vp[1] / 2];
                self.device
                    .blit(Framebuffer::Resolved, rect(vp), Framebuffer::Intermediate, rect(half), vk::Filter::LINEAR);
                vp = half;
                self.device
                    .blit(Framebuffer::Intermediate, rect(vp), Framebuffer::Resolved, rect(vp), vk::Filter::NEAREST);
            }
        }

        self.check_target(Framebuffer::Resolved);

        if self.settings.fbo_fxaa & 2 != 0 {
            self.fxaa_pass(Framebuffer::Resolved, vp);
        }

        if scaling.scale != 1.0 {
            self.scale_to_window(scaling, vp, vid);
        } else {
            self.device
                .blit(Framebuffer::Resolved, rect(vp), Framebuffer::Window, rect(vid), vk::Filter::NEAREST);
        }

        if self.settings.fbo_fxaa & 1 != 0 {
            self.device
                .blit(Framebuffer::Window, rect(vid), Framebuffer::WindowCopy, rect(vid), vk::Filter::NEAREST);
            let size = size_u32(vid);
            self.set_2d_size(size[0], size[1]);
            self.device.run_filter_pass(&FilterPass::Fxaa {
                input: Framebuffer::WindowCopy,
                width: size[0],
                height: size[1],
            });
        }

        self.device.bind_framebuffer(Framebuffer::Window);
    }

    /// FXAA over `target`, through the scratch target.
    fn fxaa_pass(&mut self, target: Framebuffer, vp: [i32; 2]) {
        let size = size_u32(vp);
        self.device.bind_framebuffer(Framebuffer::Scratch);
        self.set_2d_size(size[0], size[1]);
        self.device.run_filter_pass(&FilterPass::Fxaa {
            input: target,
            width: size[0],
            height: size[1],
        });
        self.device
            .blit(Framebuffer::Scratch, rect(vp), target, rect(vp), vk::Filter::NEAREST);
        self.device.bind_framebuffer(target);
    }

    fn scale_to_window(&mut self, scaling: EffectiveScaling, mut vp: [i32; 2], vid: [i32; 2]) {
        let hq = scaling.hq;
        let scale_int = scaling.scale_int;
        let mut input = Framebuffer::Resolved;
        let mut res_int = 0;

        if hq & HQ_INTEGER_PREPASS != 0 {
            if scale_int >= 2 && scaling.is_integer() {
                res_int = scale_int;
            } else if scaling.scale > 2.0 {
                if hq & (HQ_CUSTOM_KERNEL | HQ_PRECALCED_WEIGHTS) == 0 {
                    // stretch to the next integer multiple of the window first
                    let stretched = [vid[0] * scale_int, vid[1] * scale_int];
                    self.device
                        .blit(input, rect(vp), Framebuffer::Intermediate, rect(stretched), vk::Filter::LINEAR);
                    input = Framebuffer::Intermediate;
                    vp = stretched;
                    res_int = scale_int;
                } else {
                    res_int = -scale_int;
                }
            }

            if res_int != 0 {
                let factor = res_int.abs();
                let minified = [vp[0] / factor, vp[1] / factor];
                let out = size_u32(minified);
                self.set_2d_size(out[0], out[1]);
                self.device.bind_framebuffer(Framebuffer::Scratch);
                self.device.run_filter_pass(&FilterPass::MinifyAverage {
                    input,
                    scale_int: factor as u32,
                    texture_size: [vp[0] as f32, vp[1] as f32],
                    output_size: out,
                });
                vp = minified;
                self.device
                    .blit(Framebuffer::Scratch, rect(vp), Framebuffer::Minified, rect(vp), vk::Filter::NEAREST);
                input = Framebuffer::Minified;
            }
        }

        self.device.bind_framebuffer(Framebuffer::Window);
        let out = size_u32(vid);
        self.set_2d_size(out[0], out[1]);

        if res_int > 0 {
            self.device
                .blit(input, rect(vp), Framebuffer::Window, rect(vid), vk::Filter::NEAREST);
            return;
        }

        if hq & HQ_CUSTOM_KERNEL == 0 {
            self.device.run_filter_pass(&FilterPass::Bilinear {
                input,
                output_size: out,
                dynamic_scale: self.post.dynamic_scale,
            });
            return;
        }

        let sample_radius = self.settings.scaling_sample_radius.value;
        let (program, radius) = if hq & HQ_PRECALCED_WEIGHTS != 0 {
            let program = if scaling.resolves_in_scale_pass() {
                ScaleProgram::PreCalcedWeightsSupersampleResolve
            } else if scaling.is_integer() {
                ScaleProgram::PreCalcedWeights
            } else {
                ScaleProgram::PreCalcedWeightsMultiPattern
            };

            if self.post.weights_stale {
                let jitters = self.post.scaling_jitters();
                let weights = ScalingWeights::compute(
                    scaling.hq_mode,
                    sample_radius,
                    num_scaling_patterns(scaling.scale),
                    &jitters,
                    size_u32(vp),
                    out,
                );
                self.device.upload_scaling_weights(program, &weights);
                self.post.scaling_weights = Some(weights);
                self.post.weights_stale = false;
                self.post.weights_uploaded = false;
                self.post.weight_recalc_count += 1;
            }
            (program, sample_radius)
        } else {
            match scaling.hq_mode {
                1 => (lanczos_program(sample_radius), sample_radius),
                2 => (ScaleProgram::Minify, 1.0),
                _ => (ScaleProgram::Bicubic, 2.0),
            }
        };

        self.device.run_filter_pass(&FilterPass::ResolutionScale {
            input,
            program,
            input_pixel_size: [1.0 / vp[0].max(1) as f32, 1.0 / vp[1].max(1) as f32],
            output_pixel_size: [1.0 / vid[0].max(1) as f32, 1.0 / vid[1].max(1) as f32],
            mode: scaling.hq_mode,
            radius,
            radius_multiplier: self.settings.scaling_sample_radius_multiplier.value,
            scale_factor: self.post.dynamic_scale,
            upload_uniforms: !self.post.weights_uploaded,
        });
        self.post.weights_uploaded = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use etl_common::cvar::CvarContext;

    use crate::device::{DeviceCall, RecordingDevice};
    use crate::render_config::RenderConfig;

    fn backend() -> Backend<RecordingDevice> {
        let mut config = RenderConfig::new(640, 480);
        config.max_samples = 8;
        Backend::new(RecordingDevice::new(), config, CvarContext::shared())
    }

    fn bump<T>(t: &mut Tracked<T>, value: T) {
        t.value = value;
        t.version += 1;
    }

    /// One main-view frame with an empty surface list.
    fn frame(b: &mut Backend<RecordingDevice>) {
        b.view_parms.viewport_width = 640;
        b.view_parms.viewport_height = 480;
        b.draw_scene(&[]);
    }

    fn configured(b: &Backend<RecordingDevice>) -> usize {
        b.device.count(|c| matches!(c, DeviceCall::ConfigureTarget(..)))
    }

    fn uploads(b: &Backend<RecordingDevice>) -> usize {
        b.device.count(|c| matches!(c, DeviceCall::UploadWeights { .. }))
    }

    fn filter_passes(b: &Backend<RecordingDevice>) -> Vec<FilterPass> {
        b.device
            .calls
            .iter()
            .filter_map(|c| match c {
                DeviceCall::FilterPass(p) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }

    // ============================================================
    // Derived values
    // ============================================================

    #[test]
    fn test_texture_lod_bias() {
        let mut s = RenderSettings::default();
        s.supersample.value = 4;
        let e = EffectiveScaling::from_settings(&s);
        assert!((texture_lod_bias(&e, &s) + 1.0).abs() < 1e-6);

        let mut s = RenderSettings::default();
        s.resolution_scale.value = 2.0;
        let e = EffectiveScaling::from_settings(&s);
        assert!((texture_lod_bias(&e, &s) - 2.0f32.ln()).abs() < 1e-6);

        s.resolution_scale_lod_fix.value = 0.0;
        assert_eq!(texture_lod_bias(&e, &s), 0.0);
    }

    #[test]
    fn test_supersample_offsets_run_across_slots() {
        let offsets = supersample_offsets(2, 2);
        assert_eq!(offsets[0], vec![[0.0, 0.0], [0.5, halton(1, 3)]]);
        assert_eq!(offsets[1][0], [0.25, halton(2, 3)]);
    }

    #[test]
    fn test_lanczos_program_by_radius() {
        assert_eq!(lanczos_program(2.0), ScaleProgram::Lanczos2);
        assert_eq!(lanczos_program(2.5), ScaleProgram::Lanczos2_5);
        assert_eq!(lanczos_program(3.0), ScaleProgram::Lanczos3);
        assert_eq!(lanczos_program(1.7), ScaleProgram::Minify);
    }

    // ============================================================
    // Reconfiguration
    // ============================================================

    #[test]
    fn test_scale_change_reconfigures_once() {
        let mut b = backend();

        // frame N at native scale stays on the window
        frame(&mut b);
        assert_eq!(configured(&b), 0);
        assert_eq!(b.post.reconfigure_count, 0);

        bump(&mut b.settings.resolution_scale, 1.5);
        frame(&mut b);
        assert_eq!(b.post.reconfigure_count, 1);
        let first = configured(&b);
        assert!(first > 0);
        assert_eq!(b.post.layout.render_size, [960, 720]);
        assert!(b.device.calls.contains(&DeviceCall::Viewport(Rect::sized(960, 720))));

        for _ in 0..3 {
            frame(&mut b);
        }
        assert_eq!(b.post.reconfigure_count, 1);
        assert_eq!(configured(&b), first);
    }

    #[test]
    fn test_lod_bias_pushed_to_mipmapped_images() {
        let mut b = backend();
        b.images.register("textures/wall", 64, 64, true);
        bump(&mut b.settings.supersample, 4);
        frame(&mut b);

        let mipmapped = b.images.iter().filter(|(_, img)| img.mipmap).count();
        let pushed = b.device.count(|c| matches!(c, DeviceCall::TextureLodBias { .. }));
        assert_eq!(pushed, mipmapped);
        assert!(b.post.texture_lod_bias < 0.0);
    }

    #[test]
    fn test_incomplete_target_keeps_rendering() {
        let mut b = backend();
        b.device.framebuffer_status = FramebufferStatus::Incomplete(0x8cd6);
        bump(&mut b.settings.fbo_multisample, 4);
        frame(&mut b);
        assert!(b.device.calls.contains(&DeviceCall::BindFramebuffer(Framebuffer::Window)));
    }

    // ============================================================
    // Weight tables
    // ============================================================

    #[test]
    fn test_weights_not_recomputed_while_unchanged() {
        let mut b = backend();
        bump(&mut b.settings.resolution_scale, 1.5);
        bump(&mut b.settings.high_quality_scaling, HQ_CUSTOM_KERNEL | HQ_PRECALCED_WEIGHTS);

        for _ in 0..5 {
            frame(&mut b);
        }
        assert_eq!(b.post.weight_recalc_count, 1);
        assert_eq!(uploads(&b), 1);
        assert_eq!(b.post.scaling_weights().map(|w| w.num_patterns), Some(2));

        // only the first pass sends uniforms
        let uniform_sends = filter_passes(&b)
            .iter()
            .filter(|p| matches!(p, FilterPass::ResolutionScale { upload_uniforms: true, .. }))
            .count();
        assert_eq!(uniform_sends, 1);
    }

    #[test]
    fn test_one_setting_change_recomputes_once() {
        let mut b = backend();
        bump(&mut b.settings.resolution_scale, 1.5);
        bump(&mut b.settings.high_quality_scaling, HQ_CUSTOM_KERNEL | HQ_PRECALCED_WEIGHTS);
        frame(&mut b);
        assert_eq!(b.post.weight_recalc_count, 1);

        bump(&mut b.settings.scaling_sample_radius, 3.0);
        frame(&mut b);
        frame(&mut b);
        assert_eq!(b.post.weight_recalc_count, 2);
        assert_eq!(b.post.reconfigure_count, 2);
    }

    // ============================================================
    // Scaling paths
    // ============================================================

    #[test]
    fn test_bilinear_fast_path() {
        let mut b = backend();
        bump(&mut b.settings.resolution_scale, 1.5);
        frame(&mut b);

        let passes = filter_passes(&b);
        assert!(matches!(
            passes.last(),
            Some(FilterPass::Bilinear { input: Framebuffer::Resolved, output_size: [640, 480], .. })
        ));
        assert_eq!(b.device.calls.last(), Some(&DeviceCall::BindFramebuffer(Framebuffer::Window)));
    }

    #[test]
    fn test_integer_prepass_blits_minified() {
        let mut b = backend();
        bump(&mut b.settings.resolution_scale, 2.0);
        bump(&mut b.settings.high_quality_scaling, HQ_INTEGER_PREPASS);
        frame(&mut b);

        assert!(filter_passes(&b).iter().any(|p| matches!(p, FilterPass::MinifyAverage { scale_int: 2, .. })));
        assert!(b.device.calls.contains(&DeviceCall::Blit {
            src: Framebuffer::Minified,
            src_rect: Rect::sized(640, 480),
            dst: Framebuffer::Window,
            dst_rect: Rect::sized(640, 480),
            filter: vk::Filter::NEAREST,
        }));
    }

    #[test]
    fn test_kernel_program_by_mode() {
        let mut b = backend();
        bump(&mut b.settings.resolution_scale, 1.5);
        bump(&mut b.settings.high_quality_scaling, HQ_CUSTOM_KERNEL);
        bump(&mut b.settings.high_quality_scaling_mode, 1);
        frame(&mut b);

        assert!(filter_passes(&b).iter().any(|p| matches!(
            p,
            FilterPass::ResolutionScale { program: ScaleProgram::Lanczos2, radius, .. } if *radius == 2.0
        )));
        assert_eq!(uploads(&b), 0);
    }

    #[test]
    fn test_native_scale_blits_to_window_with_fxaa() {
        let mut b = backend();
        bump(&mut b.settings.fbo_multisample, 4);
        b.settings.fbo_fxaa = 3;
        frame(&mut b);

        let passes = filter_passes(&b);
        let fxaa = passes.iter().filter(|p| matches!(p, FilterPass::Fxaa { .. })).count();
        assert_eq!(fxaa, 2);
        assert!(b.device.calls.contains(&DeviceCall::Blit {
            src: Framebuffer::Resolved,
            src_rect: Rect::sized(640, 480),
            dst: Framebuffer::Window,
            dst_rect: Rect::sized(640, 480),
            filter: vk::Filter::NEAREST,
        }));
    }

    // ============================================================
    // Supersampling
    // ============================================================

    #[test]
    fn test_supersample_renders_each_jitter() {
        let mut b = backend();
        bump(&mut b.settings.supersample, 4);
        bump(&mut b.settings.supersample_multiframe, 2);
        frame(&mut b);

        let to_samples = b
            .device
            .count(|c| matches!(c, DeviceCall::Blit { dst: Framebuffer::Supersample(_), .. }));
        assert_eq!(to_samples, 4);
        assert!(filter_passes(&b)
            .iter()
            .any(|p| matches!(p, FilterPass::SupersampleResolve { samples: 4, .. })));
        assert_eq!(b.post.frame_slot, 1);

        frame(&mut b);
        assert_eq!(b.post.frame_slot, 0);
        // original projection restored
        assert_eq!(b.view_parms.projection_matrix, crate::tr_local::ViewParms::default().projection_matrix);
    }

    #[test]
    fn test_quality_resolve_uses_slot_weights() {
        let mut b = backend();
        bump(&mut b.settings.supersample, 2);
        bump(&mut b.settings.supersample_mode, SS_MODE_QUALITY);
        frame(&mut b);

        let resolve = filter_passes(&b)
            .into_iter()
            .find(|p| matches!(p, FilterPass::SupersampleResolve { .. }));
        match resolve {
            Some(FilterPass::SupersampleResolve { jitters, weights, mode, .. }) => {
                assert_eq!(mode, SS_MODE_QUALITY);
                assert_eq!(jitters.len(), 2);
                assert!(!weights.is_empty());
            }
            other => panic!("expected resolve pass, got {:?}", other),
        }
    }

    fn resolve_then_scale(b: &Backend<RecordingDevice>) -> (Option<usize>, Option<usize>) {
        let passes = filter_passes(b);
        let resolve = passes.iter().position(|p| matches!(p, FilterPass::SupersampleResolve { .. }));
        let scale = passes
            .iter()
            .position(|p| matches!(p, FilterPass::Bilinear { .. } | FilterPass::ResolutionScale { .. }));
        (resolve, scale)
    }

    #[test]
    fn test_quality_supersample_scaled_resolves() {
        let mut b = backend();
        bump(&mut b.settings.supersample, 2);
        bump(&mut b.settings.supersample_mode, SS_MODE_QUALITY);
        bump(&mut b.settings.resolution_scale, 1.5);
        frame(&mut b);

        let to_samples = b
            .device
            .count(|c| matches!(c, DeviceCall::Blit { dst: Framebuffer::Supersample(_), .. }));
        assert_eq!(to_samples, 2);
        assert!(filter_passes(&b)
            .iter()
            .any(|p| matches!(p, FilterPass::SupersampleResolve { mode: SS_MODE_QUALITY, .. })));
        match resolve_then_scale(&b) {
            (Some(resolve), Some(scale)) => assert!(resolve < scale),
            other => panic!("expected resolve then scale, got {:?}", other),
        }
        assert!(filter_passes(&b).iter().any(|p| matches!(p, FilterPass::Bilinear { .. })));
    }

    #[test]
    fn test_smooth_supersample_scaled_resolves() {
        let mut b = backend();
        bump(&mut b.settings.supersample, 2);
        bump(&mut b.settings.supersample_mode, SS_MODE_SMOOTH);
        bump(&mut b.settings.resolution_scale, 1.5);
        frame(&mut b);

        assert!(filter_passes(&b)
            .iter()
            .any(|p| matches!(p, FilterPass::SupersampleResolve { mode: SS_MODE_SMOOTH, .. })));
        match resolve_then_scale(&b) {
            (Some(resolve), Some(scale)) => assert!(resolve < scale),
            other => panic!("expected resolve then scale, got {:?}", other),
        }
    }

    #[test]
    fn test_quality_supersample_kernel_scale_resolves() {
        let mut b = backend();
        bump(&mut b.settings.supersample, 2);
        bump(&mut b.settings.supersample_mode, SS_MODE_QUALITY);
        // 1.3 drops the precalced bit, leaving the plain kernel
        bump(&mut b.settings.resolution_scale, 1.3);
        bump(&mut b.settings.high_quality_scaling, HQ_CUSTOM_KERNEL | HQ_PRECALCED_WEIGHTS);
        frame(&mut b);

        let passes = filter_passes(&b);
        assert!(passes.iter().any(|p| matches!(p, FilterPass::SupersampleResolve { .. })));
        assert!(passes.iter().any(|p| matches!(p, FilterPass::ResolutionScale { .. })));
        assert!(!passes.iter().any(|p| matches!(
            p,
            FilterPass::ResolutionScale { program: ScaleProgram::PreCalcedWeightsSupersampleResolve, .. }
        )));
    }
}
