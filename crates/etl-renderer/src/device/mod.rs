//! Graphics device boundary
//!
//! Everything the back end needs from the underlying API: texture binding,
//! enumerated fixed-function state, indexed batch submission, offscreen
//! targets with blits and filter passes, read-back and a finish primitive.
//! State values are expressed with the Vulkan enums from `ash` so no
//! particular legacy API leaks through the trait.

mod recording;

pub use recording::{DeviceCall, RecordingDevice};

use ash::vk;
use etl_common::q_shared::{Mat4, Vec4};

use crate::framebuffer::weights::ScalingWeights;

/// Integer rectangle in window coordinates (origin bottom-left).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle anchored at the origin.
    pub const fn sized(width: i32, height: i32) -> Self {
        Self { x: 0, y: 0, width, height }
    }
}

bitflags::bitflags! {
    /// Buffers affected by a clear.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ClearBits: u32 {
        const COLOR   = 0x1;
        const DEPTH   = 0x2;
        const STENCIL = 0x4;
    }
}

/// Texture environment (combine) mode for the active unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TexEnv {
    Modulate,
    Replace,
    Decal,
    Add,
}

/// Alpha-test comparison against a fixed reference value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AlphaTest {
    pub op: vk::CompareOp,
    pub reference: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StencilTest {
    pub op: vk::CompareOp,
    pub reference: u32,
    pub mask: u32,
}

/// Color buffer selected for drawing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawBuffer {
    Front,
    Back,
}

impl DrawBuffer {
    pub fn from_i32(value: i32) -> Self {
        // GL_FRONT
        if value == 0x0404 {
            DrawBuffer::Front
        } else {
            DrawBuffer::Back
        }
    }

    pub fn as_i32(self) -> i32 {
        match self {
            DrawBuffer::Front => 0x0404,
            DrawBuffer::Back => 0x0405,
        }
    }
}

/// Read-back format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// Three bytes per pixel.
    Rgb,
    /// One byte per pixel.
    Stencil,
}

/// Framebuffers the back end renders into or reads from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Framebuffer {
    /// The presentation surface.
    Window,
    /// Scene target, multisampled when multisampling is on.
    Multisample,
    /// Single-sample full render-resolution copy of the scene.
    Resolved,
    /// Render-resolution scratch target used by filter passes.
    Scratch,
    /// Integer-minified copy of the scene.
    Minified,
    /// Window-sized (or scale-int sized) intermediate.
    Intermediate,
    /// Window-sized copy of the back buffer for post-scale FXAA.
    WindowCopy,
    /// Per-sample accumulation target.
    Supersample(u8),
}

/// Storage description for one offscreen target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetDesc {
    pub width: u32,
    pub height: u32,
    pub format: vk::Format,
    pub samples: vk::SampleCountFlags,
    pub depth_stencil: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FramebufferStatus {
    Complete,
    Incomplete(u32),
}

/// Programs used by the resolution-scale pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScaleProgram {
    Bicubic,
    Lanczos2,
    Lanczos2_5,
    Lanczos3,
    Minify,
    PreCalcedWeights,
    PreCalcedWeightsMultiPattern,
    PreCalcedWeightsSupersampleResolve,
}

/// Full-screen filter passes drawn into the currently bound framebuffer.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterPass {
    Fxaa {
        input: Framebuffer,
        width: u32,
        height: u32,
    },
    /// Box-filter average over `scale_int` x `scale_int` texels.
    MinifyAverage {
        input: Framebuffer,
        scale_int: u32,
        texture_size: [f32; 2],
        output_size: [u32; 2],
    },
    /// Hardware bilinear stretch of the scene onto the window.
    Bilinear {
        input: Framebuffer,
        output_size: [u32; 2],
        dynamic_scale: f32,
    },
    ResolutionScale {
        input: Framebuffer,
        program: ScaleProgram,
        input_pixel_size: [f32; 2],
        output_pixel_size: [f32; 2],
        mode: i32,
        radius: f32,
        radius_multiplier: f32,
        scale_factor: f32,
        /// Uniform block needs to be (re)sent.
        upload_uniforms: bool,
    },
    SupersampleResolve {
        samples: u32,
        mode: i32,
        radius: f32,
        texture_size: [f32; 2],
        jitters: Vec<[f32; 2]>,
        weights: Vec<f32>,
    },
}

/// An indexed triangle batch ready for submission.
#[derive(Clone, Copy, Debug)]
pub struct DrawBatch<'a> {
    pub xyz: &'a [[f32; 4]],
    pub tex_coords: &'a [[f32; 2]],
    pub colors: &'a [[u8; 4]],
    pub indexes: &'a [u32],
}

/// Capability-level interface to the graphics API.
///
/// Implementations must not cache state themselves; the back end's
/// `StateCache` already filters redundant calls.
pub trait GraphicsDevice {
    // ========== Texture units ==========

    fn active_texture(&mut self, unit: usize);
    fn bind_texture(&mut self, texnum: u32);
    fn set_tex_env(&mut self, env: TexEnv);
    fn set_texture_lod_bias(&mut self, texnum: u32, bias: f32);
    /// Upload RGBA pixels; `respecify` reallocates storage at the new size.
    fn upload_texture(&mut self, texnum: u32, width: u32, height: u32, data: &[u8], respecify: bool);
    /// Copy a framebuffer rectangle into a texture and regenerate its mips.
    fn copy_framebuffer_to_texture(&mut self, texnum: u32, rect: Rect);

    // ========== Fixed-function state ==========

    /// `None` disables culling.
    fn set_cull(&mut self, face: Option<vk::CullModeFlags>);
    fn set_depth_func(&mut self, op: vk::CompareOp);
    /// `None` disables blending.
    fn set_blend(&mut self, factors: Option<(vk::BlendFactor, vk::BlendFactor)>);
    fn set_depth_mask(&mut self, write: bool);
    fn set_polygon_mode(&mut self, mode: vk::PolygonMode);
    fn set_depth_test(&mut self, enabled: bool);
    fn set_alpha_test(&mut self, test: Option<AlphaTest>);
    fn set_stencil_test(&mut self, test: Option<StencilTest>);

    // ========== View ==========

    fn set_viewport(&mut self, rect: Rect);
    fn set_scissor(&mut self, rect: Rect);
    fn load_projection(&mut self, matrix: &Mat4);
    fn load_modelview(&mut self, matrix: &Mat4);
    fn set_depth_range(&mut self, near: f32, far: f32);
    /// `None` disables the user clip plane.
    fn set_clip_plane(&mut self, plane: Option<[f64; 4]>);
    fn set_clear_color(&mut self, color: Vec4);
    fn clear(&mut self, bits: ClearBits);
    fn set_draw_buffer(&mut self, buffer: DrawBuffer);

    // ========== Submission ==========

    fn draw_indexed(&mut self, batch: &DrawBatch<'_>);

    // ========== Offscreen targets ==========

    fn configure_target(&mut self, framebuffer: Framebuffer, desc: &TargetDesc);
    fn bind_framebuffer(&mut self, framebuffer: Framebuffer);
    fn check_framebuffer(&mut self, framebuffer: Framebuffer) -> FramebufferStatus;
    fn blit(&mut self, src: Framebuffer, src_rect: Rect, dst: Framebuffer, dst_rect: Rect, filter: vk::Filter);
    fn run_filter_pass(&mut self, pass: &FilterPass);
    fn upload_scaling_weights(&mut self, program: ScaleProgram, weights: &ScalingWeights);

    // ========== Synchronization ==========

    /// Block until all submitted work has completed.
    fn finish(&mut self);
    fn read_pixels(&mut self, rect: Rect, format: PixelFormat) -> Vec<u8>;
    /// Hand the finished frame to the presentation layer.
    fn swap_buffers(&mut self);
}
