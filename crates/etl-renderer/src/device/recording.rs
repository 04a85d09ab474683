//! Device that records every call instead of drawing.
//!
//! Used by headless hosts and by the test suite to assert on the exact
//! sequence of device operations the back end produced.

use ash::vk;
use etl_common::q_shared::{Mat4, Vec4};

use super::{
    AlphaTest, ClearBits, DrawBatch, DrawBuffer, FilterPass, Framebuffer, FramebufferStatus,
    GraphicsDevice, PixelFormat, Rect, ScaleProgram, StencilTest, TargetDesc, TexEnv,
};
use crate::framebuffer::weights::ScalingWeights;

#[derive(Clone, Debug, PartialEq)]
pub enum DeviceCall {
    ActiveTexture(usize),
    BindTexture(u32),
    TexEnv(TexEnv),
    TextureLodBias { texnum: u32, bias: f32 },
    UploadTexture { texnum: u32, width: u32, height: u32, respecify: bool },
    CopyToTexture { texnum: u32, rect: Rect },
    Cull(Option<vk::CullModeFlags>),
    DepthFunc(vk::CompareOp),
    Blend(Option<(vk::BlendFactor, vk::BlendFactor)>),
    DepthMask(bool),
    PolygonMode(vk::PolygonMode),
    DepthTest(bool),
    AlphaTest(Option<AlphaTest>),
    StencilTest(Option<StencilTest>),
    Viewport(Rect),
    Scissor(Rect),
    Projection(Mat4),
    Modelview(Mat4),
    DepthRange(f32, f32),
    ClipPlane(Option<[f64; 4]>),
    ClearColor(Vec4),
    Clear(ClearBits),
    DrawBuffer(DrawBuffer),
    Draw { vertexes: usize, indexes: usize },
    ConfigureTarget(Framebuffer, TargetDesc),
    BindFramebuffer(Framebuffer),
    CheckFramebuffer(Framebuffer),
    Blit { src: Framebuffer, src_rect: Rect, dst: Framebuffer, dst_rect: Rect, filter: vk::Filter },
    FilterPass(FilterPass),
    UploadWeights { program: ScaleProgram, count: usize },
    Finish,
    ReadPixels(Rect, PixelFormat),
    Swap,
}

pub struct RecordingDevice {
    pub calls: Vec<DeviceCall>,
    /// Status reported by `check_framebuffer`.
    pub framebuffer_status: FramebufferStatus,
    /// Byte value returned for every pixel by `read_pixels`.
    pub fill: u8,
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            framebuffer_status: FramebufferStatus::Complete,
            fill: 0,
        }
    }

    pub fn take_calls(&mut self) -> Vec<DeviceCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn count(&self, pred: impl Fn(&DeviceCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn draws(&self) -> usize {
        self.count(|c| matches!(c, DeviceCall::Draw { .. }))
    }

    pub fn position(&self, call: &DeviceCall) -> Option<usize> {
        self.calls.iter().position(|c| c == call)
    }
}

impl GraphicsDevice for RecordingDevice {
    fn active_texture(&mut self, unit: usize) {
        self.calls.push(DeviceCall::ActiveTexture(unit));
    }

    fn bind_texture(&mut self, texnum: u32) {
        self.calls.push(DeviceCall::BindTexture(texnum));
    }

    fn set_tex_env(&mut self, env: TexEnv) {
        self.calls.push(DeviceCall::TexEnv(env));
    }

    fn set_texture_lod_bias(&mut self, texnum: u32, bias: f32) {
        self.calls.push(DeviceCall::TextureLodBias { texnum, bias });
    }

    fn upload_texture(&mut self, texnum: u32, width: u32, height: u32, _data: &[u8], respecify: bool) {
        self.calls.push(DeviceCall::UploadTexture { texnum, width, height, respecify });
    }

    fn copy_framebuffer_to_texture(&mut self, texnum: u32, rect: Rect) {
        self.calls.push(DeviceCall::CopyToTexture { texnum, rect });
    }

    fn set_cull(&mut self, face: Option<vk::CullModeFlags>) {
        self.calls.push(DeviceCall::Cull(face));
    }

    fn set_depth_func(&mut self, op: vk::CompareOp) {
        self.calls.push(DeviceCall::DepthFunc(op));
    }

    fn set_blend(&mut self, factors: Option<(vk::BlendFactor, vk::BlendFactor)>) {
        self.calls.push(DeviceCall::Blend(factors));
    }

    fn set_depth_mask(&mut self, write: bool) {
        self.calls.push(DeviceCall::DepthMask(write));
    }

    fn set_polygon_mode(&mut self, mode: vk::PolygonMode) {
        self.calls.push(DeviceCall::PolygonMode(mode));
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.calls.push(DeviceCall::DepthTest(enabled));
    }

    fn set_alpha_test(&mut self, test: Option<AlphaTest>) {
        self.calls.push(DeviceCall::AlphaTest(test));
    }

    fn set_stencil_test(&mut self, test: Option<StencilTest>) {
        self.calls.push(DeviceCall::StencilTest(test));
    }

    fn set_viewport(&mut self, rect: Rect) {
        self.calls.push(DeviceCall::Viewport(rect));
    }

    fn set_scissor(&mut self, rect: Rect) {
        self.calls.push(DeviceCall::Scissor(rect));
    }

    fn load_projection(&mut self, matrix: &Mat4) {
        self.calls.push(DeviceCall::Projection(*matrix));
    }

    fn load_modelview(&mut self, matrix: &Mat4) {
        self.calls.push(DeviceCall::Modelview(*matrix));
    }

    fn set_depth_range(&mut self, near: f32, far: f32) {
        self.calls.push(DeviceCall::DepthRange(near, far));
    }

    fn set_clip_plane(&mut self, plane: Option<[f64; 4]>) {
        self.calls.push(DeviceCall::ClipPlane(plane));
    }

    fn set_clear_color(&mut self, color: Vec4) {
        self.calls.push(DeviceCall::ClearColor(color));
    }

    fn clear(&mut self, bits: ClearBits) {
        self.calls.push(DeviceCall::Clear(bits));
    }

    fn set_draw_buffer(&mut self, buffer: DrawBuffer) {
        self.calls.push(DeviceCall::DrawBuffer(buffer));
    }

    fn draw_indexed(&mut self, batch: &DrawBatch<'_>) {
        self.calls.push(DeviceCall::Draw {
            vertexes: batch.xyz.len(),
            indexes: batch.indexes.len(),
        });
    }

    fn configure_target(&mut self, framebuffer: Framebuffer, desc: &TargetDesc) {
        self.calls.push(DeviceCall::ConfigureTarget(framebuffer, *desc));
    }

    fn bind_framebuffer(&mut self, framebuffer: Framebuffer) {
        self.calls.push(DeviceCall::BindFramebuffer(framebuffer));
    }

    fn check_framebuffer(&mut self, framebuffer: Framebuffer) -> FramebufferStatus {
        self.calls.push(DeviceCall::CheckFramebuffer(framebuffer));
        self.framebuffer_status
    }

    fn blit(&mut self, src: Framebuffer, src_rect: Rect, dst: Framebuffer, dst_rect: Rect, filter: vk::Filter) {
        self.calls.push(DeviceCall::Blit { src, src_rect, dst, dst_rect, filter });
    }

    fn run_filter_pass(&mut self, pass: &FilterPass) {
        self.calls.push(DeviceCall::FilterPass(pass.clone()));
    }

    fn upload_scaling_weights(&mut self, program: ScaleProgram, weights: &ScalingWeights) {
        self.calls.push(DeviceCall::UploadWeights {
            program,
            count: weights.weights.len(),
        });
    }

    fn finish(&mut self) {
        self.calls.push(DeviceCall::Finish);
    }

    fn read_pixels(&mut self, rect: Rect, format: PixelFormat) -> Vec<u8> {
        self.calls.push(DeviceCall::ReadPixels(rect, format));
        let bpp = match format {
            PixelFormat::Rgb => 3,
            PixelFormat::Stencil => 1,
        };
        vec![self.fill; rect.width.max(0) as usize * rect.height.max(0) as usize * bpp]
    }

    fn swap_buffers(&mut self) {
        self.calls.push(DeviceCall::Swap);
    }
}
