//! Back end context and command dispatch
//!
//! `Backend` owns every piece of render-thread state: the device, the
//! state cache, the open batch and the offscreen pipeline. One instance
//! lives on the render thread and executes command buffers handed over by
//! the front end.

use std::path::Path;
use std::time::Instant;

use etl_common::common::{com_dprintf, com_error, com_printf, com_warning, ErrorCode};
use etl_common::cvar::SharedCvars;
use rayon::prelude::*;

use crate::capture::{write_screenshot, VideoFrame, VideoSink};
use crate::commands::{CommandBuffer, RenderCommand, ScreenshotFormat, ViewPacket};
use crate::device::{ClearBits, DrawBatch, DrawBuffer, GraphicsDevice, PixelFormat, Rect};
use crate::effects::{DeferredEffects, NoEffects};
use crate::error::BackendResult;
use crate::framebuffer::PostProcessor;
use crate::geometry::{
    push_poly_fan, push_rotated_quad, push_stretch_quad, PendingFlare, PolyVert, StageIterator, StretchPic,
    Tessellator, QUAD_INDEXES,
};
use crate::render_config::RenderConfig;
use crate::settings::{RenderSettings, RendererCvars};
use crate::state_cache::StateCache;
use crate::tr_local::*;
use crate::tr_types::{same_shader, ImageHandle, ImageTable, ShaderTable};

/// Columns in the image-thrash grid.
const SHOW_IMAGES_COLUMNS: u32 = 40;
const SHOW_IMAGES_ROWS: u32 = 30;

const DEBUG_CLEAR_COLOR: [f32; 4] = [1.0, 0.0, 0.5, 1.0];

pub struct Backend<D: GraphicsDevice> {
    pub device: D,
    pub config: RenderConfig,
    pub cvars: SharedCvars,
    handles: RendererCvars,
    /// Snapshot taken at the start of each command buffer.
    pub settings: RenderSettings,

    pub state: StateCache,
    pub tess: Tessellator,
    pub shaders: ShaderTable,
    pub images: ImageTable,
    pub post: PostProcessor,

    // ========================================================================
    // Current view
    // ========================================================================
    pub scene: SceneState,
    pub refdef: RefDef,
    pub view_parms: ViewParms,
    pub orientation: Orientation,
    pub current_entity: CurrentEntity,
    /// The 2D projection is loaded.
    pub projection_2d: bool,
    /// Vertex color for 2D commands.
    pub color_2d: [u8; 4],
    pub is_hyperspace: bool,
    pub sky_rendered_this_view: bool,
    pub(crate) flares: Vec<PendingFlare>,

    pub frame_count: u32,
    pub pc: PerfCounters,

    pub(crate) effects: Box<dyn DeferredEffects>,
    video_sink: Option<Box<dyn VideoSink>>,
    epoch: Instant,
}

impl<D: GraphicsDevice> Backend<D> {
    pub fn new(device: D, config: RenderConfig, cvars: SharedCvars) -> Self {
        let handles = RendererCvars::register(&mut cvars.write());
        let settings = RenderSettings::sample(&cvars.read(), &handles);
        let images = ImageTable::new();
        let shaders = ShaderTable::new(images.default_image);
        let scene = SceneState {
            identity_light: config.identity_light,
            ..SceneState::default()
        };

        Self {
            device,
            tess: Tessellator::new(config.max_vertexes, config.max_indexes),
            config,
            cvars,
            handles,
            settings,
            state: StateCache::new(),
            shaders,
            images,
            post: PostProcessor::new(),
            scene,
            refdef: RefDef::default(),
            view_parms: ViewParms::default(),
            orientation: Orientation::default(),
            current_entity: CurrentEntity::World,
            projection_2d: false,
            color_2d: [255; 4],
            is_hyperspace: false,
            sky_rendered_this_view: false,
            flares: Vec::new(),
            frame_count: 0,
            pc: PerfCounters::default(),
            effects: Box::new(NoEffects),
            video_sink: None,
            epoch: Instant::now(),
        }
    }

    pub fn with_effects(mut self, effects: Box<dyn DeferredEffects>) -> Self {
        self.effects = effects;
        self
    }

    pub fn with_video_sink(mut self, sink: Box<dyn VideoSink>) -> Self {
        self.video_sink = Some(sink);
        self
    }

    /// Put the device and the state cache into their initial agreement.
    pub fn set_default_state(&mut self) {
        self.state.set_default_state(&mut self.device);
    }

    /// Wall-clock milliseconds since the back end was created.
    pub fn milliseconds(&self) -> i32 {
        clamp_millis(self.epoch.elapsed().as_millis())
    }

    /// The open batch together with the sink that draws it.
    fn batch(&mut self) -> (&mut Tessellator, StageIterator<'_>) {
        let sink = StageIterator {
            device: &mut self.device,
            state: &mut self.state,
            images: &mut self.images,
            pc: &mut self.pc,
            frame_count: self.frame_count,
            no_bind: self.settings.no_bind != 0,
            is_mirror: self.view_parms.is_mirror,
        };
        (&mut self.tess, sink)
    }

    /// Flush the open batch, if it holds anything.
    pub fn end_surface(&mut self) {
        let (tess, mut sink) = self.batch();
        tess.end(&mut sink);
    }

    // ========================================================================
    // Command loop
    // ========================================================================

    /// Run one command buffer to its end-of-list record.
    pub fn execute_render_commands(&mut self, buffer: &CommandBuffer) -> BackendResult<()> {
        let start = Instant::now();
        self.settings = RenderSettings::sample(&self.cvars.read(), &self.handles);
        self.pc = PerfCounters::default();

        let mut cursor = buffer.cursor();
        let result = loop {
            match cursor.next_command() {
                Ok(Some(cmd)) => self.dispatch(cmd),
                Ok(None) => break Ok(()),
                Err(err) => break Err(err),
            }
        };

        self.end_surface();
        self.pc.msec = start.elapsed().as_millis() as u32;

        if self.settings.speeds != 0 {
            let pc = &self.pc;
            com_printf(&format!(
                "{} shaders/{} surfs {} verts {} indexes {} batches {} overdraw {} msec\n",
                pc.c_shaders, pc.c_surfaces, pc.c_vertexes, pc.c_indexes, pc.c_batches, pc.c_overdraw, pc.msec
            ));
        }

        result.map_err(Into::into)
    }

    fn dispatch(&mut self, cmd: RenderCommand<'_>) {
        match cmd {
            RenderCommand::SetColor(color) => self.set_color(color),
            RenderCommand::StretchPic { shader, pic } => self.stretch_pic(shader, &pic),
            RenderCommand::RotatedPic { shader, pic } => self.rotated_pic(shader, &pic),
            RenderCommand::GradientPic { shader, pic } => self.gradient_pic(shader, &pic),
            RenderCommand::Poly2D { shader, verts } => self.draw_2d_polys(shader, verts),
            RenderCommand::DrawSurfs(view) => self.draw_surfs(view),
            RenderCommand::DrawBuffer(buffer) => self.draw_buffer(DrawBuffer::from_i32(buffer)),
            RenderCommand::SwapBuffers => self.swap_buffers(),
            RenderCommand::Screenshot { x, y, width, height, file_name, format } => {
                self.take_screenshot(Rect::new(x, y, width, height), file_name, format)
            }
            RenderCommand::VideoFrame { width, height, motion_jpeg } => {
                self.take_video_frame(width, height, motion_jpeg)
            }
            RenderCommand::RenderToTexture { image, x, y, width, height } => {
                self.render_to_texture(ImageHandle(image), Rect::new(x, y, width, height))
            }
            RenderCommand::Finish => self.finish(),
        }
    }

    // ========================================================================
    // 2D
    // ========================================================================

    pub fn set_color(&mut self, color: [f32; 4]) {
        self.color_2d = color.map(|c| (c * 255.0) as u8);
    }

    /// Enter 2D and make `shader` the open batch.
    fn begin_2d_batch(&mut self, shader: i32) {
        if !self.projection_2d {
            self.set_gl_2d();
        }

        let shader = self.shaders.get(shader);
        if !same_shader(Some(&shader), self.tess.shader.as_ref()) {
            if self.tess.num_indexes() > 0 {
                self.end_surface();
            }
            self.current_entity = CurrentEntity::TwoD;
            let shader_time = self.refdef.float_time - shader.time_offset as f64;
            self.tess.begin(shader, 0, false, shader_time);
        }
    }

    pub fn stretch_pic(&mut self, shader: i32, pic: &StretchPic) {
        self.begin_2d_batch(shader);
        let color = self.color_2d;
        let (tess, mut sink) = self.batch();
        push_stretch_quad(tess, &mut sink, pic, color, color);
    }

    /// Stretch pic whose lower edge takes the pic's gradient color.
    pub fn gradient_pic(&mut self, shader: i32, pic: &StretchPic) {
        self.begin_2d_batch(shader);
        let color = self.color_2d;
        let (tess, mut sink) = self.batch();
        push_stretch_quad(tess, &mut sink, pic, color, pic.gradient_color);
    }

    pub fn rotated_pic(&mut self, shader: i32, pic: &StretchPic) {
        self.begin_2d_batch(shader);
        let color = self.color_2d;
        let (tess, mut sink) = self.batch();
        push_rotated_quad(tess, &mut sink, pic, color);
    }

    pub fn draw_2d_polys(&mut self, shader: i32, verts: &[PolyVert]) {
        self.begin_2d_batch(shader);
        let (tess, mut sink) = self.batch();
        push_poly_fan(tess, &mut sink, verts);
    }

    // ========================================================================
    // 3D
    // ========================================================================

    pub fn draw_surfs(&mut self, view: &ViewPacket) {
        self.end_surface();

        self.refdef = view.refdef.clone();
        self.view_parms = view.view_parms.clone();

        self.draw_scene(&view.draw_surfs);
    }

    pub fn draw_buffer(&mut self, buffer: DrawBuffer) {
        self.device.set_draw_buffer(buffer);

        // debug: make untouched pixels obvious
        if self.settings.clear != 0 {
            self.device.set_clear_color(DEBUG_CLEAR_COLOR);
            self.device.clear(ClearBits::COLOR | ClearBits::DEPTH);
        }
    }

    // ========================================================================
    // Frame end
    // ========================================================================

    pub fn swap_buffers(&mut self) {
        self.end_surface();

        if self.settings.show_images != 0 {
            self.show_images();
        }

        if self.settings.measure_overdraw != 0 {
            let rect = Rect::sized(self.config.vid_width as i32, self.config.vid_height as i32);
            let stencil = self.device.read_pixels(rect, PixelFormat::Stencil);
            self.pc.c_overdraw += stencil.par_iter().map(|&v| v as u64).sum::<u64>();
        }

        if !self.state.finish_called {
            self.device.finish();
        }

        self.device.swap_buffers();
        self.projection_2d = false;

        self.state.finish_called = false;
        self.frame_count = self.frame_count.wrapping_add(1);
    }

    /// Draw every image in a grid to spot texture thrashing.
    fn show_images(&mut self) {
        if !self.projection_2d {
            self.set_gl_2d();
        }
        self.device.clear(ClearBits::COLOR);
        self.device.finish();
        let start = Instant::now();

        let cell_w = self.config.vid_width as f32 / SHOW_IMAGES_COLUMNS as f32;
        let cell_h = self.config.vid_height as f32 / SHOW_IMAGES_ROWS as f32;
        let proportional = self.settings.show_images == 2;
        let white = [255u8; 4];

        let handles: Vec<ImageHandle> = self.images.iter().map(|(h, _)| h).collect();
        for (i, handle) in handles.into_iter().enumerate() {
            let Some(image) = self.images.get(handle) else {
                continue;
            };
            let (mut w, mut h) = (cell_w, cell_h);
            if proportional {
                w *= image.upload_width as f32 / 512.0;
                h *= image.upload_height as f32 / 512.0;
            }
            let x = (i as u32 % SHOW_IMAGES_COLUMNS) as f32 * cell_w;
            let y = (i as u32 / SHOW_IMAGES_COLUMNS) as f32 * cell_h;

            self.state
                .bind(&mut self.device, &mut self.images, Some(handle), self.frame_count, false);
            self.device.draw_indexed(&DrawBatch {
                xyz: &[[x, y, 0.0, 1.0], [x + w, y, 0.0, 1.0], [x + w, y + h, 0.0, 1.0], [x, y + h, 0.0, 1.0]],
                tex_coords: &[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
                colors: &[white; 4],
                indexes: &QUAD_INDEXES,
            });
        }

        self.device.finish();
        com_printf(&format!("{} msec to draw all images\n", start.elapsed().as_millis()));
    }

    pub fn finish(&mut self) {
        self.end_surface();
        self.device.finish();
        self.state.finish_called = true;
    }

    // ========================================================================
    // Capture
    // ========================================================================

    pub fn take_screenshot(&mut self, rect: Rect, file_name: &str, format: ScreenshotFormat) {
        self.end_surface();

        let pixels = self.device.read_pixels(rect, PixelFormat::Rgb);
        let (width, height) = (rect.width.max(0) as u32, rect.height.max(0) as u32);
        match write_screenshot(Path::new(file_name), &pixels, width, height, format) {
            Ok(()) => com_printf(&format!("Wrote {}\n", file_name)),
            Err(err) => com_warning(&format!("RB_TakeScreenshot: {}: {}\n", file_name, err)),
        }
    }

    pub fn take_video_frame(&mut self, width: i32, height: i32, motion_jpeg: bool) {
        self.end_surface();

        let Some(sink) = self.video_sink.as_mut() else {
            com_dprintf("RB_TakeVideoFrame: no video sink\n");
            return;
        };

        let pixels = self.device.read_pixels(Rect::sized(width, height), PixelFormat::Rgb);
        match VideoFrame::from_readback(&pixels, width.max(0) as u32, height.max(0) as u32, motion_jpeg) {
            Ok(frame) => sink.write_frame(frame),
            Err(err) => com_warning(&format!("RB_TakeVideoFrame: {}\n", err)),
        }
    }

    /// Copy a framebuffer region into `image`.
    pub fn render_to_texture(&mut self, image: ImageHandle, rect: Rect) {
        self.end_surface();

        let Some(texnum) = self.images.get(image).map(|img| img.texnum) else {
            com_warning(&format!("RB_RenderToTexture: bad image {}\n", image.0));
            return;
        };
        self.state.select_texture(&mut self.device, 0);
        self.state
            .bind(&mut self.device, &mut self.images, Some(image), self.frame_count, false);
        self.device.copy_framebuffer_to_texture(texnum, rect);
    }

    // ========================================================================
    // Cinematics
    // ========================================================================

    /// Upload a cinematic frame into the client's scratch image.
    ///
    /// Storage is re-specified when the frame size changes; otherwise the
    /// texture is only rewritten when the frame is `dirty`.
    pub fn upload_cinematic(&mut self, cols: u32, rows: u32, data: &[u8], client: usize, dirty: bool) {
        let handle = self.images.scratch(client);
        self.state
            .bind(&mut self.device, &mut self.images, Some(handle), self.frame_count, false);

        let Some(image) = self.images.get_mut(handle) else {
            return;
        };
        if image.width != cols || image.height != rows {
            image.width = cols;
            image.height = rows;
            image.upload_width = cols;
            image.upload_height = rows;
            let texnum = image.texnum;
            self.device.upload_texture(texnum, cols, rows, data, true);
        } else if dirty {
            let texnum = image.texnum;
            self.device.upload_texture(texnum, cols, rows, data, false);
        }
    }

    /// Draw a raw cinematic frame straight to the screen.
    pub fn stretch_raw(
        &mut self,
        x: i32,
        y: i32,
        w: i32,
        h: i32,
        cols: u32,
        rows: u32,
        data: &[u8],
        client: usize,
        dirty: bool,
    ) {
        if !self.config.texture_npot && (!cols.is_power_of_two() || !rows.is_power_of_two()) {
            com_error(
                ErrorCode::Drop,
                &format!("Draw_StretchRaw: size not a power of 2: {} by {}", cols, rows),
            );
            return;
        }

        self.end_surface();

        let start = Instant::now();
        self.upload_cinematic(cols, rows, data, client, dirty);
        if self.settings.speeds != 0 {
            com_printf(&format!(
                "upload {}, {}: {} msec\n",
                cols,
                rows,
                start.elapsed().as_millis()
            ));
        }

        self.set_gl_2d();

        let light = (self.config.identity_light * 255.0) as u8;
        let color = [light, light, light, 255];
        let (x, y, w, h) = (x as f32, y as f32, w as f32, h as f32);
        let (s0, t0) = (0.5 / cols as f32, 0.5 / rows as f32);
        let (s1, t1) = ((cols as f32 - 0.5) / cols as f32, (rows as f32 - 0.5) / rows as f32);

        self.device.draw_indexed(&DrawBatch {
            xyz: &[[x, y, 0.0, 1.0], [x + w, y, 0.0, 1.0], [x + w, y + h, 0.0, 1.0], [x, y + h, 0.0, 1.0]],
            tex_coords: &[[s0, t0], [s1, t0], [s1, t1], [s0, t1]],
            colors: &[color; 4],
            indexes: &QUAD_INDEXES,
        });
    }
}

/// Millisecond counters stay non-negative, saturating after ~24 days.
fn clamp_millis(ms: u128) -> i32 {
    i32::try_from(ms).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use parking_lot::Mutex;

    use etl_common::cvar::CvarContext;

    use crate::commands::CommandBufferWriter;
    use crate::device::{DeviceCall, RecordingDevice, TexEnv};
    use crate::draw_surfs::DrawSurface;
    use crate::error::{BackendError, CommandError};
    use crate::geometry::{Surface, SurfaceVertex};
    use crate::sort_key::{SortKey, SortParts};
    use crate::state_cache::StateBits;
    use crate::tr_types::{Shader, ShaderRef, ShaderStage};

    fn backend() -> Backend<RecordingDevice> {
        Backend::new(RecordingDevice::new(), RenderConfig::default(), CvarContext::shared())
    }

    fn register(b: &mut Backend<RecordingDevice>, name: &str) -> ShaderRef {
        let image = b.images.white_image;
        b.shaders.register(Shader {
            name: name.to_string(),
            stages: vec![ShaderStage { image: Some(image), state_bits: StateBits::DEPTHMASK_TRUE, tex_env: TexEnv::Modulate }],
            ..Shader::default()
        })
    }

    fn pic() -> StretchPic {
        StretchPic { x: 0.0, y: 0.0, w: 100.0, h: 50.0, s1: 0.0, t1: 0.0, s2: 1.0, t2: 1.0, ..StretchPic::default() }
    }

    fn draws(b: &Backend<RecordingDevice>) -> Vec<(usize, usize)> {
        b.device
            .calls
            .iter()
            .filter_map(|c| match c {
                DeviceCall::Draw { vertexes, indexes } => Some((*vertexes, *indexes)),
                _ => None,
            })
            .collect()
    }

    // ============================================================
    // Clock
    // ============================================================

    #[test]
    fn test_milliseconds_saturate() {
        assert_eq!(clamp_millis(0), 0);
        assert_eq!(clamp_millis(1500), 1500);
        assert_eq!(clamp_millis(i32::MAX as u128), i32::MAX);
        assert_eq!(clamp_millis(i32::MAX as u128 + 1), i32::MAX);
        assert_eq!(clamp_millis(u128::MAX), i32::MAX);

        let b = backend();
        let first = b.milliseconds();
        assert!(first >= 0);
        assert!(b.milliseconds() >= first);
    }

    // ============================================================
    // Command loop
    // ============================================================

    #[test]
    fn test_single_stretch_pic_frame() {
        let mut b = backend();
        let s = register(&mut b, "gfx/2d/console");

        let mut w = CommandBufferWriter::new();
        w.set_color([1.0, 1.0, 1.0, 1.0]).stretch_pic(s.index as i32, &pic());
        b.execute_render_commands(&w.end_of_list()).unwrap();

        assert_eq!(draws(&b), vec![(4, 6)]);
        assert!(same_shader(b.tess.shader.as_ref(), Some(&s)));
        assert_eq!(b.color_2d, [255; 4]);

        // 2D projection is loaded before the pic is drawn
        let ortho = etl_common::q_shared::mat4_ortho(0.0, 640.0, 480.0, 0.0, 0.0, 1.0);
        let projection = b.device.position(&DeviceCall::Projection(ortho)).unwrap();
        let draw = b.device.calls.iter().position(|c| matches!(c, DeviceCall::Draw { .. })).unwrap();
        assert!(projection < draw);
        assert!(b.projection_2d);
        assert_eq!(b.current_entity, CurrentEntity::TwoD);
    }

    #[test]
    fn test_pics_with_same_shader_share_a_batch() {
        let mut b = backend();
        let a = register(&mut b, "a");
        let c = register(&mut b, "c");

        let mut w = CommandBufferWriter::new();
        w.stretch_pic(a.index as i32, &pic())
            .gradient_pic(a.index as i32, &pic())
            .rotated_pic(c.index as i32, &pic())
            .poly_2d(c.index as i32, &[PolyVert::default(); 5]);
        b.execute_render_commands(&w.end_of_list()).unwrap();

        assert_eq!(draws(&b), vec![(8, 12), (9, 15)]);
    }

    #[test]
    fn test_unknown_tag_stops_and_reports() {
        let mut b = backend();
        let mut w = CommandBufferWriter::new();
        w.finish();
        let mut buffer = w.end_of_list();
        buffer.bytes.truncate(4);
        buffer.bytes.extend_from_slice(&1234i32.to_ne_bytes());
        buffer.bytes.extend_from_slice(&5i32.to_ne_bytes());

        let err = b.execute_render_commands(&buffer).unwrap_err();
        assert!(matches!(err, BackendError::Command(CommandError::UnknownTag { tag: 1234, offset: 4 })));
        assert_eq!(b.device.count(|c| matches!(c, DeviceCall::Finish)), 1);
        assert_eq!(b.device.count(|c| matches!(c, DeviceCall::Swap)), 0);
    }

    #[test]
    fn test_settings_sampled_per_buffer() {
        let mut b = backend();
        b.cvars.write().set("r_measureOverdraw", "1");
        b.device.fill = 2;

        let mut w = CommandBufferWriter::new();
        w.swap_buffers();
        b.execute_render_commands(&w.end_of_list()).unwrap();

        assert_eq!(b.settings.measure_overdraw, 1);
        assert_eq!(b.pc.c_overdraw, 2 * 640 * 480);
    }

    #[test]
    fn test_draw_surfs_command() {
        let mut b = backend();
        let s = register(&mut b, "textures/wall");
        let key = SortKey::compose(&SortParts {
            entity_num: ENTITYNUM_WORLD,
            shader_index: s.sorted_index,
            fog_num: 0,
            front_face: false,
            dlighted: false,
        });
        let v = SurfaceVertex { xyz: [0.0; 3], st: [0.0; 2], color: [255; 4] };
        let tri = Surface::Face { verts: vec![v; 3], indexes: vec![0, 1, 2] };

        let mut view = ViewPacket::default();
        view.view_parms.viewport_width = 640;
        view.view_parms.viewport_height = 480;
        view.draw_surfs = vec![DrawSurface::new(key, tri.clone()), DrawSurface::new(key, tri)];

        let mut w = CommandBufferWriter::new();
        w.stretch_pic(s.index as i32, &pic()).draw_surfs(view);
        b.execute_render_commands(&w.end_of_list()).unwrap();

        // the 2D batch is flushed before the view starts
        assert_eq!(draws(&b), vec![(4, 6), (6, 6)]);
        assert!(!b.projection_2d);
        assert_eq!(b.pc.c_fast_path, 1);
        assert!(b.device.calls.contains(&DeviceCall::Viewport(Rect::sized(640, 480))));
    }

    // ============================================================
    // Frame end
    // ============================================================

    #[test]
    fn test_swap_finishes_once_per_frame() {
        let mut b = backend();
        b.finish();
        b.swap_buffers();
        assert_eq!(b.device.count(|c| matches!(c, DeviceCall::Finish)), 1);

        b.swap_buffers();
        assert_eq!(b.device.count(|c| matches!(c, DeviceCall::Finish)), 2);
        assert_eq!(b.frame_count, 2);
    }

    #[test]
    fn test_show_images_draws_every_image() {
        let mut b = backend();
        b.settings.show_images = 1;
        b.swap_buffers();
        assert_eq!(b.device.draws(), b.images.len());
    }

    #[test]
    fn test_draw_buffer_debug_clear() {
        let mut b = backend();
        b.draw_buffer(DrawBuffer::Back);
        assert_eq!(b.device.calls, vec![DeviceCall::DrawBuffer(DrawBuffer::Back)]);

        b.device.take_calls();
        b.settings.clear = 1;
        b.draw_buffer(DrawBuffer::Back);
        assert_eq!(
            b.device.calls,
            vec![
                DeviceCall::DrawBuffer(DrawBuffer::Back),
                DeviceCall::ClearColor(DEBUG_CLEAR_COLOR),
                DeviceCall::Clear(ClearBits::COLOR | ClearBits::DEPTH),
            ]
        );
    }

    // ============================================================
    // Capture and cinematics
    // ============================================================

    #[test]
    fn test_screenshot_written() {
        let mut b = backend();
        let dir = std::env::temp_dir().join(format!("etl-backend-shot-{}", std::process::id()));
        let path = dir.join("shot.tga");
        b.take_screenshot(Rect::sized(4, 4), path.to_str().unwrap(), ScreenshotFormat::Tga);
        assert!(path.exists());
        assert!(b.device.calls.contains(&DeviceCall::ReadPixels(Rect::sized(4, 4), PixelFormat::Rgb)));
        let _ = std::fs::remove_dir_all(&dir);
    }

    struct CollectFrames(Arc<Mutex<Vec<VideoFrame>>>);

    impl VideoSink for CollectFrames {
        fn write_frame(&mut self, frame: VideoFrame) {
            self.0.lock().push(frame);
        }
    }

    #[test]
    fn test_video_frame_reaches_sink() {
        let frames = Arc::new(Mutex::new(Vec::new()));
        let mut b = backend().with_video_sink(Box::new(CollectFrames(frames.clone())));
        b.take_video_frame(8, 4, false);

        let frames = frames.lock();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data.len(), 8 * 4 * 3);
    }

    #[test]
    fn test_render_to_texture() {
        let mut b = backend();
        let target = b.images.register("*portal", 256, 256, false);
        let texnum = b.images.get(target).unwrap().texnum;
        b.render_to_texture(target, Rect::sized(256, 256));
        assert!(b.device.calls.contains(&DeviceCall::BindTexture(texnum)));
        assert_eq!(
            b.device.calls.last(),
            Some(&DeviceCall::CopyToTexture { texnum, rect: Rect::sized(256, 256) })
        );
    }

    #[test]
    fn test_upload_cinematic_respecifies_on_resize() {
        let mut b = backend();
        let frame = vec![0u8; 128 * 64 * 4];
        let texnum = b.images.get(b.images.scratch(1)).unwrap().texnum;

        b.upload_cinematic(128, 64, &frame, 1, true);
        b.upload_cinematic(128, 64, &frame, 1, false);
        b.upload_cinematic(128, 64, &frame, 1, true);

        let uploads: Vec<_> = b
            .device
            .calls
            .iter()
            .filter_map(|c| match c {
                DeviceCall::UploadTexture { texnum: t, respecify, .. } if *t == texnum => Some(*respecify),
                _ => None,
            })
            .collect();
        assert_eq!(uploads, vec![true, false]);
    }

    #[test]
    fn test_stretch_raw_draws_inset_quad() {
        let mut b = backend();
        let frame = vec![0u8; 256 * 256 * 4];
        b.stretch_raw(0, 0, 640, 480, 256, 256, &frame, 0, true);
        assert_eq!(b.device.draws(), 1);
        assert!(b.projection_2d);

        b.config.texture_npot = false;
        b.device.take_calls();
        b.stretch_raw(0, 0, 640, 480, 200, 256, &frame, 0, true);
        assert_eq!(b.device.draws(), 0);
    }

    #[test]
    fn test_set_default_state_matches_cache() {
        let mut b = backend();
        b.set_default_state();
        b.device.take_calls();
        b.state.set_state(&mut b.device, crate::state_cache::GLS_DEFAULT);
        b.state.select_texture(&mut b.device, 0);
        assert!(b.device.calls.is_empty());
    }
}
