//! Command buffer encoding
//!
//! Records are fixed-size `#[repr(C)]` structs whose first field is the
//! tag, packed back to back in host byte order. Variable-size payloads
//! live in side tables and are referenced by index.

use std::mem::size_of;

use bytemuck::{Pod, Zeroable};

use super::{CommandTag, RenderCommand, ScreenshotFormat, ViewPacket};
use crate::error::CommandError;
use crate::geometry::{PolyVert, StretchPic};

// ============================================================
// Records
// ============================================================

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct SetColorCmd {
    pub tag: i32,
    pub color: [f32; 4],
}

/// Shared by stretch, rotated and gradient pics.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct StretchPicCmd {
    pub tag: i32,
    pub shader: i32,
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub s1: f32,
    pub t1: f32,
    pub s2: f32,
    pub t2: f32,
    pub angle: f32,
    pub gradient_color: [u8; 4],
}

impl StretchPicCmd {
    fn new(tag: CommandTag, shader: i32, pic: &StretchPic) -> Self {
        Self {
            tag: tag as i32,
            shader,
            x: pic.x,
            y: pic.y,
            w: pic.w,
            h: pic.h,
            s1: pic.s1,
            t1: pic.t1,
            s2: pic.s2,
            t2: pic.t2,
            angle: pic.angle,
            gradient_color: pic.gradient_color,
        }
    }

    fn pic(&self) -> StretchPic {
        StretchPic {
            x: self.x,
            y: self.y,
            w: self.w,
            h: self.h,
            s1: self.s1,
            t1: self.t1,
            s2: self.s2,
            t2: self.t2,
            angle: self.angle,
            gradient_color: self.gradient_color,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Poly2DCmd {
    pub tag: i32,
    pub shader: i32,
    pub first_vert: u32,
    pub num_verts: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct DrawSurfsCmd {
    pub tag: i32,
    pub view: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct DrawBufferCmd {
    pub tag: i32,
    pub buffer: i32,
}

/// Records with no payload beyond the tag.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct BareCmd {
    pub tag: i32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ScreenshotCmd {
    pub tag: i32,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub file_name: u32,
    pub format: i32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct VideoFrameCmd {
    pub tag: i32,
    pub width: i32,
    pub height: i32,
    pub motion_jpeg: i32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct RenderToTextureCmd {
    pub tag: i32,
    pub image: i32,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Size of the record that follows `tag`, tag included.
pub fn record_size(tag: CommandTag) -> usize {
    match tag {
        CommandTag::EndOfList | CommandTag::SwapBuffers | CommandTag::Finish => size_of::<BareCmd>(),
        CommandTag::SetColor => size_of::<SetColorCmd>(),
        CommandTag::StretchPic | CommandTag::RotatedPic | CommandTag::GradientPic => size_of::<StretchPicCmd>(),
        CommandTag::Poly2D => size_of::<Poly2DCmd>(),
        CommandTag::DrawSurfs => size_of::<DrawSurfsCmd>(),
        CommandTag::DrawBuffer => size_of::<DrawBufferCmd>(),
        CommandTag::Screenshot => size_of::<ScreenshotCmd>(),
        CommandTag::VideoFrame => size_of::<VideoFrameCmd>(),
        CommandTag::RenderToTexture => size_of::<RenderToTextureCmd>(),
    }
}

// ============================================================
// Buffer
// ============================================================

/// One frame of serialized commands plus the side tables they index.
#[derive(Clone, Debug, Default)]
pub struct CommandBuffer {
    pub bytes: Vec<u8>,
    pub views: Vec<ViewPacket>,
    pub poly_verts: Vec<PolyVert>,
    pub file_names: Vec<String>,
}

impl CommandBuffer {
    pub fn cursor(&self) -> CommandCursor<'_> {
        CommandCursor { buffer: self, offset: 0 }
    }
}

fn read_record<T: Pod>(bytes: &[u8], offset: usize, tag: i32) -> Result<T, CommandError> {
    let needed = size_of::<T>();
    let available = bytes.len().saturating_sub(offset);
    if available < needed {
        return Err(CommandError::Truncated { tag, offset, needed, available });
    }
    Ok(bytemuck::pod_read_unaligned(&bytes[offset..offset + needed]))
}

/// Decode the record at `offset`. Returns the command (`None` for
/// end-of-list) and the number of bytes it occupied.
pub fn decode_command(
    buffer: &CommandBuffer,
    offset: usize,
) -> Result<(Option<RenderCommand<'_>>, usize), CommandError> {
    let bytes = &buffer.bytes;
    if offset >= bytes.len() {
        return Ok((None, 0));
    }

    let raw: BareCmd = read_record(bytes, offset, -1)?;
    let tag = CommandTag::from_i32(raw.tag).ok_or(CommandError::UnknownTag { tag: raw.tag, offset })?;
    let size = record_size(tag);

    let command = match tag {
        CommandTag::EndOfList => None,
        CommandTag::SetColor => {
            let cmd: SetColorCmd = read_record(bytes, offset, raw.tag)?;
            Some(RenderCommand::SetColor(cmd.color))
        }
        CommandTag::StretchPic | CommandTag::RotatedPic | CommandTag::GradientPic => {
            let cmd: StretchPicCmd = read_record(bytes, offset, raw.tag)?;
            let (shader, pic) = (cmd.shader, cmd.pic());
            Some(match tag {
                CommandTag::RotatedPic => RenderCommand::RotatedPic { shader, pic },
                CommandTag::GradientPic => RenderCommand::GradientPic { shader, pic },
                _ => RenderCommand::StretchPic { shader, pic },
            })
        }
        CommandTag::Poly2D => {
            let cmd: Poly2DCmd = read_record(bytes, offset, raw.tag)?;
            let first = cmd.first_vert as usize;
            let verts = buffer
                .poly_verts
                .get(first..first + cmd.num_verts as usize)
                .ok_or(CommandError::MissingPayload { kind: "poly vertexes", index: first })?;
            Some(RenderCommand::Poly2D { shader: cmd.shader, verts })
        }
        CommandTag::DrawSurfs => {
            let cmd: DrawSurfsCmd = read_record(bytes, offset, raw.tag)?;
            let view = buffer
                .views
                .get(cmd.view as usize)
                .ok_or(CommandError::MissingPayload { kind: "view", index: cmd.view as usize })?;
            Some(RenderCommand::DrawSurfs(view))
        }
        CommandTag::DrawBuffer => {
            let cmd: DrawBufferCmd = read_record(bytes, offset, raw.tag)?;
            Some(RenderCommand::DrawBuffer(cmd.buffer))
        }
        CommandTag::SwapBuffers => Some(RenderCommand::SwapBuffers),
        CommandTag::Finish => Some(RenderCommand::Finish),
        CommandTag::Screenshot => {
            let cmd: ScreenshotCmd = read_record(bytes, offset, raw.tag)?;
            let file_name = buffer
                .file_names
                .get(cmd.file_name as usize)
                .ok_or(CommandError::MissingPayload { kind: "file name", index: cmd.file_name as usize })?;
            Some(RenderCommand::Screenshot {
                x: cmd.x,
                y: cmd.y,
                width: cmd.width,
                height: cmd.height,
                file_name,
                format: ScreenshotFormat::from_i32(cmd.format),
            })
        }
        CommandTag::VideoFrame => {
            let cmd: VideoFrameCmd = read_record(bytes, offset, raw.tag)?;
            Some(RenderCommand::VideoFrame {
                width: cmd.width,
                height: cmd.height,
                motion_jpeg: cmd.motion_jpeg != 0,
            })
        }
        CommandTag::RenderToTexture => {
            let cmd: RenderToTextureCmd = read_record(bytes, offset, raw.tag)?;
            Some(RenderCommand::RenderToTexture {
                image: cmd.image.max(0) as usize,
                x: cmd.x,
                y: cmd.y,
                width: cmd.width,
                height: cmd.height,
            })
        }
    };

    Ok((command, size))
}

/// Walks a buffer one record at a time.
pub struct CommandCursor<'a> {
    buffer: &'a CommandBuffer,
    offset: usize,
}

impl<'a> CommandCursor<'a> {
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Next command, or `Ok(None)` once the end-of-list record (or the end
    /// of the bytes) is reached.
    pub fn next_command(&mut self) -> Result<Option<RenderCommand<'a>>, CommandError> {
        let (command, consumed) = decode_command(self.buffer, self.offset)?;
        self.offset += consumed;
        Ok(command)
    }
}

// ============================================================
// Writer
// ============================================================

/// Producer-side encoder.
#[derive(Default)]
pub struct CommandBufferWriter {
    buffer: CommandBuffer,
}

impl CommandBufferWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn push<T: Pod>(&mut self, record: &T) {
        self.buffer.bytes.extend_from_slice(bytemuck::bytes_of(record));
    }

    pub fn set_color(&mut self, color: [f32; 4]) -> &mut Self {
        self.push(&SetColorCmd { tag: CommandTag::SetColor as i32, color });
        self
    }

    pub fn stretch_pic(&mut self, shader: i32, pic: &StretchPic) -> &mut Self {
        self.push(&StretchPicCmd::new(CommandTag::StretchPic, shader, pic));
        self
    }

    pub fn rotated_pic(&mut self, shader: i32, pic: &StretchPic) -> &mut Self {
        self.push(&StretchPicCmd::new(CommandTag::RotatedPic, shader, pic));
        self
    }

    pub fn gradient_pic(&mut self, shader: i32, pic: &StretchPic) -> &mut Self {
        self.push(&StretchPicCmd::new(CommandTag::GradientPic, shader, pic));
        self
    }

    pub fn poly_2d(&mut self, shader: i32, verts: &[PolyVert]) -> &mut Self {
        let first_vert = self.buffer.poly_verts.len() as u32;
        self.buffer.poly_verts.extend_from_slice(verts);
        self.push(&Poly2DCmd {
            tag: CommandTag::Poly2D as i32,
            shader,
            first_vert,
            num_verts: verts.len() as u32,
        });
        self
    }

    pub fn draw_surfs(&mut self, view: ViewPacket) -> &mut Self {
        let index = self.buffer.views.len() as u32;
        self.buffer.views.push(view);
        self.push(&DrawSurfsCmd { tag: CommandTag::DrawSurfs as i32, view: index });
        self
    }

    pub fn draw_buffer(&mut self, buffer: i32) -> &mut Self {
        self.push(&DrawBufferCmd { tag: CommandTag::DrawBuffer as i32, buffer });
        self
    }

    pub fn swap_buffers(&mut self) -> &mut Self {
        self.push(&BareCmd { tag: CommandTag::SwapBuffers as i32 });
        self
    }

    pub fn screenshot(
        &mut self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        file_name: &str,
        format: ScreenshotFormat,
    ) -> &mut Self {
        let index = self.buffer.file_names.len() as u32;
        self.buffer.file_names.push(file_name.to_string());
        self.push(&ScreenshotCmd {
            tag: CommandTag::Screenshot as i32,
            x,
            y,
            width,
            height,
            file_name: index,
            format: format.as_i32(),
        });
        self
    }

    pub fn video_frame(&mut self, width: i32, height: i32, motion_jpeg: bool) -> &mut Self {
        self.push(&VideoFrameCmd {
            tag: CommandTag::VideoFrame as i32,
            width,
            height,
            motion_jpeg: motion_jpeg as i32,
        });
        self
    }

    pub fn render_to_texture(&mut self, image: usize, x: i32, y: i32, width: i32, height: i32) -> &mut Self {
        self.push(&RenderToTextureCmd {
            tag: CommandTag::RenderToTexture as i32,
            image: image as i32,
            x,
            y,
            width,
            height,
        });
        self
    }

    pub fn finish(&mut self) -> &mut Self {
        self.push(&BareCmd { tag: CommandTag::Finish as i32 });
        self
    }

    /// Terminate the stream and hand the buffer over.
    pub fn end_of_list(mut self) -> CommandBuffer {
        self.push(&BareCmd { tag: CommandTag::EndOfList as i32 });
        self.buffer
    }
}
