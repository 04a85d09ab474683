//! Render command stream
//!
//! The front end serializes one frame of work into a `CommandBuffer`; the
//! back end walks it with a cursor that yields typed `RenderCommand`s.

pub mod queue;
pub mod wire;

pub use queue::{FrameQueue, FrameReceiver, FrameSender};
pub use wire::{CommandBuffer, CommandBufferWriter, CommandCursor};

use crate::draw_surfs::DrawSurface;
use crate::geometry::{PolyVert, StretchPic};
use crate::tr_local::{RefDef, ViewParms};

/// Leading tag of every record.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandTag {
    EndOfList = 0,
    SetColor = 1,
    StretchPic = 2,
    DrawSurfs = 3,
    DrawBuffer = 4,
    SwapBuffers = 5,
    Screenshot = 6,
    VideoFrame = 7,
    RenderToTexture = 8,
    Finish = 9,
    Poly2D = 10,
    RotatedPic = 11,
    GradientPic = 12,
}

impl CommandTag {
    pub fn from_i32(tag: i32) -> Option<Self> {
        Some(match tag {
            0 => Self::EndOfList,
            1 => Self::SetColor,
            2 => Self::StretchPic,
            3 => Self::DrawSurfs,
            4 => Self::DrawBuffer,
            5 => Self::SwapBuffers,
            6 => Self::Screenshot,
            7 => Self::VideoFrame,
            8 => Self::RenderToTexture,
            9 => Self::Finish,
            10 => Self::Poly2D,
            11 => Self::RotatedPic,
            12 => Self::GradientPic,
            _ => return None,
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScreenshotFormat {
    #[default]
    Tga,
    Jpeg,
    Png,
}

impl ScreenshotFormat {
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => Self::Jpeg,
            2 => Self::Png,
            _ => Self::Tga,
        }
    }

    pub fn as_i32(self) -> i32 {
        match self {
            Self::Tga => 0,
            Self::Jpeg => 1,
            Self::Png => 2,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Tga => "tga",
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }
}

/// Everything the back end needs to draw one 3D view.
#[derive(Clone, Debug, Default)]
pub struct ViewPacket {
    pub refdef: RefDef,
    pub view_parms: ViewParms,
    /// Sorted by the front end.
    pub draw_surfs: Vec<DrawSurface>,
}

/// One decoded record. Variable-size data is borrowed from the buffer's
/// side tables.
#[derive(Clone, Debug)]
pub enum RenderCommand<'a> {
    SetColor([f32; 4]),
    StretchPic { shader: i32, pic: StretchPic },
    RotatedPic { shader: i32, pic: StretchPic },
    GradientPic { shader: i32, pic: StretchPic },
    Poly2D { shader: i32, verts: &'a [PolyVert] },
    DrawSurfs(&'a ViewPacket),
    DrawBuffer(i32),
    SwapBuffers,
    Screenshot {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        file_name: &'a str,
        format: ScreenshotFormat,
    },
    VideoFrame {
        width: i32,
        height: i32,
        motion_jpeg: bool,
    },
    RenderToTexture {
        image: usize,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
    Finish,
}
