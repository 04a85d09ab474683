#![allow(clippy::too_many_arguments, clippy::float_cmp, clippy::needless_range_loop)]
// Render back end: executes the front end's command stream

// Shared types
pub mod error;
pub mod tr_local;
pub mod tr_types;
pub mod render_config;
pub mod settings;

// Device seam
pub mod device;
pub mod state_cache;

// Drawing
pub mod sort_key;
pub mod geometry;
pub mod view;
pub mod effects;
pub mod draw_surfs;
pub mod framebuffer;

// Command execution
pub mod commands;
pub mod capture;
pub mod backend;

pub use backend::Backend;
pub use commands::{CommandBuffer, CommandBufferWriter, FrameQueue, FrameSender, RenderCommand};
pub use device::{GraphicsDevice, RecordingDevice};
pub use error::{BackendError, BackendResult};
pub use render_config::RenderConfig;
