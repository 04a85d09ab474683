//! Front end to back end hand-off
//!
//! Finished command buffers cross to the render thread over a bounded
//! channel. A buffer is immutable once submitted; with the default
//! capacity of one the front end can build frame N+1 while the back end
//! draws frame N, and blocks if it gets further ahead.

use crossbeam::channel::{bounded, Receiver, Sender};
use etl_common::common::com_fatal;

use super::wire::CommandBuffer;
use crate::backend::Backend;
use crate::device::GraphicsDevice;

/// Frames that may wait for the back end.
pub const DEFAULT_FRAME_QUEUE_DEPTH: usize = 1;

pub struct FrameQueue {
    sender: Sender<CommandBuffer>,
    receiver: Receiver<CommandBuffer>,
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_QUEUE_DEPTH)
    }
}

impl FrameQueue {
    pub fn new(depth: usize) -> Self {
        let (sender, receiver) = bounded(depth.max(1));
        Self { sender, receiver }
    }

    /// Handle for the front end thread.
    pub fn sender(&self) -> FrameSender {
        FrameSender { sender: self.sender.clone() }
    }

    pub fn receiver(&self) -> FrameReceiver {
        FrameReceiver { receiver: self.receiver.clone() }
    }

    /// Execute every submitted frame until all senders are dropped.
    ///
    /// A malformed buffer means the producer and consumer disagree on the
    /// protocol, which is fatal.
    pub fn run_backend<D: GraphicsDevice>(self, backend: &mut Backend<D>) {
        let receiver = self.receiver();
        drop(self);

        while let Some(buffer) = receiver.recv() {
            if let Err(err) = backend.execute_render_commands(&buffer) {
                com_fatal(&format!("RB_ExecuteRenderCommands: {}", err));
            }
        }
    }
}

#[derive(Clone)]
pub struct FrameSender {
    sender: Sender<CommandBuffer>,
}

impl FrameSender {
    /// Hand a finished frame over, blocking while the queue is full.
    /// Returns `false` once the back end has gone away.
    pub fn submit(&self, buffer: CommandBuffer) -> bool {
        self.sender.send(buffer).is_ok()
    }
}

#[derive(Clone)]
pub struct FrameReceiver {
    receiver: Receiver<CommandBuffer>,
}

impl FrameReceiver {
    /// Next frame, blocking. `None` once every sender is gone.
    pub fn recv(&self) -> Option<CommandBuffer> {
        self.receiver.recv().ok()
    }

    pub fn try_recv(&self) -> Option<CommandBuffer> {
        self.receiver.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    use etl_common::cvar::CvarContext;

    use crate::commands::CommandBufferWriter;
    use crate::device::{DeviceCall, RecordingDevice};
    use crate::render_config::RenderConfig;

    fn swap_frame() -> CommandBuffer {
        let mut w = CommandBufferWriter::new();
        w.swap_buffers();
        w.end_of_list()
    }

    #[test]
    fn test_frames_run_in_order_on_render_thread() {
        let queue = FrameQueue::default();
        let sender = queue.sender();

        let render = thread::spawn(move || {
            let mut backend = Backend::new(RecordingDevice::new(), RenderConfig::default(), CvarContext::shared());
            queue.run_backend(&mut backend);
            backend.device.count(|c| matches!(c, DeviceCall::Swap))
        });

        for _ in 0..5 {
            assert!(sender.submit(swap_frame()));
        }
        drop(sender);

        assert_eq!(render.join().unwrap(), 5);
    }

    #[test]
    fn test_malformed_frame_is_fatal() {
        let queue = FrameQueue::default();
        let sender = queue.sender();

        let render = thread::spawn(move || {
            let mut backend = Backend::new(RecordingDevice::new(), RenderConfig::default(), CvarContext::shared());
            queue.run_backend(&mut backend);
        });

        let mut bad = CommandBuffer::default();
        bad.bytes.extend_from_slice(&77i32.to_ne_bytes());
        sender.submit(bad);
        drop(sender);

        assert!(render.join().is_err());
    }

    #[test]
    fn test_submit_after_backend_gone() {
        let queue = FrameQueue::new(2);
        let sender = queue.sender();
        drop(queue);
        assert!(!sender.submit(swap_frame()));
    }
}
