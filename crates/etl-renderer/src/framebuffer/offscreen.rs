//! Offscreen target set
//!
//! Sizes every target the scene and the scaling passes render into. The
//! whole set is rebuilt together whenever a tracked scaling setting moves.

use crate::device::{Framebuffer, GraphicsDevice, TargetDesc};
use crate::render_config::{sample_count_flags, RenderConfig};
use crate::settings::{EffectiveScaling, HQ_INTEGER_PREPASS};

use super::weights::MAX_SUPERSAMPLE_SAMPLES;

fn scaled(size: u32, factor: f32) -> u32 {
    ((size as f32 * factor) as u32).max(1)
}

/// Target descriptions for one scaling configuration.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OffscreenLayout {
    /// Scene render size.
    pub render_size: [u32; 2],
    pub samples: u32,
    pub targets: Vec<(Framebuffer, TargetDesc)>,
}

impl OffscreenLayout {
    pub fn compute(config: &RenderConfig, scaling: &EffectiveScaling, multisample: u32) -> Self {
        let vid = [config.vid_width, config.vid_height];
        let format = config.color_format();
        let render_scale = scaling.render_scale();
        let render_size = [scaled(vid[0], render_scale), scaled(vid[1], render_scale)];
        let scale_int = scaling.scale_int.max(1) as u32;

        let color = |width: u32, height: u32| TargetDesc {
            width,
            height,
            format,
            samples: sample_count_flags(1),
            depth_stencil: false,
        };

        let mut targets = Vec::new();

        let supersample = (scaling.supersample.max(0) as usize).min(MAX_SUPERSAMPLE_SAMPLES);
        for i in 0..supersample {
            targets.push((
                Framebuffer::Supersample(i as u8),
                color(scaled(vid[0], scaling.scale), scaled(vid[1], scaling.scale)),
            ));
        }

        targets.push((Framebuffer::Scratch, color(render_size[0], render_size[1])));
        targets.push((
            Framebuffer::Multisample,
            TargetDesc {
                samples: sample_count_flags(multisample),
                depth_stencil: true,
                ..color(render_size[0], render_size[1])
            },
        ));
        targets.push((Framebuffer::Resolved, color(render_size[0], render_size[1])));
        targets.push((
            Framebuffer::Minified,
            color((render_size[0] / scale_int).max(1), (render_size[1] / scale_int).max(1)),
        ));

        let intermediate_factor = if scaling.hq & HQ_INTEGER_PREPASS != 0 {
            scale_int as f32
        } else {
            scaling.scale
        };
        targets.push((
            Framebuffer::Intermediate,
            color(scaled(vid[0], intermediate_factor), scaled(vid[1], intermediate_factor)),
        ));
        targets.push((Framebuffer::WindowCopy, color(vid[0], vid[1])));

        Self {
            render_size,
            samples: multisample,
            targets,
        }
    }

    pub fn apply(&self, device: &mut dyn GraphicsDevice) {
        for (framebuffer, desc) in &self.targets {
            device.configure_target(*framebuffer, desc);
        }
    }

    pub fn get(&self, framebuffer: Framebuffer) -> Option<&TargetDesc> {
        self.targets.iter().find(|(fb, _)| *fb == framebuffer).map(|(_, desc)| desc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceCall, RecordingDevice};
    use crate::settings::RenderSettings;
    use ash::vk;

    fn scaling(scale: f32, hq: i32, supersample: i32, simple: bool) -> EffectiveScaling {
        let mut s = RenderSettings::default();
        s.resolution_scale.value = scale;
        s.high_quality_scaling.value = hq;
        s.supersample.value = supersample;
        s.simple_supersample.value = simple as i32;
        EffectiveScaling::from_settings(&s)
    }

    #[test]
    fn test_layout_sizes_at_one_and_a_half() {
        let config = RenderConfig::new(640, 480);
        let layout = OffscreenLayout::compute(&config, &scaling(1.5, 0, 0, false), 4);

        assert_eq!(layout.render_size, [960, 720]);
        let ms = layout.get(Framebuffer::Multisample).unwrap();
        assert_eq!((ms.width, ms.height), (960, 720));
        assert_eq!(ms.samples, vk::SampleCountFlags::TYPE_4);
        assert!(ms.depth_stencil);
        let minified = layout.get(Framebuffer::Minified).unwrap();
        assert_eq!((minified.width, minified.height), (960, 720));
        let intermediate = layout.get(Framebuffer::Intermediate).unwrap();
        assert_eq!((intermediate.width, intermediate.height), (960, 720));
        let copy = layout.get(Framebuffer::WindowCopy).unwrap();
        assert_eq!((copy.width, copy.height), (640, 480));
        assert!(layout.get(Framebuffer::Supersample(0)).is_none());
    }

    #[test]
    fn test_layout_integer_prepass_and_simple_supersample() {
        let config = RenderConfig::new(640, 480);
        let layout = OffscreenLayout::compute(&config, &scaling(2.5, HQ_INTEGER_PREPASS, 0, true), 0);

        assert_eq!(layout.render_size, [3200, 2400]);
        let minified = layout.get(Framebuffer::Minified).unwrap();
        assert_eq!((minified.width, minified.height), (1600, 1200));
        let intermediate = layout.get(Framebuffer::Intermediate).unwrap();
        assert_eq!((intermediate.width, intermediate.height), (1280, 960));
        let ms = layout.get(Framebuffer::Multisample).unwrap();
        assert_eq!(ms.samples, vk::SampleCountFlags::TYPE_1);
    }

    #[test]
    fn test_layout_supersample_targets_applied() {
        let config = RenderConfig::new(320, 200);
        let layout = OffscreenLayout::compute(&config, &scaling(1.0, 0, 3, false), 0);
        let mut dev = RecordingDevice::new();
        layout.apply(&mut dev);

        let configured = dev.count(|c| matches!(c, DeviceCall::ConfigureTarget(..)));
        assert_eq!(configured, 3 + 6);
        let ss = layout.get(Framebuffer::Supersample(2)).unwrap();
        assert_eq!((ss.width, ss.height), (320, 200));
    }
}
