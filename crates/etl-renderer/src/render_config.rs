//! Static device configuration.
//!
//! Facts about the window and device that only change on a video restart:
//! presentation size, multisample limits, sRGB availability and the batch
//! capacity the tessellator is built with.

use ash::vk;

/// Default tessellator vertex capacity.
pub const SHADER_MAX_VERTEXES: usize = 4000;
/// Default tessellator index capacity.
pub const SHADER_MAX_INDEXES: usize = 6 * SHADER_MAX_VERTEXES;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderConfig {
    /// Presentation width in pixels
    pub vid_width: u32,
    /// Presentation height in pixels
    pub vid_height: u32,
    /// Largest multisample count offscreen targets support (0 = none)
    pub max_samples: u32,
    /// Samples of the window surface itself; offscreen multisampling is
    /// skipped when the window is already multisampled
    pub window_samples: u32,
    /// sRGB color targets are available
    pub framebuffer_srgb: bool,
    /// Non-power-of-two textures are supported
    pub texture_npot: bool,
    pub max_vertexes: usize,
    pub max_indexes: usize,
    /// Overbright compensation applied to clear colors
    pub identity_light: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            vid_width: 640,
            vid_height: 480,
            max_samples: 0,
            window_samples: 0,
            framebuffer_srgb: false,
            texture_npot: true,
            max_vertexes: SHADER_MAX_VERTEXES,
            max_indexes: SHADER_MAX_INDEXES,
            identity_light: 1.0,
        }
    }
}

impl RenderConfig {
    pub fn new(vid_width: u32, vid_height: u32) -> Self {
        Self {
            vid_width,
            vid_height,
            ..Self::default()
        }
    }

    /// Offscreen multisample count for the given `r_fboMultisample` value.
    ///
    /// `-1` asks for the device maximum. Returns 0 when the window surface
    /// is already multisampled or the device has no multisample support.
    pub fn select_multisample(&self, requested: i32) -> u32 {
        if self.window_samples != 0 || self.max_samples == 0 {
            return 0;
        }
        if requested == -1 {
            self.max_samples
        } else {
            (requested.max(0) as u32).min(self.max_samples)
        }
    }

    /// Color format for offscreen targets.
    pub fn color_format(&self) -> vk::Format {
        if self.framebuffer_srgb {
            vk::Format::R8G8B8_SRGB
        } else {
            vk::Format::R8G8B8_UNORM
        }
    }
}

/// Map a sample count to the flag describing it. Counts that are not a
/// power of two round down.
pub fn sample_count_flags(samples: u32) -> vk::SampleCountFlags {
    match samples {
        0 | 1 => vk::SampleCountFlags::TYPE_1,
        2..=3 => vk::SampleCountFlags::TYPE_2,
        4..=7 => vk::SampleCountFlags::TYPE_4,
        8..=15 => vk::SampleCountFlags::TYPE_8,
        16..=31 => vk::SampleCountFlags::TYPE_16,
        32..=63 => vk::SampleCountFlags::TYPE_32,
        _ => vk::SampleCountFlags::TYPE_64,
    }
}

/// Convert sample count flags to integer for display.
pub fn sample_count_as_int(flags: vk::SampleCountFlags) -> u32 {
    match flags {
        vk::SampleCountFlags::TYPE_1 => 1,
        vk::SampleCountFlags::TYPE_2 => 2,
        vk::SampleCountFlags::TYPE_4 => 4,
        vk::SampleCountFlags::TYPE_8 => 8,
        vk::SampleCountFlags::TYPE_16 => 16,
        vk::SampleCountFlags::TYPE_32 => 32,
        vk::SampleCountFlags::TYPE_64 => 64,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============================================================
    // RenderConfig::default
    // ============================================================

    #[test]
    fn test_render_config_default() {
        let config = RenderConfig::default();
        assert_eq!(config.max_vertexes, 4000);
        assert_eq!(config.max_indexes, 24000);
        assert_eq!(config.identity_light, 1.0);
        assert_eq!(config.color_format(), vk::Format::R8G8B8_UNORM);
    }

    #[test]
    fn test_render_config_srgb_format() {
        let config = RenderConfig { framebuffer_srgb: true, ..RenderConfig::default() };
        assert_eq!(config.color_format(), vk::Format::R8G8B8_SRGB);
    }

    // ============================================================
    // select_multisample
    // ============================================================

    #[test]
    fn test_multisample_disabled_without_device_support() {
        let config = RenderConfig::new(800, 600);
        assert_eq!(config.select_multisample(4), 0);
        assert_eq!(config.select_multisample(-1), 0);
    }

    #[test]
    fn test_multisample_skipped_for_multisampled_window() {
        let config = RenderConfig { max_samples: 8, window_samples: 4, ..RenderConfig::default() };
        assert_eq!(config.select_multisample(4), 0);
    }

    #[test]
    fn test_multisample_clamped_to_max() {
        let config = RenderConfig { max_samples: 8, ..RenderConfig::default() };
        assert_eq!(config.select_multisample(4), 4);
        assert_eq!(config.select_multisample(16), 8);
        assert_eq!(config.select_multisample(-1), 8);
        assert_eq!(config.select_multisample(0), 0);
    }

    // ============================================================
    // Sample count flags
    // ============================================================

    #[test]
    fn test_sample_count_flags() {
        assert_eq!(sample_count_flags(0), vk::SampleCountFlags::TYPE_1);
        assert_eq!(sample_count_flags(4), vk::SampleCountFlags::TYPE_4);
        assert_eq!(sample_count_flags(6), vk::SampleCountFlags::TYPE_4);
        assert_eq!(sample_count_as_int(sample_count_flags(8)), 8);
    }
}
