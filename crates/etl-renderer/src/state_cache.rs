//! Device state cache
//!
//! Mirrors the state last issued to the device so redundant calls never
//! reach it. Every state change the back end makes must go through here,
//! otherwise later diffs compare against stale values.

use ash::vk;

use etl_common::common::{com_fatal, com_warning};

use crate::device::{AlphaTest, GraphicsDevice, TexEnv};
use crate::tr_types::{CullType, ImageHandle, ImageTable};

/// Texture units the back end drives.
pub const MAX_TEXTURE_UNITS: usize = 2;

bitflags::bitflags! {
    /// Packed blend/depth/alpha-test state.
    ///
    /// The blend and alpha-test entries are multi-bit fields: test them with
    /// the `*_BITS` masks, never with `contains`.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct StateBits: u32 {
        const SRCBLEND_ZERO                = 0x0000_0001;
        const SRCBLEND_ONE                 = 0x0000_0002;
        const SRCBLEND_DST_COLOR           = 0x0000_0003;
        const SRCBLEND_ONE_MINUS_DST_COLOR = 0x0000_0004;
        const SRCBLEND_SRC_ALPHA           = 0x0000_0005;
        const SRCBLEND_ONE_MINUS_SRC_ALPHA = 0x0000_0006;
        const SRCBLEND_DST_ALPHA           = 0x0000_0007;
        const SRCBLEND_ONE_MINUS_DST_ALPHA = 0x0000_0008;
        const SRCBLEND_ALPHA_SATURATE      = 0x0000_0009;
        const SRCBLEND_BITS                = 0x0000_000f;

        const DSTBLEND_ZERO                = 0x0000_0010;
        const DSTBLEND_ONE                 = 0x0000_0020;
        const DSTBLEND_SRC_COLOR           = 0x0000_0030;
        const DSTBLEND_ONE_MINUS_SRC_COLOR = 0x0000_0040;
        const DSTBLEND_SRC_ALPHA           = 0x0000_0050;
        const DSTBLEND_ONE_MINUS_SRC_ALPHA = 0x0000_0060;
        const DSTBLEND_DST_ALPHA           = 0x0000_0070;
        const DSTBLEND_ONE_MINUS_DST_ALPHA = 0x0000_0080;
        const DSTBLEND_BITS                = 0x0000_00f0;

        const DEPTHMASK_TRUE               = 0x0000_0100;
        const POLYMODE_LINE                = 0x0000_1000;
        const DEPTHTEST_DISABLE            = 0x0001_0000;
        const DEPTHFUNC_EQUAL              = 0x0002_0000;

        const ATEST_GT_0                   = 0x1000_0000;
        const ATEST_LT_16                  = 0x2000_0000;
        const ATEST_GE_16                  = 0x3000_0000;
        const ATEST_LT_32                  = 0x4000_0000;
        const ATEST_GE_32                  = 0x5000_0000;
        const ATEST_LT_64                  = 0x6000_0000;
        const ATEST_GE_64                  = 0x7000_0000;
        const ATEST_LT_128                 = 0x8000_0000;
        const ATEST_GE_128                 = 0x9000_0000;
        const ATEST_GE_192                 = 0xa000_0000;
        const ATEST_GE_224                 = 0xb000_0000;
        const ATEST_BITS                   = 0xf000_0000;
    }
}

pub const GLS_DEFAULT: StateBits = StateBits::DEPTHMASK_TRUE;

const ATEST_SHIFT: u32 = 28;

/// Source factors indexed by the SRCBLEND field; 0 has no entry.
const SRC_BLEND_FACTORS: [Option<vk::BlendFactor>; 16] = [
    None,
    Some(vk::BlendFactor::ZERO),
    Some(vk::BlendFactor::ONE),
    Some(vk::BlendFactor::DST_COLOR),
    Some(vk::BlendFactor::ONE_MINUS_DST_COLOR),
    Some(vk::BlendFactor::SRC_ALPHA),
    Some(vk::BlendFactor::ONE_MINUS_SRC_ALPHA),
    Some(vk::BlendFactor::DST_ALPHA),
    Some(vk::BlendFactor::ONE_MINUS_DST_ALPHA),
    Some(vk::BlendFactor::SRC_ALPHA_SATURATE),
    None,
    None,
    None,
    None,
    None,
    None,
];

/// Destination factors indexed by the DSTBLEND field shifted down.
const DST_BLEND_FACTORS: [Option<vk::BlendFactor>; 16] = [
    None,
    Some(vk::BlendFactor::ZERO),
    Some(vk::BlendFactor::ONE),
    Some(vk::BlendFactor::SRC_COLOR),
    Some(vk::BlendFactor::ONE_MINUS_SRC_COLOR),
    Some(vk::BlendFactor::SRC_ALPHA),
    Some(vk::BlendFactor::ONE_MINUS_SRC_ALPHA),
    Some(vk::BlendFactor::DST_ALPHA),
    Some(vk::BlendFactor::ONE_MINUS_DST_ALPHA),
    None,
    None,
    None,
    None,
    None,
    None,
    None,
];

/// Alpha-test comparisons indexed by the ATEST field; 0 disables the test.
const ALPHA_TESTS: [Option<(vk::CompareOp, f32)>; 12] = [
    None,
    Some((vk::CompareOp::GREATER, 0.0)),
    Some((vk::CompareOp::LESS, 0.0625)),
    Some((vk::CompareOp::GREATER_OR_EQUAL, 0.0625)),
    Some((vk::CompareOp::LESS, 0.125)),
    Some((vk::CompareOp::GREATER_OR_EQUAL, 0.125)),
    Some((vk::CompareOp::LESS, 0.25)),
    Some((vk::CompareOp::GREATER_OR_EQUAL, 0.25)),
    Some((vk::CompareOp::LESS, 0.5)),
    Some((vk::CompareOp::GREATER_OR_EQUAL, 0.5)),
    Some((vk::CompareOp::GREATER_OR_EQUAL, 0.75)),
    Some((vk::CompareOp::GREATER_OR_EQUAL, 0.875)),
];

/// Blend factors for `bits`, `None` when blending is off.
pub fn blend_factors(bits: StateBits) -> Option<(vk::BlendFactor, vk::BlendFactor)> {
    let src = (bits & StateBits::SRCBLEND_BITS).bits() as usize;
    let dst = ((bits & StateBits::DSTBLEND_BITS).bits() >> 4) as usize;
    if src == 0 && dst == 0 {
        return None;
    }
    let Some(src_factor) = SRC_BLEND_FACTORS[src] else {
        com_fatal("GL_State: invalid src blend state bits");
    };
    let Some(dst_factor) = DST_BLEND_FACTORS[dst] else {
        com_fatal("GL_State: invalid dst blend state bits");
    };
    Some((src_factor, dst_factor))
}

/// Alpha test selected by `bits`, `None` when disabled.
pub fn alpha_test(bits: StateBits) -> Option<AlphaTest> {
    let index = ((bits & StateBits::ATEST_BITS).bits() >> ATEST_SHIFT) as usize;
    if index == 0 {
        return None;
    }
    match ALPHA_TESTS.get(index) {
        Some(Some((op, reference))) => Some(AlphaTest { op: *op, reference: *reference }),
        _ => com_fatal(&format!("GL_State: invalid alpha test bits {:#x}", bits.bits())),
    }
}

/// Cached device state.
#[derive(Clone, Debug, PartialEq)]
pub struct StateCache {
    /// Texture bound on each unit, `None` when unknown.
    pub current_textures: [Option<u32>; MAX_TEXTURE_UNITS],
    pub current_tmu: usize,
    pub tex_env: [Option<TexEnv>; MAX_TEXTURE_UNITS],
    /// `None` forces the next cull call through.
    pub face_culling: Option<CullType>,
    pub state_bits: StateBits,
    /// A finish was issued this frame.
    pub finish_called: bool,
}

impl Default for StateCache {
    fn default() -> Self {
        Self {
            current_textures: [None; MAX_TEXTURE_UNITS],
            current_tmu: 0,
            tex_env: [None; MAX_TEXTURE_UNITS],
            face_culling: None,
            state_bits: StateBits::DEPTHTEST_DISABLE | StateBits::DEPTHMASK_TRUE,
            finish_called: false,
        }
    }
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put the device into the state the cache starts from.
    pub fn set_default_state(&mut self, device: &mut dyn GraphicsDevice) {
        *self = Self::default();

        for unit in (0..MAX_TEXTURE_UNITS).rev() {
            device.active_texture(unit);
            device.set_tex_env(TexEnv::Modulate);
            self.tex_env[unit] = Some(TexEnv::Modulate);
        }
        self.current_tmu = 0;

        device.set_cull(Some(vk::CullModeFlags::FRONT));
        device.set_depth_func(vk::CompareOp::LESS_OR_EQUAL);
        device.set_blend(None);
        device.set_depth_mask(true);
        device.set_polygon_mode(vk::PolygonMode::FILL);
        device.set_depth_test(false);
        device.set_alpha_test(None);
        device.set_clip_plane(None);
    }

    /// Bind `image` on the current unit.
    ///
    /// A missing image warns and binds the default image. With `no_bind`
    /// every bind is redirected to the dynamic light image.
    pub fn bind(
        &mut self,
        device: &mut dyn GraphicsDevice,
        images: &mut ImageTable,
        image: Option<ImageHandle>,
        frame_count: u32,
        no_bind: bool,
    ) {
        let mut texnum = match image.and_then(|h| images.get(h)) {
            Some(img) => img.texnum,
            None => {
                com_warning("GL_Bind: NULL image\n");
                images.get(images.default_image).map_or(0, |img| img.texnum)
            }
        };

        if no_bind {
            if let Some(dlight) = images.get(images.dlight_image) {
                texnum = dlight.texnum;
            }
        }

        if self.current_textures[self.current_tmu] != Some(texnum) {
            if let Some(img) = image.and_then(|h| images.get_mut(h)) {
                img.frame_used = frame_count;
            }
            self.current_textures[self.current_tmu] = Some(texnum);
            device.bind_texture(texnum);
        }
    }

    /// Bind a raw texture name that has no image record.
    pub fn bind_texnum(&mut self, device: &mut dyn GraphicsDevice, texnum: u32) {
        if self.current_textures[self.current_tmu] != Some(texnum) {
            self.current_textures[self.current_tmu] = Some(texnum);
            device.bind_texture(texnum);
        }
    }

    pub fn select_texture(&mut self, device: &mut dyn GraphicsDevice, unit: usize) {
        if self.current_tmu == unit {
            return;
        }
        if unit >= MAX_TEXTURE_UNITS {
            com_fatal(&format!("GL_SelectTexture: unit = {}", unit));
        }
        device.active_texture(unit);
        self.current_tmu = unit;
    }

    /// Set face culling. Mirrored views swap front and back.
    pub fn cull(&mut self, device: &mut dyn GraphicsDevice, cull_type: CullType, is_mirror: bool) {
        if self.face_culling == Some(cull_type) {
            return;
        }
        self.face_culling = Some(cull_type);

        if cull_type == CullType::TwoSided {
            device.set_cull(None);
            return;
        }

        let mut cull_front = cull_type == CullType::FrontSided;
        if is_mirror {
            cull_front = !cull_front;
        }
        device.set_cull(Some(if cull_front {
            vk::CullModeFlags::FRONT
        } else {
            vk::CullModeFlags::BACK
        }));
    }

    /// Forget the cull mode so the next `cull` call is issued.
    pub fn invalidate_cull(&mut self) {
        self.face_culling = None;
    }

    pub fn tex_env(&mut self, device: &mut dyn GraphicsDevice, env: TexEnv) {
        if self.tex_env[self.current_tmu] == Some(env) {
            return;
        }
        self.tex_env[self.current_tmu] = Some(env);
        device.set_tex_env(env);
    }

    /// Apply `bits`, issuing only the sub-states that differ from the cache.
    pub fn set_state(&mut self, device: &mut dyn GraphicsDevice, bits: StateBits) {
        let diff = bits ^ self.state_bits;
        if diff.is_empty() {
            return;
        }

        if diff.intersects(StateBits::DEPTHFUNC_EQUAL) {
            device.set_depth_func(if bits.intersects(StateBits::DEPTHFUNC_EQUAL) {
                vk::CompareOp::EQUAL
            } else {
                vk::CompareOp::LESS_OR_EQUAL
            });
        }

        if diff.intersects(StateBits::SRCBLEND_BITS | StateBits::DSTBLEND_BITS) {
            device.set_blend(blend_factors(bits));
        }

        if diff.intersects(StateBits::DEPTHMASK_TRUE) {
            device.set_depth_mask(bits.intersects(StateBits::DEPTHMASK_TRUE));
        }

        if diff.intersects(StateBits::POLYMODE_LINE) {
            device.set_polygon_mode(if bits.intersects(StateBits::POLYMODE_LINE) {
                vk::PolygonMode::LINE
            } else {
                vk::PolygonMode::FILL
            });
        }

        if diff.intersects(StateBits::DEPTHTEST_DISABLE) {
            device.set_depth_test(!bits.intersects(StateBits::DEPTHTEST_DISABLE));
        }

        if diff.intersects(StateBits::ATEST_BITS) {
            device.set_alpha_test(alpha_test(bits));
        }

        self.state_bits = bits;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceCall, RecordingDevice};

    fn setup() -> (StateCache, RecordingDevice, ImageTable) {
        let mut device = RecordingDevice::new();
        let mut cache = StateCache::new();
        cache.set_default_state(&mut device);
        device.take_calls();
        (cache, device, ImageTable::new())
    }

    // ============================================================
    // Idempotence
    // ============================================================

    #[test]
    fn test_set_state_twice_issues_once() {
        let (mut cache, mut device, _) = setup();
        let bits = StateBits::SRCBLEND_SRC_ALPHA | StateBits::DSTBLEND_ONE_MINUS_SRC_ALPHA;
        cache.set_state(&mut device, bits);
        let first = device.take_calls();
        cache.set_state(&mut device, bits);
        assert!(device.calls.is_empty());
        assert!(first.contains(&DeviceCall::Blend(Some((
            vk::BlendFactor::SRC_ALPHA,
            vk::BlendFactor::ONE_MINUS_SRC_ALPHA
        )))));
    }

    #[test]
    fn test_bind_twice_issues_once() {
        let (mut cache, mut device, mut images) = setup();
        let white = images.white_image;
        cache.bind(&mut device, &mut images, Some(white), 7, false);
        cache.bind(&mut device, &mut images, Some(white), 7, false);
        assert_eq!(device.count(|c| matches!(c, DeviceCall::BindTexture(_))), 1);
        assert_eq!(images.get(white).unwrap().frame_used, 7);
    }

    #[test]
    fn test_cull_and_tex_env_idempotent() {
        let (mut cache, mut device, _) = setup();
        cache.cull(&mut device, CullType::BackSided, false);
        cache.cull(&mut device, CullType::BackSided, false);
        cache.tex_env(&mut device, TexEnv::Modulate);
        assert_eq!(device.calls, vec![DeviceCall::Cull(Some(vk::CullModeFlags::BACK))]);
    }

    #[test]
    fn test_select_texture_idempotent() {
        let (mut cache, mut device, _) = setup();
        cache.select_texture(&mut device, 1);
        cache.select_texture(&mut device, 1);
        cache.select_texture(&mut device, 0);
        assert_eq!(device.calls, vec![DeviceCall::ActiveTexture(1), DeviceCall::ActiveTexture(0)]);
    }

    // ============================================================
    // Diffing
    // ============================================================

    #[test]
    fn test_set_state_only_changed_substates() {
        let (mut cache, mut device, _) = setup();
        // default state: depth test disabled, depth mask on
        cache.set_state(&mut device, StateBits::DEPTHMASK_TRUE);
        assert_eq!(device.take_calls(), vec![DeviceCall::DepthTest(true)]);

        cache.set_state(&mut device, StateBits::DEPTHMASK_TRUE | StateBits::DEPTHFUNC_EQUAL);
        assert_eq!(device.take_calls(), vec![DeviceCall::DepthFunc(vk::CompareOp::EQUAL)]);

        cache.set_state(&mut device, StateBits::ATEST_GE_128);
        assert_eq!(
            device.take_calls(),
            vec![
                DeviceCall::DepthFunc(vk::CompareOp::LESS_OR_EQUAL),
                DeviceCall::DepthMask(false),
                DeviceCall::AlphaTest(Some(AlphaTest {
                    op: vk::CompareOp::GREATER_OR_EQUAL,
                    reference: 0.5
                })),
            ]
        );
    }

    #[test]
    fn test_blend_disable() {
        let (mut cache, mut device, _) = setup();
        let blended = GLS_DEFAULT | StateBits::SRCBLEND_ONE | StateBits::DSTBLEND_ONE;
        cache.set_state(&mut device, blended);
        device.take_calls();
        cache.set_state(&mut device, GLS_DEFAULT);
        assert_eq!(device.calls, vec![DeviceCall::Blend(None)]);
    }

    #[test]
    fn test_alpha_test_table() {
        assert_eq!(alpha_test(StateBits::empty()), None);
        let gt0 = alpha_test(StateBits::ATEST_GT_0).unwrap();
        assert_eq!(gt0.op, vk::CompareOp::GREATER);
        assert_eq!(gt0.reference, 0.0);
        let ge224 = alpha_test(StateBits::ATEST_GE_224).unwrap();
        assert_eq!(ge224.reference, 0.875);
    }

    #[test]
    fn test_cull_mirror_swaps_face() {
        let (mut cache, mut device, _) = setup();
        cache.cull(&mut device, CullType::FrontSided, true);
        assert_eq!(device.take_calls(), vec![DeviceCall::Cull(Some(vk::CullModeFlags::BACK))]);
        cache.invalidate_cull();
        cache.cull(&mut device, CullType::TwoSided, true);
        assert_eq!(device.take_calls(), vec![DeviceCall::Cull(None)]);
    }

    #[test]
    fn test_no_bind_redirects_to_dlight_image() {
        let (mut cache, mut device, mut images) = setup();
        let dlight = images.get(images.dlight_image).unwrap().texnum;
        let white = images.white_image;
        cache.bind(&mut device, &mut images, Some(white), 1, true);
        assert_eq!(device.calls, vec![DeviceCall::BindTexture(dlight)]);
    }

    #[test]
    fn test_missing_image_binds_default() {
        let (mut cache, mut device, mut images) = setup();
        let default = images.get(images.default_image).unwrap().texnum;
        cache.bind(&mut device, &mut images, None, 1, false);
        assert_eq!(device.calls, vec![DeviceCall::BindTexture(default)]);
    }

    // ============================================================
    // Fatal cases
    // ============================================================

    #[test]
    #[should_panic(expected = "invalid alpha test bits")]
    fn test_invalid_alpha_test_is_fatal() {
        let (mut cache, mut device, _) = setup();
        cache.set_state(&mut device, StateBits::from_bits_retain(0xc000_0000));
    }

    #[test]
    #[should_panic(expected = "invalid src blend")]
    fn test_dst_without_src_is_fatal() {
        blend_factors(StateBits::DSTBLEND_ONE);
    }

    #[test]
    #[should_panic(expected = "invalid dst blend")]
    fn test_unknown_dst_field_is_fatal() {
        blend_factors(StateBits::SRCBLEND_ONE | StateBits::from_bits_retain(0x90));
    }

    #[test]
    #[should_panic(expected = "GL_SelectTexture: unit = 2")]
    fn test_third_texture_unit_is_fatal() {
        let (mut cache, mut device, _) = setup();
        cache.select_texture(&mut device, 2);
    }
}
