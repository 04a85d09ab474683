//! Shader stage iteration: turns a finished batch into device draws.

use crate::device::{DrawBatch, GraphicsDevice};
use crate::geometry::tess::{BatchSink, Tessellator};
use crate::state_cache::StateCache;
use crate::tr_local::PerfCounters;
use crate::tr_types::ImageTable;

/// Draws every stage of the batch's shader with the stage's texture and
/// state, one indexed submission per stage.
pub struct StageIterator<'a> {
    pub device: &'a mut dyn GraphicsDevice,
    pub state: &'a mut StateCache,
    pub images: &'a mut ImageTable,
    pub pc: &'a mut PerfCounters,
    pub frame_count: u32,
    pub no_bind: bool,
    pub is_mirror: bool,
}

impl BatchSink for StageIterator<'_> {
    fn flush(&mut self, tess: &Tessellator) {
        let Some(shader) = tess.shader.as_ref() else {
            return;
        };

        self.pc.c_shaders += 1;
        self.pc.c_vertexes += tess.num_vertexes();
        self.pc.c_indexes += tess.num_indexes();

        self.state.cull(self.device, shader.cull, self.is_mirror);

        let batch = DrawBatch {
            xyz: &tess.xyz,
            tex_coords: &tess.tex_coords,
            colors: &tess.colors,
            indexes: &tess.indexes,
        };

        for stage in &shader.stages {
            self.state.select_texture(self.device, 0);
            self.state.bind(self.device, self.images, stage.image, self.frame_count, self.no_bind);
            self.state.tex_env(self.device, stage.tex_env);
            self.state.set_state(self.device, stage.state_bits);
            self.device.draw_indexed(&batch);
            self.pc.c_batches += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceCall, RecordingDevice, TexEnv};
    use crate::state_cache::StateBits;
    use crate::tr_types::{CullType, Shader, ShaderStage, ShaderTable};

    #[test]
    fn test_one_draw_per_stage() {
        let mut images = ImageTable::new();
        let mut shaders = ShaderTable::new(images.default_image);
        let white = images.white_image;
        let shader = shaders.register(Shader {
            name: "lightmapped".to_string(),
            index: 0,
            sorted_index: 0,
            cull: CullType::TwoSided,
            entity_mergable: false,
            is_sky: false,
            time_offset: 0.0,
            stages: vec![
                ShaderStage { image: Some(white), state_bits: StateBits::DEPTHMASK_TRUE, tex_env: TexEnv::Modulate },
                ShaderStage {
                    image: Some(images.default_image),
                    state_bits: StateBits::SRCBLEND_DST_COLOR | StateBits::DSTBLEND_ZERO,
                    tex_env: TexEnv::Modulate,
                },
            ],
        });

        let mut tess = Tessellator::new(100, 100);
        tess.begin(shader, 0, false, 0.0);
        for _ in 0..3 {
            tess.push_vertex([0.0; 3], [0.0; 2], [255; 4]);
        }
        tess.push_indexes(0, &[0, 1, 2]);

        let mut device = RecordingDevice::new();
        let mut state = StateCache::new();
        let mut pc = PerfCounters::default();
        {
            let mut sink = StageIterator {
                device: &mut device,
                state: &mut state,
                images: &mut images,
                pc: &mut pc,
                frame_count: 1,
                no_bind: false,
                is_mirror: false,
            };
            tess.end(&mut sink);
        }

        assert_eq!(device.draws(), 2);
        assert_eq!(device.calls[0], DeviceCall::Cull(None));
        assert_eq!(pc.c_shaders, 1);
        assert_eq!(pc.c_batches, 2);
        assert_eq!(pc.c_indexes, 3);
        assert_eq!(tess.num_indexes(), 0);
    }
}
