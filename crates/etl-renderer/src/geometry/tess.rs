//! Surface batch accumulator.

use etl_common::common::com_fatal;

use crate::tr_types::ShaderRef;

/// Receives a finished batch.
pub trait BatchSink {
    fn flush(&mut self, tess: &Tessellator);
}

/// Geometry for one shader/fog run.
pub struct Tessellator {
    pub shader: Option<ShaderRef>,
    pub fog_num: usize,
    pub dlighted: bool,
    pub shader_time: f64,
    pub xyz: Vec<[f32; 4]>,
    pub tex_coords: Vec<[f32; 2]>,
    pub colors: Vec<[u8; 4]>,
    pub indexes: Vec<u32>,
    max_vertexes: usize,
    max_indexes: usize,
}

impl Tessellator {
    pub fn new(max_vertexes: usize, max_indexes: usize) -> Self {
        Self {
            shader: None,
            fog_num: 0,
            dlighted: false,
            shader_time: 0.0,
            xyz: Vec::with_capacity(max_vertexes),
            tex_coords: Vec::with_capacity(max_vertexes),
            colors: Vec::with_capacity(max_vertexes),
            indexes: Vec::with_capacity(max_indexes),
            max_vertexes,
            max_indexes,
        }
    }

    pub fn max_vertexes(&self) -> usize {
        self.max_vertexes
    }

    pub fn max_indexes(&self) -> usize {
        self.max_indexes
    }

    pub fn num_vertexes(&self) -> usize {
        self.xyz.len()
    }

    pub fn num_indexes(&self) -> usize {
        self.indexes.len()
    }

    /// Open a batch for `shader`.
    pub fn begin(&mut self, shader: ShaderRef, fog_num: usize, dlighted: bool, shader_time: f64) {
        self.shader = Some(shader);
        self.fog_num = fog_num;
        self.dlighted = dlighted;
        self.shader_time = shader_time;
        self.clear_geometry();
    }

    /// Flush accumulated geometry. The shader stays current so a following
    /// surface with the same shader can keep appending.
    pub fn end(&mut self, sink: &mut dyn BatchSink) {
        if self.indexes.is_empty() {
            return;
        }
        if self.shader.is_some() {
            sink.flush(self);
        }
        self.clear_geometry();
    }

    /// Make room for `verts` vertexes and `indexes` indexes, flushing and
    /// reopening the same batch when they would not fit.
    pub fn check_overflow(&mut self, verts: usize, indexes: usize, sink: &mut dyn BatchSink) {
        if self.xyz.len() + verts < self.max_vertexes && self.indexes.len() + indexes < self.max_indexes {
            return;
        }

        self.end(sink);

        if verts >= self.max_vertexes {
            com_fatal(&format!("RB_CheckOverflow: verts > MAX ({} > {})", verts, self.max_vertexes));
        }
        if indexes >= self.max_indexes {
            com_fatal(&format!("RB_CheckOverflow: indices > MAX ({} > {})", indexes, self.max_indexes));
        }

        self.clear_geometry();
    }

    pub fn push_vertex(&mut self, xyz: [f32; 3], st: [f32; 2], color: [u8; 4]) {
        self.xyz.push([xyz[0], xyz[1], xyz[2], 1.0]);
        self.tex_coords.push(st);
        self.colors.push(color);
    }

    /// Append indexes relative to `base`.
    pub fn push_indexes(&mut self, base: usize, indexes: &[u32]) {
        let base = base as u32;
        self.indexes.extend(indexes.iter().map(|&i| base + i));
    }

    fn clear_geometry(&mut self) {
        self.xyz.clear();
        self.tex_coords.clear();
        self.colors.clear();
        self.indexes.clear();
    }
}
