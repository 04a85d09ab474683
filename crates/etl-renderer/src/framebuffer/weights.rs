//! Filter kernels and precomputed weight tables
//!
//! Resolution scaling with a custom kernel samples the render-resolution
//! image around each output pixel. For a non-integer scale the sample
//! positions relative to the output pixel repeat every few pixels, so the
//! weights for each repeating sub-pixel pattern (and each supersample
//! jitter) are computed once on the CPU and handed to the device.

use std::f64::consts::PI;

use rayon::prelude::*;

/// Sub-pixel patterns per axis kept in a scaling weight table.
pub const MAX_SCALING_SAMPLE_PATTERNS: usize = 4;
/// Supersample render passes per frame.
pub const MAX_SUPERSAMPLE_SAMPLES: usize = 16;
/// Multiframe slots with their own jitter set.
pub const MAX_SUPERSAMPLE_FRAMES: usize = 8;

/// Element `index` of the Halton low-discrepancy sequence in `base`.
pub fn halton(mut index: u32, base: u32) -> f32 {
    let mut f = 1.0f32;
    let mut r = 0.0f32;
    let base_f = base as f32;
    while index > 0 {
        f /= base_f;
        r += f * (index % base) as f32;
        index /= base;
    }
    r
}

/// Cubic convolution weight at distance `x` (in output pixels).
///
/// Mode 5 uses the Mitchell-Netravali (1/3, 1/3) coefficients, mode 4 the
/// sharper (0, 0.75) pair and anything else (0.1, 0.5).
pub fn bicubic_weight(x: f32, mode: i32) -> f32 {
    let (b, c) = match mode {
        5 => (1.0 / 3.0, 1.0 / 3.0),
        4 => (0.0, 0.75),
        _ => (0.1, 0.5),
    };

    if x < 1.0 {
        (x * x * ((12.0 - 9.0 * b - 6.0 * c) * x + (-18.0 + 12.0 * b + 6.0 * c)) + (6.0 - 2.0 * b)) / 6.0
    } else if x < 2.0 {
        (x * x * ((-b - 6.0 * c) * x + (6.0 * b + 30.0 * c)) + (-12.0 * b - 48.0 * c) * x + (8.0 * b + 24.0 * c))
            / 6.0
    } else {
        0.0
    }
}

/// Lanczos window of `radius` lobes at `dist`.
pub fn lanczos_weight(dist: f64, radius: f64) -> f32 {
    if dist >= radius {
        return 0.0;
    }
    if dist == 0.0 {
        return 1.0;
    }
    let sample = (dist * PI).max(1e-5);
    (sample.sin() / sample * (sample / radius).sin() / (sample / radius)) as f32
}

/// Kernel value for the resolution-scale filter `mode`.
fn kernel_weight(dist: f64, radius: f64, mode: i32) -> f32 {
    if dist >= radius {
        0.0
    } else if dist == 0.0 {
        1.0
    } else if mode == 1 {
        lanczos_weight(dist, radius)
    } else {
        bicubic_weight(dist as f32, mode)
    }
}

/// Number of repeating sub-pixel patterns for `scale`.
pub fn num_scaling_patterns(scale: f32) -> usize {
    let frac = scale - scale.trunc();
    if frac > 0.0 {
        ((1.0 / frac) as usize).clamp(1, MAX_SCALING_SAMPLE_PATTERNS)
    } else {
        1
    }
}

/// Weights for one (pattern x, pattern y) cell.
struct PatternTable {
    first_pos: Vec<[f32; 2]>,
    counters: Vec<[u32; 2]>,
    weights: Vec<f32>,
}

/// Inputs shared by every pattern of a table.
#[derive(Clone, Copy)]
struct Sampling {
    radius: f32,
    mode: i32,
    /// Input texel size in texture coordinates.
    step: [f32; 2],
    /// Output pixel size in texture coordinates.
    outpix: [f32; 2],
}

fn compute_pattern(i: usize, j: usize, jitters: &[[f32; 2]], s: Sampling) -> PatternTable {
    let cell = [i as f32, j as f32];
    let org = [
        (0.5 - s.radius + cell[0]) * s.outpix[0],
        (0.5 - s.radius + cell[1]) * s.outpix[1],
    ];
    let max_pt = [
        (0.5 + s.radius + cell[0]) * s.outpix[0],
        (0.5 + s.radius + cell[1]) * s.outpix[1],
    ];

    let mut table = PatternTable {
        first_pos: Vec::with_capacity(jitters.len()),
        counters: Vec::with_capacity(jitters.len()),
        weights: Vec::new(),
    };

    for jitter in jitters {
        // first texel center strictly past the kernel's left/top edge
        let mut fpos = [org[0] - jitter[0] * s.step[0], org[1] - jitter[1] * s.step[1]];
        for a in 0..2 {
            let texels = fpos[a] / s.step[a];
            fpos[a] -= (texels - texels.floor()) * s.step[a];
            fpos[a] += 0.5 * s.step[a];
            if fpos[a] <= org[a] {
                fpos[a] += s.step[a];
            }
        }

        table.first_pos.push([
            fpos[0] - (cell[0] + 0.5) * s.outpix[0],
            fpos[1] - (cell[1] + 0.5) * s.outpix[1],
        ]);

        let mut counter = [0u32; 2];
        let mut cy = fpos[1];
        while cy < max_pt[1] {
            let dist_y = cy as f64 / s.outpix[1] as f64 - cell[1] as f64 - 0.5;

            counter[0] = 0;
            let mut cx = fpos[0];
            while cx < max_pt[0] {
                let dist_x = cx as f64 / s.outpix[0] as f64 - cell[0] as f64 - 0.5;
                let dist = (dist_x * dist_x + dist_y * dist_y).sqrt();
                table.weights.push(kernel_weight(dist, s.radius as f64, s.mode));
                cx += s.step[0];
                counter[0] += 1;
            }

            cy += s.step[1];
            counter[1] += 1;
        }

        table.counters.push(counter);
    }

    table
}

/// Precomputed resolution-scale weights.
///
/// Patterns are stored row-major by (x pattern, y pattern); within each
/// pattern every jitter has its own first sample position, sample counts
/// and a run of weights starting at the pattern's index.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScalingWeights {
    pub num_patterns: usize,
    pub num_jitters: usize,
    /// Flat weight buffer handed to the device.
    pub weights: Vec<f32>,
    /// Offset of the first sample from the output pixel center, per
    /// pattern and jitter.
    pub first_pos: Vec<[f32; 2]>,
    /// Samples per axis, per pattern and jitter.
    pub counters: Vec<[u32; 2]>,
    /// Start of each pattern's weights in `weights`.
    pub indexes: Vec<usize>,
}

impl ScalingWeights {
    /// Compute the table for an `input` sized render scaled to `output`.
    ///
    /// Mode 1 is the windowed sinc with `sample_radius`; every other mode
    /// is a bicubic with radius 2.
    pub fn compute(
        mode: i32,
        sample_radius: f32,
        num_patterns: usize,
        jitters: &[[f32; 2]],
        input: [u32; 2],
        output: [u32; 2],
    ) -> Self {
        let num_patterns = num_patterns.clamp(1, MAX_SCALING_SAMPLE_PATTERNS);
        let sampling = Sampling {
            radius: if mode == 1 { sample_radius } else { 2.0 },
            mode,
            step: [1.0 / input[0].max(1) as f32, 1.0 / input[1].max(1) as f32],
            outpix: [1.0 / output[0].max(1) as f32, 1.0 / output[1].max(1) as f32],
        };

        let tables: Vec<PatternTable> = (0..num_patterns * num_patterns)
            .into_par_iter()
            .map(|p| compute_pattern(p / num_patterns, p % num_patterns, jitters, sampling))
            .collect();

        let mut out = Self {
            num_patterns,
            num_jitters: jitters.len(),
            ..Self::default()
        };
        for table in tables {
            out.indexes.push(out.weights.len());
            out.first_pos.extend(table.first_pos);
            out.counters.extend(table.counters);
            out.weights.extend(table.weights);
        }
        out
    }

    fn slot(&self, i: usize, j: usize, jitter: usize) -> usize {
        (i * self.num_patterns + j) * self.num_jitters + jitter
    }

    pub fn pattern_first_pos(&self, i: usize, j: usize, jitter: usize) -> Option<[f32; 2]> {
        self.first_pos.get(self.slot(i, j, jitter)).copied()
    }

    pub fn pattern_counter(&self, i: usize, j: usize, jitter: usize) -> Option<[u32; 2]> {
        self.counters.get(self.slot(i, j, jitter)).copied()
    }
}

/// Supersample resolve weights: for each jitter, a windowed-sinc weight
/// for every integer-offset neighbour within `radius`.
pub fn supersample_weights(jitters: &[[f32; 2]], radius: f32) -> Vec<f32> {
    let radius = radius as f64;
    let mut weights = Vec::new();

    for jitter in jitters {
        let mut start = [-radius - jitter[0] as f64, -radius - jitter[1] as f64];
        for s in &mut start {
            if *s <= -radius {
                *s += 1.0;
            }
        }

        let mut cy = start[1];
        while cy < radius {
            let mut cx = start[0];
            while cx < radius {
                let dist = (cx * cx + cy * cy).sqrt();
                weights.push(lanczos_weight(dist, radius));
                cx += 1.0;
            }
            cy += 1.0;
        }
    }

    weights
}
