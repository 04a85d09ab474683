// Copyright (C) 1997-2001 Id Software, Inc.
// GPL-2.0-or-later
//
// tr_types.rs
// Resolved shaders and image records shared with the loaders

use std::sync::Arc;

use etl_common::common::com_warning;

use crate::device::TexEnv;
use crate::state_cache::StateBits;

/// Cinematic scratch images, one per video client.
pub const NUM_SCRATCH_IMAGES: usize = 16;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CullType {
    #[default]
    FrontSided,
    BackSided,
    TwoSided,
}

// ============================================================
// Images
// ============================================================

/// Index into the `ImageTable`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageHandle(pub usize);

#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    pub name: String,
    /// Device texture name.
    pub texnum: u32,
    /// Source dimensions.
    pub width: u32,
    pub height: u32,
    /// After power-of-two rounding and picmip.
    pub upload_width: u32,
    pub upload_height: u32,
    pub mipmap: bool,
    /// Last frame this image was bound, read by the eviction code.
    pub frame_used: u32,
}

/// Image registry owned by the loader; the back end only stamps usage.
pub struct ImageTable {
    images: Vec<Image>,
    next_texnum: u32,
    pub default_image: ImageHandle,
    pub white_image: ImageHandle,
    pub dlight_image: ImageHandle,
    pub scratch_images: [ImageHandle; NUM_SCRATCH_IMAGES],
}

impl Default for ImageTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageTable {
    /// Table holding the built-in images.
    pub fn new() -> Self {
        let mut table = Self {
            images: Vec::new(),
            next_texnum: 1,
            default_image: ImageHandle(0),
            white_image: ImageHandle(0),
            dlight_image: ImageHandle(0),
            scratch_images: [ImageHandle(0); NUM_SCRATCH_IMAGES],
        };
        table.default_image = table.register("*default", 16, 16, true);
        table.white_image = table.register("*white", 8, 8, false);
        table.dlight_image = table.register("*dlight", 16, 16, false);
        for i in 0..NUM_SCRATCH_IMAGES {
            table.scratch_images[i] = table.register(&format!("*scratch{}", i), 256, 256, false);
        }
        table
    }

    /// Record an image uploaded by the loader and hand out its texnum.
    pub fn register(&mut self, name: &str, width: u32, height: u32, mipmap: bool) -> ImageHandle {
        let handle = ImageHandle(self.images.len());
        self.images.push(Image {
            name: name.to_string(),
            texnum: self.next_texnum,
            width,
            height,
            upload_width: width,
            upload_height: height,
            mipmap,
            frame_used: 0,
        });
        self.next_texnum += 1;
        handle
    }

    pub fn get(&self, handle: ImageHandle) -> Option<&Image> {
        self.images.get(handle.0)
    }

    pub fn get_mut(&mut self, handle: ImageHandle) -> Option<&mut Image> {
        self.images.get_mut(handle.0)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ImageHandle, &Image)> {
        self.images.iter().enumerate().map(|(i, img)| (ImageHandle(i), img))
    }

    pub fn scratch(&self, client: usize) -> ImageHandle {
        self.scratch_images[client % NUM_SCRATCH_IMAGES]
    }
}

// ============================================================
// Shaders
// ============================================================

#[derive(Clone, Debug, PartialEq)]
pub struct ShaderStage {
    pub image: Option<ImageHandle>,
    pub state_bits: StateBits,
    pub tex_env: TexEnv,
}

/// A fully resolved material. Treated as read-only by the back end.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Shader {
    pub name: String,
    /// Registration index.
    pub index: usize,
    /// Position in the sorted shader list; this is what sort keys carry.
    pub sorted_index: usize,
    pub cull: CullType,
    /// Surfaces from different entities may share a batch.
    pub entity_mergable: bool,
    /// Drawing it marks the view as having rendered sky.
    pub is_sky: bool,
    pub time_offset: f32,
    pub stages: Vec<ShaderStage>,
}

pub type ShaderRef = Arc<Shader>;

/// Identity comparison; two handles are the same shader only if they
/// point at the same registration.
pub fn same_shader(a: Option<&ShaderRef>, b: Option<&ShaderRef>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

pub struct ShaderTable {
    shaders: Vec<ShaderRef>,
    sorted: Vec<ShaderRef>,
    default_shader: ShaderRef,
}

impl ShaderTable {
    pub fn new(default_image: ImageHandle) -> Self {
        let default_shader = Arc::new(Shader {
            name: "<default>".to_string(),
            index: 0,
            sorted_index: 0,
            cull: CullType::FrontSided,
            entity_mergable: false,
            is_sky: false,
            time_offset: 0.0,
            stages: vec![ShaderStage {
                image: Some(default_image),
                state_bits: StateBits::DEPTHMASK_TRUE,
                tex_env: TexEnv::Modulate,
            }],
        });
        Self {
            shaders: vec![default_shader.clone()],
            sorted: vec![default_shader.clone()],
            default_shader,
        }
    }

    /// Register a shader; it is appended to the sorted list as well.
    pub fn register(&mut self, mut shader: Shader) -> ShaderRef {
        shader.index = self.shaders.len();
        shader.sorted_index = self.sorted.len();
        let shader = Arc::new(shader);
        self.shaders.push(shader.clone());
        self.sorted.push(shader.clone());
        shader
    }

    /// Look up by registration handle. Out-of-range handles warn and fall
    /// back to the default shader.
    pub fn get(&self, handle: i32) -> ShaderRef {
        if handle < 0 || handle as usize >= self.shaders.len() {
            com_warning(&format!("R_GetShaderByHandle: out of range hShader '{}'\n", handle));
            return self.default_shader.clone();
        }
        self.shaders[handle as usize].clone()
    }

    pub fn sorted(&self, sorted_index: usize) -> Option<&ShaderRef> {
        self.sorted.get(sorted_index)
    }

    pub fn default_shader(&self) -> &ShaderRef {
        &self.default_shader
    }

    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }
}
