// Copyright (C) 1997-2001 Id Software, Inc.
// GPL-2.0-or-later
//
// tr_local.rs
// Back-end local definitions: scene description handed over by the front end

use etl_common::q_shared::*;

pub const MAX_REF_ENTITIES: usize = 1023;
pub const ENTITYNUM_WORLD: usize = MAX_REF_ENTITIES - 1;
pub const MAX_DLIGHTS: usize = 32;

/// Depth range used for view-model entities.
pub const DEPTHHACK_RANGE: (f32, f32) = (0.0, 0.3);
pub const FULL_DEPTH_RANGE: (f32, f32) = (0.0, 1.0);

bitflags::bitflags! {
    /// Per-view refdef flags.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct RdFlags: u32 {
        /// Used for player configuration screen.
        const NOWORLDMODEL = 0x0001;
        const HYPERSPACE   = 0x0004;
        /// The view is the portal-sky sub-view.
        const SKYBOXPORTAL = 0x0008;
        const UNDERWATER   = 0x0010;
        const DRAWINGSKY   = 0x0020;
        const SNOOPERVIEW  = 0x0040;
    }
}
pub const RDF_NOWORLDMODEL: RdFlags = RdFlags::NOWORLDMODEL;
pub const RDF_HYPERSPACE: RdFlags = RdFlags::HYPERSPACE;
pub const RDF_SKYBOXPORTAL: RdFlags = RdFlags::SKYBOXPORTAL;
pub const RDF_UNDERWATER: RdFlags = RdFlags::UNDERWATER;

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct RenderFx: u32 {
        const MINLIGHT       = 0x0001;
        const THIRD_PERSON   = 0x0002;
        const FIRST_PERSON   = 0x0004;
        /// Compressed depth range so the view model never pokes into walls.
        const DEPTHHACK      = 0x0008;
        const NOSHADOW       = 0x0040;
        const LIGHTING_ORIGIN = 0x0080;
    }
}
pub const RF_DEPTHHACK: RenderFx = RenderFx::DEPTHHACK;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RefEntityType {
    #[default]
    Model,
    Sprite,
    Beam,
    Portal,
}

/// Entity as submitted by the front end.
#[derive(Clone, Debug, PartialEq)]
pub struct RefEntity {
    pub re_type: RefEntityType,
    pub renderfx: RenderFx,
    pub origin: Vec3,
    pub axis: [Vec3; 3],
    /// Axes carry a scale and must be renormalized for lighting.
    pub non_normalized_axes: bool,
    pub shader_rgba: [u8; 4],
    /// Sprite half-size.
    pub radius: f32,
    /// Sprite roll in degrees.
    pub rotation: f32,
    pub shader_time: f32,
}

impl Default for RefEntity {
    fn default() -> Self {
        Self {
            re_type: RefEntityType::Model,
            renderfx: RenderFx::empty(),
            origin: VEC3_ORIGIN,
            axis: AXIS_DEFAULT,
            non_normalized_axes: false,
            shader_rgba: [255; 4],
            radius: 0.0,
            rotation: 0.0,
            shader_time: 0.0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrRefEntity {
    pub e: RefEntity,
    /// Entity is touched by at least one dynamic light.
    pub need_dlights: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DLight {
    pub origin: Vec3,
    pub color: Vec3,
    pub radius: f32,
    /// Origin in the local space of the current entity.
    pub transformed: Vec3,
}

/// Model-space frame of reference.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Orientation {
    pub origin: Vec3,
    pub axis: [Vec3; 3],
    /// Viewer origin in local coordinates.
    pub view_origin: Vec3,
    pub model_matrix: Mat4,
}

impl Default for Orientation {
    fn default() -> Self {
        Self {
            origin: VEC3_ORIGIN,
            axis: AXIS_DEFAULT,
            view_origin: VEC3_ORIGIN,
            model_matrix: MAT4_IDENTITY,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ViewParms {
    /// Camera frame.
    pub orientation: Orientation,
    /// World-space transform for this view.
    pub world: Orientation,
    pub is_portal: bool,
    pub is_mirror: bool,
    pub portal_plane: CPlane,
    pub viewport_x: i32,
    pub viewport_y: i32,
    pub viewport_width: i32,
    pub viewport_height: i32,
    pub projection_matrix: Mat4,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RefDef {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    /// Milliseconds.
    pub time: i32,
    pub float_time: f64,
    pub rdflags: RdFlags,
    pub entities: Vec<TrRefEntity>,
    pub dlights: Vec<DLight>,
}

// ============================================================
// Fog
// ============================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FogMode {
    #[default]
    Linear,
    Exp,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GlFog {
    pub color: Vec4,
    pub mode: FogMode,
    /// Clear the screen to the fog color before drawing.
    pub clearscreen: bool,
    pub registered: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FogState {
    /// Fog for the current view.
    pub current: GlFog,
    /// Fog registered for the portal-sky sub-view.
    pub portal_view: GlFog,
    pub active: bool,
}

/// World-scope state the view setup consults.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneState {
    /// Color of the global fog volume, when the world has one.
    pub global_fog: Option<Vec3>,
    /// The world contains a portal-sky surface.
    pub skybox_portal: bool,
    pub fog: FogState,
    pub identity_light: f32,
}

impl Default for SceneState {
    fn default() -> Self {
        Self {
            global_fog: None,
            skybox_portal: false,
            fog: FogState::default(),
            identity_light: 1.0,
        }
    }
}

// ============================================================
// Counters
// ============================================================

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PerfCounters {
    pub c_surfaces: usize,
    pub c_shaders: usize,
    pub c_vertexes: usize,
    pub c_indexes: usize,
    pub c_batches: usize,
    /// Sort-key changes that forced a decompose.
    pub c_key_changes: usize,
    /// Surfaces appended on an unchanged key.
    pub c_fast_path: usize,
    pub c_overdraw: u64,
    pub msec: u32,
}

/// Entity whose transform is currently loaded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CurrentEntity {
    #[default]
    World,
    /// Screen-space entity used by every 2D command.
    TwoD,
    Ref(usize),
}
