//! Packed draw-surface sort keys.
//!
//! ```text
//!  31          18 17        7 6    2  1   0
//! +--------------+-----------+------+---+---+
//! | sorted shader|  entity   | fog  |ff |dl |
//! +--------------+-----------+------+---+---+
//! ```

pub const QSORT_DLIGHT_SHIFT: u32 = 0;
pub const QSORT_FRONTFACE_SHIFT: u32 = 1;
pub const QSORT_FOGNUM_SHIFT: u32 = 2;
pub const QSORT_ENTITYNUM_SHIFT: u32 = 7;
pub const QSORT_SHADERNUM_SHIFT: u32 = 18;

pub const FOGNUM_BITS: u32 = 5;
pub const ENTITYNUM_BITS: u32 = 11;
pub const SHADERNUM_BITS: u32 = 14;

pub const MAX_FOGS: usize = 1 << FOGNUM_BITS;
pub const MAX_GENTITIES: usize = 1 << ENTITYNUM_BITS;
pub const MAX_SHADERS: usize = 1 << SHADERNUM_BITS;

/// Components packed into a sort key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SortParts {
    pub entity_num: usize,
    /// Index into the sorted shader list.
    pub shader_index: usize,
    pub fog_num: usize,
    pub front_face: bool,
    pub dlighted: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SortKey(pub u32);

impl SortKey {
    /// Pack `parts`. Components wider than their field are masked.
    pub fn compose(parts: &SortParts) -> Self {
        let shader = (parts.shader_index as u32) & (MAX_SHADERS as u32 - 1);
        let entity = (parts.entity_num as u32) & (MAX_GENTITIES as u32 - 1);
        let fog = (parts.fog_num as u32) & (MAX_FOGS as u32 - 1);
        SortKey(
            (shader << QSORT_SHADERNUM_SHIFT)
                | (entity << QSORT_ENTITYNUM_SHIFT)
                | (fog << QSORT_FOGNUM_SHIFT)
                | ((parts.front_face as u32) << QSORT_FRONTFACE_SHIFT)
                | ((parts.dlighted as u32) << QSORT_DLIGHT_SHIFT),
        )
    }

    pub fn decompose(self) -> SortParts {
        let k = self.0;
        SortParts {
            shader_index: ((k >> QSORT_SHADERNUM_SHIFT) & (MAX_SHADERS as u32 - 1)) as usize,
            entity_num: ((k >> QSORT_ENTITYNUM_SHIFT) & (MAX_GENTITIES as u32 - 1)) as usize,
            fog_num: ((k >> QSORT_FOGNUM_SHIFT) & (MAX_FOGS as u32 - 1)) as usize,
            front_face: (k >> QSORT_FRONTFACE_SHIFT) & 1 != 0,
            dlighted: (k >> QSORT_DLIGHT_SHIFT) & 1 != 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tr_local::ENTITYNUM_WORLD;

    #[test]
    fn test_decompose_inverts_compose() {
        let entities = [0, 1, 5, ENTITYNUM_WORLD, MAX_GENTITIES - 1];
        let shaders = [0, 1, 77, MAX_SHADERS - 1];
        let fogs = [0, 3, MAX_FOGS - 1];
        for &entity_num in &entities {
            for &shader_index in &shaders {
                for &fog_num in &fogs {
                    for front_face in [false, true] {
                        for dlighted in [false, true] {
                            let parts = SortParts { entity_num, shader_index, fog_num, front_face, dlighted };
                            assert_eq!(SortKey::compose(&parts).decompose(), parts);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_shader_dominates_ordering() {
        let a = SortKey::compose(&SortParts { shader_index: 1, entity_num: MAX_GENTITIES - 1, ..Default::default() });
        let b = SortKey::compose(&SortParts { shader_index: 2, ..Default::default() });
        assert!(a < b);
    }

    #[test]
    fn test_field_positions() {
        let key = SortKey::compose(&SortParts {
            entity_num: 1,
            shader_index: 1,
            fog_num: 1,
            front_face: true,
            dlighted: true,
        });
        assert_eq!(key.0, (1 << 18) | (1 << 7) | (1 << 2) | 2 | 1);
    }
}
