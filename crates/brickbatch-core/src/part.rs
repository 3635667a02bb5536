use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::constants::{LINE_INDICES, TRIANGLE_INDICES};
use crate::types::MaterialId;

/// Flags shared by the source variant of a part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PartFlags {
    /// Part is double sided; back faces must never be culled.
    pub no_backface_culling: bool,
    /// Part carries per-triangle material ids that override the instance material.
    pub has_complex_material: bool,
}

/// Source geometry of a part: raw triangles, edges and optional lines.
#[derive(Debug, Clone, Default)]
pub struct SourcePart {
    pub name: String,
    pub positions: Vec<Vec3>,
    /// Triangle list, 3 indices per triangle, part-local.
    pub triangles: Vec<u32>,
    /// Edge lines, 2 indices per line.
    pub lines: Vec<u32>,
    /// Optional (conditional) lines, 2 indices per line.
    pub optional_lines: Vec<u32>,
    /// One material id per triangle. Only meaningful with `flags.has_complex_material`.
    pub materials: Option<Vec<MaterialId>>,
    pub flags: PartFlags,
}

impl SourcePart {
    pub fn num_positions(&self) -> u32 {
        self.positions.len() as u32
    }

    pub fn num_triangles(&self) -> u32 {
        self.triangles.len() as u32 / TRIANGLE_INDICES
    }

    pub fn num_lines(&self) -> u32 {
        self.lines.len() as u32 / LINE_INDICES
    }

    pub fn num_optional_lines(&self) -> u32 {
        self.optional_lines.len() as u32 / LINE_INDICES
    }

    /// Per-triangle materials, if the part declares them.
    pub fn triangle_materials(&self) -> Option<&[MaterialId]> {
        if self.flags.has_complex_material {
            self.materials.as_deref()
        } else {
            None
        }
    }
}

/// GPU vertex of the render variant. Must match `RenderVertex` in scene.wgsl.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct RenderVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// Flags of the render variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderPartFlags {
    /// A chamfered triangle set (`triangles_c`) exists and may be drawn.
    pub can_chamfer: bool,
    pub has_complex_material: bool,
}

/// Render geometry of a part, derived by the loader from the source variant.
#[derive(Debug, Clone, Default)]
pub struct RenderPart {
    pub vertices: Vec<RenderVertex>,
    pub triangles: Vec<u32>,
    /// Chamfered triangle list; empty unless `flags.can_chamfer`.
    pub triangles_c: Vec<u32>,
    pub lines: Vec<u32>,
    pub materials: Option<Vec<MaterialId>>,
    pub materials_c: Option<Vec<MaterialId>>,
    pub flags: RenderPartFlags,
}

impl RenderPart {
    pub fn num_vertices(&self) -> u32 {
        self.vertices.len() as u32
    }

    pub fn num_triangles(&self) -> u32 {
        self.triangles.len() as u32 / TRIANGLE_INDICES
    }

    pub fn num_triangles_c(&self) -> u32 {
        self.triangles_c.len() as u32 / TRIANGLE_INDICES
    }

    pub fn num_lines(&self) -> u32 {
        self.lines.len() as u32 / LINE_INDICES
    }

    pub fn triangle_materials(&self) -> Option<&[MaterialId]> {
        if self.flags.has_complex_material {
            self.materials.as_deref()
        } else {
            None
        }
    }

    pub fn chamfer_materials(&self) -> Option<&[MaterialId]> {
        if self.flags.has_complex_material {
            self.materials_c.as_deref()
        } else {
            None
        }
    }
}

/// A material table entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    /// RGBA, 0-255 per channel.
    pub base_color: [u8; 4],
}

impl Material {
    /// Base color as normalized floats with alpha forced to 1.
    pub fn color_f32(&self) -> [f32; 4] {
        [
            self.base_color[0] as f32 / 255.0,
            self.base_color[1] as f32 / 255.0,
            self.base_color[2] as f32 / 255.0,
            1.0,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_vertex_size() {
        assert_eq!(std::mem::size_of::<RenderVertex>(), 24);
    }

    #[test]
    fn test_counts_from_index_lengths() {
        let part = SourcePart {
            positions: vec![Vec3::ZERO; 4],
            triangles: vec![0, 1, 2, 0, 2, 3],
            lines: vec![0, 1, 1, 2, 2, 3],
            optional_lines: vec![0, 2],
            ..Default::default()
        };
        assert_eq!(part.num_positions(), 4);
        assert_eq!(part.num_triangles(), 2);
        assert_eq!(part.num_lines(), 3);
        assert_eq!(part.num_optional_lines(), 1);
    }

    #[test]
    fn test_materials_gated_by_flag() {
        let mut part = SourcePart {
            triangles: vec![0, 1, 2],
            materials: Some(vec![MaterialId(4)]),
            ..Default::default()
        };
        assert!(part.triangle_materials().is_none());
        part.flags.has_complex_material = true;
        assert_eq!(part.triangle_materials(), Some(&[MaterialId(4)][..]));
    }

    #[test]
    fn test_material_color_normalized() {
        let red = Material {
            name: "Red".into(),
            base_color: [255, 0, 51, 128],
        };
        let c = red.color_f32();
        assert_eq!(c[0], 1.0);
        assert_eq!(c[1], 0.0);
        assert!((c[2] - 0.2).abs() < 1e-6);
        assert_eq!(c[3], 1.0);
    }
}
