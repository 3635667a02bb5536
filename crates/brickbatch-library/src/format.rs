//! RON file formats for part libraries and models.

use brickbatch_core::constants::{LINE_INDICES, TRIANGLE_INDICES};
use brickbatch_core::{Material, MaterialId, PartFlags, SourcePart};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::LoadError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryFile {
    #[serde(default)]
    pub materials: Vec<MaterialDef>,
    #[serde(default)]
    pub parts: Vec<PartDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialDef {
    pub id: u32,
    pub name: String,
    /// RGB, 0-255 per channel.
    pub color: [u8; 3],
    #[serde(default = "opaque")]
    pub alpha: u8,
}

fn opaque() -> u8 {
    255
}

impl MaterialDef {
    pub fn to_material(&self) -> (MaterialId, Material) {
        (
            MaterialId(self.id),
            Material {
                name: self.name.clone(),
                base_color: [self.color[0], self.color[1], self.color[2], self.alpha],
            },
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartDef {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    #[serde(default)]
    pub triangles: Vec<u32>,
    #[serde(default)]
    pub lines: Vec<u32>,
    #[serde(default)]
    pub optional_lines: Vec<u32>,
    /// Per-triangle material override.
    #[serde(default)]
    pub materials: Option<Vec<u32>>,
    #[serde(default)]
    pub double_sided: bool,
    /// Chamfered triangle set for the render variant.
    #[serde(default)]
    pub render: Option<ChamferDef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChamferDef {
    pub triangles_c: Vec<u32>,
    #[serde(default)]
    pub materials_c: Option<Vec<u32>>,
}

impl PartDef {
    /// Check index ranges and array lengths.
    pub fn validate(&self) -> Result<(), LoadError> {
        let vertex_count = self.positions.len() as u32;
        check_indices(&self.name, "triangles", &self.triangles, TRIANGLE_INDICES, vertex_count)?;
        check_indices(&self.name, "lines", &self.lines, LINE_INDICES, vertex_count)?;
        check_indices(
            &self.name,
            "optional_lines",
            &self.optional_lines,
            LINE_INDICES,
            vertex_count,
        )?;
        if let Some(materials) = &self.materials {
            check_material_len(&self.name, "materials", materials, &self.triangles)?;
        }
        if let Some(chamfer) = &self.render {
            check_indices(
                &self.name,
                "triangles_c",
                &chamfer.triangles_c,
                TRIANGLE_INDICES,
                vertex_count,
            )?;
            if let Some(materials_c) = &chamfer.materials_c {
                check_material_len(&self.name, "materials_c", materials_c, &chamfer.triangles_c)?;
            }
        }
        Ok(())
    }

    pub fn to_source_part(&self) -> SourcePart {
        SourcePart {
            name: self.name.clone(),
            positions: self.positions.iter().map(|p| Vec3::from_array(*p)).collect(),
            triangles: self.triangles.clone(),
            lines: self.lines.clone(),
            optional_lines: self.optional_lines.clone(),
            materials: self
                .materials
                .as_ref()
                .map(|m| m.iter().copied().map(MaterialId).collect()),
            flags: PartFlags {
                no_backface_culling: self.double_sided,
                has_complex_material: self.materials.is_some(),
            },
        }
    }
}

fn check_indices(
    part: &str,
    what: &str,
    indices: &[u32],
    arity: u32,
    vertex_count: u32,
) -> Result<(), LoadError> {
    if indices.len() as u32 % arity != 0 {
        return Err(LoadError::InvalidPart {
            name: part.to_string(),
            reason: format!("{what} length {} is not a multiple of {arity}", indices.len()),
        });
    }
    if let Some(bad) = indices.iter().find(|&&i| i >= vertex_count) {
        return Err(LoadError::InvalidPart {
            name: part.to_string(),
            reason: format!("{what} index {bad} out of range (vertex count {vertex_count})"),
        });
    }
    Ok(())
}

fn check_material_len(
    part: &str,
    what: &str,
    materials: &[u32],
    triangles: &[u32],
) -> Result<(), LoadError> {
    let expected = triangles.len() / TRIANGLE_INDICES as usize;
    if materials.len() != expected {
        return Err(LoadError::InvalidPart {
            name: part.to_string(),
            reason: format!("{what} has {} entries, expected {expected}", materials.len()),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFile {
    pub instances: Vec<InstanceDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceDef {
    pub part: String,
    pub material: u32,
    /// Column-major world transform.
    #[serde(default = "identity")]
    pub transform: [f32; 16],
}

fn identity() -> [f32; 16] {
    glam::Mat4::IDENTITY.to_cols_array()
}

pub fn parse_library(ron_str: &str) -> Result<LibraryFile, LoadError> {
    let options = ron::Options::default();
    options
        .from_str(ron_str)
        .map_err(|e| LoadError::LibraryParseError(e.to_string()))
}

pub fn parse_model(ron_str: &str) -> Result<ModelFile, LoadError> {
    let options = ron::Options::default();
    options
        .from_str(ron_str)
        .map_err(|e| LoadError::ModelParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = r#"(
        materials: [(id: 4, name: "Red", color: (201, 26, 9))],
        parts: [
            (
                name: "quad.dat",
                positions: [(0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (1.0, 1.0, 0.0), (0.0, 1.0, 0.0)],
                triangles: [0, 1, 2, 0, 2, 3],
                lines: [0, 1, 1, 2],
                double_sided: true,
            ),
        ],
    )"#;

    #[test]
    fn test_parse_library() {
        let lib = parse_library(QUAD).expect("should parse");
        assert_eq!(lib.parts.len(), 1);
        assert_eq!(lib.materials[0].alpha, 255);
        lib.parts[0].validate().expect("valid part");

        let part = lib.parts[0].to_source_part();
        assert_eq!(part.num_triangles(), 2);
        assert!(part.flags.no_backface_culling);
        assert!(!part.flags.has_complex_material);
    }

    #[test]
    fn test_out_of_range_index_rejected() {
        let mut lib = parse_library(QUAD).expect("should parse");
        lib.parts[0].triangles[5] = 9;
        let err = lib.parts[0].validate().unwrap_err();
        assert!(matches!(err, LoadError::InvalidPart { .. }));
    }

    #[test]
    fn test_material_length_mismatch_rejected() {
        let mut lib = parse_library(QUAD).expect("should parse");
        lib.parts[0].materials = Some(vec![4]);
        assert!(lib.parts[0].validate().is_err());
        lib.parts[0].materials = Some(vec![4, 1]);
        assert!(lib.parts[0].validate().is_ok());
    }

    #[test]
    fn test_model_transform_defaults_to_identity() {
        let model = parse_model(r#"(instances: [(part: "quad.dat", material: 4)])"#)
            .expect("should parse");
        assert_eq!(model.instances[0].transform, identity());
    }

    #[test]
    fn test_malformed_model_rejected() {
        assert!(matches!(
            parse_model("(instances: [oops"),
            Err(LoadError::ModelParseError(_))
        ));
    }
}
