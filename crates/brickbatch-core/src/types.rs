use glam::Mat4;
use serde::{Deserialize, Serialize};

use crate::constants::INVALID_PART;

/// Newtype for part identifiers. Dense, `0..part_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartId(pub u32);

impl PartId {
    /// Sentinel for an instance whose part failed to resolve. Never treated as id 0.
    pub const INVALID: PartId = PartId(INVALID_PART);

    pub fn is_valid(self) -> bool {
        self.0 != INVALID_PART
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Newtype for material identifiers (LDraw color codes).
/// Uploaded as-is into the shared material-id buffer.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    bytemuck::Pod,
    bytemuck::Zeroable,
)]
#[repr(transparent)]
pub struct MaterialId(pub u32);

/// One placement of a part within a model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instance {
    pub part: PartId,
    /// World transform, column-major.
    pub transform: Mat4,
    pub material: MaterialId,
}

impl Instance {
    pub fn new(part: PartId, transform: Mat4, material: MaterialId) -> Self {
        Self {
            part,
            transform,
            material,
        }
    }
}

/// A resolved model: instances in render order plus the distinct parts they reference.
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub instances: Vec<Instance>,
    /// Distinct valid part ids referenced by `instances`, ascending.
    pub parts: Vec<PartId>,
}

impl Model {
    /// Build a model from an instance list, collecting the referenced part set.
    pub fn from_instances(instances: Vec<Instance>) -> Self {
        let mut parts: Vec<PartId> = instances
            .iter()
            .map(|i| i.part)
            .filter(|p| p.is_valid())
            .collect();
        parts.sort_unstable();
        parts.dedup();
        Self { instances, parts }
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

/// Which geometry variant of every part is packed and drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GeometryVariant {
    /// Raw triangles, lines and optional lines, positions only.
    #[default]
    Source,
    /// Smoothed (optionally chamfered) triangles with normals.
    Render,
}

/// Debug restriction of the render batcher to a single instance or part.
/// Out-of-range values are clamped to the last valid index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceFilter {
    Instance(u32),
    Part(PartId),
}
