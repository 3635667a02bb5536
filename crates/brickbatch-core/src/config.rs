use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_CHAMFER;
use crate::types::GeometryVariant;

/// Rendering toggles, mutated by the application every frame.
///
/// Only `variant` and `chamfered` affect the buffer layout; every other
/// field is consumed by the render batcher alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tweak {
    /// Light direction in world space (normalized by the consumer).
    pub light_dir: [f32; 3],
    /// Global back-face culling toggle.
    pub cull: bool,
    /// Source or render geometry.
    pub variant: GeometryVariant,
    /// Draw chamfered triangles where the part supports it (render variant only).
    pub chamfered: bool,
    pub triangles: bool,
    pub edges: bool,
    pub optional: bool,
    pub wireframe: bool,
    /// Material colors (true) or pseudo-random debug colors (false).
    pub colors: bool,
    /// 0 = opaque. Any non-zero value enables additive blending without depth test.
    pub transparency: f32,
    /// Selected part for debug highlights; also restricts drawing to that part.
    pub part: Option<u32>,
    pub vertex: Option<u32>,
    pub tri: Option<u32>,
    pub edge: Option<u32>,
}

impl Default for Tweak {
    fn default() -> Self {
        Self {
            light_dir: [-0.577_350_3, 0.577_350_3, 0.577_350_3],
            cull: true,
            variant: GeometryVariant::Source,
            chamfered: false,
            triangles: true,
            edges: false,
            optional: false,
            wireframe: true,
            colors: true,
            transparency: 0.0,
            part: None,
            vertex: None,
            tri: None,
            edge: None,
        }
    }
}

/// How the loader repairs source geometry after parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PartFixMode {
    #[default]
    None,
    /// Merge coincident positions and drop triangles that collapse.
    Weld,
}

/// When the loader derives render parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RenderPartBuildMode {
    /// Build render parts while resolving the model.
    #[default]
    OnLoad,
    /// Only build render parts on explicit request.
    OnDemand,
}

/// Loader configuration. Any change recreates the part library and
/// therefore invalidates the loaded model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub part_fix_mode: PartFixMode,
    /// Chamfer amount. Zero disables chamfered triangle sets.
    pub chamfer: f32,
    pub build_mode: RenderPartBuildMode,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            part_fix_mode: PartFixMode::None,
            chamfer: DEFAULT_CHAMFER,
            build_mode: RenderPartBuildMode::OnLoad,
        }
    }
}
