//! Single source of truth for shared constants.
//! Strides and uniform layouts must match `shaders/scene.wgsl` in brickbatch-render.

/// Bytes per vertex in the source variant (position only, 3 x f32).
pub const SOURCE_VERTEX_STRIDE: u64 = 12;

/// Bytes per vertex in the render variant (position + normal, 6 x f32).
pub const RENDER_VERTEX_STRIDE: u64 = 24;

/// Bytes per index in the shared index buffer (u32 indices).
pub const INDEX_STRIDE: u64 = 4;

/// Bytes per entry in the shared material-id buffer (u32 ids).
pub const MATERIAL_ID_STRIDE: u64 = 4;

/// Indices per triangle.
pub const TRIANGLE_INDICES: u32 = 3;

/// Indices per line segment.
pub const LINE_INDICES: u32 = 2;

/// Raw value of the sentinel part id handed out for parts that failed to resolve.
pub const INVALID_PART: u32 = u32::MAX;

/// Seed the debug color stream is reset to at the start of every frame,
/// so an instance keeps the same pseudo-random color across frames.
pub const DEBUG_COLOR_SEED: u32 = 1123;

/// Default chamfer amount used by the loader (LDraw units).
pub const DEFAULT_CHAMFER: f32 = 0.35;

/// Positions closer than this are merged by the weld fix mode.
pub const WELD_EPSILON: f32 = 1.0e-3;

/// Shading intensity of the solid triangle pass.
pub const SOLID_INTENSITY: f32 = 1.0;

/// Shading intensity of edge and optional-line passes.
pub const LINE_INTENSITY: f32 = 0.2;

/// Shading intensity of the wireframe overlay.
pub const WIREFRAME_INTENSITY: f32 = 0.5;

/// Shading intensity of the selected vertex and triangle highlights.
pub const SELECTION_INTENSITY: f32 = 2.0;

/// Shading intensity of the selected edge highlight.
pub const SELECTED_EDGE_INTENSITY: f32 = 1.5;

/// Scale applied to every line width (hi-dpi compensation).
pub const LINE_WIDTH_SCALE: f32 = 2.0;
