//! Render batcher: turns the instance list into a flat list of state
//! changes and draws against the shared buffers.
//!
//! The batcher never touches the GPU. It produces a [`DrawList`] that the
//! executor replays inside one render pass, so every state transition it
//! emits is observable in tests.

use std::ops::Range;

use brickbatch_core::constants::{
    DEBUG_COLOR_SEED, LINE_INDICES, LINE_INTENSITY, LINE_WIDTH_SCALE, SELECTED_EDGE_INTENSITY,
    SELECTION_INTENSITY, SOLID_INTENSITY, TRIANGLE_INDICES, WIREFRAME_INTENSITY,
};
use brickbatch_core::math::{is_counter_clockwise, normal_matrix, DebugColors};
use brickbatch_core::{GeometryVariant, Instance, InstanceFilter, Model, PartId, PartSource, Tweak};

use crate::layout::{DrawRegion, LayoutPlan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Winding {
    Ccw,
    Cw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FillMode {
    Fill,
    Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    Opaque,
    /// Additive blending, no depth test.
    Additive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Triangles,
    Lines,
    Points,
}

/// What a draw represents. Selects the shading style in the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawPass {
    Solid,
    Edges,
    OptionalLines,
    Wireframe,
    SelectedVertex,
    SelectedTriangle,
    SelectedEdge,
}

impl DrawPass {
    pub const ALL: [DrawPass; 7] = [
        DrawPass::Solid,
        DrawPass::Edges,
        DrawPass::OptionalLines,
        DrawPass::Wireframe,
        DrawPass::SelectedVertex,
        DrawPass::SelectedTriangle,
        DrawPass::SelectedEdge,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn intensity(self) -> f32 {
        match self {
            DrawPass::Solid => SOLID_INTENSITY,
            DrawPass::Edges | DrawPass::OptionalLines => LINE_INTENSITY,
            DrawPass::Wireframe => WIREFRAME_INTENSITY,
            DrawPass::SelectedVertex | DrawPass::SelectedTriangle => SELECTION_INTENSITY,
            DrawPass::SelectedEdge => SELECTED_EDGE_INTENSITY,
        }
    }

    /// Only solid triangles receive lighting.
    pub fn lit(self) -> bool {
        self == DrawPass::Solid
    }

    fn fill(self) -> FillMode {
        match self {
            DrawPass::Wireframe | DrawPass::SelectedTriangle => FillMode::Line,
            _ => FillMode::Fill,
        }
    }

    /// Wireframe stays one pixel wide; every other line is scaled.
    fn line_width(self) -> Option<f32> {
        match self {
            DrawPass::Edges | DrawPass::OptionalLines => Some(LINE_WIDTH_SCALE),
            DrawPass::Wireframe => Some(1.0),
            DrawPass::SelectedTriangle => Some(4.0 * LINE_WIDTH_SCALE),
            DrawPass::SelectedEdge => Some(2.0 * LINE_WIDTH_SCALE),
            DrawPass::Solid | DrawPass::SelectedVertex => None,
        }
    }

    fn stipple(self) -> Option<bool> {
        match self {
            DrawPass::Edges | DrawPass::SelectedEdge => Some(false),
            DrawPass::OptionalLines | DrawPass::Wireframe => Some(true),
            _ => None,
        }
    }
}

/// Fixed-function state a draw needs. `None` means the draw does not care.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterState {
    pub cull: bool,
    pub front_face: Winding,
    pub fill: FillMode,
    pub blend: BlendMode,
    pub line_width: Option<f32>,
    pub stipple: Option<bool>,
}

/// A single draw against the shared buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub pass: DrawPass,
    pub primitive: Primitive,
    /// Index range for indexed draws, vertex range otherwise.
    pub range: Range<u32>,
    pub base_vertex: i32,
    pub indexed: bool,
    /// Slot of this draw's instance in [`DrawList::objects`].
    pub object: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    SetCull(bool),
    SetFrontFace(Winding),
    SetFill(FillMode),
    SetBlend(BlendMode),
    SetLineWidth(f32),
    SetStipple(bool),
    Draw(DrawCall),
}

/// Per-instance uniform block. Must match `ObjectUniforms` in scene.wgsl.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectUniforms {
    pub world: [[f32; 4]; 4],
    pub world_it: [[f32; 4]; 4],
    pub color: [f32; 4],
    pub material_id: u32,
    pub _pad: [u32; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchStats {
    pub instances_drawn: u32,
    pub instances_skipped: u32,
    pub draw_calls: u32,
    pub cull_changes: u32,
    pub winding_changes: u32,
    pub other_changes: u32,
}

impl BatchStats {
    pub fn state_changes(&self) -> u32 {
        self.cull_changes + self.winding_changes + self.other_changes
    }
}

#[derive(Debug, Clone, Default)]
pub struct DrawList {
    pub ops: Vec<DrawOp>,
    pub objects: Vec<ObjectUniforms>,
    pub stats: BatchStats,
}

impl DrawList {
    pub fn draws(&self) -> impl Iterator<Item = &DrawCall> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Draw(call) => Some(call),
            _ => None,
        })
    }
}

/// Last applied fixed-function state. Unknown until the first draw.
#[derive(Debug, Default)]
pub struct StateTracker {
    cull: Option<bool>,
    front_face: Option<Winding>,
    fill: Option<FillMode>,
    blend: Option<BlendMode>,
    line_width: Option<f32>,
    stipple: Option<bool>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit only the transitions from the last applied state to `desired`.
    pub fn apply(&mut self, desired: &RasterState, list: &mut DrawList) {
        if self.cull != Some(desired.cull) {
            self.cull = Some(desired.cull);
            list.ops.push(DrawOp::SetCull(desired.cull));
            list.stats.cull_changes += 1;
        }
        if self.front_face != Some(desired.front_face) {
            self.front_face = Some(desired.front_face);
            list.ops.push(DrawOp::SetFrontFace(desired.front_face));
            list.stats.winding_changes += 1;
        }
        if self.fill != Some(desired.fill) {
            self.fill = Some(desired.fill);
            list.ops.push(DrawOp::SetFill(desired.fill));
            list.stats.other_changes += 1;
        }
        if self.blend != Some(desired.blend) {
            self.blend = Some(desired.blend);
            list.ops.push(DrawOp::SetBlend(desired.blend));
            list.stats.other_changes += 1;
        }
        if let Some(width) = desired.line_width {
            if self.line_width != Some(width) {
                self.line_width = Some(width);
                list.ops.push(DrawOp::SetLineWidth(width));
                list.stats.other_changes += 1;
            }
        }
        if let Some(stipple) = desired.stipple {
            if self.stipple != Some(stipple) {
                self.stipple = Some(stipple);
                list.ops.push(DrawOp::SetStipple(stipple));
                list.stats.other_changes += 1;
            }
        }
    }
}

/// Everything the batcher reads for one frame.
pub struct BatchInput<'a> {
    pub model: &'a Model,
    pub plan: &'a LayoutPlan,
    pub source: &'a dyn PartSource,
    pub tweak: &'a Tweak,
    pub filter: Option<InstanceFilter>,
}

/// Clamp a debug filter to the last valid instance or part.
fn clamp_filter(filter: InstanceFilter, instances: usize, parts: u32) -> Option<InstanceFilter> {
    match filter {
        InstanceFilter::Instance(i) => {
            let last = instances.checked_sub(1)? as u32;
            Some(InstanceFilter::Instance(i.min(last)))
        }
        InstanceFilter::Part(p) => {
            let last = parts.checked_sub(1)?;
            Some(InstanceFilter::Part(PartId(p.0.min(last))))
        }
    }
}

/// Clamp an element selection to `count`, or `None` when there is nothing to select.
fn clamp_selection(selected: Option<u32>, count: u32) -> Option<u32> {
    let last = count.checked_sub(1)?;
    selected.map(|s| s.min(last))
}

struct Batcher<'a> {
    input: &'a BatchInput<'a>,
    tracker: StateTracker,
    list: DrawList,
    blend: BlendMode,
    selected_part: Option<PartId>,
}

impl Batcher<'_> {
    fn draw(&mut self, state: RasterState, call: DrawCall) {
        self.tracker.apply(&state, &mut self.list);
        self.list.ops.push(DrawOp::Draw(call));
        self.list.stats.draw_calls += 1;
    }

    fn state(&self, base: &RasterState, pass: DrawPass) -> RasterState {
        RasterState {
            // The selected triangle outline is visible from both sides.
            cull: base.cull && pass != DrawPass::SelectedTriangle,
            fill: pass.fill(),
            blend: self.blend,
            line_width: pass.line_width(),
            stipple: pass.stipple(),
            ..*base
        }
    }

    fn indexed(
        &mut self,
        base: &RasterState,
        pass: DrawPass,
        primitive: Primitive,
        range: Range<u32>,
        region: &DrawRegion,
        object: u32,
    ) {
        if range.is_empty() {
            return;
        }
        let state = self.state(base, pass);
        self.draw(
            state,
            DrawCall {
                pass,
                primitive,
                range,
                base_vertex: region.vertex_offset as i32,
                indexed: true,
                object,
            },
        );
    }

    fn instance(&mut self, instance: &Instance, region: &DrawRegion, color: [f32; 4]) {
        let tweak = self.input.tweak;
        let no_backface_culling = self
            .input
            .source
            .part(instance.part)
            .map(|p| p.flags.no_backface_culling)
            .unwrap_or(false);
        let base = RasterState {
            cull: tweak.cull && !no_backface_culling,
            front_face: if is_counter_clockwise(&instance.transform) {
                Winding::Ccw
            } else {
                Winding::Cw
            },
            fill: FillMode::Fill,
            blend: self.blend,
            line_width: None,
            stipple: None,
        };

        let object = self.list.objects.len() as u32;
        self.list.objects.push(ObjectUniforms {
            world: instance.transform.to_cols_array_2d(),
            world_it: normal_matrix(&instance.transform).to_cols_array_2d(),
            color,
            material_id: instance.material.0,
            _pad: [0; 3],
        });
        self.list.stats.instances_drawn += 1;

        let chamfered = tweak.chamfered
            && self.input.plan.options.variant == GeometryVariant::Render
            && region.triangle_c_count > 0;
        let triangles = if chamfered {
            region.triangles_c()
        } else {
            region.triangles()
        };

        if tweak.triangles {
            let range = triangles.clone();
            self.indexed(&base, DrawPass::Solid, Primitive::Triangles, range, region, object);
        }
        if tweak.edges {
            let range = region.edges();
            self.indexed(&base, DrawPass::Edges, Primitive::Lines, range, region, object);
        }
        if tweak.optional {
            let range = region.optional_lines();
            self.indexed(&base, DrawPass::OptionalLines, Primitive::Lines, range, region, object);
        }
        if tweak.wireframe {
            let range = triangles;
            self.indexed(&base, DrawPass::Wireframe, Primitive::Triangles, range, region, object);
        }

        if self.selected_part == Some(instance.part) {
            self.selection(&base, region, object);
        }
    }

    fn selection(&mut self, base: &RasterState, region: &DrawRegion, object: u32) {
        let tweak = self.input.tweak;

        if let Some(v) = clamp_selection(tweak.vertex, region.vertex_count) {
            let first = region.vertex_offset + v;
            let state = self.state(base, DrawPass::SelectedVertex);
            self.draw(
                state,
                DrawCall {
                    pass: DrawPass::SelectedVertex,
                    primitive: Primitive::Points,
                    range: first..first + 1,
                    base_vertex: 0,
                    indexed: false,
                    object,
                },
            );
        }

        if let Some(t) = clamp_selection(tweak.tri, region.triangle_count / TRIANGLE_INDICES) {
            let start = region.triangle_offset + t * TRIANGLE_INDICES;
            self.indexed(
                base,
                DrawPass::SelectedTriangle,
                Primitive::Triangles,
                start..start + TRIANGLE_INDICES,
                region,
                object,
            );
        }

        if let Some(e) = clamp_selection(tweak.edge, region.edge_count / LINE_INDICES) {
            let start = region.edge_offset + e * LINE_INDICES;
            self.indexed(
                base,
                DrawPass::SelectedEdge,
                Primitive::Lines,
                start..start + LINE_INDICES,
                region,
                object,
            );
        }
    }
}

/// Build the frame's draw list.
///
/// Instances are visited in model order. A debug filter (explicit or via
/// `tweak.part`) restricts drawing to one instance or one part; unresolved
/// instances and parts without geometry are skipped.
pub fn build_draw_list(input: &BatchInput<'_>) -> DrawList {
    let instance_count = input.model.instances.len();
    let part_count = input.source.part_count();
    let selected_part = input
        .tweak
        .part
        .map(|p| InstanceFilter::Part(PartId(p)))
        .and_then(|f| clamp_filter(f, instance_count, part_count));
    let filter = input
        .filter
        .and_then(|f| clamp_filter(f, instance_count, part_count))
        .or(selected_part);

    let mut batcher = Batcher {
        input,
        tracker: StateTracker::new(),
        list: DrawList::default(),
        blend: if input.tweak.transparency > 0.0 {
            BlendMode::Additive
        } else {
            BlendMode::Opaque
        },
        selected_part: match selected_part {
            Some(InstanceFilter::Part(p)) => Some(p),
            _ => None,
        },
    };

    // Colors are drawn for every instance so filtering never shifts them.
    let mut debug_colors = DebugColors::new(DEBUG_COLOR_SEED);

    for (i, instance) in input.model.instances.iter().enumerate() {
        let random = debug_colors.next_color();
        let excluded = match filter {
            Some(InstanceFilter::Instance(only)) => i as u32 != only,
            Some(InstanceFilter::Part(only)) => instance.part != only,
            None => false,
        };
        if excluded {
            continue;
        }

        let region = match input.plan.region(instance.part) {
            Some(region) if region.present && instance.part.is_valid() => *region,
            _ => {
                batcher.list.stats.instances_skipped += 1;
                continue;
            }
        };

        let color = if input.tweak.colors {
            input
                .source
                .material(instance.material)
                .map(|m| m.color_f32())
                .unwrap_or(random)
        } else {
            random
        };

        batcher.instance(instance, &region, color);
    }

    batcher.list
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::library;
    use crate::layout::{plan_layout, LayoutOptions};
    use crate::select::select_active_parts;
    use brickbatch_core::{LoadMode, LoaderConfig, MaterialId, RenderPartBuildMode};
    use brickbatch_library::PartLibrary;
    use glam::Mat4;

    struct Scene {
        lib: PartLibrary,
        model: Model,
        plan: LayoutPlan,
    }

    fn scene(instances: &str, options: LayoutOptions, config: LoaderConfig) -> Scene {
        let mut lib = library(config);
        let (_, model) = lib
            .resolve_model_str(instances, LoadMode::Immediate)
            .expect("should resolve");
        let active = select_active_parts(&model, lib.part_count());
        let plan = plan_layout(&active, &lib, options).expect("layout");
        Scene { lib, model, plan }
    }

    fn run(scene: &Scene, tweak: &Tweak, filter: Option<InstanceFilter>) -> DrawList {
        build_draw_list(&BatchInput {
            model: &scene.model,
            plan: &scene.plan,
            source: &scene.lib,
            tweak,
            filter,
        })
    }

    fn solid_only() -> Tweak {
        Tweak {
            wireframe: false,
            ..Default::default()
        }
    }

    const MIRROR: &str = "(-1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0)";

    #[test]
    fn test_empty_model_no_draws() {
        let s = scene("(instances: [])", LayoutOptions::default(), LoaderConfig::default());
        let list = run(&s, &Tweak::default(), None);
        assert!(list.ops.is_empty());
        assert!(list.objects.is_empty());
    }

    #[test]
    fn test_two_instances_share_region() {
        let ron = r#"(instances: [
            (part: "plain.dat", material: 4),
            (part: "plain.dat", material: 1, transform: (1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 5.0, 0.0, 0.0, 1.0)),
        ])"#;
        let s = scene(ron, LayoutOptions::default(), LoaderConfig::default());
        let list = run(&s, &solid_only(), None);

        let draws: Vec<_> = list.draws().collect();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].range, draws[1].range);
        assert_eq!(draws[0].base_vertex, draws[1].base_vertex);
        assert_ne!(draws[0].object, draws[1].object);
        assert_ne!(list.objects[0], list.objects[1]);
        assert_eq!(list.objects[1].material_id, 1);
        assert_eq!(list.objects[1].world[3][0], 5.0);
        // Cull, winding, fill, blend once; nothing re-issued for the second instance.
        assert_eq!(list.stats.state_changes(), 4);
    }

    #[test]
    fn test_front_face_matches_determinant() {
        let ron = format!(
            r#"(instances: [
                (part: "plain.dat", material: 4),
                (part: "plain.dat", material: 4, transform: {MIRROR}),
                (part: "plain.dat", material: 4, transform: {MIRROR}),
                (part: "complex.dat", material: 4),
            ])"#
        );
        let s = scene(&ron, LayoutOptions::default(), LoaderConfig::default());
        let list = run(&s, &Tweak::default(), None);

        let mut front_face = None;
        for op in &list.ops {
            match op {
                DrawOp::SetFrontFace(w) => front_face = Some(*w),
                DrawOp::Draw(call) => {
                    let world = Mat4::from_cols_array_2d(&list.objects[call.object as usize].world);
                    let expected = if world.determinant() > 0.0 {
                        Winding::Ccw
                    } else {
                        Winding::Cw
                    };
                    assert_eq!(front_face, Some(expected));
                }
                _ => {}
            }
        }
        assert_eq!(list.stats.winding_changes, 3);
    }

    #[test]
    fn test_double_sided_disables_cull() {
        let ron = r#"(instances: [
            (part: "plain.dat", material: 4),
            (part: "double.dat", material: 4),
            (part: "plain.dat", material: 4),
        ])"#;
        let s = scene(ron, LayoutOptions::default(), LoaderConfig::default());
        let list = run(&s, &solid_only(), None);
        let culls: Vec<bool> = list
            .ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::SetCull(c) => Some(*c),
                _ => None,
            })
            .collect();
        assert_eq!(culls, vec![true, false, true]);

        let no_cull = Tweak {
            cull: false,
            ..solid_only()
        };
        let list = run(&s, &no_cull, None);
        assert_eq!(list.stats.cull_changes, 1);
    }

    #[test]
    fn test_overlays_and_line_state() {
        let s = scene(
            r#"(instances: [(part: "plain.dat", material: 4)])"#,
            LayoutOptions::default(),
            LoaderConfig::default(),
        );
        let tweak = Tweak {
            edges: true,
            optional: true,
            ..Default::default()
        };
        let list = run(&s, &tweak, None);
        let passes: Vec<DrawPass> = list.draws().map(|d| d.pass).collect();
        assert_eq!(
            passes,
            vec![
                DrawPass::Solid,
                DrawPass::Edges,
                DrawPass::OptionalLines,
                DrawPass::Wireframe
            ]
        );
        let wire = list.draws().last().expect("wireframe draw");
        assert_eq!(wire.range, 0..6);
        assert!(list.ops.contains(&DrawOp::SetStipple(true)));
        assert!(list.ops.contains(&DrawOp::SetFill(FillMode::Line)));
        assert!(list.ops.contains(&DrawOp::SetLineWidth(2.0)));
        assert_eq!(list.ops.last(), Some(&DrawOp::Draw(wire.clone())));
    }

    #[test]
    fn test_line_widths() {
        assert_eq!(DrawPass::Edges.line_width(), Some(2.0));
        assert_eq!(DrawPass::OptionalLines.line_width(), Some(2.0));
        assert_eq!(DrawPass::Wireframe.line_width(), Some(1.0));
        assert_eq!(DrawPass::SelectedTriangle.line_width(), Some(8.0));
        assert_eq!(DrawPass::SelectedEdge.line_width(), Some(4.0));
        assert_eq!(DrawPass::Solid.line_width(), None);
    }

    #[test]
    fn test_wireframe_stippled_after_edges() {
        let s = scene(
            r#"(instances: [(part: "plain.dat", material: 4)])"#,
            LayoutOptions::default(),
            LoaderConfig::default(),
        );
        let tweak = Tweak {
            edges: true,
            ..Default::default()
        };
        let list = run(&s, &tweak, None);
        let stipples: Vec<bool> = list
            .ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::SetStipple(on) => Some(*on),
                _ => None,
            })
            .collect();
        // Solid does not care, edges are solid lines, wireframe is dashed.
        assert_eq!(stipples, vec![false, true]);
    }

    #[test]
    fn test_selected_triangle_not_culled() {
        let s = scene(
            r#"(instances: [(part: "plain.dat", material: 4)])"#,
            LayoutOptions::default(),
            LoaderConfig::default(),
        );
        let tweak = Tweak {
            part: Some(0),
            tri: Some(1),
            ..solid_only()
        };
        let list = run(&s, &tweak, None);
        let mut cull = None;
        for op in &list.ops {
            match op {
                DrawOp::SetCull(c) => cull = Some(*c),
                DrawOp::Draw(call) if call.pass == DrawPass::SelectedTriangle => {
                    assert_eq!(cull, Some(false));
                }
                DrawOp::Draw(call) if call.pass == DrawPass::Solid => {
                    assert_eq!(cull, Some(true));
                }
                _ => {}
            }
        }
        assert!(list.draws().any(|d| d.pass == DrawPass::SelectedTriangle));
    }

    #[test]
    fn test_chamfer_range_selection() {
        let ron = r#"(instances: [
            (part: "plain.dat", material: 4),
            (part: "complex.dat", material: 4),
        ])"#;
        let options = LayoutOptions {
            variant: GeometryVariant::Render,
            chamfer: true,
        };
        let s = scene(ron, options, LoaderConfig::default());
        let tweak = Tweak {
            chamfered: true,
            variant: GeometryVariant::Render,
            ..solid_only()
        };
        let list = run(&s, &tweak, None);
        let draws: Vec<_> = list.draws().collect();
        // plain.dat cannot chamfer and keeps its primary range.
        assert_eq!(draws[0].range, s.plan.regions[0].triangles());
        assert_eq!(draws[1].range, s.plan.regions[1].triangles_c());
        assert_eq!(draws[1].range.len(), 3);
    }

    #[test]
    fn test_missing_render_part_draws_nothing() {
        let config = LoaderConfig {
            build_mode: RenderPartBuildMode::OnDemand,
            ..Default::default()
        };
        let options = LayoutOptions {
            variant: GeometryVariant::Render,
            chamfer: false,
        };
        let s = scene(r#"(instances: [(part: "plain.dat", material: 4)])"#, options, config);
        let tweak = Tweak {
            part: Some(0),
            vertex: Some(0),
            tri: Some(0),
            edge: Some(0),
            ..Default::default()
        };
        let list = run(&s, &tweak, None);
        assert_eq!(list.draws().count(), 0);
        assert_eq!(list.stats.instances_skipped, 1);
    }

    #[test]
    fn test_selection_clamped() {
        let s = scene(
            r#"(instances: [(part: "plain.dat", material: 4), (part: "complex.dat", material: 4)])"#,
            LayoutOptions::default(),
            LoaderConfig::default(),
        );
        let tweak = Tweak {
            part: Some(1),
            vertex: Some(99),
            tri: Some(99),
            edge: Some(1),
            ..solid_only()
        };
        let list = run(&s, &tweak, None);
        let region = s.plan.regions[1];
        let draws: Vec<_> = list.draws().collect();
        // Only complex.dat is drawn: solid + vertex + triangle + edge.
        assert_eq!(draws.len(), 4);
        assert_eq!(draws[1].pass, DrawPass::SelectedVertex);
        assert_eq!(draws[1].range, region.vertex_offset + 3..region.vertex_offset + 4);
        assert!(!draws[1].indexed);
        assert_eq!(draws[2].range, region.triangle_offset + 3..region.triangle_offset + 6);
        assert_eq!(draws[3].range, region.edge_offset + 2..region.edge_offset + 4);
    }

    #[test]
    fn test_out_of_range_part_filter_clamped() {
        let s = scene(
            r#"(instances: [(part: "plain.dat", material: 4), (part: "double.dat", material: 4)])"#,
            LayoutOptions::default(),
            LoaderConfig::default(),
        );
        let list = run(&s, &solid_only(), Some(InstanceFilter::Part(PartId(40))));
        assert_eq!(list.stats.instances_drawn, 1);
        assert_eq!(list.objects.len(), 1);

        let list = run(&s, &solid_only(), Some(InstanceFilter::Instance(7)));
        assert_eq!(list.stats.instances_drawn, 1);
        assert_eq!(list.draws().next().map(|d| d.base_vertex), Some(4));
    }

    #[test]
    fn test_debug_colors_stable_under_filter() {
        let s = scene(
            r#"(instances: [(part: "plain.dat", material: 4), (part: "plain.dat", material: 4)])"#,
            LayoutOptions::default(),
            LoaderConfig::default(),
        );
        let tweak = Tweak {
            colors: false,
            ..solid_only()
        };
        let all = run(&s, &tweak, None);
        let second = run(&s, &tweak, Some(InstanceFilter::Instance(1)));
        assert_eq!(all.objects[1].color, second.objects[0].color);
        assert_ne!(all.objects[0].color, all.objects[1].color);

        let material = run(&s, &solid_only(), None);
        let red = s.lib.material(MaterialId(4)).expect("red").color_f32();
        assert_eq!(material.objects[0].color, red);
    }

    #[test]
    fn test_transparency_switches_blend() {
        let s = scene(
            r#"(instances: [(part: "plain.dat", material: 4)])"#,
            LayoutOptions::default(),
            LoaderConfig::default(),
        );
        let tweak = Tweak {
            transparency: 0.5,
            ..solid_only()
        };
        let list = run(&s, &tweak, None);
        assert!(list.ops.contains(&DrawOp::SetBlend(BlendMode::Additive)));
    }

    #[test]
    fn test_unresolved_instance_skipped() {
        let s = scene(
            r#"(instances: [(part: "nope.dat", material: 4), (part: "plain.dat", material: 4)])"#,
            LayoutOptions::default(),
            LoaderConfig::default(),
        );
        let list = run(&s, &solid_only(), None);
        assert_eq!(list.stats.instances_skipped, 1);
        assert_eq!(list.stats.instances_drawn, 1);
    }
}
