use std::ops::Range;

use brickbatch_core::constants::{RENDER_VERTEX_STRIDE, SOURCE_VERTEX_STRIDE};
use brickbatch_core::{GeometryVariant, PartId, PartSource, RenderError};

use crate::select::ActiveParts;

/// Where one part's geometry lives inside the shared buffers.
///
/// All counts and offsets are in elements: vertices for the vertex fields,
/// `u32` indices for the index fields, material ids for the material fields.
/// Index values stay part-local; draws add `vertex_offset` as base vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrawRegion {
    /// False for inactive parts and parts without geometry in the variant.
    pub present: bool,
    pub vertex_count: u32,
    pub vertex_offset: u32,
    pub triangle_count: u32,
    pub triangle_offset: u32,
    pub triangle_c_count: u32,
    pub triangle_c_offset: u32,
    pub edge_count: u32,
    pub edge_offset: u32,
    pub optional_count: u32,
    pub optional_offset: u32,
    pub material_count: u32,
    pub material_offset: u32,
    pub material_c_count: u32,
    pub material_c_offset: u32,
}

impl DrawRegion {
    pub fn triangles(&self) -> Range<u32> {
        self.triangle_offset..self.triangle_offset + self.triangle_count
    }

    pub fn triangles_c(&self) -> Range<u32> {
        self.triangle_c_offset..self.triangle_c_offset + self.triangle_c_count
    }

    pub fn edges(&self) -> Range<u32> {
        self.edge_offset..self.edge_offset + self.edge_count
    }

    pub fn optional_lines(&self) -> Range<u32> {
        self.optional_offset..self.optional_offset + self.optional_count
    }

    /// Indices occupied in the shared index buffer.
    pub fn index_count(&self) -> u32 {
        self.triangle_count + self.triangle_c_count + self.edge_count + self.optional_count
    }

    pub fn materials_total(&self) -> u32 {
        self.material_count + self.material_c_count
    }
}

/// Grand totals of a layout, in elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayoutTotals {
    pub vertices: u32,
    pub indices: u32,
    pub materials: u32,
}

/// Layout-affecting inputs. Everything else is a draw-time toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayoutOptions {
    pub variant: GeometryVariant,
    /// Pack chamfered triangle sets (render variant only).
    pub chamfer: bool,
}

/// Output of the layout planner: one region per registered part id.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LayoutPlan {
    pub regions: Vec<DrawRegion>,
    pub totals: LayoutTotals,
    pub options: LayoutOptions,
}

impl LayoutPlan {
    pub fn region(&self, id: PartId) -> Option<&DrawRegion> {
        self.regions.get(id.index())
    }

    pub fn vertex_stride(&self) -> u64 {
        match self.options.variant {
            GeometryVariant::Source => SOURCE_VERTEX_STRIDE,
            GeometryVariant::Render => RENDER_VERTEX_STRIDE,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.totals == LayoutTotals::default()
    }
}

#[derive(Default)]
struct Cursor {
    vertices: u32,
    indices: u32,
    materials: u32,
}

/// Reserve `count` elements at the end of a running total.
fn advance(total: &mut u32, count: u32, label: &'static str) -> Result<u32, RenderError> {
    let offset = *total;
    *total = offset
        .checked_add(count)
        .ok_or(RenderError::LayoutOverflow { label })?;
    Ok(offset)
}

impl Cursor {
    fn take_vertices(&mut self, count: u32) -> Result<u32, RenderError> {
        advance(&mut self.vertices, count, "vertex")
    }

    fn take_indices(&mut self, count: u32) -> Result<u32, RenderError> {
        advance(&mut self.indices, count, "index")
    }

    fn take_materials(&mut self, count: u32) -> Result<u32, RenderError> {
        advance(&mut self.materials, count, "material")
    }
}

/// Compute every active part's region, ascending by id. Sub-regions are
/// appended in a fixed order: vertices, triangles, edges, then optional
/// lines (source) or chamfered triangles (render); materials primary first.
///
/// Fails with [`RenderError::LayoutOverflow`] if a total no longer fits the
/// 32-bit offsets of the shared buffers.
pub fn plan_layout(
    active: &ActiveParts,
    source: &dyn PartSource,
    options: LayoutOptions,
) -> Result<LayoutPlan, RenderError> {
    let part_count = source.part_count() as usize;
    let mut regions = vec![DrawRegion::default(); part_count];
    let mut cursor = Cursor::default();

    for id in active.iter() {
        let Some(region) = regions.get_mut(id.index()) else {
            continue;
        };
        let planned = match options.variant {
            GeometryVariant::Source => plan_source(id, source, &mut cursor)?,
            GeometryVariant::Render => plan_render(id, source, options.chamfer, &mut cursor)?,
        };
        if let Some(planned) = planned {
            *region = planned;
        }
    }

    Ok(LayoutPlan {
        regions,
        totals: LayoutTotals {
            vertices: cursor.vertices,
            indices: cursor.indices,
            materials: cursor.materials,
        },
        options,
    })
}

fn plan_source(
    id: PartId,
    source: &dyn PartSource,
    cursor: &mut Cursor,
) -> Result<Option<DrawRegion>, RenderError> {
    let Some(part) = source.part(id) else {
        return Ok(None);
    };
    let mut region = DrawRegion {
        present: true,
        vertex_count: part.num_positions(),
        triangle_count: part.triangles.len() as u32,
        edge_count: part.lines.len() as u32,
        optional_count: part.optional_lines.len() as u32,
        ..Default::default()
    };
    region.vertex_offset = cursor.take_vertices(region.vertex_count)?;
    region.triangle_offset = cursor.take_indices(region.triangle_count)?;
    region.edge_offset = cursor.take_indices(region.edge_count)?;
    region.optional_offset = cursor.take_indices(region.optional_count)?;
    region.triangle_c_offset = cursor.indices;

    region.material_offset = cursor.materials;
    region.material_c_offset = cursor.materials;
    if let Some(materials) = part.triangle_materials() {
        region.material_count = materials.len() as u32;
        region.material_offset = cursor.take_materials(region.material_count)?;
        region.material_c_offset = cursor.materials;
    }
    Ok(Some(region))
}

fn plan_render(
    id: PartId,
    source: &dyn PartSource,
    chamfer: bool,
    cursor: &mut Cursor,
) -> Result<Option<DrawRegion>, RenderError> {
    let Some(part) = source.render_part(id) else {
        return Ok(None);
    };
    let pack_chamfer = chamfer && part.flags.can_chamfer;
    let mut region = DrawRegion {
        present: true,
        vertex_count: part.num_vertices(),
        triangle_count: part.triangles.len() as u32,
        edge_count: part.lines.len() as u32,
        triangle_c_count: if pack_chamfer {
            part.triangles_c.len() as u32
        } else {
            0
        },
        ..Default::default()
    };
    region.vertex_offset = cursor.take_vertices(region.vertex_count)?;
    region.triangle_offset = cursor.take_indices(region.triangle_count)?;
    region.edge_offset = cursor.take_indices(region.edge_count)?;
    region.optional_offset = cursor.indices;
    region.triangle_c_offset = cursor.take_indices(region.triangle_c_count)?;

    region.material_offset = cursor.materials;
    if let Some(materials) = part.triangle_materials() {
        region.material_count = materials.len() as u32;
        region.material_offset = cursor.take_materials(region.material_count)?;
    }
    region.material_c_offset = cursor.materials;
    if let Some(materials_c) = part.chamfer_materials().filter(|_| pack_chamfer) {
        region.material_c_count = materials_c.len() as u32;
        region.material_c_offset = cursor.take_materials(region.material_c_count)?;
    }
    Ok(Some(region))
}
