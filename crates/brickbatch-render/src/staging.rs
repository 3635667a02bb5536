use brickbatch_core::constants::{INDEX_STRIDE, MATERIAL_ID_STRIDE};
use brickbatch_core::{GeometryVariant, MaterialId, PartId, PartSource};

use crate::layout::{DrawRegion, LayoutPlan};

/// CPU copy of the three shared buffers, laid out exactly as the plan says.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StagedBuffers {
    pub vertex: Vec<u8>,
    pub index: Vec<u8>,
    pub material: Vec<u8>,
    pub variant: GeometryVariant,
    pub vertex_stride: u64,
}

impl StagedBuffers {
    pub fn total_bytes(&self) -> u64 {
        (self.vertex.len() + self.index.len() + self.material.len()) as u64
    }
}

fn write<T: bytemuck::Pod>(dst: &mut [u8], element_offset: u32, stride: u64, data: &[T]) {
    let bytes: &[u8] = bytemuck::cast_slice(data);
    let start = element_offset as usize * stride as usize;
    match dst.get_mut(start..start + bytes.len()) {
        Some(region) => region.copy_from_slice(bytes),
        None => log::warn!(
            "Staging write of {} bytes at {} overruns a {} byte buffer",
            bytes.len(),
            start,
            dst.len()
        ),
    }
}

/// Copy every present region's geometry into freshly zeroed staging
/// buffers, ascending by part id. The same plan and source always produce
/// byte-identical output.
pub fn materialize(plan: &LayoutPlan, source: &dyn PartSource) -> StagedBuffers {
    let vertex_stride = plan.vertex_stride();
    let mut staged = StagedBuffers {
        vertex: vec![0; plan.totals.vertices as usize * vertex_stride as usize],
        index: vec![0; plan.totals.indices as usize * INDEX_STRIDE as usize],
        material: vec![0; plan.totals.materials as usize * MATERIAL_ID_STRIDE as usize],
        variant: plan.options.variant,
        vertex_stride,
    };

    for (i, region) in plan.regions.iter().enumerate() {
        if !region.present {
            continue;
        }
        let id = PartId(i as u32);
        match plan.options.variant {
            GeometryVariant::Source => stage_source(&mut staged, id, region, source),
            GeometryVariant::Render => stage_render(&mut staged, id, region, source),
        }
    }
    staged
}

fn stage_source(
    staged: &mut StagedBuffers,
    id: PartId,
    region: &DrawRegion,
    source: &dyn PartSource,
) {
    let Some(part) = source.part(id) else {
        return;
    };
    let positions: Vec<[f32; 3]> = part.positions.iter().map(|p| p.to_array()).collect();
    write(&mut staged.vertex, region.vertex_offset, staged.vertex_stride, &positions);
    write(&mut staged.index, region.triangle_offset, INDEX_STRIDE, &part.triangles);
    write(&mut staged.index, region.edge_offset, INDEX_STRIDE, &part.lines);
    write(&mut staged.index, region.optional_offset, INDEX_STRIDE, &part.optional_lines);
    if region.material_count > 0 {
        if let Some(materials) = part.triangle_materials() {
            write_materials(staged, region.material_offset, materials);
        }
    }
}

fn stage_render(
    staged: &mut StagedBuffers,
    id: PartId,
    region: &DrawRegion,
    source: &dyn PartSource,
) {
    let Some(part) = source.render_part(id) else {
        return;
    };
    write(&mut staged.vertex, region.vertex_offset, staged.vertex_stride, &part.vertices);
    write(&mut staged.index, region.triangle_offset, INDEX_STRIDE, &part.triangles);
    write(&mut staged.index, region.edge_offset, INDEX_STRIDE, &part.lines);
    if region.triangle_c_count > 0 {
        write(&mut staged.index, region.triangle_c_offset, INDEX_STRIDE, &part.triangles_c);
    }
    if region.material_count > 0 {
        if let Some(materials) = part.triangle_materials() {
            write_materials(staged, region.material_offset, materials);
        }
    }
    if region.material_c_count > 0 {
        if let Some(materials_c) = part.chamfer_materials() {
            write_materials(staged, region.material_c_offset, materials_c);
        }
    }
}

fn write_materials(staged: &mut StagedBuffers, offset: u32, materials: &[MaterialId]) {
    write(&mut staged.material, offset, MATERIAL_ID_STRIDE, materials);
}
