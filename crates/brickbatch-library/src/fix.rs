//! Source geometry repair applied by the loader.

use std::collections::HashMap;

use brickbatch_core::constants::{LINE_INDICES, TRIANGLE_INDICES};
use brickbatch_core::{PartFixMode, SourcePart};
use glam::Vec3;

use crate::format::ChamferDef;

/// Repair a part in place according to `mode`. A supplied chamfered
/// triangle set is remapped alongside the primary triangles.
pub fn apply_fix(
    part: &mut SourcePart,
    chamfer: Option<&mut ChamferDef>,
    mode: PartFixMode,
    epsilon: f32,
) {
    match mode {
        PartFixMode::None => {}
        PartFixMode::Weld => {
            let remap = weld_positions(part, epsilon);

            let (triangles, kept) = remap_triangles(&part.triangles, &remap);
            part.triangles = triangles;
            if let Some(materials) = part.materials.as_mut() {
                *materials = keep(materials, &kept);
            }
            part.lines = remap_lines(&part.lines, &remap);
            part.optional_lines = remap_lines(&part.optional_lines, &remap);

            if let Some(chamfer) = chamfer {
                let (triangles_c, kept) = remap_triangles(&chamfer.triangles_c, &remap);
                chamfer.triangles_c = triangles_c;
                if let Some(materials_c) = chamfer.materials_c.as_mut() {
                    *materials_c = keep(materials_c, &kept);
                }
            }
        }
    }
}

type Cell = (i64, i64, i64);

fn cell(p: Vec3, epsilon: f32) -> Cell {
    let q = (p / epsilon).floor();
    (q.x as i64, q.y as i64, q.z as i64)
}

/// Merge each position into the first kept position within `epsilon` of it.
/// Cells are `epsilon` wide, so every candidate lies in one of the 27 cells
/// around the position's own. Returns the old-to-new index table.
fn weld_positions(part: &mut SourcePart, epsilon: f32) -> Vec<u32> {
    let mut cells: HashMap<Cell, Vec<u32>> = HashMap::new();
    let mut positions: Vec<Vec3> = Vec::with_capacity(part.positions.len());
    let mut remap = Vec::with_capacity(part.positions.len());
    for &p in &part.positions {
        let (x, y, z) = cell(p, epsilon);
        let mut found: Option<u32> = None;
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(candidates) = cells.get(&(x + dx, y + dy, z + dz)) else {
                        continue;
                    };
                    for &c in candidates {
                        if positions[c as usize].distance(p) <= epsilon
                            && found.map_or(true, |f| c < f)
                        {
                            found = Some(c);
                        }
                    }
                }
            }
        }
        let index = match found {
            Some(index) => index,
            None => {
                let index = positions.len() as u32;
                positions.push(p);
                cells.entry((x, y, z)).or_default().push(index);
                index
            }
        };
        remap.push(index);
    }

    let merged = part.positions.len() - positions.len();
    if merged > 0 {
        log::debug!("Welded {} positions in '{}'", merged, part.name);
    }
    part.positions = positions;
    remap
}

/// Remap a triangle list, dropping triangles that collapsed. Also returns
/// the indices of the surviving triangles.
fn remap_triangles(triangles: &[u32], remap: &[u32]) -> (Vec<u32>, Vec<usize>) {
    let mut out = Vec::with_capacity(triangles.len());
    let mut kept = Vec::with_capacity(triangles.len() / TRIANGLE_INDICES as usize);
    for (t, tri) in triangles.chunks_exact(TRIANGLE_INDICES as usize).enumerate() {
        let (a, b, c) = (
            remap[tri[0] as usize],
            remap[tri[1] as usize],
            remap[tri[2] as usize],
        );
        if a == b || b == c || a == c {
            continue;
        }
        out.extend_from_slice(&[a, b, c]);
        kept.push(t);
    }
    (out, kept)
}

fn remap_lines(lines: &[u32], remap: &[u32]) -> Vec<u32> {
    lines
        .chunks_exact(LINE_INDICES as usize)
        .map(|l| (remap[l[0] as usize], remap[l[1] as usize]))
        .filter(|(a, b)| a != b)
        .flat_map(|(a, b)| [a, b])
        .collect()
}

fn keep<T: Copy>(values: &[T], kept: &[usize]) -> Vec<T> {
    kept.iter().filter_map(|&i| values.get(i).copied()).collect()
}
