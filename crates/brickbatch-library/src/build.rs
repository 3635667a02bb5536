//! Render-part derivation and the fork-join part builder.

use std::thread;

use brickbatch_core::constants::TRIANGLE_INDICES;
use brickbatch_core::math::face_normal;
use brickbatch_core::{MaterialId, RenderPart, RenderPartFlags, RenderVertex, SourcePart};
use glam::Vec3;

use crate::format::ChamferDef;

/// Derive the render variant of a part: one vertex per source position with
/// an area-weighted smooth normal. The chamfered set is kept only when the
/// library supplies one and `chamfer` is positive.
pub fn derive_render_part(
    source: &SourcePart,
    chamfer_def: Option<&ChamferDef>,
    chamfer: f32,
) -> RenderPart {
    let mut normals = vec![Vec3::ZERO; source.positions.len()];
    for tri in source.triangles.chunks_exact(TRIANGLE_INDICES as usize) {
        let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        let n = face_normal(source.positions[a], source.positions[b], source.positions[c]);
        normals[a] += n;
        normals[b] += n;
        normals[c] += n;
    }

    let vertices = source
        .positions
        .iter()
        .zip(&normals)
        .map(|(p, n)| RenderVertex {
            position: p.to_array(),
            normal: n.try_normalize().unwrap_or(Vec3::Y).to_array(),
        })
        .collect();

    let chamfer_def = chamfer_def.filter(|c| chamfer > 0.0 && !c.triangles_c.is_empty());
    let has_complex_material = source.flags.has_complex_material;

    RenderPart {
        vertices,
        triangles: source.triangles.clone(),
        triangles_c: chamfer_def.map(|c| c.triangles_c.clone()).unwrap_or_default(),
        lines: source.lines.clone(),
        materials: source.triangle_materials().map(<[MaterialId]>::to_vec),
        materials_c: chamfer_def
            .and_then(|c| c.materials_c.as_ref())
            .filter(|_| has_complex_material)
            .map(|m| m.iter().copied().map(MaterialId).collect()),
        flags: RenderPartFlags {
            can_chamfer: chamfer_def.is_some(),
            has_complex_material,
        },
    }
}

/// Split `items` into `workers` contiguous slices and run `f` on every item,
/// one scoped thread per slice. Returns once all workers have joined.
pub fn fork_join<T, F>(items: &mut [T], workers: usize, f: F)
where
    T: Send,
    F: Fn(&mut T) + Sync,
{
    let workers = workers.max(1);
    if workers == 1 || items.len() < 2 {
        items.iter_mut().for_each(&f);
        return;
    }

    let chunk = items.len().div_ceil(workers).max(1);
    let f = &f;
    thread::scope(|scope| {
        for slice in items.chunks_mut(chunk) {
            scope.spawn(move || slice.iter_mut().for_each(f));
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use brickbatch_core::PartFlags;

    fn tent() -> SourcePart {
        SourcePart {
            name: "tent.dat".into(),
            positions: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(5.0, 5.0, 5.0),
            ],
            triangles: vec![0, 1, 2],
            lines: vec![0, 1],
            materials: Some(vec![MaterialId(7)]),
            flags: PartFlags {
                no_backface_culling: false,
                has_complex_material: true,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_smooth_normals() {
        let render = derive_render_part(&tent(), None, 0.35);
        assert_eq!(render.num_vertices(), 4);
        assert_eq!(render.vertices[0].normal, [0.0, 0.0, 1.0]);
        // Unreferenced vertex falls back to +Y.
        assert_eq!(render.vertices[3].normal, [0.0, 1.0, 0.0]);
        assert_eq!(render.lines, vec![0, 1]);
        assert_eq!(render.triangle_materials(), Some(&[MaterialId(7)][..]));
        assert!(!render.flags.can_chamfer);
    }

    #[test]
    fn test_chamfer_requires_positive_amount() {
        let def = ChamferDef {
            triangles_c: vec![0, 1, 2],
            materials_c: Some(vec![9]),
        };
        let on = derive_render_part(&tent(), Some(&def), 0.35);
        assert!(on.flags.can_chamfer);
        assert_eq!(on.num_triangles_c(), 1);
        assert_eq!(on.chamfer_materials(), Some(&[MaterialId(9)][..]));

        let off = derive_render_part(&tent(), Some(&def), 0.0);
        assert!(!off.flags.can_chamfer);
        assert!(off.triangles_c.is_empty());
        assert!(off.materials_c.is_none());
    }

    #[test]
    fn test_fork_join_visits_every_item() {
        let mut items: Vec<u32> = (0..103).collect();
        fork_join(&mut items, 4, |x| *x *= 2);
        assert!(items.iter().enumerate().all(|(i, &x)| x == i as u32 * 2));
    }

    #[test]
    fn test_fork_join_more_workers_than_items() {
        let mut items = vec![1u32, 2, 3];
        fork_join(&mut items, 16, |x| *x += 1);
        assert_eq!(items, vec![2, 3, 4]);
    }
}
