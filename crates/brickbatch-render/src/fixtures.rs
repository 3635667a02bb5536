//! Shared test fixtures: a small library of quads and model helpers.

use brickbatch_core::{LoadMode, LoaderConfig, Model};
use brickbatch_library::format::{ChamferDef, PartDef};
use brickbatch_library::PartLibrary;

/// A unit quad: 4 positions, 2 triangles, 3 edges, 1 optional line.
pub fn part_def(name: &str, complex: bool, chamfer: bool) -> PartDef {
    PartDef {
        name: name.to_string(),
        positions: vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ],
        triangles: vec![0, 1, 2, 0, 2, 3],
        lines: vec![0, 1, 1, 2, 2, 3],
        optional_lines: vec![0, 2],
        materials: complex.then(|| vec![4, 1]),
        double_sided: false,
        render: chamfer.then(|| ChamferDef {
            triangles_c: vec![0, 1, 3],
            materials_c: complex.then(|| vec![2]),
        }),
    }
}

/// Parts: 0 `plain.dat`, 1 `complex.dat` (complex + chamfer), 2 `unused.dat`
/// (chamfer), 3 `double.dat` (double sided).
pub fn library(config: LoaderConfig) -> PartLibrary {
    let mut double = part_def("double.dat", false, false);
    double.double_sided = true;
    PartLibrary::builder(config)
        .material(4, "Red", [201, 26, 9])
        .material(1, "Blue", [0, 85, 191])
        .part(part_def("plain.dat", false, false))
        .part(part_def("complex.dat", true, true))
        .part(part_def("unused.dat", false, true))
        .part(double)
        .build()
        .expect("valid library")
}

/// Resolve a model placing each named part once, identity transform, material 4.
pub fn resolve(lib: &mut PartLibrary, names: &[&str]) -> Model {
    let instances: Vec<String> = names
        .iter()
        .map(|n| format!("(part: \"{n}\", material: 4)"))
        .collect();
    let ron = format!("(instances: [{}])", instances.join(","));
    lib.resolve_model_str(&ron, LoadMode::Immediate)
        .expect("should resolve")
        .1
}
