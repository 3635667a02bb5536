use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use brickbatch_core::constants::WELD_EPSILON;
use brickbatch_core::{
    Instance, LoadMode, LoaderConfig, Material, MaterialId, Model, PartId, PartSource,
    RenderPart, RenderPartBuildMode, ResolveStatus, SourcePart,
};
use glam::Mat4;

use crate::build::{derive_render_part, fork_join};
use crate::error::LoadError;
use crate::fix::apply_fix;
use crate::format::{parse_library, parse_model, ChamferDef, LibraryFile, MaterialDef, PartDef};

/// One registered part. Geometry is exposed only once the part is built.
#[derive(Debug)]
struct PartEntry {
    source: SourcePart,
    chamfer: Option<ChamferDef>,
    render: Option<RenderPart>,
    built: bool,
}

impl PartEntry {
    fn build(&mut self, config: &LoaderConfig) {
        if self.built {
            return;
        }
        apply_fix(
            &mut self.source,
            self.chamfer.as_mut(),
            config.part_fix_mode,
            WELD_EPSILON,
        );
        if config.build_mode == RenderPartBuildMode::OnLoad {
            self.build_render(config.chamfer);
        }
        self.built = true;
    }

    fn build_render(&mut self, chamfer: f32) {
        if self.render.is_none() {
            self.render = Some(derive_render_part(
                &self.source,
                self.chamfer.as_ref(),
                chamfer,
            ));
        }
    }
}

/// Registry of parts and materials loaded from a library file.
///
/// Parts are registered up front with dense ids in file order and built
/// lazily when a model references them. A library is tied to the
/// `LoaderConfig` it was created with; a new config means a new library.
#[derive(Debug)]
pub struct PartLibrary {
    config: LoaderConfig,
    parts: Vec<PartEntry>,
    names: HashMap<String, PartId>,
    materials: HashMap<MaterialId, Material>,
    pending: usize,
}

impl PartLibrary {
    pub fn builder(config: LoaderConfig) -> PartLibraryBuilder {
        PartLibraryBuilder {
            config,
            file: LibraryFile {
                materials: Vec::new(),
                parts: Vec::new(),
            },
        }
    }

    pub fn from_ron_str(ron_str: &str, config: LoaderConfig) -> Result<Self, LoadError> {
        let file = parse_library(ron_str)?;
        Self::from_file(file, config)
    }

    pub fn open(path: &Path, config: LoaderConfig) -> Result<Self, LoadError> {
        let text = read(path)?;
        let library = Self::from_ron_str(&text, config)?;
        log::info!(
            "Opened part library {} ({} parts, {} materials)",
            path.display(),
            library.parts.len(),
            library.materials.len()
        );
        Ok(library)
    }

    fn from_file(file: LibraryFile, config: LoaderConfig) -> Result<Self, LoadError> {
        let mut names = HashMap::with_capacity(file.parts.len());
        let mut parts = Vec::with_capacity(file.parts.len());
        for def in &file.parts {
            def.validate()?;
            let id = PartId(parts.len() as u32);
            if names.insert(def.name.clone(), id).is_some() {
                return Err(LoadError::DuplicatePart(def.name.clone()));
            }
            parts.push(PartEntry {
                source: def.to_source_part(),
                chamfer: def.render.clone(),
                render: None,
                built: false,
            });
        }

        let materials = file.materials.iter().map(MaterialDef::to_material).collect();

        Ok(Self {
            config,
            parts,
            names,
            materials,
            pending: 0,
        })
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn part_id(&self, name: &str) -> Option<PartId> {
        self.names.get(name).copied()
    }

    /// Resolve a model file against this library.
    pub fn resolve_model(
        &mut self,
        path: &Path,
        mode: LoadMode,
    ) -> Result<(ResolveStatus, Model), LoadError> {
        let text = read(path)?;
        self.resolve_model_str(&text, mode)
    }

    /// Resolve model RON text. Unknown part names resolve to
    /// `PartId::INVALID` and downgrade the status to a warning. In
    /// `Immediate` mode referenced parts are built before returning; in
    /// `Deferred` mode the caller must run [`Self::build_deferred`].
    pub fn resolve_model_str(
        &mut self,
        ron_str: &str,
        mode: LoadMode,
    ) -> Result<(ResolveStatus, Model), LoadError> {
        let start = Instant::now();
        let file = parse_model(ron_str)?;

        let mut status = ResolveStatus::Success;
        let instances = file
            .instances
            .iter()
            .map(|def| {
                let part = match self.part_id(&def.part) {
                    Some(id) => id,
                    None => {
                        log::warn!("Part '{}' not found in library", def.part);
                        status = ResolveStatus::WarningPartNotFound;
                        PartId::INVALID
                    }
                };
                Instance::new(
                    part,
                    Mat4::from_cols_array(&def.transform),
                    MaterialId(def.material),
                )
            })
            .collect();
        let model = Model::from_instances(instances);

        match mode {
            LoadMode::Immediate => {
                for id in &model.parts {
                    self.parts[id.index()].build(&self.config);
                }
            }
            LoadMode::Deferred => {
                self.pending = self.parts.iter().filter(|e| !e.built).count();
            }
        }

        log::info!(
            "Resolved model: {} instances, {} distinct parts in {:.2?}",
            model.instances.len(),
            model.parts.len(),
            start.elapsed()
        );
        Ok((status, model))
    }

    /// Build every registered part that is not built yet, splitting the
    /// part ids evenly across `workers` threads. Returns the number of
    /// parts built.
    pub fn build_deferred(&mut self, workers: usize) -> usize {
        let start = Instant::now();
        let config = &self.config;
        let mut targets: Vec<&mut PartEntry> =
            self.parts.iter_mut().filter(|e| !e.built).collect();
        let built = targets.len();
        fork_join(&mut targets, workers, |entry| entry.build(config));

        self.pending = 0;
        log::info!(
            "Built {} deferred parts on {} workers in {:.2?}",
            built,
            workers.max(1),
            start.elapsed()
        );
        built
    }

    /// Parts registered by a deferred resolve that still await building.
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Derive render parts for `ids` when the library builds them on demand.
    pub fn build_render_parts(&mut self, ids: &[PartId]) {
        let chamfer = self.config.chamfer;
        for id in ids {
            if let Some(entry) = self.parts.get_mut(id.index()).filter(|e| e.built) {
                entry.build_render(chamfer);
            }
        }
    }
}

impl PartSource for PartLibrary {
    fn part_count(&self) -> u32 {
        self.parts.len() as u32
    }

    fn part(&self, id: PartId) -> Option<&SourcePart> {
        self.parts
            .get(id.index())
            .filter(|e| e.built)
            .map(|e| &e.source)
    }

    fn render_part(&self, id: PartId) -> Option<&RenderPart> {
        self.parts.get(id.index()).and_then(|e| e.render.as_ref())
    }

    fn material_count(&self) -> u32 {
        self.materials.len() as u32
    }

    fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(&id)
    }

    fn supports_parallel_build(&self) -> bool {
        true
    }
}

/// Assembles a library in code.
pub struct PartLibraryBuilder {
    config: LoaderConfig,
    file: LibraryFile,
}

impl PartLibraryBuilder {
    pub fn material(mut self, id: u32, name: &str, color: [u8; 3]) -> Self {
        self.file.materials.push(MaterialDef {
            id,
            name: name.to_string(),
            color,
            alpha: 255,
        });
        self
    }

    pub fn part(mut self, def: PartDef) -> Self {
        self.file.parts.push(def);
        self
    }

    pub fn build(self) -> Result<PartLibrary, LoadError> {
        PartLibrary::from_file(self.file, self.config)
    }
}

fn read(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: PathBuf::from(path),
        source,
    })
}
