use crate::part::{Material, RenderPart, SourcePart};
use crate::types::{MaterialId, PartId};

/// Non-fatal outcome of resolving a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveStatus {
    Success,
    /// At least one referenced part could not be found; its instances carry
    /// `PartId::INVALID`.
    WarningPartNotFound,
}

impl ResolveStatus {
    pub fn is_success(self) -> bool {
        self == ResolveStatus::Success
    }
}

/// Whether part geometry is built while the model resolves or afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    #[default]
    Immediate,
    /// Parts are registered only; the caller builds them (possibly in
    /// parallel) and then finishes the model.
    Deferred,
}

/// Read-only registry of parts and materials, indexed by dense id.
///
/// The packer and batcher never mutate the source; the owning loader may only
/// change it between materialization passes.
pub trait PartSource {
    /// Number of registered parts. Valid ids are `0..part_count()`.
    fn part_count(&self) -> u32;

    fn part(&self, id: PartId) -> Option<&SourcePart>;

    /// Render variant of a part. `None` if it was never built.
    fn render_part(&self, id: PartId) -> Option<&RenderPart>;

    fn material_count(&self) -> u32;

    fn material(&self, id: MaterialId) -> Option<&Material>;

    /// Whether the source can build deferred parts on a fork-join worker pool.
    fn supports_parallel_build(&self) -> bool {
        false
    }
}
