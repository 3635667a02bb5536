//! Frame-level entry point: owns the layout and decides when to repack.

use std::time::{Duration, Instant};

use brickbatch_core::{
    GeometryVariant, InstanceFilter, LoaderConfig, Model, PartId, PartSource, RenderError, Tweak,
};
use glam::Vec3;

use crate::batch::{build_draw_list, BatchInput, DrawList};
use crate::buffers::BufferSink;
use crate::invalidate::{BuildSnapshot, Invalidation, PackState};
use crate::layout::{plan_layout, LayoutOptions, LayoutPlan, LayoutTotals};
use crate::select::select_active_parts;
use crate::staging::materialize;

/// Summary of the last successful materialization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackStats {
    pub totals: LayoutTotals,
    pub active_parts: usize,
    pub bytes: u64,
    pub elapsed: Duration,
}

/// Readout for the selected part.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionInfo {
    pub part: PartId,
    pub name: String,
    /// Part-local position of the selected vertex, clamped to the part.
    pub vertex: Option<Vec3>,
}

pub struct ScenePacker {
    loader: LoaderConfig,
    variant: GeometryVariant,
    chamfer: bool,
    model_generation: u64,
    invalidation: Invalidation,
    plan: LayoutPlan,
    stats: Option<PackStats>,
}

impl ScenePacker {
    pub fn new(loader: LoaderConfig) -> Self {
        Self {
            loader,
            variant: GeometryVariant::Source,
            chamfer: false,
            model_generation: 0,
            invalidation: Invalidation::new(),
            plan: LayoutPlan::default(),
            stats: None,
        }
    }

    pub fn select_geometry_variant(&mut self, variant: GeometryVariant) {
        self.variant = variant;
    }

    pub fn set_chamfer_enabled(&mut self, enabled: bool) {
        self.chamfer = enabled;
    }

    /// Pick up the layout-affecting toggles of a tweak.
    pub fn apply_tweak(&mut self, tweak: &Tweak) {
        self.select_geometry_variant(tweak.variant);
        self.set_chamfer_enabled(tweak.chamfered);
    }

    /// The loader was recreated with `loader`. The packer stays out of
    /// `Clean` until the model is reloaded against it.
    pub fn notify_config_changed(&mut self, loader: &LoaderConfig) {
        if *loader != self.loader {
            log::debug!("Loader configuration changed: {loader:?}");
            self.loader = loader.clone();
            self.invalidation.require_reload(self.model_generation);
        }
    }

    pub fn notify_model_reloaded(&mut self) {
        self.model_generation += 1;
    }

    /// Repack on the next frame even if nothing changed.
    pub fn rebuild(&mut self) {
        self.invalidation.force();
    }

    pub fn snapshot(&self) -> BuildSnapshot {
        BuildSnapshot {
            loader: self.loader.clone(),
            variant: self.variant,
            chamfer: self.chamfer,
            model_generation: self.model_generation,
        }
    }

    pub fn state(&self) -> PackState {
        self.invalidation.state(&self.snapshot())
    }

    pub fn is_clean(&self) -> bool {
        self.state() == PackState::Clean
    }

    pub fn plan(&self) -> &LayoutPlan {
        &self.plan
    }

    pub fn stats(&self) -> Option<&PackStats> {
        self.stats.as_ref()
    }

    /// Repack into `sink` if dirty. Returns whether a materialization ran.
    ///
    /// An upload failure aborts the frame: the error is returned, the old
    /// plan and buffers stay, and the same inputs are not retried until
    /// something changes or [`rebuild`](Self::rebuild) is called.
    pub fn prepare_frame(
        &mut self,
        source: &dyn PartSource,
        model: &Model,
        sink: &mut dyn BufferSink,
    ) -> Result<bool, RenderError> {
        let snapshot = self.snapshot();
        let reason = match self.invalidation.state(&snapshot) {
            PackState::Clean | PackState::Failed => return Ok(false),
            PackState::AwaitReload => {
                log::debug!("Waiting for model reload before repacking");
                return Ok(false);
            }
            PackState::Dirty(reason) => reason,
        };
        log::debug!("Repacking scene: {reason:?}");

        let start = Instant::now();
        let active = select_active_parts(model, source.part_count());
        let options = LayoutOptions {
            variant: self.variant,
            chamfer: self.chamfer,
        };
        let plan = match plan_layout(&active, source, options) {
            Ok(plan) => plan,
            Err(e) => {
                log::warn!("Scene layout failed, frame aborted: {e}");
                self.invalidation.mark_failed(snapshot);
                return Err(e);
            }
        };
        let staged = materialize(&plan, source);

        if let Err(e) = sink.upload(&staged) {
            log::warn!("Scene materialization failed, frame aborted: {e}");
            self.invalidation.mark_failed(snapshot);
            return Err(e);
        }

        let stats = PackStats {
            totals: plan.totals,
            active_parts: active.count(),
            bytes: staged.total_bytes(),
            elapsed: start.elapsed(),
        };
        log::info!(
            "Packed {} parts: {} vertices, {} indices, {} materials ({} bytes) in {:.2?}",
            stats.active_parts,
            stats.totals.vertices,
            stats.totals.indices,
            stats.totals.materials,
            stats.bytes,
            stats.elapsed
        );
        self.plan = plan;
        self.stats = Some(stats);
        self.invalidation.mark_clean(snapshot);
        Ok(true)
    }

    /// Batch the frame. Fails with [`RenderError::NotClean`] unless the
    /// packed buffers match the current inputs.
    pub fn render(
        &self,
        source: &dyn PartSource,
        model: &Model,
        tweak: &Tweak,
        filter: Option<InstanceFilter>,
    ) -> Result<DrawList, RenderError> {
        if !self.is_clean() {
            return Err(RenderError::NotClean);
        }
        Ok(build_draw_list(&BatchInput {
            model,
            plan: &self.plan,
            source,
            tweak,
            filter,
        }))
    }

    /// Name and selected vertex of `tweak.part`, both clamped.
    pub fn selection_info(&self, source: &dyn PartSource, tweak: &Tweak) -> Option<SelectionInfo> {
        let last = source.part_count().checked_sub(1)?;
        let id = PartId(tweak.part?.min(last));
        let part = source.part(id)?;
        let vertex = tweak.vertex.and_then(|v| match self.variant {
            GeometryVariant::Source => {
                let last = part.positions.len().checked_sub(1)?;
                part.positions.get((v as usize).min(last)).copied()
            }
            GeometryVariant::Render => {
                let vertices = &source.render_part(id)?.vertices;
                let last = vertices.len().checked_sub(1)?;
                vertices.get((v as usize).min(last)).map(|rv| Vec3::from(rv.position))
            }
        });
        Some(SelectionInfo {
            part: id,
            name: part.name.clone(),
            vertex,
        })
    }
}
