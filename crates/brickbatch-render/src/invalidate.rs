//! Dirty-state tracking for the packed scene.
//!
//! The controller keeps the snapshot of the last successful materialization
//! and compares it against the current inputs every frame.

use brickbatch_core::{GeometryVariant, LoaderConfig};

/// Every input that changes the packed buffer layout.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildSnapshot {
    pub loader: LoaderConfig,
    pub variant: GeometryVariant,
    pub chamfer: bool,
    /// Incremented whenever the model is (re)loaded.
    pub model_generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyReason {
    /// Nothing materialized yet.
    Initial,
    LoaderConfig,
    Variant,
    Chamfer,
    Reload,
    /// Explicit rebuild request.
    Forced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackState {
    Clean,
    Dirty(DirtyReason),
    /// The loader changed but the model has not been reloaded against it yet.
    AwaitReload,
    /// The last attempt for these exact inputs failed. Waits for a change or
    /// an explicit rebuild.
    Failed,
}

/// Why `current` needs a rebuild relative to `previous`, if it does.
pub fn dirty_reason(previous: Option<&BuildSnapshot>, current: &BuildSnapshot) -> Option<DirtyReason> {
    let Some(previous) = previous else {
        return Some(DirtyReason::Initial);
    };
    if previous.loader != current.loader {
        Some(DirtyReason::LoaderConfig)
    } else if previous.variant != current.variant {
        Some(DirtyReason::Variant)
    } else if previous.chamfer != current.chamfer {
        Some(DirtyReason::Chamfer)
    } else if previous.model_generation != current.model_generation {
        Some(DirtyReason::Reload)
    } else {
        None
    }
}

#[derive(Debug, Default)]
pub struct Invalidation {
    clean: Option<BuildSnapshot>,
    failed: Option<BuildSnapshot>,
    forced: bool,
    /// Model generation current when the loader last changed. Only a later
    /// generation was loaded with the new loader.
    reload_after: Option<u64>,
}

impl Invalidation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, current: &BuildSnapshot) -> PackState {
        if self.reload_after.is_some_and(|g| current.model_generation <= g) {
            return PackState::AwaitReload;
        }
        if let Some(clean) = &self.clean {
            if clean.loader != current.loader && clean.model_generation == current.model_generation {
                return PackState::AwaitReload;
            }
        }
        if self.forced {
            return PackState::Dirty(DirtyReason::Forced);
        }
        if self.failed.as_ref() == Some(current) {
            return PackState::Failed;
        }
        match dirty_reason(self.clean.as_ref(), current) {
            Some(reason) => PackState::Dirty(reason),
            None => PackState::Clean,
        }
    }

    /// The loader changed while `generation` was the current model. The
    /// scene cannot become clean until a newer model is loaded.
    pub fn require_reload(&mut self, generation: u64) {
        self.reload_after = Some(generation);
    }

    /// Request a rebuild on the next frame even if nothing changed.
    pub fn force(&mut self) {
        self.forced = true;
    }

    pub fn mark_clean(&mut self, snapshot: BuildSnapshot) {
        if self.reload_after.is_some_and(|g| snapshot.model_generation > g) {
            self.reload_after = None;
        }
        self.clean = Some(snapshot);
        self.failed = None;
        self.forced = false;
    }

    /// Record a failed materialization. The previous clean snapshot is kept
    /// since its buffers are still resident.
    pub fn mark_failed(&mut self, snapshot: BuildSnapshot) {
        self.failed = Some(snapshot);
        self.forced = false;
    }
}
