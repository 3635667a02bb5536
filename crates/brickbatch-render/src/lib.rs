pub mod batch;
pub mod buffers;
pub mod executor;
pub mod invalidate;
pub mod layout;
pub mod scene;
pub mod select;
pub mod staging;

#[cfg(test)]
mod fixtures;

pub use batch::{build_draw_list, BatchInput, BatchStats, DrawCall, DrawList, DrawOp, DrawPass};
pub use buffers::{BufferSink, GpuSink, SceneBuffers};
pub use executor::{SceneRenderer, ViewUniforms, DEPTH_FORMAT};
pub use invalidate::{BuildSnapshot, DirtyReason, Invalidation, PackState};
pub use layout::{plan_layout, DrawRegion, LayoutOptions, LayoutPlan, LayoutTotals};
pub use scene::{PackStats, ScenePacker, SelectionInfo};
pub use select::{select_active_parts, ActiveParts};
pub use staging::{materialize, StagedBuffers};
