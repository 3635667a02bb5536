pub mod config;
pub mod constants;
pub mod error;
pub mod math;
pub mod part;
pub mod source;
pub mod types;

pub use config::{LoaderConfig, PartFixMode, RenderPartBuildMode, Tweak};
pub use error::RenderError;
pub use part::{Material, PartFlags, RenderPart, RenderPartFlags, RenderVertex, SourcePart};
pub use source::{LoadMode, PartSource, ResolveStatus};
pub use types::{GeometryVariant, Instance, InstanceFilter, MaterialId, Model, PartId};
