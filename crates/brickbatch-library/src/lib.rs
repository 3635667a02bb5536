//! In-memory part library: the geometry source the packer reads from.

pub mod build;
pub mod error;
pub mod fix;
pub mod format;
pub mod library;

pub use error::LoadError;
pub use library::{PartLibrary, PartLibraryBuilder};
