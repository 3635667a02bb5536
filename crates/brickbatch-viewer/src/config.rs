use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::ViewerError;

/// Read a RON config file (tweak or loader settings). Missing fields take
/// their defaults.
pub fn load_ron<T: DeserializeOwned>(path: &Path) -> Result<T, ViewerError> {
    let text = std::fs::read_to_string(path).map_err(|e| ViewerError::Config {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    ron::Options::default()
        .from_str(&text)
        .map_err(|e| ViewerError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use brickbatch_core::{GeometryVariant, LoadMode, LoaderConfig, PartFixMode, Tweak};
    use brickbatch_library::PartLibrary;

    use super::load_ron;

    #[test]
    fn test_tweak_partial_ron() {
        let tweak: Tweak = ron::Options::default()
            .from_str("(variant: Render, chamfered: true, part: Some(2))")
            .expect("parse");
        assert_eq!(tweak.variant, GeometryVariant::Render);
        assert!(tweak.chamfered);
        assert_eq!(tweak.part, Some(2));
        assert!(tweak.cull);
    }

    #[test]
    fn test_loader_partial_ron() {
        let loader: LoaderConfig = ron::Options::default()
            .from_str("(part_fix_mode: Weld)")
            .expect("parse");
        assert_eq!(loader.part_fix_mode, PartFixMode::Weld);
        assert_eq!(loader.chamfer, LoaderConfig::default().chamfer);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = load_ron::<Tweak>(Path::new("/nonexistent/tweak.ron"));
        assert!(matches!(err, Err(crate::error::ViewerError::Config { .. })));
    }

    #[test]
    fn test_bundled_assets_load() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("assets");
        let tweak: Tweak = load_ron(&dir.join("tweak.ron")).expect("tweak");
        assert_eq!(tweak.variant, GeometryVariant::Render);
        let loader: LoaderConfig = load_ron(&dir.join("loader.ron")).expect("loader");
        assert_eq!(loader.part_fix_mode, PartFixMode::Weld);

        let mut lib = PartLibrary::open(&dir.join("library.ron"), loader).expect("library");
        let (status, model) = lib
            .resolve_model(&dir.join("model.ron"), LoadMode::Immediate)
            .expect("model");
        assert!(status.is_success());
        assert_eq!(model.instances.len(), 5);
        assert_eq!(model.parts.len(), 3);
    }
}
