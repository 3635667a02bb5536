use std::path::{Path, PathBuf};
use std::time::Instant;

use brickbatch_core::{
    InstanceFilter, LoadMode, LoaderConfig, Model, PartSource, RenderPartBuildMode, ResolveStatus,
    Tweak,
};
use brickbatch_library::PartLibrary;
use brickbatch_render::{
    GpuSink, SceneBuffers, ScenePacker, SceneRenderer, SelectionInfo, ViewUniforms,
};
use glam::{Mat4, Vec3};

use crate::error::ViewerError;
use crate::gpu::{Gpu, Targets, COLOR_FORMAT};
use crate::report::FrameRecord;

/// Fixed look-at camera framing the loaded model.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::ZERO,
            far: 100.0,
        }
    }
}

impl Camera {
    /// Frame the world-space bounds of every resolved instance.
    pub fn fit(source: &dyn PartSource, model: &Model) -> Self {
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        for instance in &model.instances {
            let Some(part) = source.part(instance.part) else {
                continue;
            };
            for p in &part.positions {
                let w = instance.transform.transform_point3(*p);
                min = min.min(w);
                max = max.max(w);
            }
        }
        if min.x > max.x {
            return Self::default();
        }
        let target = (min + max) * 0.5;
        let radius = ((max - min).length() * 0.5).max(1.0);
        Self {
            eye: target + Vec3::new(1.0, 0.8, 1.5).normalize() * radius * 3.0,
            target,
            far: radius * 10.0,
        }
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, Vec3::Y)
    }

    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(45f32.to_radians(), aspect, self.far * 1.0e-3, self.far)
    }
}

/// Worker threads for a deferred build. Sources that cannot build in
/// parallel get one.
pub fn deferred_workers(source: &dyn PartSource, requested: usize) -> usize {
    if source.supports_parallel_build() {
        requested.max(1)
    } else {
        if requested > 1 {
            log::debug!("Part source builds serially, ignoring {requested} workers");
        }
        1
    }
}

/// Owns the library, the model and every GPU resource of the viewer.
pub struct App {
    gpu: Gpu,
    loader: LoaderConfig,
    library_path: PathBuf,
    library: Option<PartLibrary>,
    model_path: Option<PathBuf>,
    model: Option<Model>,
    status: Option<ResolveStatus>,
    load_mode: LoadMode,
    workers: usize,
    packer: ScenePacker,
    buffers: SceneBuffers,
    renderer: SceneRenderer,
    targets: Targets,
    camera: Camera,
    start: Instant,
    frame_index: u32,
}

impl App {
    pub fn new(
        gpu: Gpu,
        library_path: PathBuf,
        loader: LoaderConfig,
        width: u32,
        height: u32,
    ) -> Result<Self, ViewerError> {
        let renderer = SceneRenderer::new(&gpu.device, COLOR_FORMAT)?;
        let targets = Targets::new(&gpu.device, width, height);
        Ok(Self {
            packer: ScenePacker::new(loader.clone()),
            gpu,
            loader,
            library_path,
            library: None,
            model_path: None,
            model: None,
            status: None,
            load_mode: LoadMode::Immediate,
            workers: 1,
            buffers: SceneBuffers::new(),
            renderer,
            targets,
            camera: Camera::default(),
            start: Instant::now(),
            frame_index: 0,
        })
    }

    /// Resolve parts on `workers` threads after the model is read.
    pub fn set_deferred(&mut self, workers: usize) {
        self.load_mode = LoadMode::Deferred;
        self.workers = workers.max(1);
    }

    pub fn gpu(&self) -> &Gpu {
        &self.gpu
    }

    pub fn packer(&self) -> &ScenePacker {
        &self.packer
    }

    pub fn model(&self) -> Option<&Model> {
        self.model.as_ref()
    }

    pub fn status(&self) -> Option<ResolveStatus> {
        self.status
    }

    /// Load a model. On failure nothing changes: the previous model and its
    /// packed buffers stay in use.
    pub fn load_model(&mut self, path: &Path) -> Result<ResolveStatus, ViewerError> {
        let mut library = match self.library.take() {
            Some(library) => library,
            None => PartLibrary::open(&self.library_path, self.loader.clone())?,
        };
        let (status, model) = match library.resolve_model(path, self.load_mode) {
            Ok(resolved) => resolved,
            Err(e) => {
                self.library = Some(library);
                return Err(e.into());
            }
        };

        if self.load_mode == LoadMode::Deferred {
            library.build_deferred(deferred_workers(&library, self.workers));
        }
        if self.loader.build_mode == RenderPartBuildMode::OnDemand {
            library.build_render_parts(&model.parts);
        }
        if !status.is_success() {
            log::warn!("Model {} references unknown parts", path.display());
        }

        self.camera = Camera::fit(&library, &model);
        self.library = Some(library);
        self.model = Some(model);
        self.model_path = Some(path.to_path_buf());
        self.status = Some(status);
        self.packer.notify_model_reloaded();
        Ok(status)
    }

    /// Recreate the library with `loader` and reload the current model
    /// against it.
    pub fn set_loader_config(&mut self, loader: LoaderConfig) -> Result<(), ViewerError> {
        if loader == self.loader {
            return Ok(());
        }
        log::info!("Recreating part library: {loader:?}");
        self.loader = loader;
        self.library = None;
        self.packer.notify_config_changed(&self.loader);
        if let Some(path) = self.model_path.clone() {
            self.load_model(&path)?;
        }
        Ok(())
    }

    /// Force a repack on the next frame.
    pub fn rebuild(&mut self) {
        self.packer.rebuild();
    }

    pub fn selection_info(&self, tweak: &Tweak) -> Option<SelectionInfo> {
        let library = self.library.as_ref()?;
        self.packer.selection_info(library, tweak)
    }

    /// Pack if needed, batch and submit one frame.
    pub fn frame(
        &mut self,
        tweak: &Tweak,
        filter: Option<InstanceFilter>,
    ) -> Result<FrameRecord, ViewerError> {
        let (Some(library), Some(model)) = (self.library.as_ref(), self.model.as_ref()) else {
            return Err(ViewerError::NoModel);
        };
        let index = self.frame_index;
        self.frame_index += 1;
        let frame_start = Instant::now();

        self.packer.apply_tweak(tweak);
        let packed = {
            let mut sink = GpuSink {
                device: &self.gpu.device,
                buffers: &mut self.buffers,
            };
            self.packer.prepare_frame(library, model, &mut sink)?
        };
        let list = self.packer.render(library, model, tweak, filter)?;

        let uniforms = ViewUniforms::new(
            self.camera.view(),
            self.camera.projection(self.targets.aspect()),
            Vec3::from_array(tweak.light_dir),
            [self.targets.width as f32, self.targets.height as f32],
            self.start.elapsed().as_secs_f32(),
            tweak.transparency,
        );
        self.renderer.update_view(&self.gpu.queue, &uniforms);

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame-encoder"),
            });
        let issued = self.renderer.render(
            &self.gpu.device,
            &self.gpu.queue,
            &mut encoder,
            &self.buffers,
            &list,
            &self.targets.color_view,
            &self.targets.depth_view,
        )?;
        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        self.gpu.device.poll(wgpu::Maintain::Wait);

        Ok(FrameRecord {
            index,
            packed,
            draw_calls: list.stats.draw_calls,
            issued,
            instances_drawn: list.stats.instances_drawn,
            instances_skipped: list.stats.instances_skipped,
            state_changes: list.stats.state_changes(),
            elapsed_ms: frame_start.elapsed().as_secs_f64() * 1000.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brickbatch_core::{Material, MaterialId, PartId, RenderPart, SourcePart};

    const LIBRARY: &str = r#"(
        parts: [(
            name: "quad.dat",
            positions: [(0.0, 0.0, 0.0), (2.0, 0.0, 0.0), (2.0, 2.0, 0.0), (0.0, 2.0, 0.0)],
            triangles: [0, 1, 2, 0, 2, 3],
        )],
    )"#;

    #[test]
    fn test_camera_frames_model_bounds() {
        let mut lib = PartLibrary::from_ron_str(LIBRARY, LoaderConfig::default()).expect("library");
        let (_, model) = lib
            .resolve_model_str(
                "(instances: [(part: \"quad.dat\", material: 4)])",
                LoadMode::Immediate,
            )
            .expect("model");
        let camera = Camera::fit(&lib, &model);
        assert_eq!(camera.target, Vec3::new(1.0, 1.0, 0.0));
        assert!(camera.eye.distance(camera.target) > 1.0);
        assert!(camera.far > camera.eye.distance(camera.target));
    }

    struct SerialSource;

    impl PartSource for SerialSource {
        fn part_count(&self) -> u32 {
            0
        }

        fn part(&self, _: PartId) -> Option<&SourcePart> {
            None
        }

        fn render_part(&self, _: PartId) -> Option<&RenderPart> {
            None
        }

        fn material_count(&self) -> u32 {
            0
        }

        fn material(&self, _: MaterialId) -> Option<&Material> {
            None
        }
    }

    #[test]
    fn test_deferred_workers_follow_source() {
        let lib = PartLibrary::from_ron_str(LIBRARY, LoaderConfig::default()).expect("library");
        assert_eq!(deferred_workers(&lib, 4), 4);
        assert_eq!(deferred_workers(&lib, 0), 1);
        assert_eq!(deferred_workers(&SerialSource, 4), 1);
    }

    #[test]
    fn test_camera_default_for_empty_model() {
        let mut lib = PartLibrary::from_ron_str(LIBRARY, LoaderConfig::default()).expect("library");
        let (_, model) = lib
            .resolve_model_str("(instances: [])", LoadMode::Immediate)
            .expect("model");
        let camera = Camera::fit(&lib, &model);
        assert_eq!(camera.target, Vec3::ZERO);
    }
}
