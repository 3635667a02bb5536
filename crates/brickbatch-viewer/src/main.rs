use std::path::PathBuf;
use std::process;

use brickbatch_core::{
    GeometryVariant, InstanceFilter, LoaderConfig, PartFixMode, PartId, RenderPartBuildMode, Tweak,
};
use brickbatch_viewer::app::App;
use brickbatch_viewer::config::load_ron;
use brickbatch_viewer::error::ViewerError;
use brickbatch_viewer::gpu::Gpu;
use brickbatch_viewer::report::{self, PackSummary, Report};
use clap::Parser;

/// Headless viewer: packs a model into shared buffers and renders frames offscreen.
#[derive(Parser, Debug)]
#[command(name = "brickbatch-viewer", version)]
struct Args {
    /// Part library (RON).
    #[arg(long, default_value = "assets/library.ron")]
    library: PathBuf,

    /// Model file (RON).
    #[arg(long, default_value = "assets/model.ron")]
    model: PathBuf,

    /// Render toggles (RON). Flags below override it.
    #[arg(long)]
    tweak: Option<PathBuf>,

    /// Loader configuration (RON). Flags below override it.
    #[arg(long)]
    loader: Option<PathBuf>,

    /// Frames to render.
    #[arg(long, default_value_t = 3)]
    frames: u32,

    #[arg(long, default_value_t = 640)]
    width: u32,

    #[arg(long, default_value_t = 480)]
    height: u32,

    /// Pack render geometry instead of source geometry.
    #[arg(long)]
    render: bool,

    /// Draw chamfered triangles (with --render).
    #[arg(long)]
    chamfer: bool,

    /// Weld coincident vertices while loading.
    #[arg(long)]
    weld: bool,

    /// Build render parts only when requested after loading.
    #[arg(long)]
    on_demand: bool,

    /// Build parts on a worker pool after resolving the model.
    #[arg(long)]
    workers: Option<usize>,

    /// Only draw this instance index.
    #[arg(long, conflicts_with = "only_part")]
    instance: Option<u32>,

    /// Only draw instances of this part id.
    #[arg(long)]
    only_part: Option<u32>,

    /// Switch to welded loading at this frame to exercise a library reload.
    #[arg(long)]
    reload_at: Option<u32>,

    /// Write the report as JSON.
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        log::error!("{e}");
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), ViewerError> {
    let mut tweak: Tweak = match &args.tweak {
        Some(path) => load_ron(path)?,
        None => Tweak::default(),
    };
    if args.render {
        tweak.variant = GeometryVariant::Render;
    }
    if args.chamfer {
        tweak.chamfered = true;
    }

    let mut loader: LoaderConfig = match &args.loader {
        Some(path) => load_ron(path)?,
        None => LoaderConfig::default(),
    };
    if args.weld {
        loader.part_fix_mode = PartFixMode::Weld;
    }
    if args.on_demand {
        loader.build_mode = RenderPartBuildMode::OnDemand;
    }

    let filter = match (args.instance, args.only_part) {
        (Some(i), _) => Some(InstanceFilter::Instance(i)),
        (None, Some(p)) => Some(InstanceFilter::Part(PartId(p))),
        (None, None) => None,
    };

    log::info!("Initializing GPU...");
    let gpu = Gpu::new()?;
    let adapter = format!("{} ({})", gpu.adapter_name, gpu.backend);
    let mut app = App::new(gpu, args.library.clone(), loader.clone(), args.width, args.height)?;
    if let Some(workers) = args.workers {
        app.set_deferred(workers);
    }
    let status = app.load_model(&args.model)?;

    if let Some(info) = app.selection_info(&tweak) {
        log::info!(
            "Selected part {} '{}', vertex {:?}",
            info.part.0,
            info.name,
            info.vertex
        );
    }

    let mut frames = Vec::with_capacity(args.frames as usize);
    let mut skipped_frames = 0;
    for i in 0..args.frames {
        if args.reload_at == Some(i) {
            let welded = LoaderConfig {
                part_fix_mode: PartFixMode::Weld,
                ..loader.clone()
            };
            app.set_loader_config(welded)?;
        }
        match app.frame(&tweak, filter) {
            Ok(record) => frames.push(record),
            Err(e) => {
                log::warn!("Frame {i} skipped: {e}");
                skipped_frames += 1;
            }
        }
    }

    let (instances, parts) = app
        .model()
        .map(|m| (m.instances.len(), m.parts.len()))
        .unwrap_or_default();
    let report = Report {
        adapter,
        model: args.model.display().to_string(),
        status: format!("{:?}", app.status().unwrap_or(status)),
        instances,
        parts,
        pack: app.packer().stats().map(PackSummary::from),
        frames,
        skipped_frames,
    };

    println!("\n## Frame Report\n");
    println!("{}", report::format_markdown(&report));

    if let Some(path) = &args.output {
        report::save_report(path, &report).map_err(|source| ViewerError::Report {
            path: path.clone(),
            source,
        })?;
        log::info!("Saved report to {}", path.display());
    }

    log::info!("Viewer complete.");
    Ok(())
}
