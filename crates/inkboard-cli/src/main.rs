//! Headless replay shell: run a gesture script against the engine and write
//! the result as a document and/or image.

mod script;

use clap::{Parser, ValueEnum};
use inkboard_core::{Engine, EngineConfig, EngineError};
use inkboard_render::{FrameInput, GlyphSet, GridStyle, LayeredRenderer, RenderConfig, RendererError};
use script::{Replay, ReplayReport, Script};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum Grid {
    /// Plain background
    #[default]
    None,
    /// Ruled lines
    Lines,
    /// Dot grid
    Dots,
}

impl From<Grid> for GridStyle {
    fn from(grid: Grid) -> Self {
        match grid {
            Grid::None => GridStyle::None,
            Grid::Lines => GridStyle::Lines,
            Grid::Dots => GridStyle::Dots,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "inkboard")]
#[command(about = "Replay a gesture script against the inkboard engine")]
struct Args {
    /// Gesture script (JSON)
    script: PathBuf,

    /// Engine configuration (JSON); defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Document to load before replaying
    #[arg(short, long)]
    document: Option<PathBuf>,

    /// Surface width in logical pixels
    #[arg(long, default_value_t = 1000.0)]
    width: f64,

    /// Surface height in logical pixels
    #[arg(long, default_value_t = 1000.0)]
    height: f64,

    /// Device pixel ratio
    #[arg(long, default_value_t = 1.0)]
    dpr: f64,

    /// Write the shapes layer as PNG
    #[arg(long)]
    png: Option<PathBuf>,

    /// Write the shapes layer wrapped in SVG
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Save the resulting document
    #[arg(short, long)]
    save: Option<PathBuf>,

    /// Font for text and stamps; a system font is tried otherwise
    #[arg(long)]
    font: Option<PathBuf>,

    /// Background grid
    #[arg(long, value_enum, default_value = "none")]
    grid: Grid,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("{path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("Invalid script: {0}")]
    Script(#[from] serde_json::Error),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Render(#[from] RendererError),
}

fn write_file(path: &Path, bytes: impl AsRef<[u8]>) -> Result<(), CliError> {
    fs::write(path, bytes).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn load_script(path: &Path) -> Result<Script, CliError> {
    let json = fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&json)?)
}

fn run(args: &Args) -> Result<ReplayReport, CliError> {
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let script = load_script(&args.script)?;

    let mut engine = Engine::headless(config, args.width, args.height, args.dpr);
    if let Some(path) = &args.document {
        engine.load(path)?;
        log::info!("Loaded {} shapes from {}", engine.store().len(), path.display());
    }

    let report = Replay::new(&mut engine).run(&script);

    if args.png.is_some() || args.svg.is_some() {
        let glyphs = match &args.font {
            Some(path) => Some(GlyphSet::load(path)?),
            None => GlyphSet::system(),
        };
        let config = RenderConfig::default().with_grid(args.grid.into());
        let mut renderer = LayeredRenderer::new(config);
        if let Some(glyphs) = glyphs {
            renderer = renderer.with_glyphs(glyphs);
        }
        renderer.render(&FrameInput::from_engine(&mut engine))?;
        if let Some(path) = &args.png {
            write_file(path, renderer.export_png()?)?;
            log::info!("Wrote {}", path.display());
        }
        if let Some(path) = &args.svg {
            write_file(path, renderer.export_svg(engine.viewport().dpr)?)?;
            log::info!("Wrote {}", path.display());
        }
    }

    if let Some(path) = &args.save {
        engine.save(path)?;
        log::info!("Saved document to {}", path.display());
    }

    println!(
        "{} steps, {} frames, {} events handled, {} shapes",
        report.steps,
        report.frames,
        report.handled,
        engine.store().len()
    );
    Ok(report)
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(&args) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("inkboard: {e}");
            ExitCode::FAILURE
        }
    }
}
