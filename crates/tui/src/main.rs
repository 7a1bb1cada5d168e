mod renderer;

use std::fs::File;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tracelens_core::config::ViewerConfig;
use tracelens_core::svg::render_svg;
use tracelens_core::TraceView;
use tracelens_protocol::Viewport;
use tracing_subscriber::EnvFilter;

/// Waterfall viewer for agent execution traces.
#[derive(Debug, Parser)]
#[command(name = "tracelens", version, about)]
struct Args {
    /// Trace JSON: a nested observation array, a trace-detail document or a
    /// flat observation list.
    path: PathBuf,

    /// TOML viewer configuration.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write logs here. Without it the interactive viewer logs nothing.
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Render the fully expanded waterfall to an SVG file and exit.
    #[arg(long, value_name = "FILE")]
    export_svg: Option<PathBuf>,

    /// Canvas width in pixels for `--export-svg`.
    #[arg(long, default_value_t = 1200.0)]
    width: f64,

    /// Print the trace summary as JSON and exit.
    #[arg(long)]
    summary: bool,

    /// Light palette instead of dark.
    #[arg(long)]
    light: bool,
}

fn init_logging(args: &Args) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match &args.log_file {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("creating log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        // The interactive viewer owns the terminal, so only batch modes log to stderr.
        None if args.export_svg.is_some() || args.summary => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
        None => {}
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args)?;

    let config = match &args.config {
        Some(path) => ViewerConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => ViewerConfig::default(),
    };

    let data = std::fs::read(&args.path).with_context(|| format!("reading {}", args.path.display()))?;
    let mut view = TraceView::new(config);
    view.load_json(&data)
        .with_context(|| format!("parsing {}", args.path.display()))?;

    if args.summary {
        let summary = serde_json::to_string_pretty(&view.summary())?;
        writeln!(std::io::stdout().lock(), "{summary}")?;
        return Ok(());
    }

    if let Some(out) = &args.export_svg {
        view.set_viewport(Viewport::sized(args.width, f64::MAX));
        let height = view.content_height();
        view.set_viewport(Viewport::sized(args.width, height));
        let commands = view.render(0.0);
        let svg = render_svg(&commands, args.width, height, !args.light);
        std::fs::write(out, svg).with_context(|| format!("writing {}", out.display()))?;
        tracing::info!(path = %out.display(), commands = commands.len(), "exported svg");
        return Ok(());
    }

    renderer::run(view, !args.light)
}
