use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use jersey::compose::RegionSummary;
use jersey::config::{load_and_validate_config, Catalog};
use jersey::materials::FabricLibrary;
use jersey::mesh::{MeshSource, NodeTable};
use jersey::panels::{build_panel, Panel};
use jersey::resources::{AssetLoader, ImageLoader};
use jersey::schema::Color;
use jersey::session::{Configurator, FrameUpdate};
use jersey::text::{FontBook, TextRasterizer, TextStyle};

#[derive(Debug, Parser)]
#[command(name = "jersey")]
#[command(about = "Garment customizer material and decal composer")]
#[command(version = env!("JERSEY_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Validate a catalog config and print a summary.
    Check { config: PathBuf },
    /// Print a panel's control descriptors as JSON.
    Schema {
        panel: Panel,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Rasterize a text texture to PNG.
    Text {
        #[arg(long)]
        text: String,
        #[arg(long, default_value = "#000000")]
        color: Color,
        #[arg(long, default_value_t = 64)]
        font_size: u32,
        #[arg(long)]
        family: Option<String>,
        #[arg(long, default_value = "#FFFFFF")]
        stroke_color: Color,
        #[arg(long, default_value_t = 5)]
        stroke_width: u32,
        #[arg(short = 'o', long = "output")]
        output: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Apply panel edits to a fresh session and print the composed scene.
    Compose {
        config: PathBuf,
        #[arg(long)]
        edits: Option<PathBuf>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Edit {
    panel: Panel,
    key: String,
    value: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct SceneReport {
    fabric: String,
    update: FrameUpdate,
    regions: Vec<RegionSummary>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("JERSEY_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Check { config } => run_check(&config),
        Commands::Schema { panel, config } => run_schema(panel, config.as_deref()),
        Commands::Text {
            text,
            color,
            font_size,
            family,
            stroke_color,
            stroke_width,
            output,
            config,
        } => {
            let catalog = load_catalog(config.as_deref())?;
            let style = TextStyle {
                text,
                color,
                font_size,
                font_family: family.unwrap_or_else(|| catalog.fonts.default_family.clone()),
                stroke_color,
                stroke_width,
            };
            run_text(&catalog, &style, &output)
        }
        Commands::Compose { config, edits } => run_compose(&config, edits.as_deref()),
    }
}

fn load_catalog(path: Option<&Path>) -> Result<Catalog> {
    match path {
        Some(path) => load_and_validate_config(path),
        None => Ok(Catalog::default()),
    }
}

fn run_check(config_path: &Path) -> Result<()> {
    let catalog = load_and_validate_config(config_path)?;
    println!("OK: {}", config_path.display());
    println!(
        "Palette: {} colors, patterns: {}, font families: {} ({} faces)",
        catalog.palette.len(),
        catalog.patterns.len(),
        catalog.fonts.families.len(),
        catalog.fonts.faces.len()
    );
    println!(
        "Fabrics: {}; mesh regions: {}; assets: {}",
        catalog.fabric_names().join(", "),
        catalog.mesh.nodes.len(),
        catalog.asset_root.display()
    );
    Ok(())
}

fn run_schema(panel: Panel, config_path: Option<&Path>) -> Result<()> {
    let catalog = load_catalog(config_path)?;
    let group = build_panel(panel, &catalog);
    println!("{}", serde_json::to_string_pretty(&group)?);
    Ok(())
}

fn run_text(catalog: &Catalog, style: &TextStyle, output: &Path) -> Result<()> {
    let fonts = FontBook::from_config(&catalog.fonts)?;
    if fonts.is_empty() {
        bail!("no font faces configured; add fonts.faces to the config");
    }
    let rasterizer = TextRasterizer::new(Box::new(fonts));
    let bitmap = rasterizer.rasterize(style)?;
    bitmap.save_png(output)?;
    println!(
        "Wrote {} ({} covered pixels, sha256 {})",
        output.display(),
        bitmap.covered_pixels(),
        bitmap.digest()
    );
    Ok(())
}

fn run_compose(config_path: &Path, edits_path: Option<&Path>) -> Result<()> {
    let catalog = Arc::new(load_and_validate_config(config_path)?);
    let edits = match edits_path {
        Some(path) => load_edits(path)?,
        None => Vec::new(),
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    let report = runtime.block_on(compose_scene(catalog, edits))?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn load_edits(path: &Path) -> Result<Vec<Edit>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read edits {}", path.display()))?;
    serde_yaml::from_str(&contents).map_err(|error| {
        let location = error
            .location()
            .map(|location| format!("line {}, column {}", location.line(), location.column()))
            .unwrap_or_else(|| "unknown location".to_owned());
        anyhow!(
            "failed to parse edits in {} at {}: {}",
            path.display(),
            location,
            error
        )
    })
}

async fn compose_scene(catalog: Arc<Catalog>, edits: Vec<Edit>) -> Result<SceneReport> {
    let loader: Arc<dyn ImageLoader> = Arc::new(AssetLoader::new(Arc::clone(&catalog)));
    let mesh = NodeTable::new(catalog.mesh.clone()).load_mesh(&catalog.mesh.path)?;
    let fabrics = FabricLibrary::load(&catalog, loader.as_ref()).await;
    let fonts = FontBook::from_config(&catalog.fonts)?;
    if fonts.is_empty() {
        warn!("no font faces configured; name and number decals will be skipped");
    }
    let mut session = Configurator::new(
        Arc::clone(&catalog),
        &mesh,
        fabrics,
        loader,
        Box::new(fonts),
    )?;

    for (index, edit) in edits.into_iter().enumerate() {
        let control = session
            .panel(edit.panel)
            .and_then(|group| group.get(&edit.key))
            .ok_or_else(|| {
                anyhow!(
                    "edit #{index}: panel {} has no control '{}'",
                    edit.panel,
                    edit.key
                )
            })?;
        let value = control
            .parse_value(&edit.value)
            .with_context(|| format!("edit #{index}: {}.{}", edit.panel, edit.key))?;
        session.apply_control(edit.panel, &edit.key, value);
    }

    session.settle().await;
    let update = session.tick();
    Ok(SceneReport {
        fabric: session.fabric().to_owned(),
        update,
        regions: session.scene().values().map(|state| state.summary()).collect(),
    })
}
