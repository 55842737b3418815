use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use toonswap_core::{Pipeline, Preset};
use toonswap_face::SwapEngine;

#[derive(Parser)]
#[command(name = "toonswap", about = "Face swap and cartoon filter pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Swap a face from SOURCE onto BASE, then run the filter chain
    Swap {
        /// Image providing the face
        #[arg(short, long)]
        source: PathBuf,
        /// Image receiving the face
        #[arg(short, long)]
        base: PathBuf,
        /// Output path (format from extension)
        #[arg(short, long)]
        out: PathBuf,
        /// Filter preset name
        #[arg(short, long, default_value = "classic")]
        preset: String,
        /// Skip the filter chain, keep the bare swap
        #[arg(long)]
        no_filters: bool,
        /// Grain seed; omit for a random one
        #[arg(long)]
        seed: Option<u64>,
        /// Directory with the ONNX model files
        #[arg(long)]
        model_dir: Option<PathBuf>,
    },
    /// Run the filter chain over a single image
    Filter {
        /// Input image
        #[arg(short, long)]
        image: PathBuf,
        /// Output path (format from extension)
        #[arg(short, long)]
        out: PathBuf,
        /// Filter preset name
        #[arg(short, long, default_value = "classic")]
        preset: String,
        /// Grain seed; omit for a random one
        #[arg(long)]
        seed: Option<u64>,
    },
    /// List built-in filter presets
    Presets {
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match Cli::parse().command {
        Commands::Swap {
            source,
            base,
            out,
            preset,
            no_filters,
            seed,
            model_dir,
        } => {
            let model_dir = model_dir.unwrap_or_else(toonswap_face::default_model_dir);
            let mut engine = SwapEngine::load(&model_dir)?;

            let source_img = open_rgb(&source)?;
            let base_img = open_rgb(&base)?;
            let swapped = engine.swap(&source_img, &base_img)?;

            let result = if no_filters {
                swapped
            } else {
                run_filters(&swapped, &preset, seed)?
            };
            result
                .save(&out)
                .with_context(|| format!("saving {}", out.display()))?;
            println!("{}", out.display());
        }
        Commands::Filter {
            image,
            out,
            preset,
            seed,
        } => {
            let input = open_rgb(&image)?;
            let result = run_filters(&input, &preset, seed)?;
            result
                .save(&out)
                .with_context(|| format!("saving {}", out.display()))?;
            println!("{}", out.display());
        }
        Commands::Presets { json } => {
            let presets = Preset::builtin();
            if json {
                println!("{}", serde_json::to_string_pretty(&presets)?);
            } else {
                for preset in presets {
                    println!("{:<10} stages: {}", preset.name, preset.stage_names().join(" -> "));
                }
            }
        }
    }

    Ok(())
}

fn open_rgb(path: &PathBuf) -> Result<image::RgbImage> {
    Ok(image::open(path)
        .with_context(|| format!("opening {}", path.display()))?
        .to_rgb8())
}

fn run_filters(img: &image::RgbImage, preset: &str, seed: Option<u64>) -> Result<image::RgbImage> {
    let preset = Preset::by_name(preset)?;
    let seed = seed.unwrap_or_else(rand::random);
    tracing::info!(preset = %preset.name, seed, "running filter pipeline");
    Ok(Pipeline::from_preset(&preset).run(img, seed)?)
}
