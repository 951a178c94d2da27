use anyhow::{anyhow, Result};
use batch_imagegen::app::{App, GenerateOptions};
use batch_imagegen::dimensions::AspectRatio;
use batch_imagegen::models::{ImageCount, ModelId};
use batch_imagegen::prompts::random_prompt;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "batch-imagegen")]
#[command(about = "Generate batches of images with Hugging Face text-to-image models")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a batch of images from one prompt.
    Generate(GenerateArgs),
    /// Run the single-image generation proxy.
    Serve {
        /// Address to listen on; defaults to BIND_ADDR.
        #[arg(long)]
        bind: Option<String>,
    },
    /// List the supported models.
    Models,
}

#[derive(Debug, Args)]
struct GenerateArgs {
    /// Model id, e.g. black-forest-labs/FLUX.1-dev.
    #[arg(long, value_parser = parse_model_arg)]
    model: ModelId,

    #[arg(long, conflicts_with = "random", required_unless_present = "random")]
    prompt: Option<String>,

    /// Pick a prompt from the bundled examples.
    #[arg(long)]
    random: bool,

    /// Number of images, 1 to 4.
    #[arg(long, default_value = "1", value_parser = parse_count_arg)]
    count: ImageCount,

    /// Aspect ratio as W/H.
    #[arg(long, default_value = "1/1", value_parser = parse_ratio_arg)]
    ratio: AspectRatio,

    /// Directory for saved images; defaults to OUTPUT_DIR.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Keep results in memory only.
    #[arg(long, conflicts_with = "output")]
    no_save: bool,
}

fn parse_model_arg(input: &str) -> std::result::Result<ModelId, String> {
    input.parse().map_err(|_| {
        let known: Vec<&str> = ModelId::ALL.iter().map(|m| m.as_str()).collect();
        format!("Unsupported model '{}'. Expected one of: {}", input, known.join(", "))
    })
}

fn parse_count_arg(input: &str) -> std::result::Result<ImageCount, String> {
    input
        .parse()
        .map_err(|_| format!("Invalid count '{}'. Expected a number from 1 to 4", input))
}

fn parse_ratio_arg(input: &str) -> std::result::Result<AspectRatio, String> {
    input
        .parse()
        .map_err(|_| format!("Invalid ratio '{}'. Expected W/H, e.g. 16/9", input))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "batch_imagegen=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();

    if let Command::Models = args.command {
        for model in ModelId::ALL {
            println!("{:<45} {}", model.as_str(), model.label());
        }
        return Ok(());
    }

    let app = match App::new() {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    match args.command {
        Command::Generate(generate) => {
            let options = generate_options(&app, generate)?;
            info!("Prompt: {}", options.prompt);
            match app.generate(options).await {
                Ok(batch) if batch.failed_count() == 0 => Ok(()),
                Ok(batch) => {
                    error!("{} of {} image(s) failed", batch.failed_count(), batch.len());
                    std::process::exit(1);
                }
                Err(e) => {
                    error!("Generation failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Command::Serve { bind } => {
            if let Err(e) = app.serve(bind.as_deref()).await {
                error!("Server failed: {}", e);
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Models => Ok(()),
    }
}

fn generate_options(app: &App, args: GenerateArgs) -> Result<GenerateOptions> {
    let prompt = match args.prompt {
        Some(prompt) => prompt,
        None => random_prompt(&mut rand::thread_rng())
            .ok_or_else(|| anyhow!("No example prompts available"))?
            .to_string(),
    };

    let output_dir = if args.no_save {
        None
    } else {
        Some(args.output.unwrap_or_else(|| app.config().output_dir.clone()))
    };

    Ok(GenerateOptions {
        prompt,
        model: Some(args.model),
        count: args.count,
        ratio: args.ratio,
        output_dir,
    })
}
