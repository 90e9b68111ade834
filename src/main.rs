use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use bubble_translator::Stage;

#[derive(Parser, Debug)]
#[command(
    name = "bubble-translator",
    version,
    about = "Translate the text inside speech-bubble images"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Target language (DeepL code, e.g. EN-US, DE, PT-BR)
    #[arg(short = 'l', long = "lang", default_value = "EN-US", global = true)]
    lang: String,

    /// DeepL API key (overrides the environment variable)
    #[arg(short = 'k', long = "key", global = true)]
    key: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings", global = true)]
    read_settings: Option<String>,

    /// Working directory for intermediate files
    #[arg(short = 'w', long = "work-dir", global = true)]
    work_dir: Option<String>,

    /// Directory for translated images
    #[arg(short = 'o', long = "output-dir", global = true)]
    output_dir: Option<String>,

    /// Skip the region debug overlay
    #[arg(long = "no-overlay", global = true)]
    no_overlay: bool,

    /// Enable verbose logging
    #[arg(long = "verbose", global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// OCR the image and store the text boxes
    Detect { image: PathBuf },
    /// Merge stored text boxes into bubble regions
    Refine { image: PathBuf },
    /// Translate the stored regions
    Translate { image: PathBuf },
    /// Erase the text regions from the image
    Clean { image: PathBuf },
    /// Render stored translations onto the cleaned image
    Compose { image: PathBuf },
    /// Run every stage in order
    Run { image: PathBuf },
}

impl Command {
    fn into_parts(self) -> (Stage, PathBuf) {
        match self {
            Command::Detect { image } => (Stage::Detect, image),
            Command::Refine { image } => (Stage::Refine, image),
            Command::Translate { image } => (Stage::Translate, image),
            Command::Clean { image } => (Stage::Clean, image),
            Command::Compose { image } => (Stage::Compose, image),
            Command::Run { image } => (Stage::Run, image),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    bubble_translator::logging::init(cli.verbose)?;

    let (stage, input) = cli.command.into_parts();
    let output = bubble_translator::run(bubble_translator::Config {
        stage,
        input,
        lang: cli.lang,
        key: cli.key,
        settings_path: cli.read_settings,
        work_dir: cli.work_dir,
        output_dir: cli.output_dir,
        no_overlay: cli.no_overlay,
    })
    .await?;

    println!("{}", output);
    Ok(())
}
