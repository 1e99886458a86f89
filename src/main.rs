use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::debug;

use boq_table_editor::backend::{DocumentKind, PresentationFormat};
use boq_table_editor::cli;
use boq_table_editor::config::BoqConfig;
use boq_table_editor::costing::CostingFactors;
use boq_table_editor::logging::{init_logging, LoggingConfig};
use boq_table_editor::table::FileId;

#[derive(Parser)]
#[command(name = "boq")]
#[command(about = "Stitch, edit and cost bill-of-quantities tables")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stitch per-page tables (HTML, markdown or layout JSON) into one table
    Stitch {
        #[arg(required = true)]
        pages: Vec<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Normalize a stitched fragment into live editable markup
    Normalize {
        input: PathBuf,
        #[arg(long)]
        file_id: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replay a JSON array of table events against the live table
    Replay {
        input: PathBuf,
        #[arg(long)]
        file_id: String,
        #[arg(long)]
        events: PathBuf,
        /// Answer yes to every confirmation
        #[arg(short, long)]
        yes: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the table's headers and rows as JSON
    Extract {
        input: PathBuf,
        #[arg(long, default_value = "local")]
        file_id: String,
    },
    /// Write a standalone HTML document of the edited table
    Export {
        input: PathBuf,
        #[arg(long, default_value = "local")]
        file_id: String,
        #[arg(long, default_value = "Bill of Quantities")]
        title: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Subtotal, tax and grand total of a saved costing result
    Summary { costed: PathBuf },
    /// Fetch the stitched table for a file from the server
    Fetch {
        #[arg(long)]
        file_id: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Submit the table for costing and write the costed tables
    Cost {
        input: PathBuf,
        #[arg(long)]
        file_id: String,
        #[arg(long)]
        net_margin: Option<f64>,
        #[arg(long)]
        freight: Option<f64>,
        #[arg(long)]
        customs: Option<f64>,
        #[arg(long)]
        installation: Option<f64>,
        #[arg(long)]
        exchange_rate: Option<f64>,
        #[arg(long)]
        additional: Option<f64>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Ask the server to generate a document
    Generate {
        #[arg(value_enum)]
        kind: KindArg,
        #[arg(long)]
        file_id: String,
        #[arg(long, value_enum)]
        format: Option<FormatArg>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Offer,
    Presentation,
    Mas,
    ZeroCosting,
}

impl From<KindArg> for DocumentKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Offer => DocumentKind::Offer,
            KindArg::Presentation => DocumentKind::Presentation,
            KindArg::Mas => DocumentKind::Mas,
            KindArg::ZeroCosting => DocumentKind::ZeroCosting,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Pdf,
    Pptx,
}

impl From<FormatArg> for PresentationFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Pdf => PresentationFormat::Pdf,
            FormatArg::Pptx => PresentationFormat::Pptx,
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<BoqConfig> {
    match path {
        Some(path) => {
            let mut config = BoqConfig::load_from_file(path)?;
            config.apply_env();
            Ok(config)
        }
        None => Ok(BoqConfig::load_from_env()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_ref())?;
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    let _log_guard = init_logging(&LoggingConfig::from(&config.logging))?;
    debug!(backend = %config.backend.base_url, "Configuration loaded");

    match cli.command {
        Commands::Stitch { pages, output } => cli::stitch_command(pages, output).await,
        Commands::Normalize { input, file_id, output } => {
            cli::normalize_command(&config, input, FileId::from(file_id), output).await
        }
        Commands::Replay {
            input,
            file_id,
            events,
            yes,
            output,
        } => cli::replay_command(&config, input, FileId::from(file_id), events, yes, output).await,
        Commands::Extract { input, file_id } => cli::extract_command(&config, input, FileId::from(file_id)).await,
        Commands::Export {
            input,
            file_id,
            title,
            output,
        } => cli::export_command(&config, input, FileId::from(file_id), title, output).await,
        Commands::Summary { costed } => cli::summary_command(&config, costed).await,
        Commands::Fetch { file_id, output } => cli::fetch_command(&config, FileId::from(file_id), output).await,
        Commands::Cost {
            input,
            file_id,
            net_margin,
            freight,
            customs,
            installation,
            exchange_rate,
            additional,
            output,
        } => {
            let defaults = config.costing.default_factors;
            let factors = CostingFactors {
                net_margin: net_margin.unwrap_or(defaults.net_margin),
                freight: freight.unwrap_or(defaults.freight),
                customs: customs.unwrap_or(defaults.customs),
                installation: installation.unwrap_or(defaults.installation),
                exchange_rate: exchange_rate.unwrap_or(defaults.exchange_rate),
                additional: additional.unwrap_or(defaults.additional),
            };
            cli::cost_command(&config, input, FileId::from(file_id), factors, output).await
        }
        Commands::Generate { kind, file_id, format } => {
            cli::generate_command(&config, kind.into(), FileId::from(file_id), format.map(Into::into)).await
        }
    }
}
