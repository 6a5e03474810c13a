mod analyze;
mod render;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use quantifai_client::AnalysisClient;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "quantifai")]
#[command(about = "Submit sales data to the Quantif'AI analysis service")]
struct Cli {
    /// Analysis service base URL (overrides `QUANTIFAI_SERVICE_URL`)
    #[arg(long, global = true)]
    service_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Upload a sales file and show the stock and staffing recommendation
    Analyze(AnalyzeArgs),
    /// Download a result file by the identifier an analysis returned
    Download {
        /// Identifier from the analysis result (`output_file`)
        output_file: String,
        /// Where to save the file (defaults to the identifier's base name)
        #[arg(long, short)]
        out: Option<PathBuf>,
    },
}

#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Args)]
pub(crate) struct AnalyzeArgs {
    /// Sales file to upload (.xlsx, .csv or .txt)
    pub file: PathBuf,
    /// Start of the date range, passed through as typed
    #[arg(long)]
    pub start_date: Option<String>,
    /// End of the date range, passed through as typed
    #[arg(long)]
    pub end_date: Option<String>,
    /// Rainy weather expected
    #[arg(long)]
    pub weather: bool,
    /// Holiday period
    #[arg(long)]
    pub holiday: bool,
    /// Promotion running
    #[arg(long)]
    pub promo: bool,
    /// Print the normalized result as JSON
    #[arg(long)]
    pub json: bool,
    /// Also save the full result file to this path
    #[arg(long, value_name = "PATH")]
    pub download: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = quantifai_core::load_app_config()?;
    if let Some(url) = cli.service_url {
        config.service_url = url;
    }

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    tracing::debug!(?config, "configuration loaded");

    let client = AnalysisClient::new(&config)?;

    match cli.command {
        Commands::Analyze(args) => analyze::run_analyze(client, args).await,
        Commands::Download { output_file, out } => {
            analyze::run_download(&client, &output_file, out).await
        }
    }
}
