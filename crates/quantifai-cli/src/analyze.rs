//! `analyze` and `download` command handlers.
//!
//! The CLI stands in for the browser form: it fills an [`UploadCapture`] from
//! the arguments, hands the selection to the orchestrator, follows the
//! lifecycle while the call is in flight, then renders the settled state.

use std::path::{Path, PathBuf};

use quantifai_client::{AnalysisClient, AnalysisOrchestrator, LifecycleState};
use quantifai_core::{Flag, UploadCapture, UploadFile};
use tokio::sync::watch;

use crate::render;
use crate::AnalyzeArgs;

/// Run one analysis and print the result.
///
/// # Errors
///
/// Returns an error if the input file cannot be read, if the analysis ends
/// in `Failed` (with the user-facing message only), or if the requested
/// download fails.
pub(crate) async fn run_analyze(client: AnalysisClient, args: AnalyzeArgs) -> anyhow::Result<()> {
    let mut capture = UploadCapture::new();
    capture.select_file(Some(UploadFile::from_path(&args.file).await?));
    capture.set_date_range(args.start_date, args.end_date);
    capture.set_flag(Flag::Weather, args.weather);
    capture.set_flag(Flag::Holiday, args.holiday);
    capture.set_flag(Flag::Promo, args.promo);

    let orchestrator = AnalysisOrchestrator::new(client);
    let progress = follow_progress(orchestrator.subscribe());

    tokio::select! {
        () = orchestrator.submit(capture.selection()) => {}
        () = progress => {}
    }

    let state = orchestrator.state();
    let result = match &state {
        LifecycleState::Succeeded(result) => result,
        LifecycleState::Failed(message) => anyhow::bail!("{message}"),
        LifecycleState::Idle | LifecycleState::Submitting => {
            anyhow::bail!("analysis did not settle (state: {state})")
        }
    };

    let download_url = orchestrator
        .service()
        .download_url(result.summary.output_file.as_deref());

    if args.json {
        println!("{}", render::render_json(result, download_url.as_ref())?);
    } else {
        print!("{}", render::render_state(&state, download_url.as_ref()));
    }

    if let Some(dest) = args.download {
        match result.summary.output_file.as_deref() {
            Some(output_file) if result.summary.download_available() => {
                save(orchestrator.service(), output_file, &dest).await?;
            }
            _ => tracing::warn!("the service returned no result file; nothing to download"),
        }
    }

    Ok(())
}

/// Download a result file by identifier.
///
/// # Errors
///
/// Returns an error if the identifier is empty, the service refuses the
/// download, or the file cannot be written.
pub(crate) async fn run_download(
    client: &AnalysisClient,
    output_file: &str,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let dest = out.unwrap_or_else(|| default_download_path(output_file));
    save(client, output_file, &dest).await
}

async fn save(client: &AnalysisClient, output_file: &str, dest: &Path) -> anyhow::Result<()> {
    let bytes = client.download(output_file, dest).await?;
    eprintln!("saved {bytes} bytes to {}", dest.display());
    Ok(())
}

/// Base name of the identifier, which the service builds from a server-side
/// path (e.g. `./uploads/Forecast.xlsx`).
fn default_download_path(output_file: &str) -> PathBuf {
    let name = output_file
        .rsplit(['/', '\\'])
        .find(|segment| !matches!(*segment, "" | "." | ".."))
        .unwrap_or("result.xlsx");
    PathBuf::from(name)
}

/// Reports lifecycle transitions while a submission is in flight. Never
/// completes on its own; the caller races it against the submission.
async fn follow_progress(mut rx: watch::Receiver<LifecycleState>) {
    while rx.changed().await.is_ok() {
        let state = rx.borrow_and_update().clone();
        tracing::debug!(%state, "lifecycle transition");
        if state.is_submitting() {
            eprintln!("{}", render::PROGRESS_MESSAGE);
        }
    }
    std::future::pending::<()>().await;
}
