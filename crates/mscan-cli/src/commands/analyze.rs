use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use mscan_application::{PollSnapshot, PollState, PollerSettings, ResultPoller};
use mscan_core::analysis::{AnalysisId, AnalysisResultView, ResultFetcher};
use tokio::sync::watch;

use super::Context;

pub async fn run(ctx: &Context, company: &str, file: &Path, output: Option<&Path>) -> Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let file_name = file
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload.pdf");

    let id = ctx.client.start_analysis(company, file_name, bytes).await?;
    eprintln!("🚀 Analysis started for {} ({})", company, id);
    eprintln!("⏳ Waiting for the report, press Ctrl-C to cancel...");

    let poller = ResultPoller::new(
        Arc::new(ctx.client.clone()),
        PollerSettings::from(&ctx.config.poller),
    );
    let mut updates = poller.subscribe();
    let handle = poller.start(id.clone()).await;

    let state = tokio::select! {
        state = wait_terminal(&mut updates, &id) => state,
        _ = tokio::signal::ctrl_c() => {
            poller.stop().await;
            match ctx.client.cancel_analysis(&id).await {
                Ok(true) => eprintln!("🛑 Analysis {} cancelled", id),
                Ok(false) => eprintln!("Analysis {} had already finished", id),
                Err(e) => eprintln!("⚠️  Could not cancel analysis {}: {}", id, e),
            }
            bail!("Interrupted");
        }
    };
    if let Err(e) = handle.await {
        tracing::debug!(error = %e, "Poll task ended abnormally");
    }

    match state {
        PollState::Completed { report, errors, .. } => {
            for error in &errors {
                eprintln!("⚠️  {}", error);
            }
            write_report(output, &report)
        }
        PollState::Error { messages } => bail!("Analysis failed:\n  {}", messages.join("\n  ")),
        PollState::Idle | PollState::Loading => bail!("Polling stopped before a result arrived"),
    }
}

/// Prints the current result of an analysis without waiting.
pub async fn show_result(ctx: &Context, analysis_id: &str) -> Result<()> {
    let id = AnalysisId::from(analysis_id);
    match ctx.client.fetch(&id).await {
        Ok(AnalysisResultView::NotComplete) => {
            eprintln!("⏳ Analysis {} is not yet complete", id);
            Ok(())
        }
        Ok(AnalysisResultView::Completed { report, errors, .. }) => {
            for error in &errors {
                eprintln!("⚠️  {}", error);
            }
            write_report(None, &report)
        }
        Ok(AnalysisResultView::Failed { errors, .. }) => {
            bail!("Analysis failed:\n  {}", errors.join("\n  "))
        }
        Err(e) if e.is_not_found() => bail!("Analysis ID not found"),
        Err(e) => Err(e.into()),
    }
}

async fn wait_terminal(updates: &mut watch::Receiver<PollSnapshot>, id: &AnalysisId) -> PollState {
    loop {
        {
            let snapshot = updates.borrow_and_update();
            if snapshot.analysis_id.as_ref() == Some(id) && snapshot.state.is_terminal() {
                return snapshot.state.clone();
            }
        }
        if updates.changed().await.is_err() {
            return updates.borrow().state.clone();
        }
    }
}

fn write_report(output: Option<&Path>, report: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, report)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("✅ Report written to {}", path.display());
        }
        None => println!("{}", report),
    }
    Ok(())
}
