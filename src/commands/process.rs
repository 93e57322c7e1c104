use std::io::{self, Write};

use anyhow::{Result, bail};
use serde::Serialize;
use tracing::{error, info};

use crate::cli::ProcessArgs;
use crate::commands::resolve::{resolve, write_text_plan};
use crate::ledger::ResolutionPlan;
use crate::util::write_json_stdout;
use crate::writer::{CommitOutcome, SignalWriter};

#[derive(Debug, Serialize)]
struct FailedCommit {
    recipient: String,
    error: String,
}

#[derive(Debug, Serialize)]
struct ProcessReport {
    plan: ResolutionPlan,
    committed: Vec<CommitOutcome>,
    failed: Vec<FailedCommit>,
    downloads_cleared: Option<usize>,
}

pub fn run(args: ProcessArgs) -> Result<()> {
    let resolve_args = &args.resolve;
    let (record, resolution) = resolve(resolve_args)?;

    let recipients = resolution
        .writable()
        .map(|entry| entry.recipient.clone())
        .collect::<Vec<String>>();
    let signal_pdf = resolve_args.source.signal_pdf();
    let writer = SignalWriter::new(
        &resolve_args.data_root,
        &resolve_args.source.downloads_dir,
        signal_pdf,
    );

    let mut committed = Vec::new();
    let mut failed = Vec::new();
    for entry in resolution.writable() {
        match writer.commit(&record, &recipients, entry) {
            Ok(outcome) => committed.push(outcome),
            Err(err) => {
                error!(recipient = %entry.recipient, error = %err, "commit failed");
                failed.push(FailedCommit {
                    recipient: entry.recipient.clone(),
                    error: format!("{err:#}"),
                });
            }
        }
    }

    let downloads_cleared = if args.clear_downloads && !committed.is_empty() {
        Some(writer.clear_downloads()?)
    } else {
        None
    };

    info!(
        identifier = %resolution.identifier,
        committed = committed.len(),
        failed = failed.len(),
        skipped = resolution.entries.len() - recipients.len(),
        "process finished"
    );

    let report = ProcessReport {
        plan: resolution,
        committed,
        failed,
        downloads_cleared,
    };

    if resolve_args.json {
        write_json_stdout(&report)?;
    } else {
        write_text_report(&report)?;
    }

    if !report.failed.is_empty() {
        bail!("{} of {} recipient commits failed", report.failed.len(), recipients.len());
    }
    Ok(())
}

fn write_text_report(report: &ProcessReport) -> Result<()> {
    write_text_plan(&report.plan)?;

    let mut output = io::BufWriter::new(io::stdout().lock());
    writeln!(output, "Committed: {}", report.committed.len())?;
    for outcome in &report.committed {
        writeln!(output, "\t{}", outcome.folder)?;
        for missing in &outcome.missing {
            writeln!(output, "\t\tmissing attachment: {missing}")?;
        }
    }
    for failure in &report.failed {
        writeln!(output, "Failed: {}\t{}", failure.recipient, failure.error)?;
    }
    if let Some(removed) = report.downloads_cleared {
        writeln!(output, "Downloads cleared: {removed} files")?;
    }

    output.flush()?;
    Ok(())
}
