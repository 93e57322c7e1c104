use std::io::{self, Write};

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::ScanArgs;
use crate::ledger::{SignalState, scan};
use crate::util::write_json_stdout;

#[derive(Debug, Serialize)]
struct ScanReport<'a> {
    data_root: String,
    signal_count: usize,
    signals: Vec<&'a SignalState>,
}

pub fn run(args: ScanArgs) -> Result<()> {
    let state = scan(&args.data_root)?;
    if state.is_empty() {
        warn!(data_root = %args.data_root.display(), "no signal folders found");
    }

    let signals = state
        .signals()
        .filter(|signal| match &args.recipient {
            Some(recipient) => signal.recipients.iter().any(|held| held == recipient),
            None => true,
        })
        .collect::<Vec<&SignalState>>();

    info!(
        data_root = %args.data_root.display(),
        signals = signals.len(),
        "scan finished"
    );

    let report = ScanReport {
        data_root: args.data_root.display().to_string(),
        signal_count: signals.len(),
        signals,
    };

    if args.json {
        return write_json_stdout(&report);
    }

    let mut output = io::BufWriter::new(io::stdout().lock());
    writeln!(output, "Data root: {}", report.data_root)?;
    writeln!(output, "Signals: {}", report.signal_count)?;
    for signal in &report.signals {
        writeln!(
            output,
            "{}\t{}\tFM {}",
            signal.serial, signal.signal_id, signal.sender
        )?;
        for recipient in &signal.recipients {
            let versions = signal
                .versions
                .get(recipient)
                .map(|versions| {
                    versions
                        .iter()
                        .map(u32::to_string)
                        .collect::<Vec<String>>()
                        .join(",")
                })
                .unwrap_or_default();
            if versions.is_empty() {
                writeln!(output, "\t{recipient}")?;
            } else {
                writeln!(output, "\t{recipient}\tversions={versions}")?;
            }
        }
    }
    output.flush()?;
    Ok(())
}
