use std::io::{self, Write};

use anyhow::Result;
use tracing::{info, warn};

use crate::cli::ExtractArgs;
use crate::commands::pipeline::SignalPipeline;
use crate::model::ExtractionReport;
use crate::util::write_json_stdout;

pub fn run(args: ExtractArgs) -> Result<()> {
    let pipeline = SignalPipeline::new(&args.extraction)?;
    let (source, extraction) = pipeline.extract_source(&args.source)?;
    let report = extraction.report(&source);

    if report.manual_input_required {
        warn!(
            source = %report.source,
            meaningful_chars = report.meaningful_chars,
            "too little text extracted; manual entry required"
        );
    }
    info!(
        source = %report.source,
        serial = %report.serial,
        recipients = report.record.recipients.len(),
        attachments = report.record.attachments.len(),
        "extraction finished"
    );

    if args.json {
        write_json_stdout(&report)
    } else {
        write_text_report(&report)
    }
}

fn write_text_report(report: &ExtractionReport) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    let record = &report.record;

    writeln!(output, "Source: {}", report.source)?;
    writeln!(output, "ID: {}", record.identifier_text())?;
    writeln!(output, "FM: {}", record.sender_text())?;
    writeln!(output, "Theme: {}", record.theme.display())?;
    writeln!(output, "Serial: {} ({})", report.serial, report.numeric_serial)?;
    writeln!(output, "Recipients: {}", record.recipients.len())?;
    for recipient in &record.recipients {
        writeln!(output, "\t{recipient}")?;
    }
    writeln!(output, "Attachments: {}", record.attachments.len())?;
    for attachment in &record.attachments {
        writeln!(output, "\t{attachment}")?;
    }
    if report.manual_input_required {
        writeln!(
            output,
            "Manual entry required: only {} meaningful characters",
            report.meaningful_chars
        )?;
    }

    output.flush()?;
    Ok(())
}
