use std::io::{self, Write};

use anyhow::Result;

use crate::cli::ResolveArgs;
use crate::commands::pipeline::{SignalPipeline, target_recipients};
use crate::ledger::{ResolutionPlan, plan};
use crate::model::CandidateRecord;
use crate::util::write_json_stdout;

pub fn run(args: ResolveArgs) -> Result<()> {
    let (_, resolution) = resolve(&args)?;

    if args.json {
        write_json_stdout(&resolution)
    } else {
        write_text_plan(&resolution)
    }
}

/// Candidate selection and resolution shared with `process`.
pub fn resolve(args: &ResolveArgs) -> Result<(CandidateRecord, ResolutionPlan)> {
    let pipeline = SignalPipeline::new(&args.extraction)?;
    let record = pipeline.candidate(&args.source, &args.manual)?;
    let recipients = target_recipients(&args.recipients, &record)?;
    let resolution = plan(&args.data_root, &record, &recipients, args.resend.policy())?;
    Ok((record, resolution))
}

pub fn write_text_plan(resolution: &ResolutionPlan) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(output, "ID: {}", resolution.identifier)?;
    writeln!(output, "FM: {}", resolution.sender)?;
    writeln!(output, "Serial: {}", resolution.serial)?;
    if !resolution.holders.is_empty() {
        writeln!(output, "Already held by: {}", resolution.holders.join(", "))?;
    }
    for entry in &resolution.entries {
        match &entry.on_disk_identifier {
            Some(folder) => writeln!(
                output,
                "\t{}\t{}\t{}",
                entry.recipient,
                entry.resolution.as_str(),
                folder
            )?,
            None => writeln!(
                output,
                "\t{}\t{}\t(skipped)",
                entry.recipient,
                entry.resolution.as_str()
            )?,
        }
    }

    output.flush()?;
    Ok(())
}
