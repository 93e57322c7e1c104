use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::ledger::ResendPolicy;
use crate::zones::DEFAULT_URL_PATTERN;

#[derive(Parser, Debug)]
#[command(
    name = "signalbox",
    version,
    about = "Signal PDF field extraction, de-duplication and filing"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract a candidate record from a signal PDF or text file.
    Extract(ExtractArgs),
    /// Print the identity state reconstructed from the data tree.
    Scan(ScanArgs),
    /// Show how a signal would be filed for each recipient without writing.
    Resolve(ResolveArgs),
    /// Extract, resolve and file a signal.
    Process(ProcessArgs),
    /// Write missing signal_info.json files from each folder's PDF.
    Regenerate(RegenerateArgs),
    /// Move signal folders of a recipient into the backup tree.
    Archive(ArchiveArgs),
    /// Move archived signal folders back into the data tree.
    Restore(RestoreArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ExtractionOptions {
    #[arg(long, default_value = "recipients.json")]
    pub recipient_list: PathBuf,

    #[arg(long = "platform-marker", default_values = ["texchn", "pyrseia"])]
    pub platform_markers: Vec<String>,

    #[arg(long, default_value = DEFAULT_URL_PATTERN)]
    pub boilerplate_url: String,
}

#[derive(Args, Debug, Clone)]
pub struct SourceOptions {
    #[arg(long, default_value = "downloads")]
    pub downloads_dir: PathBuf,

    #[arg(long, default_value = "pyrseia_server.pdf")]
    pub signal_pdf_name: String,

    /// Signal PDF to read instead of `<downloads-dir>/<signal-pdf-name>`.
    #[arg(long, conflicts_with = "text")]
    pub pdf: Option<PathBuf>,

    /// Plain-text signal body; skips PDF layout reading.
    #[arg(long)]
    pub text: Option<PathBuf>,
}

impl SourceOptions {
    pub fn signal_pdf(&self) -> PathBuf {
        self.pdf
            .clone()
            .unwrap_or_else(|| self.downloads_dir.join(&self.signal_pdf_name))
    }
}

#[derive(Args, Debug, Clone)]
pub struct ManualOptions {
    /// Signal identifier for manual entry; overrides extraction.
    #[arg(long = "id", requires = "manual_sender")]
    pub manual_identifier: Option<String>,

    /// Sender for manual entry.
    #[arg(long = "fm", requires = "manual_identifier")]
    pub manual_sender: Option<String>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ResendMode {
    Skip,
    Version,
}

impl ResendMode {
    pub fn policy(self) -> ResendPolicy {
        match self {
            Self::Skip => ResendPolicy::Skip,
            Self::Version => ResendPolicy::Version,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    #[command(flatten)]
    pub source: SourceOptions,

    #[command(flatten)]
    pub extraction: ExtractionOptions,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    #[arg(long, default_value = "DATA")]
    pub data_root: PathBuf,

    #[arg(long)]
    pub recipient: Option<String>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ResolveArgs {
    #[arg(long, default_value = "DATA")]
    pub data_root: PathBuf,

    #[command(flatten)]
    pub source: SourceOptions,

    #[command(flatten)]
    pub extraction: ExtractionOptions,

    #[command(flatten)]
    pub manual: ManualOptions,

    /// Recipients to file for; defaults to the detected recipients.
    #[arg(long = "recipient")]
    pub recipients: Vec<String>,

    /// What to do for recipients that already hold this signal. `version` files
    /// `ID(N)`; an N already taken by another signal's folder is reported blocked.
    #[arg(long, value_enum, default_value_t = ResendMode::Skip)]
    pub resend: ResendMode,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ProcessArgs {
    #[command(flatten)]
    pub resolve: ResolveArgs,

    #[arg(long, default_value_t = false)]
    pub clear_downloads: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RegenerateArgs {
    #[arg(long, default_value = "DATA")]
    pub data_root: PathBuf,

    #[command(flatten)]
    pub extraction: ExtractionOptions,

    /// Limit regeneration to these recipients.
    #[arg(long = "recipient")]
    pub recipients: Vec<String>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ArchiveArgs {
    #[arg(long, default_value = "DATA")]
    pub data_root: PathBuf,

    #[arg(long, default_value = "BACK UP DATA")]
    pub backup_root: PathBuf,

    #[arg(long)]
    pub recipient: String,

    /// Backup subfolder under the recipient, e.g. a file number.
    #[arg(long)]
    pub label: String,

    /// Signal folders to move; all of the recipient's folders when omitted.
    #[arg(long = "signal")]
    pub signals: Vec<String>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RestoreArgs {
    #[arg(long, default_value = "DATA")]
    pub data_root: PathBuf,

    #[arg(long, default_value = "BACK UP DATA")]
    pub backup_root: PathBuf,

    #[arg(long)]
    pub recipient: String,

    #[arg(long)]
    pub label: String,

    /// Archived folders to restore; every folder under the label when omitted.
    #[arg(long = "signal")]
    pub signals: Vec<String>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}
