//! Style dump tool for StyleKit documents.
//!
//! Parses an XHTML document (or fragment), applies its linked stylesheets
//! plus any given on the command line, and prints the resolved attributes of
//! every element.
//!
//! ## Usage
//!
//! ```bash
//! # Dump every element with non-default attributes
//! style-dump page.html
//!
//! # Add a stylesheet and dump one subtree as JSON
//! style-dump page.html --css theme.css --id main --format json
//!
//! # Debug logging for the cascade only
//! style-dump page.html -v --log-filter stylekit_css=trace
//! ```

use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use stylekit_common::{init_logging, LogConfig, LogFormat};
use tracing::error;

mod dump;

use dump::{DumpOptions, OutputFormat};

#[derive(Parser, Debug)]
#[command(name = "style-dump")]
#[command(about = "Dump resolved StyleKit attributes for every element of a document")]
struct Cli {
    /// XHTML document or fragment
    document: PathBuf,

    /// Extra stylesheet, applied after the linked ones (repeatable)
    #[arg(long = "css", value_name = "FILE")]
    stylesheets: Vec<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Only dump the subtree of the element with this id
    #[arg(long)]
    id: Option<String>,

    /// Include attributes that resolve to their default
    #[arg(long)]
    all: bool,

    /// Include hover variants
    #[arg(long)]
    hover: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log filter, e.g. "stylekit_css=debug"
    #[arg(long)]
    log_filter: Option<String>,

    /// Log record format: pretty, compact or json
    #[arg(long)]
    log_format: Option<LogFormat>,
}

impl Cli {
    fn dump_options(&self) -> DumpOptions {
        DumpOptions {
            document: self.document.clone(),
            stylesheets: self.stylesheets.clone(),
            format: self.format,
            id: self.id.clone(),
            all: self.all,
            hover: self.hover,
        }
    }

    fn log_config(&self) -> LogConfig {
        let mut config = LogConfig::from_verbosity(self.verbose);
        if let Some(filter) = &self.log_filter {
            config = config.with_filter(filter.clone());
        }
        if let Some(format) = self.log_format {
            config = config.with_format(format);
        }
        config
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_config());

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = dump::run(&cli.dump_options(), &mut out);
    let _ = out.flush();

    if let Err(e) = result {
        error!(category = e.category(), "{}", e);
        eprintln!("style-dump: {}", e);
        std::process::exit(e.exit_code());
    }
}
