//! Command-line interface.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};

use crate::errors::FfaResult;
use crate::runtime::{Backend, OutputTarget, RunOptions};

#[derive(Debug, Parser)]
#[command(name = "ffaflow", version)]
#[command(about = "Run the FFA pulsar-search pipeline over a list of observations", long_about = None)]
pub struct Cli {
    /// File listing observation directories, one per line
    #[arg(short = 'i', value_name = "INPUT_LIST")]
    pub input_list: PathBuf,

    /// Output directory, or `auto` for <observation>/FFAPipeData
    #[arg(short = 'o', value_name = "DIR|auto")]
    pub output: String,

    /// File listing compute hosts, one per line (rank order)
    #[arg(short = 'm', value_name = "NODE_LIST")]
    pub node_list: PathBuf,

    /// Backend that produced the raw data
    #[arg(short = 'b', value_enum, ignore_case = true, default_value_t = Backend::Spotlight)]
    pub backend: Backend,

    /// Process every scan of each observation instead of only the latest
    #[arg(short = 'a')]
    pub all_scans: bool,

    /// Time binning factor for extraction
    #[arg(short = 't', default_value_t = 1)]
    pub time_bin: u32,

    /// Frequency binning factor for extraction
    #[arg(short = 'f', default_value_t = 1)]
    pub freq_bin: u32,

    /// Parallel extraction jobs per host
    #[arg(short = 'j', default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub jobs: u32,

    /// Beam offset for extraction
    #[arg(short = 's', default_value_t = 0, allow_negative_numbers = true)]
    pub offset: i32,

    /// Pipeline configuration (JSON)
    #[arg(short = 'c', value_name = "CONFIG")]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn into_options(self) -> FfaResult<RunOptions> {
        Ok(RunOptions {
            input_list: self.input_list,
            output: OutputTarget::parse(&self.output)?,
            node_list: self.node_list,
            backend: self.backend,
            all_scans: self.all_scans,
            time_bin: self.time_bin,
            freq_bin: self.freq_bin,
            jobs: self.jobs,
            offset: self.offset,
            config: self.config,
        })
    }
}

/// Result of command-line parsing.
#[derive(Debug)]
pub enum ParseOutcome {
    Run(RunOptions),
    /// Stop with this exit code (help, version, or a usage error already printed).
    Exit(i32),
}

/// Parse `args` (program name first).
///
/// No arguments prints usage and exits 0; help and version exit 0; any
/// other parse error exits 1.
pub fn parse_args<I, T>(args: I) -> ParseOutcome
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    if args.len() <= 1 {
        let _ = Cli::command().print_help();
        return ParseOutcome::Exit(0);
    }

    match Cli::try_parse_from(&args) {
        Ok(cli) => match cli.into_options() {
            Ok(options) => ParseOutcome::Run(options),
            Err(e) => {
                eprintln!("error: {}", e);
                ParseOutcome::Exit(1)
            }
        },
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            ParseOutcome::Exit(code)
        }
    }
}
