//! Yami QA CLI
//!
//! Command-line interface for the libyami codec regression harness.

#![allow(clippy::doc_markdown)]

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::EnvFilter;
use yami_qa_cli::{
    CliError, RunOptions, describe_geometry, execute_run, list_presets, summary_lines,
};

#[derive(Parser)]
#[command(name = "yami-qa")]
#[command(about = "Regression harness for the libyami codec tools", long_about = None)]
#[command(version)]
struct Cli {
    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a test mode over a media file or directory
    Run {
        /// Media file or directory
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Test mode (decode, decode-full, encode, v4l2, v4l2-render)
        #[arg(value_name = "MODE")]
        mode: String,

        /// Directory the tools write their outputs into
        #[arg(value_name = "OUTPUT", default_value = "output")]
        output: PathBuf,

        /// Keep decoded and encoded outputs
        #[arg(long)]
        save: bool,

        /// Reference hash file used for every input instead of bits.md5
        #[arg(long, value_name = "FILE")]
        md5: Option<PathBuf>,

        /// Harness configuration (YAML)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Directory holding the codec tools
        #[arg(long, value_name = "DIR")]
        tools_dir: Option<PathBuf>,

        /// Directory for the timestamped result log
        #[arg(long, value_name = "DIR", default_value = "log")]
        log_dir: PathBuf,

        /// Kill a tool invocation after this many seconds
        #[arg(long, value_name = "N")]
        timeout_secs: Option<u64>,

        /// Also write a JUnit XML report
        #[arg(long, value_name = "FILE")]
        junit: Option<PathBuf>,

        /// Also write a JSON summary
        #[arg(long, value_name = "FILE")]
        json: Option<PathBuf>,
    },

    /// List the available test modes
    Presets,

    /// Print the frame geometry encoded in a file name
    Geometry {
        /// File name such as clip_352x288.yuv
        #[arg(value_name = "FILE_NAME")]
        file_name: String,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// First Ctrl-C stops the run after the current case, a second one exits
fn setup_signal_handler() -> Arc<AtomicBool> {
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    if let Err(e) = ctrlc::set_handler(move || {
        if flag.swap(true, Ordering::SeqCst) {
            eprintln!("\nSecond interrupt, exiting now.");
            std::process::exit(130); // 128 + SIGINT(2)
        }
        eprintln!("\nInterrupt received. Finishing the current case, then writing the report...");
    }) {
        tracing::warn!("failed to set signal handler: {e}");
    }
    interrupted
}

fn fail(err: &CliError) -> ! {
    eprintln!("{err}");
    std::process::exit(1);
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            path,
            mode,
            output,
            save,
            md5,
            config,
            tools_dir,
            log_dir,
            timeout_secs,
            junit,
            json,
        } => {
            let interrupted = setup_signal_handler();
            let options = RunOptions {
                path,
                mode,
                output,
                save,
                md5,
                config,
                tools_dir,
                log_dir,
                timeout_secs,
                junit,
                json,
            };
            println!(
                "Running {} over {} (output: {}, save: {})",
                options.mode,
                options.path.display(),
                options.output.display(),
                options.save
            );
            let report = match execute_run(&options, None, Arc::clone(&interrupted)) {
                Ok(report) => report,
                Err(e) => fail(&e),
            };
            println!("{}", summary_lines(&report));
            if interrupted.load(Ordering::SeqCst) {
                std::process::exit(130);
            }
        }
        Commands::Presets => print!("{}", list_presets()),
        Commands::Geometry { file_name } => match describe_geometry(&file_name) {
            Ok(geometry) => println!("{geometry}"),
            Err(e) => fail(&e),
        },
    }
}
