use clap::Parser;
use sample_pack_core::{core::tempo::batch_process_root, Analyzers, Event, Reporter};
use std::{path::PathBuf, process::ExitCode};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tempo-matcher")]
#[command(about = "Time-stretch folders of audio to one BPM, cut to whole bars", long_about = None)]
#[command(version)]
struct Cli {
    /// Root folder whose subfolders hold the audio
    #[arg(short = 'i', long)]
    root_input: PathBuf,

    /// Where the mirrored subfolders are written
    #[arg(short = 'o', long)]
    root_output: PathBuf,

    /// Target tempo
    #[arg(short, long)]
    bpm: f64,

    #[arg(short = 'p', long, default_value_t = 4)]
    beats_per_bar: u32,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if !cli.root_input.is_dir() {
        eprintln!("Error: input folder not found: {}", cli.root_input.display());
        return ExitCode::FAILURE;
    }

    let reporter = Reporter::callback(|ev| {
        if let Event::Log(msg) = ev {
            println!("{msg}");
        }
    });
    let analyzers = Analyzers::default();

    match batch_process_root(
        &cli.root_input,
        &cli.root_output,
        cli.bpm,
        cli.beats_per_bar,
        analyzers.tempo.as_ref(),
        analyzers.stretcher.as_ref(),
        &reporter,
    ) {
        Ok((_, summary)) => {
            println!(
                "Summary: {} matched, {} failed (of {} total)",
                summary.succeeded, summary.failed, summary.total
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
