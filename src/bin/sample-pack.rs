use clap::{Args, Parser, Subcommand};
use sample_pack_core::{
    drum_presets, presets::find_preset, Event, PipelineConfig, Reporter, SampleError, Session,
    Stage,
};
use std::{
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
    process::ExitCode,
    sync::mpsc::{self, RecvTimeoutError},
    thread,
    time::Duration,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sample-pack")]
#[command(about = "Build sample packs from online tracks: download, separate, slice, tag", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON config file (defaults to the per-user config when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Root of the tracks/, separated/ and samples/ folders
    #[arg(short, long, global = true)]
    base_dir: Option<PathBuf>,

    /// Local folder of tracks to use instead of <base-dir>/tracks
    #[arg(short, long, global = true)]
    source_dir: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand playlist URLs into individual video URLs
    Links { urls: Vec<String> },

    /// Download URLs (playlists are expanded first) as audio
    Download {
        urls: Vec<String>,

        /// Read additional URLs from a file, one per line
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Split every downloaded track into stems
    Separate {
        /// Separation model passed to demucs
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Slice drum hits and loops out of the separated stems
    Extract,

    /// Normalize and fade every sample in place
    Preprocess(PreprocessArgs),

    /// Randomly nudge samples in time
    Humanize(HumanizeArgs),

    /// Detect and tag the musical key of every sample
    TagKeys,

    /// Download, separate, extract, preprocess, tag and humanize
    RunAll {
        urls: Vec<String>,

        #[arg(short, long)]
        file: Option<PathBuf>,

        #[command(flatten)]
        preprocess: PreprocessArgs,

        #[command(flatten)]
        humanize: HumanizeArgs,
    },

    /// List the bundled drum pattern presets
    Presets {
        /// Show the step grid of one preset
        name: Option<String>,
    },

    /// Interactive session; stages run in the background
    Shell,
}

#[derive(Args, Clone, Default)]
struct PreprocessArgs {
    /// Normalize RMS to --dbfs before fading
    #[arg(long)]
    normalize: bool,

    #[arg(long, allow_hyphen_values = true)]
    dbfs: Option<f32>,

    /// Fade-in length in milliseconds
    #[arg(long)]
    fade_in: Option<u32>,

    /// Fade-out length in milliseconds
    #[arg(long)]
    fade_out: Option<u32>,
}

#[derive(Args, Clone, Default)]
struct HumanizeArgs {
    /// Maximum shift in milliseconds
    #[arg(long)]
    max_ms: Option<u32>,

    /// Percent chance that a sample gets shifted
    #[arg(long)]
    chance: Option<f64>,
}

impl PreprocessArgs {
    fn apply(&self, cfg: &mut PipelineConfig) {
        cfg.normalize |= self.normalize;
        if let Some(v) = self.dbfs {
            cfg.target_dbfs = v;
        }
        if let Some(v) = self.fade_in {
            cfg.fade_in_ms = v;
        }
        if let Some(v) = self.fade_out {
            cfg.fade_out_ms = v;
        }
    }
}

impl HumanizeArgs {
    fn apply(&self, cfg: &mut PipelineConfig) {
        if let Some(v) = self.max_ms {
            cfg.humanize_ms = v;
        }
        if let Some(v) = self.chance {
            cfg.humanize_chance = v;
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = if quiet { "error" } else { filter };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn read_url_file(path: &Path) -> Result<Vec<String>, SampleError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(raw.lines().map(str::to_string).collect())
}

fn run(cli: Cli) -> Result<(), SampleError> {
    let mut cfg = PipelineConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.base_dir {
        cfg.base_dir = dir;
    }
    if let Some(dir) = cli.source_dir {
        cfg.download_dir = Some(dir);
    }

    let quiet = cli.quiet;
    let (stage, urls) = match cli.command {
        Commands::Presets { name } => return handle_presets(name.as_deref()),
        Commands::Shell => {
            cfg.validate()?;
            return handle_shell(cfg);
        }
        Commands::Links { urls } => (Stage::Links, urls),
        Commands::Download { mut urls, file } => {
            if let Some(f) = file {
                urls.extend(read_url_file(&f)?);
            }
            // Playlists are expanded in a separate pass below.
            (Stage::Download, urls)
        }
        Commands::Separate { model } => {
            if let Some(m) = model {
                cfg.separation_model = m;
            }
            (Stage::Separate, Vec::new())
        }
        Commands::Extract => (Stage::Extract, Vec::new()),
        Commands::Preprocess(args) => {
            args.apply(&mut cfg);
            (Stage::Preprocess, Vec::new())
        }
        Commands::Humanize(args) => {
            args.apply(&mut cfg);
            (Stage::Humanize, Vec::new())
        }
        Commands::TagKeys => (Stage::TagKeys, Vec::new()),
        Commands::RunAll {
            mut urls,
            file,
            preprocess,
            humanize,
        } => {
            if let Some(f) = file {
                urls.extend(read_url_file(&f)?);
            }
            preprocess.apply(&mut cfg);
            humanize.apply(&mut cfg);
            (Stage::RunAll, urls)
        }
    };
    cfg.validate()?;

    let session = Session::new(cfg, Reporter::callback(move |ev| render(&ev, quiet)));
    session.set_urls(&urls);
    if matches!(stage, Stage::Download | Stage::RunAll) && urls.iter().any(|u| u.contains("list=")) {
        session.run(Stage::Links)?;
    }
    session.run(stage)?;

    if stage == Stage::Links && quiet {
        for url in session.urls() {
            println!("{url}");
        }
    }
    Ok(())
}

fn render(ev: &Event, quiet: bool) {
    if quiet {
        return;
    }
    match ev {
        Event::Status(msg) => eprintln!("⏳ {msg}"),
        Event::Log(msg) => println!("{msg}"),
        Event::Progress { done, total } => {
            eprint!("\r🔄 {done}/{total}");
            if done >= total {
                eprintln!();
            }
        }
        Event::Finished { stage } => eprintln!("✅ {stage} finished"),
    }
}

fn handle_presets(name: Option<&str>) -> Result<(), SampleError> {
    if let Some(name) = name {
        let p = find_preset(name)?;
        println!("{} ({} BPM)", p.name, p.tempo);
        for row in p.grid() {
            println!("  {row}");
        }
        return Ok(());
    }

    eprintln!("📋 Drum Presets");
    eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for p in drum_presets()? {
        println!("  • {:<20} {} BPM", p.name, p.tempo);
    }
    eprintln!();
    eprintln!("Use `sample-pack presets <name>` to show a pattern");
    Ok(())
}

const SHELL_HELP: &str = "\
commands:
  url <url>...     add URLs to the list
  urls             show the URL list
  clear            empty the URL list
  folder [path]    use a local folder of tracks (no path: back to tracks/)
  links | download | separate | extract | preprocess | tag-keys | humanize | run-all
                   start a stage in the background
  status           show the running stage
  help             this text
  quit             leave (a running stage is abandoned)";

fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

fn handle_shell(cfg: PipelineConfig) -> Result<(), SampleError> {
    let (tx, events) = mpsc::channel();
    let mut session = Session::new(cfg, Reporter::channel(tx));

    let (line_tx, lines) = mpsc::channel::<String>();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line_tx.send(line).is_err() {
                break;
            }
        }
    });

    println!("sample-pack shell, base dir {}", session.layout().root().display());
    println!("tracks from {}", session.source_dir().display());
    println!("{SHELL_HELP}");
    prompt();

    loop {
        for ev in events.try_iter() {
            render(&ev, false);
        }

        let line = match lines.recv_timeout(Duration::from_millis(100)) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let mut words = line.split_whitespace();
        match words.next() {
            None => {}
            Some("quit") | Some("exit") => break,
            Some("help") => println!("{SHELL_HELP}"),
            Some("url") => {
                let mut urls = session.urls();
                urls.extend(words.map(str::to_string));
                session.set_urls(&urls);
                println!("{} URLs", urls.len());
            }
            Some("urls") => {
                for u in session.urls() {
                    println!("  {u}");
                }
            }
            Some("clear") => session.set_urls::<&str>(&[]),
            Some("folder") => {
                let path = line.trim_start()["folder".len()..].trim();
                session.set_source_dir((!path.is_empty()).then(|| PathBuf::from(path)));
                println!("tracks from {}", session.source_dir().display());
            }
            Some("status") => match session.running() {
                Some(st) => println!("running: {st}"),
                None => println!("idle"),
            },
            Some(cmd) => match cmd.parse::<Stage>() {
                Ok(stage) => {
                    if let Err(e) = session.start(stage) {
                        println!("{e}");
                    }
                }
                Err(e) => println!("{e} (try `help`)"),
            },
        }
        prompt();
    }
    Ok(())
}
