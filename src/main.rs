// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Result, anyhow, Context};
use log::{warn, info, LevelFilter, Log, Metadata, Record, Level, SetLoggerError};
use std::path::{Path, PathBuf};
use std::io::Write;
use std::fs::File;
use std::io::BufReader;
use clap::{Args, Parser, ValueEnum, CommandFactory, Subcommand};
use clap_complete::{generate, Shell};

use vidsub::app_config::{self, Config};
use vidsub::app_controller::Controller;
use vidsub::subtitle_processor::CueGranularity;

/// CLI Wrapper for CueGranularity to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliGranularity {
    Word,
    Phrase,
}

impl From<CliGranularity> for CueGranularity {
    fn from(cli_granularity: CliGranularity) -> Self {
        match cli_granularity {
            CliGranularity::Word => CueGranularity::Word,
            CliGranularity::Phrase => CueGranularity::Phrase,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Subtitle a video (default command)
    Process(ProcessArgs),

    /// Transcribe an audio file to SRT without touching any video
    Transcribe(TranscribeArgs),

    /// Generate shell completions for vidsub
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct ProcessArgs {
    /// Input video file
    #[arg(value_name = "INPUT")]
    input_path: PathBuf,

    /// Force overwrite of an existing output file
    #[arg(short, long)]
    force_overwrite: bool,
}

#[derive(Parser, Debug)]
struct TranscribeArgs {
    /// Input audio file (mono PCM WAV works best)
    #[arg(value_name = "AUDIO")]
    audio_path: PathBuf,

    /// Subtitle file to write (defaults to the audio path with .srt)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// Options shared by every subcommand
#[derive(Args, Debug)]
struct CommonArgs {
    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config_path: String,

    /// Recognition service WebSocket URL
    #[arg(long, env = "VIDSUB_RECOGNITION_URL", global = true)]
    server_url: Option<String>,

    /// One cue per word or per phrase
    #[arg(short, long, value_enum, global = true)]
    granularity: Option<CliGranularity>,

    /// Directory for intermediate and output files
    #[arg(short = 'd', long, global = true)]
    output_dir: Option<PathBuf>,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,
}

/// vidsub - burn speech-recognized subtitles into portrait videos
///
/// Extracts the audio track, transcribes it through a streaming speech
/// recognizer, reframes the video to a vertical canvas and burns the
/// resulting subtitles into it.
#[derive(Parser, Debug)]
#[command(name = "vidsub")]
#[command(version)]
#[command(about = "Speech-recognized subtitles for portrait videos")]
#[command(long_about = "vidsub reframes a video to 1080x1920, transcribes its audio with a streaming \
speech recognizer and burns the words in as subtitles.

EXAMPLES:
    vidsub clip.mp4                                # Subtitle using conf.json
    vidsub -f clip.mp4                             # Overwrite an existing output
    vidsub -g phrase clip.mp4                      # One cue per phrase
    vidsub --server-url ws://vosk:2700 clip.mp4    # Use another recognizer
    vidsub transcribe clip.wav -o clip.srt         # Only transcribe audio
    vidsub completions bash > vidsub.bash          # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input video file
    #[arg(value_name = "INPUT")]
    input_path: Option<PathBuf>,

    /// Force overwrite of an existing output file
    #[arg(short, long)]
    force_overwrite: bool,

    #[command(flatten)]
    common: CommonArgs,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        // Filtering happens through log::max_level, which may be raised later
        let logger = Box::new(CustomLogger::new(LevelFilter::Trace));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji for log level
    fn get_emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌ ",
            Level::Warn => "🚧 ",
            Level::Info => " ",
            Level::Debug => "🔍 ",
            Level::Trace => "📋 ",
        }
    }

    // @returns: ANSI color code for log level
    fn get_color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "1;31",
            Level::Warn => "1;33",
            Level::Info => "1;32",
            Level::Debug => "1;36",
            Level::Trace => "1;35",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let level = record.level();

            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "\x1B[{}m{} {} {}\x1B[0m",
                Self::get_color_for_level(level),
                now,
                Self::get_emoji_for_level(level),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Info by default; raised or lowered once the config is loaded
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "vidsub", &mut std::io::stdout());
            Ok(())
        }
        Some(Commands::Process(args)) => run_process(args, cli.common).await,
        Some(Commands::Transcribe(args)) => run_transcribe(args, cli.common).await,
        None => {
            let input_path = cli.input_path.ok_or_else(|| {
                anyhow!("INPUT is required when no subcommand is specified")
            })?;

            let process_args = ProcessArgs {
                input_path,
                force_overwrite: cli.force_overwrite,
            };
            run_process(process_args, cli.common).await
        }
    }
}

async fn run_process(options: ProcessArgs, common: CommonArgs) -> Result<()> {
    let config = load_config(&common)?;
    let output_dir = config.output_dir.clone();
    let controller = Controller::with_config(config)?;

    match controller.run(options.input_path, output_dir, options.force_overwrite).await? {
        Some(output) => println!("{}", output.display()),
        None => info!("Nothing to do"),
    }

    Ok(())
}

async fn run_transcribe(options: TranscribeArgs, common: CommonArgs) -> Result<()> {
    let config = load_config(&common)?;
    let controller = Controller::with_config(config)?;

    let output = controller.transcribe_only(options.audio_path, options.output).await?;
    println!("{}", output.display());

    Ok(())
}

/// Load (or create) the config file, apply CLI overrides and set the log level
fn load_config(options: &CommonArgs) -> Result<Config> {
    // If log level is set via command line, apply it immediately
    if let Some(cmd_log_level) = &options.log_level {
        let level: app_config::LogLevel = cmd_log_level.clone().into();
        log::set_max_level(LevelFilter::from(&level));
    }

    let config_path = &options.config_path;
    let mut config = if Path::new(config_path).exists() {
        let file = File::open(config_path)
            .context(format!("Failed to open config file: {}", config_path))?;

        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .context(format!("Failed to parse config file: {}", config_path))?
    } else {
        warn!("Config file not found at '{}', creating default config.", config_path);

        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;

        std::fs::write(config_path, config_json)
            .context(format!("Failed to write default config to file: {}", config_path))?;

        config
    };

    apply_overrides(&mut config, options);

    config.validate()
        .context("Configuration validation failed")?;

    // If log level was not set via command line, update it from config now
    if options.log_level.is_none() {
        log::set_max_level(LevelFilter::from(&config.log_level));
    }

    Ok(config)
}

fn apply_overrides(config: &mut Config, options: &CommonArgs) {
    if let Some(server_url) = &options.server_url {
        config.recognition.server_url = server_url.clone();
    }

    if let Some(granularity) = &options.granularity {
        config.subtitles.granularity = granularity.clone().into();
    }

    if let Some(output_dir) = &options.output_dir {
        config.output_dir = Some(output_dir.clone());
    }

    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }
}
