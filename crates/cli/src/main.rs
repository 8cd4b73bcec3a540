use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use photo_organizer_core::{
    app_paths, clear_last_log, load_config, load_last_log, save_last_log, undo_operations,
    AppConfig, CommandTagger, GazetteerResolver, OperationLog, OrganizeStats, Organizer,
};
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Parser)]
#[command(name = "photo-organizer-cli")]
#[command(about = "Sort photos into YYYY/MM/<location> folders using EXIF metadata")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Organize(OrganizeArgs),
    Undo(UndoArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    Show,
}

#[derive(Debug, Args)]
struct OrganizeArgs {
    #[arg(long)]
    source: PathBuf,
    #[arg(long)]
    dest: PathBuf,
    /// Move files; without this only the plan is printed
    #[arg(long, default_value_t = false)]
    apply: bool,
    /// Tag images with the configured tagging command
    #[arg(long, default_value_t = false)]
    tag: bool,
    /// GeoNames-style CSV used for reverse geocoding
    #[arg(long)]
    gazetteer: Option<PathBuf>,
    #[arg(long)]
    max_distance_km: Option<f64>,
    /// Also write the operation log here
    #[arg(long)]
    log: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

#[derive(Debug, Args)]
struct UndoArgs {
    /// Operation log to undo; defaults to the last applied run
    log: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config()?;
    setup_logging(&config, cli.verbose);

    match cli.command {
        Commands::Organize(args) => cmd_organize(&config, args),
        Commands::Undo(args) => cmd_undo(args),
        Commands::Config(config_args) => match config_args.action {
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

fn setup_logging(config: &AppConfig, verbosity: u8) {
    let level = match verbosity {
        0 => log::LevelFilter::from_str(&config.log_level).unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

fn cmd_organize(config: &AppConfig, args: OrganizeArgs) -> Result<()> {
    if args.apply {
        fs::create_dir_all(&args.dest).with_context(|| {
            format!(
                "failed to create destination directory: {}",
                args.dest.display()
            )
        })?;
    }

    let mut organizer = Organizer::new(&args.source, &args.dest);

    if let Some(gazetteer) = args
        .gazetteer
        .as_ref()
        .or(config.geocoding.gazetteer.as_ref())
    {
        let max_distance = args.max_distance_km.or(config.geocoding.max_distance_km);
        organizer = organizer.with_resolver(GazetteerResolver::from_path(gazetteer, max_distance)?);
    }

    if config.tagging_enabled(args.tag) {
        if config.tagging.command.is_empty() {
            bail!("tagging requested but tagging.command is not set in the config file");
        }
        organizer = organizer.with_tagger(CommandTagger::new(&config.tagging.command)?);
    }

    let mode = if args.apply { "LIVE RUN" } else { "DRY RUN" };
    eprintln!("{mode}");
    eprintln!("source: {}", organizer.source_root().display());
    eprintln!("destination: {}", organizer.dest_root().display());

    let stats = organizer.organize(!args.apply)?;

    match args.output {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "stats": stats,
                "operations": organizer.operation_log(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Table => print_table(organizer.operation_log(), &stats),
    }

    if let Some(path) = args.log.as_ref() {
        organizer.save_operation_log(path)?;
        eprintln!("operation log saved to: {}", path.display());
    }

    if args.apply {
        save_last_log(organizer.operation_log())?;
        eprintln!("run `photo-organizer-cli undo` to restore the original layout");
    } else {
        eprintln!("dry run: no files were moved. Pass --apply to move them.");
    }

    Ok(())
}

fn cmd_undo(args: UndoArgs) -> Result<()> {
    let (log, from_last_run) = match args.log {
        Some(path) => (OperationLog::load(&path)?, false),
        None => (
            load_last_log()?.context("no applied run to undo; pass a log file")?,
            true,
        ),
    };

    let result = undo_operations(&log);

    println!(
        "undo complete: restored={} skipped={} failed={}",
        result.restored, result.skipped, result.failed
    );

    if result.failed > 0 {
        bail!("{} operations could not be undone", result.failed);
    }
    if from_last_run {
        clear_last_log()?;
    }
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let paths = app_paths()?;
    println!("config file: {}", paths.config_path.display());
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

fn print_table(log: &OperationLog, stats: &OrganizeStats) {
    println!("source -> destination [location] (tags)");
    for entry in log.entries() {
        let tags = entry
            .tags
            .as_ref()
            .map(|t| t.join(", "))
            .unwrap_or_default();
        println!(
            "{} -> {} [{}] ({})",
            entry.source.display(),
            entry.destination.display(),
            entry.location.as_deref().unwrap_or("-"),
            tags
        );
    }

    println!(
        "\nsummary: processed={} moved={} tagged={} errors={}",
        stats.processed, stats.moved, stats.tagged, stats.errors
    );
}
