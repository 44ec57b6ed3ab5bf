use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use inspectkit_cli::conf::C_ENV_CONFIG;
use inspectkit_cli::{
    CliError, SpecGenerateOptions, init_logging, load_config, run_generate, run_init, run_list,
    run_status,
};
use inspectkit_core::EnumReportVariant;
use tracing::error;

/// Inspection report generator: group inspection records into numbered
/// report lines, render them to xlsx and file them per train.
#[derive(Parser)]
#[command(name = "inspectkit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Config file (default: ./inspectkit.toml when present)
    #[arg(long, global = true, env = C_ENV_CONFIG)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored log output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the next report(s) from the source export
    Generate(GenerateArgs),

    /// Write a fresh watermark state
    Init(InitArgs),

    /// Show the watermark state and pending source rows
    Status(VariantArgs),

    /// List stored reports of one train
    List(ListArgs),
}

#[derive(Args, Debug)]
struct VariantArgs {
    /// Report variant: visual | functional
    #[arg(long)]
    variant: EnumReportVariant,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[command(flatten)]
    target: VariantArgs,

    /// Start item number for the first report, replacing the stored one
    #[arg(long)]
    start_item_no: Option<u64>,

    /// Keep generating until the source is exhausted
    #[arg(long)]
    all: bool,

    /// Render and plan placement without storing or saving state
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args, Debug)]
struct InitArgs {
    #[command(flatten)]
    target: VariantArgs,

    /// Item number of the first report line
    #[arg(long)]
    start_item_no: u64,

    /// Replace an existing state
    #[arg(long)]
    force: bool,
}

#[derive(Args, Debug)]
struct ListArgs {
    #[command(flatten)]
    target: VariantArgs,

    /// Train number
    #[arg(long)]
    train: String,

    /// File name glob (default: *.xlsx)
    #[arg(long)]
    pattern: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.global.verbose, cli.global.quiet, cli.global.no_color);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let config = load_config(cli.global.config.as_deref())?;

    match &cli.command {
        Commands::Generate(args) => {
            let report = run_generate(
                &config,
                &SpecGenerateOptions {
                    variant: args.target.variant,
                    start_item_no: args.start_item_no,
                    if_all: args.all,
                    if_dry_run: args.dry_run,
                },
            )?;
            for batch in &report.batches {
                println!(
                    "{} {}..{} {}",
                    batch.train_no,
                    batch.start_item_no,
                    batch.end_item_no,
                    batch.path_report.display()
                );
            }
            for c_msg in &report.warnings {
                eprintln!("warning: {c_msg}");
            }
            println!("{report}");
        }
        Commands::Init(args) => {
            let path_state =
                run_init(&config, args.target.variant, args.start_item_no, args.force)?;
            println!("{}", path_state.display());
        }
        Commands::Status(args) => {
            print!("{}", run_status(&config, args.variant)?);
        }
        Commands::List(args) => {
            for path in run_list(
                &config,
                args.target.variant,
                &args.train,
                args.pattern.as_deref(),
            )? {
                println!("{}", path.display());
            }
        }
    }
    Ok(())
}
