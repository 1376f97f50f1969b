//! vocsync CLI
//!
//! Command-line tool for converting, checking and maintaining SKOS vocabularies.

use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vocsync::checks::check_ci_layout;
use vocsync::convert::{
    check, context_for, convert, format_ranges, join_vocab, make_ids, ranges, split_vocab,
    CheckOptions, ConvertOptions,
};
use vocsync::mint::MintRequest;
use vocsync::split::DEFAULT_BUCKET_SIZE;
use vocsync::{
    Config, OverrideSource, Overrides, Severity, ShapeSet, SourceFormat, SplitLayout,
    ValidationReport, VocabContext, VocabError,
};

#[derive(Parser)]
#[command(name = "vocsync")]
#[command(about = "Keep SKOS vocabularies in sync between xlsx workbooks and Turtle")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the ID range configuration
    #[arg(long, global = true, default_value = "idranges.toml")]
    config: PathBuf,

    /// More output; RUST_LOG takes precedence when set
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Vocabulary version used for provenance links (overrides VOCSYNC_VERSION)
    #[arg(long, global = true)]
    vocab_version: Option<String>,

    /// Committer whose ID ranges new IDs must come from (overrides GITHUB_ACTOR)
    #[arg(long, global = true)]
    committer: Option<String>,

    /// Repository as "owner/name" (overrides GITHUB_REPOSITORY)
    #[arg(long, global = true)]
    repository: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert xlsx to Turtle, or Turtle (file or split tree) to xlsx or canonical Turtle
    Convert(ConvertArgs),
    /// Validate vocabularies and report every problem found
    Check(CheckArgs),
    /// Replace placeholder IRIs in a workbook with permanent IDs
    MakeIds(MakeIdsArgs),
    /// Split a Turtle file into one file per concept or collection
    Split(SplitArgs),
    /// Join a split tree into a single Turtle file
    Join(JoinArgs),
    /// Show how much of each ID range is used
    Ranges(RangesArgs),
}

#[derive(Args)]
struct ConvertArgs {
    /// Workbooks, Turtle files or split directories
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output file, .xlsx or .ttl (only with a single input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Read Turtle written in the legacy format
    #[arg(long)]
    legacy: bool,
}

#[derive(Args)]
struct CheckArgs {
    /// Workbooks, Turtle files or split directories
    #[arg(required_unless_present = "ci_inbox")]
    inputs: Vec<PathBuf>,

    /// Inbox of a CI run; its workbook names must match the configuration
    #[arg(long)]
    ci_inbox: Option<PathBuf>,

    /// Published vocabularies checked together with --ci-inbox
    #[arg(long, requires = "ci_inbox")]
    ci_vocabs: Option<PathBuf>,

    /// Shape profile: vocpub or minimal
    #[arg(long, default_value = "vocpub")]
    profile: String,

    /// Lowest severity that fails the check: info, warning or violation
    #[arg(long, default_value = "violation")]
    fail_at: String,

    /// Print the reports as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Previous version (file, or directory holding files of the same name)
    #[arg(long)]
    previous: Option<PathBuf>,

    /// Read Turtle written in the legacy format
    #[arg(long)]
    legacy: bool,
}

#[derive(Args)]
struct MakeIdsArgs {
    /// Workbook to rewrite
    input: PathBuf,

    /// "prefix" or "prefix:base_iri" whose placeholders get IDs
    prefix: String,

    /// First ID to hand out
    start: u64,

    /// Write here instead of rewriting the input
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct SplitArgs {
    /// Turtle file to split
    input: PathBuf,

    /// Target directory (default: next to the input, named after it)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of IDs per bucket directory
    #[arg(long, default_value_t = DEFAULT_BUCKET_SIZE)]
    bucket_size: u64,

    /// Put every file at the root of the tree
    #[arg(long)]
    flat: bool,
}

#[derive(Args)]
struct JoinArgs {
    /// Split directory to join
    input: PathBuf,

    /// Output file (default: the directory name with .ttl)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct RangesArgs {
    /// Vocabulary name as declared in the configuration
    vocab: String,

    /// Vocabulary whose used IDs are counted
    #[arg(long)]
    input: Option<PathBuf>,
}

fn init_logging(verbose: u8) {
    let default = if verbose > 0 {
        "vocsync=debug"
    } else {
        "vocsync=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Configuration file if present; without it every vocabulary is unconfigured
fn load_config(path: &Path) -> Result<Option<Config>, VocabError> {
    if path.exists() {
        Ok(Some(Config::load(path)?))
    } else {
        warn!(
            "No configuration at {}, ID and metadata checks are disabled",
            path.display()
        );
        Ok(None)
    }
}

fn source_format(legacy: bool) -> SourceFormat {
    if legacy {
        SourceFormat::Legacy
    } else {
        SourceFormat::Current
    }
}

fn run_convert(
    args: ConvertArgs,
    config: Option<&Config>,
    overrides: &Overrides,
) -> Result<(), VocabError> {
    if args.output.is_some() && args.inputs.len() > 1 {
        return Err(VocabError::InvalidArgument(
            "--output can only be used with a single input".to_string(),
        ));
    }
    let options = ConvertOptions {
        output: args.output,
        format: source_format(args.legacy),
        today: chrono::Local::now().date_naive(),
    };
    for input in &args.inputs {
        let ctx = context_for(input, config, overrides.clone())?;
        let output = convert(input, &ctx, &options)?;
        eprintln!("Wrote {}", output.display());
    }
    Ok(())
}

/// Previous version matching `input`; a directory is searched by file name
fn previous_for(previous: &Path, input: &Path) -> Option<PathBuf> {
    let candidate = match input.file_name() {
        Some(name) if previous.is_dir() && !input.is_dir() => previous.join(name),
        _ => previous.to_path_buf(),
    };
    if candidate.exists() {
        Some(candidate)
    } else {
        info!("No previous version of {}, treating it as new", input.display());
        None
    }
}

fn run_check(
    args: CheckArgs,
    config: Option<&Config>,
    overrides: &Overrides,
) -> Result<(), VocabError> {
    if let Some(inbox) = &args.ci_inbox {
        match config {
            Some(config) => check_ci_layout(config, inbox, args.ci_vocabs.as_deref())?,
            None => warn!("Without a configuration the CI file names are not checked"),
        }
    }

    let shapes: ShapeSet = args.profile.parse()?;
    let fail_at: Severity = args.fail_at.parse()?;
    let format = source_format(args.legacy);

    let mut failing = ValidationReport::new();
    let mut reports = Vec::new();
    for input in &args.inputs {
        let ctx = context_for(input, config, overrides.clone())?;
        let options = CheckOptions {
            shapes: shapes.clone(),
            fail_at,
            previous: args
                .previous
                .as_deref()
                .and_then(|p| previous_for(p, input)),
            format,
        };
        let report = check(input, &ctx, &options)?;
        if args.json {
            reports.push(serde_json::json!({
                "vocabulary": ctx.name,
                "conforms": !report.fails_at(fail_at),
                "report": report,
            }));
        } else {
            report.log();
            eprintln!("{}: {}", input.display(), report.summary());
        }
        failing.extend(report.at_least(fail_at).violations);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }
    if failing.is_empty() {
        Ok(())
    } else {
        Err(VocabError::Validation(failing))
    }
}

fn run_make_ids(args: MakeIdsArgs, ctx: &VocabContext) -> Result<(), VocabError> {
    let request = MintRequest::parse(&args.prefix, args.start)?;
    let minted = make_ids(&args.input, args.output.as_deref(), ctx, &request)?;
    eprintln!(
        "Assigned {} IDs in {}",
        minted.assigned.len(),
        args.output.as_ref().unwrap_or(&args.input).display()
    );
    Ok(())
}

fn run_split(args: SplitArgs, ctx: &VocabContext) -> Result<(), VocabError> {
    let layout = if args.flat {
        SplitLayout::Flat
    } else {
        SplitLayout::Bucketed {
            size: args.bucket_size,
        }
    };
    let target = split_vocab(&args.input, args.output.as_deref(), ctx, layout)?;
    eprintln!("Wrote split tree to {}", target.display());
    Ok(())
}

fn run_join(args: JoinArgs, ctx: &VocabContext) -> Result<(), VocabError> {
    let output = join_vocab(&args.input, args.output.as_deref(), ctx)?;
    eprintln!("Wrote {}", output.display());
    Ok(())
}

fn run_ranges(
    args: RangesArgs,
    config: Option<&Config>,
    overrides: &Overrides,
) -> Result<(), VocabError> {
    let config = config.cloned().unwrap_or_default();
    let ctx = VocabContext::new(&args.vocab, &config, overrides.clone())?;
    let usage = ranges(args.input.as_deref(), &ctx, SourceFormat::Current)?;
    print!("{}", format_ranges(&ctx, &usage));
    Ok(())
}

fn run(cli: Cli) -> Result<(), VocabError> {
    let overrides = Overrides::resolve(&[
        OverrideSource::Environment,
        OverrideSource::Explicit(Overrides {
            version: cli.vocab_version,
            committer: cli.committer,
            repository: cli.repository,
        }),
    ]);
    let config = load_config(&cli.config)?;
    let config = config.as_ref();

    match cli.command {
        Commands::Convert(args) => run_convert(args, config, &overrides),
        Commands::Check(args) => run_check(args, config, &overrides),
        Commands::MakeIds(args) => {
            let ctx = context_for(&args.input, config, overrides)?;
            run_make_ids(args, &ctx)
        }
        Commands::Split(args) => {
            let ctx = context_for(&args.input, config, overrides)?;
            run_split(args, &ctx)
        }
        Commands::Join(args) => {
            let ctx = context_for(&args.input, config, overrides)?;
            run_join(args, &ctx)
        }
        Commands::Ranges(args) => run_ranges(args, config, &overrides),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
