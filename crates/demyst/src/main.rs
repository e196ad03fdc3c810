use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::{fs, process};

use clap::{Args, Parser, Subcommand};
use demyst_core::config::{MarkupStyle, PathStyle};
use demyst_core::metadata::{LoadedTrace, TraceFile};
use demyst_core::postprocess::PostProcessor;
use demyst_core::trace::TraceAggregator;
use demyst_core::types::ResolvedFrame;
use demyst_core::{DemystResult, TraceOptions};
use demyst_utils::{debug, info, init_logging, init_logging_with_level, LogFormat, LogLevel, LoggingError, LoggingGuard};

/// Render readable, demystified stack traces from captured frame metadata.
#[derive(Parser, Debug)]
#[command(name = "demyst")]
#[command(version)]
#[command(about = "Render readable, demystified stack traces from captured frame metadata", long_about = None)]
struct Cli
{
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    render: RenderArgs,

    /// Log level (error, warn, info, debug, trace); overrides RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Log format (pretty or json); overrides DEMYST_LOG_FORMAT
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
}

/// Rendering flags, applied on top of the `DEMYST_*` environment settings.
#[derive(Args, Debug)]
struct RenderArgs
{
    /// Render full parameter types and names instead of compact letters
    #[arg(long, global = true)]
    full_params: bool,

    /// Emit plain text without markup sentinels
    #[arg(long, global = true)]
    plain: bool,

    /// Resolve every frame without the shared cache
    #[arg(long, global = true)]
    no_cache: bool,

    /// Skip post-processing and print decorated text as is
    #[arg(long, global = true)]
    no_postprocess: bool,

    /// Drop the first line containing this marker and everything after it
    #[arg(long, global = true)]
    boundary: Option<String>,

    /// Path separator normalization (unix, windows, preserve)
    #[arg(long, global = true)]
    path_style: Option<PathStyle>,

    /// Markup vocabulary (rich or ansi)
    #[arg(long, global = true)]
    markup: Option<MarkupStyle>,

    /// Font size for file locations in rich markup
    #[arg(long, global = true)]
    font_size: Option<u32>,

    /// Prefix for every emitted line
    #[arg(long, global = true)]
    continuation: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Render the exception (or call-site frames) of a trace file
    Render
    {
        /// Path to a JSON trace file
        file: PathBuf,
    },
    /// List resolved frames of a trace file, one per line with its index
    Frames
    {
        /// Path to a JSON trace file
        file: PathBuf,
    },
    /// Post-process decorated trace text
    Postprocess
    {
        /// Path to decorated text, or `-` for stdin
        input: String,
    },
}

fn main()
{
    let cli = Cli::parse();

    // Kept alive until exit so file logging is flushed
    let _guard = match start_logging(&cli) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run_command(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn start_logging(cli: &Cli) -> Result<LoggingGuard, LoggingError>
{
    match (cli.log_level, cli.log_format) {
        (None, None) => init_logging(),
        (level, format) => init_logging_with_level(level.unwrap_or(LogLevel::Warn), format.unwrap_or_default()),
    }
}

fn run_command(cli: Cli) -> DemystResult<()>
{
    let options = build_options(&cli.render)?;
    debug!(?options, "Render options");

    match cli.command {
        Commands::Render { file } => {
            let trace = load_trace(&file)?;
            let aggregator = TraceAggregator::new(options);

            match &trace.exception {
                Some(exception) => {
                    let formatted = aggregator.format_exception(exception, Some(trace.call_site.as_slice()));
                    println!("{}", formatted.message);
                    print_block(&formatted.stack_trace);
                }
                None => print_block(&aggregator.format_trace(&trace.call_site)),
            }
            Ok(())
        }
        Commands::Frames { file } => {
            let trace = load_trace(&file)?;
            let aggregator = TraceAggregator::new(options);

            match &trace.exception {
                Some(exception) => {
                    let chain = aggregator.aggregate(exception, Some(trace.call_site.as_slice()))?;
                    println!("{}", chain.headline());
                    let mut index = 0;
                    for section in chain.sections() {
                        if let Some(banner) = &section.banner {
                            println!("{banner}");
                        }
                        for frame in &section.document {
                            print_frame(index, frame, &aggregator);
                            index += 1;
                        }
                    }
                }
                None => {
                    let document = aggregator.document(&trace.call_site);
                    for (index, frame) in document.iter().enumerate() {
                        print_frame(index, frame, &aggregator);
                    }
                }
            }
            Ok(())
        }
        Commands::Postprocess { input } => {
            let text = read_input(&input)?;
            let processor = PostProcessor::new(&options);
            print!("{}", processor.process(&text));
            Ok(())
        }
    }
}

/// Environment settings first, then command-line flags.
fn build_options(args: &RenderArgs) -> DemystResult<TraceOptions>
{
    let mut options = TraceOptions::from_env()?;

    if args.full_params {
        options = options.with_full_params(true);
    }
    if args.plain {
        options = options.with_markup(false);
    }
    if args.no_cache {
        options = options.with_cache(false);
    }
    if args.no_postprocess {
        options = options.with_postprocess(false);
    }
    if let Some(boundary) = &args.boundary {
        options = options.with_boundary_marker(boundary.as_str());
    }
    if let Some(style) = args.path_style {
        options = options.with_path_style(style);
    }
    if let Some(style) = args.markup {
        options = options.with_markup_style(style);
    }
    if let Some(size) = args.font_size {
        options = options.with_file_font_size(size);
    }
    if let Some(marker) = &args.continuation {
        options = options.with_continuation_marker(marker.as_str());
    }

    Ok(options)
}

fn load_trace(path: &Path) -> DemystResult<LoadedTrace>
{
    info!("Loading trace file {}", path.display());
    let text = fs::read_to_string(path)?;
    let trace = TraceFile::from_json(&text)?.load()?;
    debug!(methods = trace.methods.len(), "Linked method metadata");
    Ok(trace)
}

fn read_input(input: &str) -> DemystResult<String>
{
    if input == "-" {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text)?;
        Ok(text)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn print_frame(index: usize, frame: &ResolvedFrame, aggregator: &TraceAggregator)
{
    let text = aggregator.formatter().format_plain(frame);
    let flags = match frame.method() {
        Some(method) if method.is_async && method.is_lambda => " [async, lambda]",
        Some(method) if method.is_async => " [async]",
        Some(method) if method.is_lambda => " [lambda]",
        Some(_) => "",
        None => " [raw]",
    };
    println!("{index:>4}  {text}{flags}");
}

fn print_block(text: &str)
{
    if text.ends_with('\n') {
        print!("{text}");
    } else {
        println!("{text}");
    }
}
