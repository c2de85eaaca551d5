use anyhow::{Context, Result};
use tracing::debug;
use tracing_subscriber::filter::LevelFilter;

mod args;
mod cmd_committers;
mod cmd_handle;
mod util;

use args::{CommandLineArgs, GlobalArgs};

/// The environment variable holding extra `tracing` filter directives, e.g. `clabot=trace`.
const LOG_ENV_VAR: &str = "CLABOT_LOG";

/// The most verbose level to log at, from `-q` and the number of `-v` flags.
fn max_level(global_args: &GlobalArgs) -> LevelFilter {
    if global_args.quiet {
        return LevelFilter::ERROR;
    }
    match global_args.verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Install the global `tracing` subscriber, which writes to stderr.
///
/// Records from crates that log through `log`, like `reqwest`, are forwarded to it.
fn configure_tracing(global_args: &GlobalArgs) -> Result<()> {
    use tracing_log::{AsLog, LogTracer};
    use tracing_subscriber::EnvFilter;

    let level = max_level(global_args);
    LogTracer::builder().with_max_level(level.as_log()).init()?;

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .with_env_var(LOG_ENV_VAR)
        .from_env()
        .with_context(|| format!("Failed to parse filters from {LOG_ENV_VAR} environment variable"))?;

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_writer(std::io::stderr)
        .with_ansi(global_args.use_color(std::io::stderr()))
        .with_env_filter(filter)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn configure_color(global_args: &GlobalArgs) {
    console::set_colors_enabled(global_args.use_color(std::io::stdout()));
    console::set_colors_enabled_stderr(global_args.use_color(std::io::stderr()));
}

fn try_main(args: &CommandLineArgs) -> Result<()> {
    let global_args = &args.global_args;
    configure_color(global_args);
    configure_tracing(global_args).context("Failed to initialize logging")?;
    debug!("Using GitLab API at {}", global_args.gitlab_api.gitlab_url);

    match &args.command {
        args::Command::Committers(args) => cmd_committers::run(global_args, args),
        args::Command::Handle(args) => cmd_handle::run(global_args, args),
    }
}

fn main() {
    let args = CommandLineArgs::parse_args();
    if let Err(e) = try_main(&args) {
        // `{:?}` includes the backtrace, if any; only show it at `-vv` and up
        if args.global_args.verbose >= 2 {
            eprintln!("Error: {e:?}");
        } else {
            eprintln!("Error: {e:#}");
        }
        std::process::exit(2);
    }
}
