use anyhow::{Context, Result};
use clap::{crate_description, ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::io::IsTerminal;
use std::path::PathBuf;
use url::Url;

use clabot::committers::DEFAULT_EXTERNAL_PROVIDER;
use clabot::gitlab;

// -----------------------------------------------------------------------------
// command-line args
// -----------------------------------------------------------------------------
/// Check that the contributors to GitLab merge requests have signed a CLA
#[derive(Parser, Debug)]
#[command(name = "clabot", bin_name = "clabot", author, version, about, long_about = crate_description!())]
#[deny(missing_docs)]
pub struct CommandLineArgs {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub global_args: GlobalArgs,
}

impl CommandLineArgs {
    /// Parse the process arguments, honoring <https://no-color.org/>.
    pub fn parse_args() -> Self {
        let mut args = Self::parse();
        if std::env::var_os("NO_COLOR").is_some() {
            args.global_args.color = Mode::Never;
        }
        args
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the distinct committers of a merge request
    ///
    /// The commits of the merge request are collapsed into distinct committers by email address,
    /// and the GitLab account of each committer is looked up.
    /// Committers whose commits have no email address, or whose account cannot be found, are
    /// reported by name as unresolved.
    #[command(display_order = 1)]
    Committers(CommittersArgs),

    /// Handle a GitLab webhook event
    ///
    /// The event is read as JSON from the given file, or from stdin.
    /// Merge request events, and comments on merge requests that summon the bot, cause the merge
    /// request to be checked: its commit status, labels, and comments are updated to reflect
    /// whether every contributor has signed the CLA.
    /// All other events are ignored.
    #[command(display_order = 2)]
    Handle(HandleArgs),
}

// -----------------------------------------------------------------------------
// global options
// -----------------------------------------------------------------------------
#[derive(Args, Debug)]
#[command(next_help_heading = "Global Options")]
pub struct GlobalArgs {
    /// Log more about what is going on
    ///
    /// Give once for INFO messages, twice for DEBUG, and three times for TRACE.
    /// Finer control is available through the `CLABOT_LOG` environment variable.
    #[arg(global=true, long, short, action=ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    ///
    /// Overrides `--verbose`.
    #[arg(global=true, long, short)]
    pub quiet: bool,

    /// Whether to use colors in output and logs
    ///
    /// With "auto", colors are used when writing to a terminal.
    /// Setting the `NO_COLOR` environment variable has the same effect as "never".
    #[arg(global=true, long, default_value_t=Mode::Auto, value_name="MODE")]
    pub color: Mode,

    #[command(flatten)]
    pub gitlab_api: GitLabApiArgs,
}

impl GlobalArgs {
    /// Should colors be used when writing to `stream`?
    pub fn use_color<T: IsTerminal>(&self, stream: T) -> bool {
        self.color.resolve(stream)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum Mode {
    Auto,
    Never,
    Always,
}

impl Mode {
    fn resolve<T: IsTerminal>(self, stream: T) -> bool {
        match self {
            Mode::Auto => stream.is_terminal(),
            Mode::Never => false,
            Mode::Always => true,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Mode::Auto => "auto",
            Mode::Never => "never",
            Mode::Always => "always",
        })
    }
}

// -----------------------------------------------------------------------------
// GitLab API options
// -----------------------------------------------------------------------------
#[derive(Args, Debug)]
#[command(next_help_heading = "GitLab API Options")]
pub struct GitLabApiArgs {
    /// Use the specified URL for GitLab API access
    ///
    /// If accessing a self-hosted GitLab instance, this should be of the form
    /// `https://gitlab.example.com/api/v4`.
    ///
    /// An access token can be specified using the `GITLAB_ACCESS_TOKEN` environment variable.
    /// Without one, unauthenticated access is used.
    #[arg(
        global=true,
        long,
        value_name="URL",
        value_hint=clap::ValueHint::Url,
        default_value=gitlab::ClientBuilder::DEFAULT_BASE_URL,
        env="CLABOT_GITLAB_URL",
    )]
    pub gitlab_url: Url,

    /// Disable TLS certificate validation for GitLab API access
    #[arg(global=true, long)]
    pub ignore_certs: bool,
}

// -----------------------------------------------------------------------------
// `committers` command
// -----------------------------------------------------------------------------
#[derive(Args, Debug)]
pub struct CommittersArgs {
    /// The ID of the project
    #[arg(long, value_name = "ID")]
    pub project: u64,

    /// The IID of the merge request within the project
    #[arg(long, value_name = "IID")]
    pub merge_request: u64,

    /// Report the committer's ID from this linked identity provider
    #[arg(long, value_name = "PROVIDER", default_value = DEFAULT_EXTERNAL_PROVIDER)]
    pub external_provider: String,

    #[command(flatten)]
    pub output_args: OutputArgs,
}

// -----------------------------------------------------------------------------
// `handle` command
// -----------------------------------------------------------------------------
#[derive(Args, Debug)]
pub struct HandleArgs {
    /// The file to read the webhook event from
    ///
    /// If this argument is not provided or is `-`, stdin will be used.
    #[arg(value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    pub input: Option<PathBuf>,

    /// Report the committer's ID from this linked identity provider
    #[arg(long, value_name = "PROVIDER", default_value = DEFAULT_EXTERNAL_PROVIDER)]
    pub external_provider: String,

    #[command(flatten)]
    pub output_args: OutputArgs,
}

// -----------------------------------------------------------------------------
// output options
// -----------------------------------------------------------------------------
#[derive(Args, Debug)]
#[command(next_help_heading = "Output Options")]
pub struct OutputArgs {
    /// Write the report to this file instead of stdout
    #[arg(long, short, value_name = "PATH", value_hint = clap::ValueHint::FilePath)]
    pub output: Option<PathBuf>,

    /// The report format
    #[arg(long, short, value_name="FORMAT", default_value_t=OutputFormat::Human)]
    pub format: OutputFormat,
}

impl OutputArgs {
    /// Open the report destination for buffered writing.
    pub fn get_writer(&self) -> std::io::Result<Box<dyn std::io::Write>> {
        let writer: Box<dyn std::io::Write> = match &self.output {
            Some(path) => Box::new(std::io::BufWriter::new(std::fs::File::create(path)?)),
            None => Box::new(std::io::BufWriter::new(std::io::stdout())),
        };
        Ok(writer)
    }
}

// -----------------------------------------------------------------------------
// output format
// -----------------------------------------------------------------------------
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain text
    Human,

    /// A single pretty-printed JSON value
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            OutputFormat::Human => "human",
            OutputFormat::Json => "json",
        })
    }
}

// -----------------------------------------------------------------------------
// report writer
// -----------------------------------------------------------------------------
pub trait Reportable {
    fn human_format<W: std::io::Write>(&self, writer: W) -> Result<()>;
    fn json_format<W: std::io::Write>(&self, writer: W) -> Result<()>;

    /// Write the report to the destination and in the format the output options ask for.
    fn report(&self, output_args: &OutputArgs) -> Result<()> {
        let writer = output_args
            .get_writer()
            .context("Failed to open output destination for writing")?;
        let result = match output_args.format {
            OutputFormat::Human => self.human_format(writer),
            OutputFormat::Json => self.json_format(writer),
        };
        match result {
            // the reader went away, e.g. `clabot ... | head`
            Err(e) if is_broken_pipe(&e) => Ok(()),
            result => result,
        }
    }
}

fn is_broken_pipe(e: &anyhow::Error) -> bool {
    matches!(e.downcast_ref::<std::io::Error>(), Some(e) if e.kind() == std::io::ErrorKind::BrokenPipe)
}
