use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct SourceConfigOpts {
    #[arg(
        short = 's',
        long,
        help = "Directory to scan (default: current dir).",
        help_heading = "Source Setup",
        value_name = "PATH"
    )]
    pub source: Option<PathBuf>,

    #[arg(
        long,
        help = "Specify path/filename of the TOML config file (default: .xtools/xfuse/xfuse.toml).",
        value_name = "CONFIG_FILE",
        conflicts_with = "no_config_file",
        help_heading = "Source Setup"
    )]
    pub config_file: Option<String>,

    #[arg(
        long,
        help = "Disable loading any TOML config file.",
        conflicts_with = "config_file",
        help_heading = "Source Setup"
    )]
    pub no_config_file: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FilterOpts {
    #[arg(
        short = 'e',
        long = "ext",
        value_name = "EXT",
        value_delimiter = ',',
        action = clap::ArgAction::Append,
        help = "Include only files with these extensions, e.g. '.py,.rs'. Replaces the configured list.",
        help_heading = "Filtering"
    )]
    pub extensions: Vec<String>,

    #[arg(
        long = "exclude-folder",
        value_name = "NAME",
        action = clap::ArgAction::Append,
        help = "Skip directories with this exact name. Replaces the configured list.",
        help_heading = "Filtering"
    )]
    pub exclude_folders: Vec<String>,

    #[arg(
        long = "exclude-pattern",
        value_name = "REGEX",
        action = clap::ArgAction::Append,
        help = "Skip files whose absolute path matches this regular expression.",
        help_heading = "Filtering"
    )]
    pub exclude_patterns: Vec<String>,

    #[arg(
        long,
        value_name = "MB",
        help = "Skip files larger than this many megabytes.",
        help_heading = "Filtering"
    )]
    pub max_size: Option<f64>,

    #[arg(long, help = "Skip image files.", help_heading = "Filtering")]
    pub exclude_images: bool,

    #[arg(long, help = "Skip executable files.", help_heading = "Filtering")]
    pub exclude_executables: bool,

    #[arg(
        long,
        help = "Skip temporary and backup files (and anything under the temp dir).",
        help_heading = "Filtering"
    )]
    pub exclude_temp: bool,

    #[arg(long, help = "Skip hidden files.", help_heading = "Filtering")]
    pub exclude_hidden: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct LayoutOpts {
    #[arg(
        short = 'o',
        long,
        value_name = "FILE",
        help = "Output file [default: xfuse_output.txt].",
        help_heading = "Output Layout"
    )]
    pub output: Option<PathBuf>,

    #[arg(
        long,
        value_name = "STYLE",
        value_parser = ["markdown", "banner"],
        help = "Artifact layout style.",
        help_heading = "Output Layout"
    )]
    pub style: Option<String>,

    #[arg(long, help = "Prefix every line with its number.", help_heading = "Output Layout")]
    pub line_numbers: bool,

    #[arg(long, help = "Add a 'Last Modified' line to each file header.", help_heading = "Output Layout")]
    pub timestamps: bool,

    #[arg(long, help = "Add a 'Size' line to each file header.", help_heading = "Output Layout")]
    pub file_size: bool,

    #[arg(long, help = "Wrap each file body in a fenced code block.", help_heading = "Output Layout")]
    pub fence: bool,

    #[arg(long, help = "Remove /* ... */ comments from file bodies.", help_heading = "Output Layout")]
    pub strip_comments: bool,

    #[arg(long, help = "Omit the summary trailer.", help_heading = "Output Layout")]
    pub no_summary: bool,

    #[arg(
        long,
        help = "Write only counts of skipped folders and files, not their paths.",
        help_heading = "Output Layout"
    )]
    pub counts_only: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ExecutionOpts {
    #[arg(
        short = 'w',
        long,
        value_name = "N",
        help = "Number of worker threads [default: 4].",
        help_heading = "Execution"
    )]
    pub workers: Option<usize>,

    #[arg(long = "zip", help = "Also pack the output into a zip archive.", help_heading = "Execution")]
    pub archive: bool,

    #[arg(
        long,
        help = "Emit file blocks in directory walk order instead of completion order.",
        help_heading = "Execution"
    )]
    pub ordered: bool,
}

#[derive(Parser, Debug)]
#[command(
    name = "xfuse",
    author,
    version,
    about = "Combine the files of a directory tree into one text artifact.",
    long_about = "xfuse walks a source directory, filters files by extension, folder, pattern, size \nand file kind, and concatenates the survivors into a single annotated text file \nusing a pool of worker threads. Optionally zips the result.",
    help_template = "{about-section}\nUsage: {usage}\n\n{all-args}{after-help}",
    after_help = "EXAMPLES:\n  xfuse fuse -s ./project -e .py,.rs -o combined.txt\n  xfuse fuse --fence --line-numbers --zip\n  xfuse plan -e .rs --json\n  xfuse config --save",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Increase message verbosity (-v, -vv).")]
    pub verbose: u8,

    #[arg(
        short,
        long,
        global = true,
        help = "Silence informational messages and warnings."
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    #[command(
        visible_alias = "f",
        visible_alias = "run",
        about = "Combine the matching files into the output artifact."
    )]
    Fuse(FuseArgs),

    #[command(
        visible_alias = "p",
        about = "Show which files would be combined and why others are skipped."
    )]
    Plan(PlanArgs),

    #[command(about = "Generate or save shell completion scripts.")]
    Completion(CompletionArgs),

    #[command(about = "Show or save the configuration file structure.")]
    Config(ConfigArgs),
}

#[derive(Args, Debug, Clone)]
pub struct FuseArgs {
    #[clap(flatten)]
    pub source_config: SourceConfigOpts,
    #[clap(flatten)]
    pub filters: FilterOpts,
    #[clap(flatten)]
    pub layout: LayoutOpts,
    #[clap(flatten)]
    pub execution: ExecutionOpts,

    #[arg(long, help = "Print the run summary as JSON.", help_heading = "Reporting")]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    #[clap(flatten)]
    pub source_config: SourceConfigOpts,
    #[clap(flatten)]
    pub filters: FilterOpts,

    #[arg(long, help = "Print the plan as JSON.", help_heading = "Reporting")]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CompletionArgs {
    #[arg(
        long,
        value_name = "SHELL",
        help = "Shell to generate completions for (fish, bash, zsh) [default: fish]"
    )]
    pub shell: Option<String>,
    #[arg(
        long,
        help = "Save completion script to default location (prompts overwrite)."
    )]
    pub save: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[clap(flatten)]
    pub source_config: SourceConfigOpts,

    #[arg(
        long,
        help = "Show the configuration loaded for the source instead of the defaults.",
        conflicts_with = "save"
    )]
    pub effective: bool,

    #[arg(
        long,
        help = "Save default config structure to default path (prompts overwrite)."
    )]
    pub save: bool,
}
