use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint};

#[derive(Parser, Debug)]
#[command(author, version, about = "Fair random draws from a name list", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Draw winners from a roster file and save the updated counters.
    Draw(DrawArgs),
    /// Print the roster and mark who is currently eligible.
    Show(ShowArgs),
    /// Subtract the lowest counter from every entry and save the file.
    Normalize(FileArgs),
}

#[derive(Args, Debug, Clone)]
pub struct FileArgs {
    /// Roster file: header line, then `name;counter` (or comma separated) rows.
    #[arg(long, short, value_hint = ValueHint::FilePath)]
    pub file: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct DrawArgs {
    #[command(flatten)]
    pub roster: FileArgs,

    /// Number of winners to draw. Clamped to the roster size.
    #[arg(long, short = 'n', default_value_t = 1)]
    pub count: usize,

    /// Seed for a reproducible draw.
    #[arg(long)]
    pub seed: Option<u64>,

    /// JSON file with animation timing overrides.
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Leave the roster file untouched.
    #[arg(long)]
    pub no_save: bool,

    /// Print every engine event as a JSON line.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    #[command(flatten)]
    pub roster: FileArgs,

    /// Print the roster as JSON.
    #[arg(long)]
    pub json: bool,
}
