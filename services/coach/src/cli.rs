use clap::{Parser, Subcommand};
use coach_core::session::{InvalidUserId, validate_user_id};
use std::path::PathBuf;

/// Drive the fitness coach for a user from the command line.
#[derive(Parser, Debug)]
#[command(name = "coach", version, about)]
pub struct Cli {
    /// Session store file. Overrides SESSION_STORE_PATH.
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Run one coaching turn and print the message for the user.
    Run {
        #[arg(long, short, value_parser = parse_user_id)]
        user: String,
        /// Skip the LLM and use the decision policy directly.
        #[arg(long)]
        no_reasoning: bool,
    },
    /// Record the user's feedback on their current exercise.
    Feedback {
        #[arg(long, short, value_parser = parse_user_id)]
        user: String,
        #[arg(long, short)]
        text: String,
    },
    /// Print the user's session record as JSON.
    Status {
        #[arg(long, short, value_parser = parse_user_id)]
        user: String,
    },
    /// Forget everything stored for the user.
    Reset {
        #[arg(long, short, value_parser = parse_user_id)]
        user: String,
    },
}

fn parse_user_id(value: &str) -> Result<String, InvalidUserId> {
    validate_user_id(value).map(str::to_string)
}

impl Command {
    /// Whether the command needs the reasoning delegate to be configured.
    pub fn uses_reasoning(&self) -> bool {
        matches!(self, Command::Run { no_reasoning: false, .. })
    }
}
