//! Command-line interface definition for codechat.

use clap::{Parser, Subcommand};

/// Ask questions about a repository indexed by the analysis service.
#[derive(Parser, Debug, Clone)]
#[command(name = "codechat")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Base URL of the analysis service
    #[arg(long, env = "CODECHAT_API_URL", default_value = "http://localhost:8000")]
    pub api_url: String,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Stream the answer to one question
    Ask {
        /// Repository id
        repo: String,

        /// Question about the repository
        question: String,

        /// Cancel the answer after this many seconds
        #[arg(long)]
        deadline_secs: Option<u64>,
    },

    /// Ask questions read line by line from stdin
    Chat {
        /// Repository id
        repo: String,
    },

    /// Queue a repository for (re)indexing
    Analyze {
        /// Repository id
        repo: String,
    },

    /// Delete a repository and its indexed data
    Delete {
        /// Repository id
        repo: String,
    },
}

impl Commands {
    /// Subcommand name as typed on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ask { .. } => "ask",
            Self::Chat { .. } => "chat",
            Self::Analyze { .. } => "analyze",
            Self::Delete { .. } => "delete",
        }
    }
}
