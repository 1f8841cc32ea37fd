use clap::{Parser, Subcommand};

/// `EchoQuill` - link a social account, learn its voice, draft replies.
#[derive(Parser, Debug)]
#[command(name = "echoquill")]
#[command(version = "0.1.0")]
#[command(
    about = "Link a social account, learn its voice, draft replies that sound like you.",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Link a social account via OAuth with PKCE
    Login,

    /// Show the linked account, persona, and suggestion queue
    Status,

    /// Unlink the account and clear the stored session
    Logout,

    /// Run the token exchange proxy (the only process that holds the client secret)
    Proxy {
        /// Port to listen on (use 0 for a random available port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
    },

    /// Build the writing-voice persona from the account's content
    Persona {
        #[command(subcommand)]
        persona_command: PersonaCommands,
    },

    /// Generate and review reply suggestions
    Suggest {
        #[command(subcommand)]
        suggest_command: SuggestCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum PersonaCommands {
    /// Fetch posts and replies, then analyze the account's voice
    Build,
}

#[derive(Subcommand, Debug)]
pub enum SuggestCommands {
    /// Full sweep: generate queries, search, draft, record
    Run {
        /// Candidates drafted per search query
        #[arg(long, default_value_t = 3)]
        per_query: u8,
    },

    /// List recorded suggestions
    List {
        /// Filter by status (pending, approved, rejected, posted)
        #[arg(long)]
        status: Option<String>,
    },

    /// Approve a pending suggestion
    Approve {
        /// Suggestion id (from `suggest list`)
        id: String,
    },

    /// Reject a pending suggestion
    Reject {
        /// Suggestion id (from `suggest list`)
        id: String,
    },

    /// Mark a pending suggestion as posted
    Post {
        /// Suggestion id (from `suggest list`)
        id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::{Cli, Commands, SuggestCommands};
    use clap::CommandFactory;
    use clap::Parser;

    #[test]
    fn cli_definition_has_no_flag_conflicts() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_suggest_run_with_per_query() {
        let cli = Cli::parse_from(["echoquill", "suggest", "run", "--per-query", "5"]);

        match cli.command {
            Commands::Suggest {
                suggest_command: SuggestCommands::Run { per_query },
            } => assert_eq!(per_query, 5),
            other => panic!("expected suggest run, got {other:?}"),
        }
    }

    #[test]
    fn parse_proxy_defaults_to_config_values() {
        let cli = Cli::parse_from(["echoquill", "proxy"]);

        match cli.command {
            Commands::Proxy { port, host } => {
                assert!(port.is_none());
                assert!(host.is_none());
            }
            other => panic!("expected proxy, got {other:?}"),
        }
    }

    #[test]
    fn parse_suggest_approve_takes_positional_id() {
        let cli = Cli::parse_from(["echoquill", "suggest", "approve", "sg-1"]);

        match cli.command {
            Commands::Suggest {
                suggest_command: SuggestCommands::Approve { id },
            } => assert_eq!(id, "sg-1"),
            other => panic!("expected suggest approve, got {other:?}"),
        }
    }
}
