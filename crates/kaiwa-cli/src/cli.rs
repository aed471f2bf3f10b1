//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// kaiwa - a terminal client for streaming chat backends
#[derive(Parser, Debug)]
#[command(name = "kaiwa", version, about = "A terminal client for streaming chat backends")]
pub struct Cli {
    /// Override the kaiwa home directory (default: ~/.kaiwa, or $KAIWA_HOME)
    #[arg(long, value_name = "DIR", global = true)]
    pub home: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and store credentials
    Login {
        /// Login name; the password is prompted for
        login: String,
    },
    /// Invalidate the session and remove stored credentials
    Logout,
    /// Show the authenticated user
    Me,
    /// List chats
    Chats {
        /// Fetch the next page instead of starting over
        #[arg(long)]
        more: bool,
    },
    /// Create a chat
    New {
        /// Optional chat name
        name: Option<String>,
        /// Tag to attach (repeatable)
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,
    },
    /// Rename a chat
    Rename {
        chat_id: String,
        name: String,
    },
    /// Delete a chat
    Rm {
        chat_id: String,
    },
    /// Show a chat's messages
    History {
        chat_id: String,
        /// Fetch the next (older) page instead of starting over
        #[arg(long)]
        more: bool,
    },
    /// Send a message and stream the reply (Ctrl-C cancels, keeping the partial)
    Send {
        chat_id: String,
        content: String,
        /// Wait for the complete reply instead of streaming
        #[arg(long)]
        no_stream: bool,
        /// Disable retrieval-augmented generation for this message
        #[arg(long)]
        no_rag: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_flags_parse() {
        let cli = Cli::parse_from(["kaiwa", "send", "c1", "hello", "--no-stream", "--no-rag"]);
        match cli.command {
            Command::Send {
                chat_id,
                content,
                no_stream,
                no_rag,
            } => {
                assert_eq!(chat_id, "c1");
                assert_eq!(content, "hello");
                assert!(no_stream);
                assert!(no_rag);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_new_accepts_repeated_tags() {
        let cli = Cli::parse_from(["kaiwa", "new", "plans", "--tag", "work", "--tag", "q3"]);
        match cli.command {
            Command::New { name, tags } => {
                assert_eq!(name.as_deref(), Some("plans"));
                assert_eq!(tags, vec!["work", "q3"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_home_flag() {
        let cli = Cli::parse_from(["kaiwa", "chats", "--home", "/tmp/kaiwa"]);
        assert_eq!(cli.home.as_deref(), Some(std::path::Path::new("/tmp/kaiwa")));
    }
}
