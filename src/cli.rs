use clap::{Parser, Subcommand};

/// Checkin: QR-gated kiosk check-in service
#[derive(Parser)]
#[command(name = "checkin", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind (overrides CHECKIN_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Inspect or rotate the kiosk security token
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },

    /// Manage form fields
    Field {
        #[command(subcommand)]
        command: FieldCommands,
    },

    /// Browse and purge check-in records
    Record {
        #[command(subcommand)]
        command: RecordCommands,
    },
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Print the active token and its distributable URL
    Show,
    /// Generate a new token, voiding every code already handed out
    Rotate,
}

#[derive(Subcommand)]
pub enum FieldCommands {
    /// List fields in form order
    List,
    /// Append a field to the form
    Add {
        #[arg(long)]
        text: String,
        /// binary, choice or free_text (aliases: yesno, radio, input)
        #[arg(long = "type", default_value = "binary")]
        kind: String,
        /// Comma-separated options for choice fields
        #[arg(long, default_value = "")]
        options: String,
        #[arg(long)]
        required: bool,
    },
    /// Replace a field's attributes, keeping its position
    Edit {
        #[arg(long)]
        id: String,
        #[arg(long)]
        text: String,
        #[arg(long = "type", default_value = "binary")]
        kind: String,
        #[arg(long, default_value = "")]
        options: String,
        #[arg(long)]
        required: bool,
    },
    /// Delete a field. Stored answers to it are kept.
    Remove {
        #[arg(long)]
        id: String,
    },
}

#[derive(Subcommand)]
pub enum RecordCommands {
    /// List records, newest first
    List {
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Permanently delete a record
    Remove {
        #[arg(long)]
        id: String,
    },
    /// Print the export table as tab-separated values
    Export {
        #[arg(short, long)]
        search: Option<String>,
    },
}
