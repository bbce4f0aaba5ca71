use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "revcycle")]
#[command(about = "Clinic revenue cycle: coding, claims, remittance and denials")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file (extension optional)
    #[arg(short, long, global = true, default_value = "config/default")]
    pub config: String,

    /// User id recorded in the audit trail
    #[arg(short, long, global = true, default_value = "system")]
    pub user: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize database and seed the E&M fee schedule
    Init,

    /// Score an encounter and record its E&M charge
    Code {
        /// Encounter id
        encounter: i64,

        /// JSON file with the encounter's clinical facts
        #[arg(long)]
        facts: PathBuf,

        /// Only show the selected code, don't record a charge
        #[arg(long)]
        preview: bool,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Manage charges
    Charge {
        #[command(subcommand)]
        command: ChargeCommands,
    },

    /// Build, submit and inspect claims
    Claim {
        #[command(subcommand)]
        command: ClaimCommands,
    },

    /// Post electronic remittance advice
    Remit {
        #[command(subcommand)]
        command: RemitCommands,
    },

    /// Inspect denials
    Denials {
        #[command(subcommand)]
        command: DenialCommands,
    },

    /// File an appeal against a denial
    Appeal {
        /// Denial id
        denial: i64,

        /// Why the denial should be overturned
        #[arg(short, long)]
        reason: String,

        /// Supporting document references (repeatable)
        #[arg(short, long = "document")]
        documents: Vec<String>,

        /// Appeal deadline (YYYY-MM-DD)
        #[arg(long)]
        deadline: NaiveDate,
    },

    /// Close a denial with its outcome
    Resolve {
        /// Denial id
        denial: i64,

        /// Free-text outcome
        #[arg(short, long)]
        resolution: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show statistics and reports
    Stats {
        /// Output format: table or json
        #[arg(short, long, default_value = "table")]
        format: String,
    },
}

#[derive(Subcommand)]
pub enum ChargeCommands {
    /// Record a charge against an encounter
    Add {
        /// Encounter id
        encounter: i64,

        /// Billing code (CPT/HCPCS)
        code: String,

        /// Diagnosis ranks this line supports, e.g. 1,2
        #[arg(short, long, value_delimiter = ',', required = true)]
        pointers: Vec<u32>,

        /// Procedure modifiers, e.g. 25
        #[arg(short, long, value_delimiter = ',')]
        modifiers: Vec<String>,

        #[arg(long, default_value = "1")]
        units: u32,
    },

    /// List an encounter's pending charges
    List {
        /// Encounter id
        encounter: i64,
    },
}

#[derive(Subcommand)]
pub enum ClaimCommands {
    /// Bill an encounter's pending charges to an insurance policy
    Create {
        /// Encounter id
        encounter: i64,

        /// Insurance policy id
        #[arg(short, long)]
        insurance: i64,
    },

    /// Encode and send a draft or denied claim to the clearinghouse
    Submit {
        /// Claim number, e.g. CLM00000001
        claim: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show one claim with its lines and balance
    Show {
        /// Claim number
        claim: String,

        /// Print the stored 837 interchange
        #[arg(long)]
        edi: bool,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// List claims
    List {
        /// Filter by status (draft, submitted, paid, ..., all)
        #[arg(short, long, default_value = "all")]
        status: String,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },
}

#[derive(Subcommand)]
pub enum RemitCommands {
    /// Import an 835 file
    Import {
        file: PathBuf,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },
}

#[derive(Subcommand)]
pub enum DenialCommands {
    /// List denials
    List {
        /// Filter by status (pending, appealing, resolved, all)
        #[arg(short, long, default_value = "all")]
        status: String,

        /// Only unresolved denials past their appeal deadline
        #[arg(long)]
        overdue: bool,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },
}
