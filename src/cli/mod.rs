pub mod commands;

pub use commands::{ChargeCommands, ClaimCommands, Cli, Commands, DenialCommands, RemitCommands};
