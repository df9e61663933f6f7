use clap::{Parser, Subcommand};
use clap_complete::Shell;

use crate::trace::TraceLevel;

#[derive(Parser)]
#[command(name = "dscbridge")]
#[command(version)]
#[command(about = "Adapter bridging a configuration engine to resource modules", long_about = None)]
pub struct Cli {
    /// Trace verbosity for the stderr wire protocol
    #[arg(
        long,
        global = true,
        value_enum,
        env = "DSCBRIDGE_TRACE_LEVEL",
        default_value = "info"
    )]
    pub trace_level: TraceLevel,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List every cached resource, rebuilding the cache if needed
    List,

    /// Read the actual state of the requested resources
    Get(InputArgs),

    /// Converge the requested resources to their desired state
    Set(InputArgs),

    /// Check whether the requested resources are in the desired state
    Test(InputArgs),

    /// Export all instances of the requested resources
    Export(InputArgs),

    /// Validate a request envelope without invoking anything
    Validate(InputArgs),

    /// Delete the discovery cache file
    ClearCache,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(clap::Args)]
pub struct InputArgs {
    /// JSON request envelope; read from stdin when omitted
    pub input: Option<String>,
}
