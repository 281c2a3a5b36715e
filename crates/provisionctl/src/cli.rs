//! CLI structure and command definitions

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Wait on long-running operations of a cloud provisioning API
#[derive(Parser, Debug)]
#[command(name = "provisionctl")]
#[command(version, about = "Wait on long-running operations of a cloud provisioning API")]
#[command(long_about = "
Wait on long-running operations of a cloud provisioning API

Mutations against the control plane return an operation id or leave the
resource in a transitional state. provisionctl polls until the work is done,
tolerating short bursts of transient errors, and exits non-zero when the
backend reports a failure.

EXAMPLES:
    # Wait for an operation in the profile's default location
    provisionctl operation wait op-1234 --name create-cluster

    # Wait for a cluster to become AVAILABLE
    provisionctl resource wait clusters/c-1 --target AVAILABLE --pending CREATING,PROVISIONING

    # Show the resolved configuration
    provisionctl config show
")]
pub struct Cli {
    /// Profile to use for this command
    #[arg(long, short, global = true, env = "PROVISIONCTL_PROFILE")]
    pub profile: Option<String>,

    /// Path to alternate configuration file
    #[arg(long, global = true, env = "PROVISIONCTL_CONFIG_FILE")]
    pub config_file: Option<String>,

    /// Output format
    #[arg(long, short = 'o', global = true, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Enable verbose logging
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Backend operations
    #[command(subcommand)]
    Operation(OperationCommands),

    /// Resources with a lifecycle state
    #[command(subcommand)]
    Resource(ResourceCommands),

    /// Configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
pub enum OperationCommands {
    /// Poll an operation until it is DONE
    #[command(after_help = "EXAMPLES:
    provisionctl operation wait op-1234
    provisionctl operation wait op-1234 --name delete-cluster --timeout 600
    provisionctl operation wait op-1234 --project proj-2 --provider gcp --region europe-west1
")]
    Wait {
        /// Operation ID
        id: String,

        /// Name used in progress output and errors
        #[arg(long, default_value = "operation")]
        name: String,

        #[command(flatten)]
        location: LocationArgs,

        #[command(flatten)]
        wait: WaitArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum ResourceCommands {
    /// Poll a resource until it reaches a target state
    #[command(after_help = "EXAMPLES:
    provisionctl resource wait clusters/c-1 --target AVAILABLE --pending CREATING
    provisionctl resource wait peerings/p-9 --target ACTIVE --pending PENDING_ACCEPTANCE \\
        --failure REJECTED --strategy switch
")]
    Wait {
        /// Resource path relative to the location, e.g. clusters/c-1
        path: String,

        /// State that ends the wait successfully
        #[arg(long)]
        target: String,

        /// States that keep the wait going
        #[arg(long, value_delimiter = ',')]
        pending: Vec<String>,

        /// States that end the wait with an error
        #[arg(long, value_delimiter = ',')]
        failure: Vec<String>,

        /// Name of the JSON field holding the state
        #[arg(long, default_value = "state")]
        state_field: String,

        /// How undeclared states and refresh errors are handled
        #[arg(long, value_enum, default_value = "fast-fail")]
        strategy: StrategyArg,

        #[command(flatten)]
        location: LocationArgs,

        #[command(flatten)]
        wait: WaitArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the resolved settings for the selected profile (token redacted)
    Show,
    /// Print the configuration file path
    Path,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    /// Abort on refresh errors and undeclared states
    FastFail,
    /// Only the target and failure states end the wait
    Switch,
}

/// Location overrides; anything omitted comes from the profile
#[derive(Args, Debug, Clone, Default)]
pub struct LocationArgs {
    /// Organization ID
    #[arg(long)]
    pub org: Option<String>,

    /// Project ID
    #[arg(long)]
    pub project: Option<String>,

    /// Cloud provider (requires --region)
    #[arg(long, requires = "region")]
    pub provider: Option<String>,

    /// Provider region (requires --provider)
    #[arg(long, requires = "provider")]
    pub region: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct WaitArgs {
    /// Give up after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Seconds between polls (defaults to the profile's polling settings)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_resource_wait_splits_state_lists() {
        let cli = Cli::parse_from([
            "provisionctl",
            "resource",
            "wait",
            "clusters/c-1",
            "--target",
            "AVAILABLE",
            "--pending",
            "CREATING,PROVISIONING",
            "--failure",
            "FAILED",
        ]);

        match cli.command {
            Commands::Resource(ResourceCommands::Wait {
                pending,
                failure,
                strategy,
                ..
            }) => {
                assert_eq!(pending, vec!["CREATING", "PROVISIONING"]);
                assert_eq!(failure, vec!["FAILED"]);
                assert_eq!(strategy, StrategyArg::FastFail);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let result = Cli::try_parse_from([
            "provisionctl",
            "operation",
            "wait",
            "op-1",
            "--interval",
            "0",
        ]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from([
            "provisionctl",
            "operation",
            "wait",
            "op-1",
            "--interval",
            "2",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Operation(OperationCommands::Wait { ref wait, .. }) if wait.interval == Some(2)
        ));
    }

    #[test]
    fn test_provider_requires_region() {
        let result = Cli::try_parse_from([
            "provisionctl",
            "operation",
            "wait",
            "op-1",
            "--provider",
            "aws",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_verbosity_counts() {
        let cli = Cli::parse_from(["provisionctl", "-vvv", "config", "show"]);
        assert_eq!(cli.verbose, 3);
    }
}
