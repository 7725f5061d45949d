//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// paramtree - inspect, check and rewrite hierarchical config files
#[derive(Parser, Debug)]
#[command(name = "paramtree")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging (RUST_LOG also works)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Settings file to use instead of the per-user one
    #[arg(long, global = true, env = "PARAMTREE_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Load configs and report everything that would fail at runtime
    ///
    /// Configs are given by name (looked up in the search paths) or by
    /// file path. Everything after `--` is treated as the program's
    /// command line.
    ///
    /// Examples:
    ///   paramtree check daq --fact site=tower
    ///   paramtree check ./cfg/main.pt --search ./cfg/site -- --ports.cmd 7
    Check {
        /// Configs to load, in order
        #[arg(required = true)]
        configs: Vec<String>,

        /// Fact as name=value, may be repeated
        #[arg(short, long = "fact", value_name = "NAME=VALUE")]
        facts: Vec<String>,

        /// Additional directory to search for configs
        #[arg(short, long = "search", value_name = "DIR")]
        search: Vec<PathBuf>,

        /// Fail on parameters that only have a suggested value
        #[arg(long, conflicts_with = "lenient")]
        strict: bool,

        /// Accept suggested values with a warning
        #[arg(long)]
        lenient: bool,

        /// Program command line
        #[arg(last = true)]
        cmdline: Vec<String>,
    },

    /// Print the elements of a config in load order
    Dump {
        /// Config name or file path
        config: String,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,

        /// Print resolved values instead of raw elements
        #[arg(long)]
        resolved: bool,

        /// Fact as name=value, may be repeated
        #[arg(short, long = "fact", value_name = "NAME=VALUE")]
        facts: Vec<String>,
    },

    /// Re-export a config file in the format implied by the output name
    Convert {
        /// File to read
        input: PathBuf,

        /// File to write
        output: PathBuf,
    },

    /// List subconfig templates of a config
    Templates {
        /// Config file
        config: PathBuf,

        /// Only templates whose instances live directly below this prefix
        #[arg(short, long)]
        prefix: Option<String>,
    },

    /// Create concrete parameters from a template
    ///
    /// Examples:
    ///   paramtree instantiate checker.pt checker.filters f1
    ///   paramtree instantiate checker.pt checker.filters.*.regions f1 eu --write
    Instantiate {
        /// Config file
        config: PathBuf,

        /// Template name, e.g. `checker.filters`
        spec: String,

        /// One instance name per `*` in the template, plus one
        #[arg(required = true)]
        instances: Vec<String>,

        /// Write the result back to the config file
        #[arg(long)]
        write: bool,
    },

    /// Rewrite a config file through import and export
    Normalize {
        /// Config file
        config: PathBuf,
    },

    /// Show how two configs differ after normalization
    Diff {
        a: PathBuf,
        b: PathBuf,
    },
}
