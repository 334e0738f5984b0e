use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod private_key;

pub use private_key::PrivateKey;

#[derive(Debug, Clone, Parser)]
#[clap(rename_all = "kebab-case")]
pub struct Args {
    /// Path to the harness configuration file
    #[clap(short, long, env, default_value = "deployments.yml")]
    pub config: PathBuf,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
#[clap(rename_all = "kebab-case")]
pub enum Command {
    /// Run pending deployment tasks against a network, in declaration order
    Run {
        /// The target network name, as configured
        #[clap(short, long, env)]
        network: String,

        /// Run a single task instead of every registered one
        #[clap(short, long)]
        id: Option<String>,

        /// Re-run tasks that already have recorded deployments
        #[clap(short, long)]
        force: bool,

        /// Private key to use for the deployment
        #[clap(short, long, env)]
        private_key: PrivateKey,
    },

    /// Rebuild the address book for a network and write it to disk
    Save {
        #[clap(short, long, env)]
        network: String,
    },

    /// Report whether the on-disk address book matches the recorded task
    /// outputs; exits non-zero on drift
    Check {
        #[clap(short, long, env)]
        network: String,
    },

    /// Print every registered task and its status on a network
    List {
        #[clap(short, long, env)]
        network: String,
    },

    /// Submit a deployed contract for explorer verification
    Verify {
        #[clap(short, long, env)]
        network: String,

        /// The task that deployed the contract
        #[clap(short, long)]
        id: String,

        /// Name of the deployed contract
        #[clap(long)]
        contract: String,

        /// Constructor arguments, one per flag occurrence
        #[clap(short, long)]
        args: Vec<String>,
    },

    /// Run tasks against an ephemeral fork of a network; nothing is persisted
    Test {
        #[clap(short, long, env)]
        network: String,

        /// Run a single task instead of every registered one
        #[clap(short, long)]
        id: Option<String>,

        /// Private key to use on the fork
        #[clap(short, long, env)]
        private_key: PrivateKey,

        /// Port the forked node listens on
        #[clap(long, default_value_t = 8546)]
        port: u16,
    },
}
