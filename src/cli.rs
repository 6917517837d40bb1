use clap::{Parser, Subcommand};

/// Build details stamped by build.rs, shown by `--version`.
const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\nbuilt:  ",
    env!("DEVBOX_BUILD_DATE"),
    "\ntarget: ",
    env!("DEVBOX_BUILD_TARGET"),
    "\nrustc:  ",
    env!("DEVBOX_BUILD_RUSTC"),
);

#[derive(Parser, Debug)]
#[command(
    name = "devbox",
    version,
    long_version = LONG_VERSION,
    about = "Create, attach, rebuild and remove containerized development instances."
)]
pub(crate) struct Cli {
    /// Colorize output: auto|always|never
    #[arg(long = "color", value_enum, global = true)]
    pub(crate) color: Option<devbox::ColorMode>,

    /// Print step-by-step progress
    #[arg(long, short = 'v', global = true)]
    pub(crate) verbose: bool,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum Command {
    /// Clone a repository and start a new instance for it
    Create {
        /// Repository URL, or path to a local checkout
        repo: String,
        /// Instance name, e.g. feature-x
        instance: String,
        /// Free-text note on what the instance is for
        #[arg(long)]
        purpose: Option<String>,
    },

    /// Start the instance if needed and attach to its terminal session
    Attach {
        /// Workspace name or instance suffix
        name: String,
    },

    /// Recreate the instance's container from a refreshed config
    Rebuild {
        /// Workspace name or instance suffix
        name: String,
        /// Rebuild even when the container is running
        #[arg(long)]
        force: bool,
    },

    /// Stop and delete the instance and its clone
    #[command(alias = "rm")]
    Remove {
        /// Workspace name or instance suffix
        name: String,
        /// Override safety protections (audit-logged)
        #[arg(long)]
        force: bool,
        /// Proceed without interactive confirmation
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// List instances
    #[command(alias = "ls")]
    List {
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
        /// Include git state per instance (slower)
        #[arg(long)]
        git: bool,
    },
}
