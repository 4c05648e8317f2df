use std::path::PathBuf;
use clap::{ArgAction, Parser, Subcommand};

#[derive(Debug, Parser, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct CLI {
    #[command(subcommand)]
    pub(crate) command: GraftCommand,

    /// Project directory. Defaults to the current directory
    #[clap(long, global = true)]
    pub(crate) cwd: Option<PathBuf>,

    /// Registry to install from: a directory, a `registry.json` path or an http(s) URL
    #[clap(long, global = true, env = "GRAFT_REGISTRY")]
    pub(crate) registry: Option<String>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[clap(short, long, global = true, action = ArgAction::Count)]
    pub(crate) verbose: u8,

    /// Only log errors
    #[clap(short, long, global = true)]
    pub(crate) quiet: bool,
}

#[derive(Debug, Subcommand, Clone, PartialEq)]
pub enum GraftCommand {
    /// Initializes the project: writes `graft.json` and creates the alias directories
    Init {
        /// Accept the detected defaults without prompting
        #[clap(short, long)]
        yes: bool,
        /// Data model variant to record in `graft.json`
        #[clap(long)]
        model: Option<String>,
        /// Import alias components are installed under
        #[clap(long)]
        components_alias: Option<String>,
        /// Import alias library modules are installed under
        #[clap(long)]
        lib_alias: Option<String>,
    },
    /// Installs components and everything they depend on
    Add {
        /// Component names or titles (case-insensitive)
        names: Vec<String>,
        /// Add every component of a category
        #[clap(long)]
        category: Option<String>,
        /// Overwrite conflicting files without asking
        #[clap(short, long)]
        force: bool,
        /// Never prompt; conflicts are kept and reported
        #[clap(short, long)]
        yes: bool,
    },
    /// Initializes the project if needed, installs every component and adds missing packages
    Bootstrap {
        /// Overwrite conflicting files without asking
        #[clap(short, long)]
        force: bool,
        /// Do not run the package manager
        #[clap(long)]
        skip_install: bool,
    },
    /// Prints the dependency tree of a component
    Tree {
        name: String,
        /// Print the tree as JSON
        #[clap(long)]
        json: bool,
        /// Maximum depth to expand
        #[clap(long, default_value_t = graft::DEFAULT_TREE_DEPTH)]
        depth: usize,
    },
    /// Lists the components in the registry
    List {
        /// Only list one category
        #[clap(long)]
        category: Option<String>,
        /// Print the list as JSON
        #[clap(long)]
        json: bool,
    },
    /// Reports installed files that are outdated, locally modified or untracked
    Status {
        /// Print the report as JSON
        #[clap(long)]
        json: bool,
    },
}
