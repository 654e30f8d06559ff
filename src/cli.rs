use crate::boundary::IsolationPolicy;
use std::path::PathBuf;
use structopt::StructOpt;

/// Options for the CLI.
#[derive(StructOpt, Debug)]
#[structopt(
    name = "runt-host",
    about = "Discover and run tests hosted by an isolated test framework."
)]
pub struct Opts {
    /// Test assemblies. Globs are expanded.
    #[structopt(name = "ASSEMBLY", required = true)]
    pub assemblies: Vec<String>,

    /// Configuration file to use instead of `<assembly>.runt-host.toml`.
    #[structopt(short, long, parse(from_os_str))]
    pub config: Option<PathBuf>,

    /// Isolation policy: required, ifavailable or denied.
    #[structopt(long)]
    pub isolation: Option<IsolationPolicy>,

    /// Copy framework hosts before starting them.
    #[structopt(long)]
    pub shadow_copy: bool,

    /// Directory for shadow copies.
    #[structopt(long, parse(from_os_str))]
    pub shadow_copy_folder: Option<PathBuf>,

    /// List the selected tests instead of running them.
    #[structopt(short, long)]
    pub list: bool,

    /// Only consider tests of this fully qualified type.
    #[structopt(long = "class")]
    pub class: Option<String>,

    /// Include tests whose display name matches this regex.
    #[structopt(short, long = "include")]
    pub include_filter: Option<String>,

    /// Exclude tests whose display name matches this regex.
    #[structopt(short = "x", long = "exclude")]
    pub exclude_filter: Option<String>,

    /// Number of assemblies run in parallel. Defaults to the number of CPUs.
    #[structopt(short, long = "jobs")]
    pub jobs_limit: Option<usize>,

    /// Print passing tests too.
    #[structopt(short, long)]
    pub verbose: bool,
}
