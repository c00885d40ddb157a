use clap::{Args, Parser, Subcommand, ValueEnum};
use domain::common::entity::{IpProto, SysId};
use infrastructure::config::{AgentConfig, LogFormat, LogLevel};
use infrastructure::constants::DEFAULT_CONFIG_PATH;

#[derive(Parser, Debug)]
#[command(
    name = "xnet-agent",
    about = "xnet per-node service mesh agent",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Log level override (takes precedence over config file)
    #[arg(short, long)]
    pub log_level: Option<LogLevel>,

    /// Log format: json (default, production) or text (development)
    #[arg(long)]
    pub log_format: Option<LogFormat>,

    #[command(flatten)]
    pub features: FeatureArgs,

    /// Output format for inspection commands
    #[arg(short, long, default_value = "json", global = true)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Switches that override the matching configuration file keys.
#[derive(Args, Debug, Clone, Default)]
pub struct FeatureArgs {
    /// Enable or disable the mesh redirect feature
    #[arg(long, env = "XNET_ENABLE_MESH")]
    pub enable_mesh: Option<bool>,

    /// Enable or disable the node load balancer feature
    #[arg(long, env = "XNET_ENABLE_E4LB")]
    pub enable_e4lb: Option<bool>,

    /// Unload and reload the program bundle at startup
    #[arg(long)]
    pub upgrade_prog: bool,

    /// Tear down everything the agent installed and serve only /version
    #[arg(long)]
    pub uninstall_prog: bool,

    /// Namespace excluded from monitoring (repeatable)
    #[arg(long = "mesh-exclude-namespace")]
    pub mesh_exclude_namespaces: Vec<String>,
}

impl FeatureArgs {
    /// Fold the flags into a loaded configuration.
    pub fn apply(&self, config: &mut AgentConfig) {
        if let Some(enabled) = self.enable_mesh {
            config.mesh.enabled = enabled;
        }
        if let Some(enabled) = self.enable_e4lb {
            config.e4lb.enabled = enabled;
        }
        if self.upgrade_prog {
            config.lifecycle.upgrade = true;
        }
        if self.uninstall_prog {
            config.lifecycle.uninstall = true;
        }
        for ns in &self.mesh_exclude_namespaces {
            if !config.mesh.exclude_namespaces.contains(ns) {
                config.mesh.exclude_namespaces.push(ns.clone());
            }
        }
    }
}

/// Output format for inspection commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON array (default)
    Json,
    /// Human-readable table
    Table,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Display version and build information
    Version,

    /// Inspect and edit the pinned kernel maps
    Maps(MapsArgs),
}

#[derive(Args, Debug)]
pub struct MapsArgs {
    #[command(subcommand)]
    pub command: MapsCommand,
}

#[derive(Subcommand, Debug)]
pub enum MapsCommand {
    /// Redirect override entries
    Opt {
        #[command(subcommand)]
        command: OptCommand,
    },

    /// Per-port trace toggles
    TracePort {
        #[command(subcommand)]
        command: TracePortCommand,
    },

    /// Per-system config registers
    Cfg {
        #[command(subcommand)]
        command: CfgCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum OptCommand {
    /// Dump the redirect overrides of one protocol
    Show {
        #[arg(long, default_value = "tcp")]
        proto: ProtoArg,
    },
}

#[derive(Subcommand, Debug)]
pub enum TracePortCommand {
    /// Dump every trace port entry
    Show,

    /// Enable tracing on a port
    Add {
        #[arg(long, default_value = "mesh")]
        sys: SysId,
        #[arg(long)]
        port: u16,
        #[arg(long)]
        ingress: bool,
        #[arg(long)]
        egress: bool,
    },

    /// Remove a trace port entry
    Del {
        #[arg(long, default_value = "mesh")]
        sys: SysId,
        #[arg(long)]
        port: u16,
    },
}

#[derive(Subcommand, Debug)]
pub enum CfgCommand {
    /// Dump the decoded flags of every system
    Show,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProtoArg {
    Tcp,
    Udp,
}

impl From<ProtoArg> for IpProto {
    fn from(p: ProtoArg) -> Self {
        match p {
            ProtoArg::Tcp => Self::Tcp,
            ProtoArg::Udp => Self::Udp,
        }
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}
