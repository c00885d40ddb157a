use std::fmt::Write as _;
use std::sync::Arc;

use adapters::ebpf::config_register::PinnedConfigRegister;
use adapters::ebpf::opt_map::PinnedOptMap;
use adapters::ebpf::pinned::PinnedMaps;
use adapters::ebpf::trace_port_map::PinnedTracePortMap;
use anyhow::{Context, Result};
use application::config_register_service::ConfigRegisterService;
use application::flow_map_service::FlowMapService;
use domain::common::entity::IpProto;
use domain::config::entity::{CfgFlag, ConfigView};
use domain::flow::entity::{MapEntry, OptKey, OptValue, TracePortKey, TracePortValue};
use ports::secondary::config_register_port::ConfigRegisterPort;
use ports::secondary::opt_map_port::OptMapPort;
use ports::secondary::trace_port_map_port::TracePortMapPort;

use crate::cli::{CfgCommand, MapsCommand, OptCommand, OutputFormat, TracePortCommand};

/// Services backing the `maps` subcommands.
pub struct MapTools {
    flows: FlowMapService,
    registers: ConfigRegisterService,
}

impl MapTools {
    pub fn new(
        opt: Arc<dyn OptMapPort>,
        trace: Arc<dyn TracePortMapPort>,
        registers: Arc<dyn ConfigRegisterPort>,
    ) -> Self {
        Self {
            flows: FlowMapService::new(opt, trace),
            registers: ConfigRegisterService::new(registers),
        }
    }

    /// Tools over the maps pinned under `pin_dir`.
    pub fn pinned(pin_dir: &str) -> Self {
        let maps = PinnedMaps::new(pin_dir);
        Self::new(
            Arc::new(PinnedOptMap::new(maps.clone())),
            Arc::new(PinnedTracePortMap::new(maps.clone())),
            Arc::new(PinnedConfigRegister::new(maps)),
        )
    }
}

pub fn cmd_maps(tools: &MapTools, command: MapsCommand, output: OutputFormat) -> Result<()> {
    let text = run_maps(tools, command, output)?;
    print!("{text}");
    Ok(())
}

/// Execute one `maps` subcommand and render what it prints.
pub fn run_maps(tools: &MapTools, command: MapsCommand, output: OutputFormat) -> Result<String> {
    match command {
        MapsCommand::Opt {
            command: OptCommand::Show { proto },
        } => {
            let proto = IpProto::from(proto);
            let entries = tools
                .flows
                .show_opts(proto)
                .with_context(|| format!("failed to read {} opt map", proto.label()))?;
            match output {
                OutputFormat::Json => json(&entries),
                OutputFormat::Table => Ok(opt_table(&entries)),
            }
        }

        MapsCommand::TracePort { command } => match command {
            TracePortCommand::Show => {
                let mut entries = tools
                    .flows
                    .show_trace_ports()
                    .context("failed to read trace port map")?;
                entries.sort_by_key(|e| (e.key.sys, e.key.port));
                match output {
                    OutputFormat::Json => json(&entries),
                    OutputFormat::Table => Ok(trace_port_table(&entries)),
                }
            }
            TracePortCommand::Add {
                sys,
                port,
                ingress,
                egress,
            } => {
                tools
                    .flows
                    .add_trace_port(sys, port, TracePortValue { ingress, egress })
                    .with_context(|| format!("failed to add trace port {sys}/{port}"))?;
                Ok(format!("trace port {sys}/{port} added\n"))
            }
            TracePortCommand::Del { sys, port } => {
                tools
                    .flows
                    .del_trace_port(sys, port)
                    .with_context(|| format!("failed to delete trace port {sys}/{port}"))?;
                Ok(format!("trace port {sys}/{port} deleted\n"))
            }
        },

        MapsCommand::Cfg {
            command: CfgCommand::Show,
        } => {
            let views = tools
                .registers
                .view_all()
                .context("failed to read config registers")?;
            match output {
                OutputFormat::Json => json(&views),
                OutputFormat::Table => Ok(cfg_table(&views)),
            }
        }
    }
}

fn json<T: serde::Serialize>(value: &T) -> Result<String> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    Ok(text)
}

// ── Tables ─────────────────────────────────────────────────────────

fn opt_table(entries: &[MapEntry<OptKey, OptValue>]) -> String {
    if entries.is_empty() {
        return "No opt entries.\n".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<6} {:<5} {:<40} {:<40} {:<40} {:>6}",
        "SYS", "PROTO", "LOCAL", "REMOTE", "REDIRECT", "PORT"
    );
    for entry in entries {
        let _ = writeln!(
            out,
            "{:<6} {:<5} {:<40} {:<40} {:<40} {:>6}",
            entry.key.sys,
            entry.key.proto.label(),
            endpoint(entry.key.local_addr, entry.key.local_port),
            endpoint(entry.key.remote_addr, entry.key.remote_port),
            entry.value.daddr,
            entry.value.dport,
        );
    }
    let _ = writeln!(out, "\n{} entr(ies) total.", entries.len());
    out
}

fn trace_port_table(entries: &[MapEntry<TracePortKey, TracePortValue>]) -> String {
    if entries.is_empty() {
        return "No trace ports.\n".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(out, "{:<6} {:>6}  {:<7}  {:<6}", "SYS", "PORT", "INGRESS", "EGRESS");
    for entry in entries {
        let _ = writeln!(
            out,
            "{:<6} {:>6}  {:<7}  {:<6}",
            entry.key.sys,
            entry.key.port,
            yes_no(entry.value.ingress),
            yes_no(entry.value.egress),
        );
    }
    out
}

fn cfg_table(views: &[ConfigView]) -> String {
    let mut out = String::new();
    for view in views {
        let _ = writeln!(out, "{}", view.sys);
        let _ = writeln!(out, "  ipv4: {}", flag_names(&view.ipv4));
        let _ = writeln!(out, "  ipv6: {}", flag_names(&view.ipv6));
    }
    out
}

fn flag_names(flags: &[CfgFlag]) -> String {
    if flags.is_empty() {
        return "-".to_string();
    }
    flags
        .iter()
        .filter_map(|f| serde_json::to_value(f).ok())
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect::<Vec<_>>()
        .join(",")
}

fn endpoint(addr: std::net::IpAddr, port: u16) -> String {
    if addr.is_unspecified() && port == 0 {
        return "*".to_string();
    }
    if port == 0 {
        return addr.to_string();
    }
    std::net::SocketAddr::new(addr, port).to_string()
}

fn yes_no(v: bool) -> &'static str {
    if v { "yes" } else { "no" }
}
