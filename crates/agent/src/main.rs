#![forbid(unsafe_code)]

mod cli;
mod commands;
mod shutdown;
mod startup;

use std::path::Path;

use anyhow::Result;
use infrastructure::config::AgentConfig;

use cli::Command;
use commands::MapTools;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::parse();

    match cli.command {
        Some(Command::Version) => {
            let build = startup::BUILD;
            println!(
                "xnet-agent {} (commit {}, built {})",
                build.version, build.git_commit, build.build_date
            );
            Ok(())
        }

        Some(Command::Maps(args)) => {
            let config = AgentConfig::load_or_default(Path::new(&cli.config))?;
            let tools = MapTools::pinned(&config.node.pin_dir);
            commands::cmd_maps(&tools, args.command, cli.output)
        }

        None => startup::run(&cli).await,
    }
}
