mod command_line;
mod logging;

use anyhow::Result;
use certificate_monkey_infra::{Configuration, ResourceGraph};
use clap::Parser;
use tracing::info;

use crate::command_line::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    dotenv::dotenv().ok();
    logging::init_logging()?;

    let sdk_config = aws_config::load_from_env().await;
    let region = sdk_config.region().map(|region| region.to_string());

    let config = Configuration::from_env(region.as_deref())?;
    info!(
        environment = %config.environment,
        region = %config.region,
        "Building Certificate Monkey resource graph"
    );

    let graph = ResourceGraph::build(&config)?;

    command_line::run(&graph, &cli.command_or_default())
}
