mod commands;
mod terminal;

use commands::{CommandLine, Commands, scan, vendor};
use terminal::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();

    logging::init_logging(commands.verbose);

    match commands.command {
        Commands::Scan(args) => scan::scan(args).await,
        Commands::Vendor(args) => vendor::vendor(args),
    }
}
