mod commands;
mod terminal;

use commands::{CommandLine, scan};
use terminal::{logging, print};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();

    logging::init(commands.verbosity(), commands.log_file.as_deref())?;
    print::banner(commands.quiet);

    scan::scan(&commands).await
}
