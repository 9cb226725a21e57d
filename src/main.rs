use anyhow::Result;
use clap::Parser;

use bigsid::commands::{self, Cli, Commands};
use bigsid::logging;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // start wires its own logger: stderr in the foreground, the
        // daemon log file once detached
        Commands::Start {
            config,
            watch_dir,
            working_dir,
            threads,
            foreground,
        } => commands::daemon_ctl::start(
            &config,
            watch_dir,
            working_dir,
            threads,
            foreground,
            cli.verbose,
        ),

        Commands::Stop { config, timeout } => {
            logging::init_logger(cli.verbose);
            commands::daemon_ctl::stop(&config, timeout)
        }

        Commands::Info { config, pid_only } => {
            logging::init_logger(cli.verbose);
            commands::daemon_ctl::info_cmd(&config, pid_only)
        }

        Commands::Sketch {
            config,
            file,
            index_dir,
        } => {
            logging::init_logger(cli.verbose);
            commands::sketch::sketch(&config, &file, index_dir.as_deref())
        }

        Commands::Shrink { config } => {
            logging::init_logger(cli.verbose);
            commands::sketch::shrink(&config)
        }
    }
}
