use anyhow::Result;
use clap::CommandFactory;
use std::process::ExitCode;

use cloudwatchmon::cli::{self, PutArgs};
use cloudwatchmon::config::{Config, PUT_CLIENT_NAME};
use cloudwatchmon::logging;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Exit with help when no arguments are given
    if std::env::args_os().len() == 1 {
        let _ = PutArgs::command().print_help();
        return ExitCode::from(1);
    }

    let args = cli::parse_put_args();

    if args.version {
        println!("{} version {}", PUT_CLIENT_NAME, cloudwatchmon::VERSION);
        return ExitCode::SUCCESS;
    }

    if let Err(e) = logging::setup_logger(args.verbose) {
        eprintln!("{e}");
    }

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logging::log_error(PUT_CLIENT_NAME, &format!("{e:#}"), args.from_cron);
            ExitCode::from(1)
        }
    }
}

async fn run(args: &PutArgs) -> Result<()> {
    let config = Config::load(PUT_CLIENT_NAME)?;
    cli::put::run(args, &config).await
}
