use anyhow::Result;
use std::process::ExitCode;

use cloudwatchmon::cli::{self, GetArgs};
use cloudwatchmon::config::{Config, GET_CLIENT_NAME};
use cloudwatchmon::logging;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = cli::parse_get_args();

    if args.version {
        println!("{} version {}", GET_CLIENT_NAME, cloudwatchmon::VERSION);
        return ExitCode::SUCCESS;
    }

    if let Err(e) = logging::setup_logger(args.verbose) {
        eprintln!("{e}");
    }

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logging::log_error(GET_CLIENT_NAME, &format!("{e:#}"), false);
            ExitCode::from(1)
        }
    }
}

async fn run(args: &GetArgs) -> Result<()> {
    let config = Config::load(GET_CLIENT_NAME)?;
    cli::get::run(args, &config).await
}
