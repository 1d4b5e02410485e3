// src/main.rs

use etlflow::result::RunStatus;
use etlflow::{cli, logging, run};

#[tokio::main]
async fn main() {
    match run_main().await {
        Ok(RunStatus::Completed) => {}
        Ok(status) => {
            eprintln!("etlflow: run {status}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("etlflow error: {err:?}");
            std::process::exit(1);
        }
    }
}

async fn run_main() -> anyhow::Result<RunStatus> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}
