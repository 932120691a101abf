use clap::Parser;
use drover::cli::{self, Args, Commands};
use tracing::error;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let verbose = matches!(&args.command, Commands::Run { verbose: true, .. });
    let default_filter = if verbose { "drover=debug" } else { "drover=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_target(false)
        .init();

    let result = match args.command {
        Commands::Run {
            task,
            file,
            params,
            dry_run,
            strict,
            verbose: _,
        } => cli::run_task(task, file, params, dry_run, strict).await,
        Commands::List { file } => cli::list_tasks(file).await,
        Commands::Plan { task, file, json } => cli::show_plan(task, file, json).await,
        Commands::Check { file } => cli::check(file).await,
    };

    if let Err(e) = result {
        error!("{e:#}");
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
