use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use techdigest::app::{self, AppError, CollectOptions, DigestOptions};
use techdigest::logging::{self, LogConfig};

#[derive(Parser, Debug)]
#[command(name = "techdigest", version, about = "Collect tech feeds into a Markdown digest")]
struct Cli {
    /// Log at debug level on the console
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory for run log files
    #[arg(long, value_name = "DIR", default_value = "logs", global = true)]
    log_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch every enabled source and write the JSON payload
    Collect {
        /// Feeds file
        #[arg(long, value_name = "PATH", default_value = "feeds.yml")]
        config: PathBuf,

        /// Run date (defaults to today)
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: Option<NaiveDate>,

        /// Payload path (defaults to out/raw-{date}.json)
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Fetch and merge but write nothing
        #[arg(long)]
        dry_run: bool,
    },

    /// Render a JSON payload as Markdown
    Digest {
        /// Digest date (defaults to today)
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: Option<NaiveDate>,

        /// Payload path (defaults to out/raw-{date}.json)
        #[arg(long, value_name = "PATH")]
        input: Option<PathBuf>,

        /// Markdown path (defaults to out/digest-{date}.md)
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Print the Markdown instead of writing it
        #[arg(long)]
        dry_run: bool,
    },
}

fn run_date(date: Option<NaiveDate>) -> String {
    date.unwrap_or_else(|| Local::now().date_naive())
        .format("%Y-%m-%d")
        .to_string()
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Collect {
            config,
            date,
            output,
            dry_run,
        } => {
            let date = run_date(date);
            let log_file = (!dry_run).then(|| cli.log_dir.join(format!("collector-{date}.log")));
            logging::init(&LogConfig::for_run(cli.verbose, log_file))
                .context("Failed to initialize logging")?;

            let opts = CollectOptions {
                config_path: config,
                output: output.unwrap_or_else(|| app::default_payload_path(&date)),
                dry_run,
            };
            app::collect(&opts).await.map(|report| {
                if let Some(path) = report.written {
                    tracing::info!(
                        path = %path.display(),
                        entries = report.document.entries.len(),
                        "Collect finished"
                    );
                }
            })
        }
        Command::Digest {
            date,
            input,
            output,
            dry_run,
        } => {
            let date = run_date(date);
            let log_file = cli.log_dir.join(format!("digest-{date}.log"));
            logging::init(&LogConfig::for_run(cli.verbose, Some(log_file)))
                .context("Failed to initialize logging")?;

            let opts = DigestOptions {
                input: input.unwrap_or_else(|| app::default_payload_path(&date)),
                output: output.unwrap_or_else(|| app::default_digest_path(&date)),
                date,
                dry_run,
            };
            app::digest(&opts).map(|report| {
                if report.written.is_none() {
                    println!("{}", report.markdown);
                }
            })
        }
    };

    if let Err(e) = result {
        exit_with(e);
    }
    Ok(())
}

fn exit_with(error: AppError) -> ! {
    let code = error.exit_code();
    tracing::error!(error = %error, exit_code = code, "Run failed");
    std::process::exit(code)
}
