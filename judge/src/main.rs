use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use judge::cli::{self, SubmitOptions};
use judge::config::load_config;
use judge::exit_codes;

#[derive(Parser)]
#[command(
    name = "judge",
    version,
    about = "Run untrusted submissions in throwaway containers and judge their output"
)]
struct Cli {
    /// Path to the judge configuration file.
    #[arg(long, global = true, default_value = "judge.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default configuration file at `--config` if missing.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// List problem ids in the catalog.
    List,
    /// Judge a code file against a problem.
    Submit {
        problem_id: String,
        code_file: PathBuf,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
        /// User recorded with an accepted submission.
        #[arg(long)]
        user: Option<String>,
    },
    /// Check that the container runtime can serve an image.
    Preflight { image: String },
}

fn main() {
    sandbox::logging::init();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            if let Err(print_err) = err.print() {
                eprintln!("{print_err}");
            }
            let code = if err.use_stderr() {
                exit_codes::INVALID
            } else {
                exit_codes::OK
            };
            std::process::exit(code);
        }
    };
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Init { force } => cli::init_config(&cli.config, force),
        Command::List => cli::list_problems(&load_config(&cli.config)?),
        Command::Submit {
            problem_id,
            code_file,
            json,
            user,
        } => cli::submit(
            &load_config(&cli.config)?,
            &SubmitOptions {
                problem_id: &problem_id,
                code_file: &code_file,
                json,
                user: user.as_deref(),
            },
        ),
        Command::Preflight { image } => cli::preflight(&load_config(&cli.config)?, &image),
    }
}
