use clap::Parser;
use std::process::ExitCode;

mod cli;
mod fetch;
mod logging;
mod schema;
mod validate;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    logging::init(cli.verbose);

    let result = match cli.command {
        cli::Command::Fetch(args) => fetch::run(args),
        cli::Command::Validate { file } => validate::run(&file),
        cli::Command::Schema => schema::run().map(|()| ExitCode::SUCCESS),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
