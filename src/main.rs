/************************************************************
 ******************ftx: the file transfer client************
 ***********************************************************
 ****one connection to ask, one connection to receive*******
 **********************************************************/

use std::env;
use std::process::exit;

use anyhow::{Context, Result};

use ftx::cmd::{parse_client_args, ClientArgs, Invocation};
use ftx::console::Console;
use ftx::files::DirStorage;
use ftx::{logging, session, Error, Outcome, SessionConfig};

fn main() {
    let argv: Vec<String> = env::args().collect();

    let args = match parse_client_args(&argv) {
        Ok(Invocation::Run(args)) => args,
        Ok(Invocation::Help(usage)) => {
            println!("{}", usage);
            return;
        }
        Err(Error::Usage(m)) => {
            eprintln!("Error: {}", m);
            exit(1);
        }
        Err(m) => {
            eprintln!("Error while parsing input arguments:\n  {}", m);
            exit(1);
        }
    };
    logging::init("warn", args.verbose);

    if let Err(e) = run(args) {
        eprintln!("Error: {:#}", e);
        exit(1);
    }
}

fn run(args: ClientArgs) -> Result<()> {
    let config = SessionConfig {
        host: args.host,
        port: args.port,
        data_port: args.data_port,
        sync: args.sync,
        timeout: args.timeout,
    };
    let console = Console::new(args.assume_yes);
    let storage = DirStorage::new(&args.dest);

    let outcome = session::run(&config, &args.command, &console, &storage).with_context(|| {
        format!(
            "{} request to {}:{} failed",
            args.command.flag(),
            config.host,
            config.port
        )
    })?;
    // a missing file has already been reported and is not a failure
    if let Outcome::NotFound(reason) = outcome {
        tracing::info!(%reason, "server has no such file");
    }
    Ok(())
}
