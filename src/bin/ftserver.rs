use std::env;
use std::process::exit;

use anyhow::{bail, Context, Result};

use ftx::cmd::{parse_server_args, Invocation, ServerArgs};
use ftx::server::{serve, ServerConfig};
use ftx::{logging, Error};

fn main() {
    let argv: Vec<String> = env::args().collect();

    let args = match parse_server_args(&argv) {
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
    logging::init("info", args.verbose);

    if let Err(e) = run(args) {
        eprintln!("Error: {:#}", e);
        exit(1);
    }
}

fn run(args: ServerArgs) -> Result<()> {
    if !args.root.is_dir() {
        bail!("root is not a directory: {}", args.root.display());
    }
    let root = std::fs::canonicalize(&args.root)
        .with_context(|| format!("failed to canonicalize {}", args.root.display()))?;
    let config = ServerConfig {
        port: args.port,
        bind: args.bind,
        root,
        sync: args.sync,
    };
    serve(config).context("server stopped")
}
