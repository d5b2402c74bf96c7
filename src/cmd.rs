extern crate getopts;

use std::path::PathBuf;
use std::time::Duration;

use getopts::Options;

use crate::error::{Error, Result};
use crate::files::is_flat_name;
use crate::protocol::{Command, MAX_PORT, MIN_PORT};
use crate::session::{SyncMode, LEGACY_SETTLE_DELAY};

#[derive(Debug, Clone, PartialEq)]
pub struct ClientArgs {
    pub host: String,
    pub port: u16,
    pub command: Command,
    pub data_port: u16,
    pub sync: SyncMode,
    pub timeout: Option<Duration>,
    pub dest: PathBuf,
    pub assume_yes: bool,
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerArgs {
    pub port: u16,
    pub bind: String,
    pub root: PathBuf,
    pub sync: SyncMode,
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Invocation<T> {
    Help(String),
    Run(T),
}

fn client_options() -> Options {
    let mut opts = Options::new();
    opts.optflag("l", "list", "list the files in the server's directory");
    opts.optflag("g", "get", "fetch <filename> from the server");
    opts.optopt(
        "d",
        "legacy-delay",
        "skip the ready handshake and wait MS milliseconds before opening the data connection",
        "MS",
    );
    opts.optflag("", "legacy", "skip the ready handshake and wait 1000 ms");
    opts.optopt("t", "timeout", "read/write timeout on both connections", "SECS");
    opts.optopt("o", "dest", "directory received files are written to (default .)", "DIR");
    opts.optflag("y", "yes", "overwrite existing files without asking");
    opts.optflag("v", "verbose", "debug logging");
    opts.optflag("h", "help", "print this help");
    opts
}

fn server_options() -> Options {
    let mut opts = Options::new();
    opts.optopt("r", "root", "directory to serve (default .)", "DIR");
    opts.optopt("b", "bind", "interface to listen on (default 0.0.0.0)", "HOST");
    opts.optflag("", "legacy", "never send the ready acknowledgment");
    opts.optflag("v", "verbose", "debug logging");
    opts.optflag("h", "help", "print this help");
    opts
}

pub fn client_usage(program: &str) -> String {
    let brief = format!(
        "Usage: {} host port (-l | -g) [filename] data_port [options]\n  [filename] is only required with the -g command",
        program
    );
    client_options().usage(&brief)
}

pub fn server_usage(program: &str) -> String {
    server_options().usage(&format!("Usage: {} port [options]", program))
}

pub fn parse_client_args(argv: &[String]) -> Result<Invocation<ClientArgs>> {
    let program = argv.first().map(String::as_str).unwrap_or("ftclient");
    let matches = client_options()
        .parse(argv.iter().skip(1))
        .map_err(|e| Error::Usage(e.to_string()))?;
    if matches.opt_present("h") {
        return Ok(Invocation::Help(client_usage(program)));
    }

    let list = matches.opt_present("l");
    let get = matches.opt_present("g");
    let free = &matches.free;
    let (host, port, filename, data_port) = match (list, get) {
        (true, true) => return Err(Error::Usage("-l and -g cannot be combined".to_string())),
        (false, false) => {
            return Err(Error::Usage(
                "invalid command. Acceptable commands are -l or -g".to_string(),
            ))
        }
        (true, false) => match free.as_slice() {
            [host, port, data_port] => (host, port, None, data_port),
            [_, _, _, _] => {
                return Err(Error::Usage("<filename> is only accepted with -g".to_string()))
            }
            _ => return Err(Error::Usage(client_usage(program))),
        },
        (false, true) => match free.as_slice() {
            [host, port, filename, data_port] => (host, port, Some(filename), data_port),
            [_, _, _] => {
                return Err(Error::Usage(
                    "<filename> parameter required with -g command".to_string(),
                ))
            }
            _ => return Err(Error::Usage(client_usage(program))),
        },
    };

    let command = match filename {
        None => Command::ListDirectory,
        Some(name) if is_flat_name(name) => Command::GetFile(name.clone()),
        Some(name) => {
            return Err(Error::Usage(format!(
                "{:?} is not a plain filename in the server's directory",
                name
            )))
        }
    };

    Ok(Invocation::Run(ClientArgs {
        host: host.clone(),
        port: parse_port(port)?,
        command,
        data_port: parse_port(data_port)?,
        sync: parse_sync(matches.opt_present("legacy"), matches.opt_str("d"))?,
        timeout: matches
            .opt_str("t")
            .map(|secs| parse_seconds(&secs))
            .transpose()?,
        dest: PathBuf::from(matches.opt_str("o").unwrap_or_else(|| ".".to_string())),
        assume_yes: matches.opt_present("y"),
        verbose: matches.opt_present("v"),
    }))
}

pub fn parse_server_args(argv: &[String]) -> Result<Invocation<ServerArgs>> {
    let program = argv.first().map(String::as_str).unwrap_or("ftserver");
    let matches = server_options()
        .parse(argv.iter().skip(1))
        .map_err(|e| Error::Usage(e.to_string()))?;
    if matches.opt_present("h") {
        return Ok(Invocation::Help(server_usage(program)));
    }
    let port = match matches.free.as_slice() {
        [port] => parse_port(port)?,
        _ => return Err(Error::Usage(server_usage(program))),
    };
    let sync = if matches.opt_present("legacy") {
        SyncMode::SettleDelay(LEGACY_SETTLE_DELAY)
    } else {
        SyncMode::Acknowledged
    };
    Ok(Invocation::Run(ServerArgs {
        port,
        bind: matches.opt_str("b").unwrap_or_else(|| "0.0.0.0".to_string()),
        root: PathBuf::from(matches.opt_str("r").unwrap_or_else(|| ".".to_string())),
        sync,
        verbose: matches.opt_present("v"),
    }))
}

pub fn parse_port(text: &str) -> Result<u16> {
    let port: i64 = text
        .parse()
        .map_err(|_| Error::Usage(format!("{:?} is not a port number", text)))?;
    if !(i64::from(MIN_PORT)..=i64::from(MAX_PORT)).contains(&port) {
        return Err(Error::Usage(format!(
            "invalid port {}. Acceptable range: {} - {}",
            port, MIN_PORT, MAX_PORT
        )));
    }
    Ok(port as u16)
}

/// An explicit `--legacy-delay` wins over the bare `--legacy` default.
fn parse_sync(legacy: bool, millis: Option<String>) -> Result<SyncMode> {
    match millis {
        Some(ms) => {
            let ms: u64 = ms
                .parse()
                .map_err(|_| Error::Usage(format!("{:?} is not a delay in milliseconds", ms)))?;
            Ok(SyncMode::SettleDelay(Duration::from_millis(ms)))
        }
        None if legacy => Ok(SyncMode::SettleDelay(LEGACY_SETTLE_DELAY)),
        None => Ok(SyncMode::Acknowledged),
    }
}

fn parse_seconds(text: &str) -> Result<Duration> {
    match text.parse::<u64>() {
        Ok(0) | Err(_) => Err(Error::Usage(format!("{:?} is not a timeout in seconds", text))),
        Ok(secs) => Ok(Duration::from_secs(secs)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        std::iter::once("ftclient")
            .chain(args.iter().copied())
            .map(String::from)
            .collect()
    }

    fn run_args(args: &[&str]) -> ClientArgs {
        match parse_client_args(&argv(args)).unwrap() {
            Invocation::Run(args) => args,
            Invocation::Help(_) => panic!("unexpected help"),
        }
    }

    fn usage_error(args: &[&str]) -> String {
        match parse_client_args(&argv(args)) {
            Err(Error::Usage(msg)) => msg,
            other => panic!("expected usage error, got {:?}", other),
        }
    }

    #[test]
    fn list_invocation() {
        let args = run_args(&["flip1", "30021", "-l", "30020"]);
        assert_eq!(args.host, "flip1");
        assert_eq!(args.port, 30021);
        assert_eq!(args.command, Command::ListDirectory);
        assert_eq!(args.data_port, 30020);
        assert_eq!(args.sync, SyncMode::Acknowledged);
        assert_eq!(args.timeout, None);
    }

    #[test]
    fn get_invocation_with_options() {
        let args = run_args(&["localhost", "30021", "-g", "report.txt", "30020", "-y", "-t", "5"]);
        assert_eq!(args.command, Command::GetFile("report.txt".to_string()));
        assert_eq!(args.data_port, 30020);
        assert!(args.assume_yes);
        assert_eq!(args.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn legacy_flag_waits_one_second() {
        let args = run_args(&["localhost", "30021", "-l", "30020", "--legacy"]);
        assert_eq!(args.sync, SyncMode::SettleDelay(Duration::from_secs(1)));
    }

    #[test]
    fn legacy_delay_takes_a_value_in_every_form() {
        let args = run_args(&["localhost", "30021", "-l", "30020", "--legacy-delay=250"]);
        assert_eq!(args.sync, SyncMode::SettleDelay(Duration::from_millis(250)));
        let args = run_args(&["localhost", "30021", "-l", "30020", "--legacy-delay", "250"]);
        assert_eq!(args.sync, SyncMode::SettleDelay(Duration::from_millis(250)));
        assert_eq!(args.data_port, 30020);
    }

    #[test]
    fn short_delay_flag_leaves_data_port_alone() {
        let args = run_args(&["localhost", "30021", "-l", "-d", "250", "30020"]);
        assert_eq!(args.sync, SyncMode::SettleDelay(Duration::from_millis(250)));
        assert_eq!(args.data_port, 30020);
        let args = run_args(&["localhost", "30021", "-g", "report.txt", "-d", "40", "30020"]);
        assert_eq!(args.command, Command::GetFile("report.txt".to_string()));
        assert_eq!(args.sync, SyncMode::SettleDelay(Duration::from_millis(40)));
        assert_eq!(args.data_port, 30020);
    }

    #[test]
    fn delay_flag_without_value_is_a_usage_error() {
        usage_error(&["localhost", "30021", "-l", "30020", "-d"]);
        usage_error(&["localhost", "30021", "-l", "30020", "--legacy-delay", "soon"]);
    }

    #[test]
    fn get_without_filename() {
        assert!(usage_error(&["localhost", "30021", "-g", "30020"]).contains("required with -g"));
    }

    #[test]
    fn ports_out_of_range() {
        assert!(usage_error(&["localhost", "80", "-l", "30020"]).contains("Acceptable range"));
        assert!(usage_error(&["localhost", "30021", "-l", "70000"]).contains("Acceptable range"));
        assert!(usage_error(&["localhost", "30021", "-l", "port"]).contains("not a port"));
    }

    #[test]
    fn command_vocabulary() {
        usage_error(&["localhost", "30021", "30020"]);
        usage_error(&["localhost", "30021", "-l", "-g", "x.txt", "30020"]);
        usage_error(&["localhost", "30021", "-x", "30020"]);
    }

    #[test]
    fn path_like_filenames_are_refused() {
        usage_error(&["localhost", "30021", "-g", "../etc/passwd", "30020"]);
    }

    #[test]
    fn server_arguments() {
        let argv: Vec<String> = ["ftserver", "30021", "--legacy", "-r", "/srv/files"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        match parse_server_args(&argv).unwrap() {
            Invocation::Run(args) => {
                assert_eq!(args.port, 30021);
                assert_eq!(args.root, PathBuf::from("/srv/files"));
                assert_eq!(args.bind, "0.0.0.0");
                assert_eq!(args.sync, SyncMode::SettleDelay(LEGACY_SETTLE_DELAY));
            }
            Invocation::Help(_) => panic!("unexpected help"),
        }
    }
}
