#![allow(dead_code)]

use std::cell::RefCell;
use std::net::TcpListener;
use std::thread::{self, JoinHandle};

use ftx::console::Reporter;
use ftx::server::{serve_one, ServerConfig};
use ftx::{SessionConfig, SyncMode};

/// Console stand-in that remembers every line and answers the overwrite
/// question with a fixed choice.
pub struct Recorder {
    pub lines: RefCell<Vec<String>>,
    pub prompts: RefCell<Vec<String>>,
    overwrite: bool,
}

impl Recorder {
    pub fn new(overwrite: bool) -> Recorder {
        Recorder {
            lines: RefCell::new(Vec::new()),
            prompts: RefCell::new(Vec::new()),
            overwrite,
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }
}

impl Reporter for Recorder {
    fn report(&self, line: &str) {
        self.lines.borrow_mut().push(line.to_string());
    }

    fn confirm_overwrite(&self, filename: &str) -> bool {
        self.prompts.borrow_mut().push(filename.to_string());
        self.overwrite
    }
}

pub fn free_port() -> u16 {
    let sock = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = sock.local_addr().unwrap().port();
    drop(sock);
    port
}

pub fn client_config(port: u16, data_port: u16, sync: SyncMode) -> SessionConfig {
    SessionConfig {
        host: "127.0.0.1".to_string(),
        port,
        data_port,
        sync,
        timeout: Some(std::time::Duration::from_secs(10)),
    }
}

/// A real server answering exactly one control connection. Returns the
/// control port and the handle of the serving thread.
pub fn spawn_server(
    root: &std::path::Path,
    sync: SyncMode,
) -> (u16, JoinHandle<ftx::Result<()>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let config = ServerConfig {
        port,
        bind: "127.0.0.1".to_string(),
        root: root.to_path_buf(),
        sync,
    };
    let handle = thread::spawn(move || serve_one(&listener, &config));
    (port, handle)
}
