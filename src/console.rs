use std::io::{self, BufRead, Write};

/// Everything the client tells or asks the person at the terminal.
pub trait Reporter {
    fn report(&self, line: &str);
    /// Asked when the destination already holds `filename`. `true` overwrites.
    fn confirm_overwrite(&self, filename: &str) -> bool;
}

/// stdout for progress, stdin for the overwrite question.
pub struct Console {
    assume_yes: bool,
}

impl Console {
    pub fn new(assume_yes: bool) -> Console {
        Console { assume_yes }
    }
}

impl Reporter for Console {
    fn report(&self, line: &str) {
        println!("{}", line);
    }

    fn confirm_overwrite(&self, _filename: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        print!("File already exists. Would you like to overwrite? (y/n) ");
        let _ = io::stdout().flush();
        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => answer.trim() == "y",
            // no terminal to ask: keep the existing file
            Err(_) => false,
        }
    }
}
