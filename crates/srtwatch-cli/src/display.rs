//! Terminal rendering for the countdown loop — the counter redraws in
//! place on stderr, connection notices go to stdout.

use std::io::Write;

use srtwatch_supervisor::countdown::CountdownDisplay;

pub struct TerminalDisplay;

impl CountdownDisplay for TerminalDisplay {
    fn remaining(&mut self, secs: u32) {
        eprint!("\rsession expires in {secs:>4} s  (Ctrl-C terminates)");
        let _ = std::io::stderr().flush();
    }

    fn connected(&mut self, endpoint: &str) {
        eprintln!();
        println!("connected with {endpoint}");
    }
}
