//! Terminal notifications: progress and errors on stderr, results on stdout.

use quip_sync::Notifier;

#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notice(&self, message: &str) {
        eprintln!("{}", message);
    }

    fn success(&self, message: &str, link: &str) {
        println!("{}: {}", message, link);
    }
}
