//! Operator-facing transcript of a transaction

use std::io::Write;

use sipprobe_message::RenderedMessage;

/// Receives every message the engine sends and every line it reads
pub trait Transcript: Send {
    fn sent(&mut self, message: &RenderedMessage);

    /// `line` has its terminator stripped
    fn received(&mut self, line: &str);
}

impl<T: Transcript + ?Sized> Transcript for &mut T {
    fn sent(&mut self, message: &RenderedMessage) {
        (**self).sent(message)
    }

    fn received(&mut self, line: &str) {
        (**self).received(line)
    }
}

/// Echoes the exchange to standard output
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutTranscript;

impl Transcript for StdoutTranscript {
    fn sent(&mut self, message: &RenderedMessage) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "Client:");
        for line in message.as_str().lines() {
            let _ = writeln!(out, "  {line}");
        }
        let _ = out.flush();
    }

    fn received(&mut self, line: &str) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "Server: {line}");
        let _ = out.flush();
    }
}
