//! Terminal presentation for streaming sends.

use kaiwa_core::{ChatEvent, ChatEventSink, StreamPhase};
use std::io::{self, Write};

/// Writes deltas to stdout as they arrive, flushing after each chunk so the
/// reply appears incrementally.
pub struct StdoutSink {
    wrote: bool,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self { wrote: false }
    }
}

impl ChatEventSink for StdoutSink {
    fn handle(&mut self, event: ChatEvent<'_>) -> io::Result<()> {
        match event {
            ChatEvent::Started { .. } => {}
            ChatEvent::Delta(chunk) => {
                print!("{}", chunk);
                io::stdout().flush()?;
                self.wrote = true;
            }
            ChatEvent::Ended(phase) => {
                if self.wrote {
                    println!();
                }
                match phase {
                    StreamPhase::Cancelled => eprintln!("(cancelled, partial reply kept)"),
                    StreamPhase::Failed => eprintln!("(stream interrupted, partial reply kept)"),
                    _ => {}
                }
            }
        }
        Ok(())
    }
}
