use std::io::Write;

/// Indentation depth of a single simulation trace line, mirroring the
/// original's `OUTPUT`/`ALERT` split by event class: switch-in is the
/// least indented, sleep/wake next, everything else deepest. This is
/// purely cosmetic — unlike `tracing`'s `-v`/`-q` diagnostic levels, the
/// simulation trace itself is never filtered by verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    One,
    Two,
    Three,
}

impl Level {
    fn indent(self) -> &'static str {
        match self {
            Level::One => "",
            Level::Two => "\t",
            Level::Three => "\t\t",
        }
    }
}

/// Destination for the simulation's own narrative trace, as distinct from
/// `tracing`'s diagnostic logs: this is the product output, not telemetry.
pub trait TraceSink {
    fn line(&mut self, level: Level, text: &str);

    /// `###-<text>-###`, used for process-created/process-exiting events
    /// and the start/end-of-run markers.
    fn banner(&mut self, text: &str) {
        self.line(Level::One, &format!("###-{text}-###"));
    }
}

/// A single `<display-name>/<time_slice>/<ms-since-start>ms - <message>`
/// trace line, as required of every non-banner event.
pub fn event_line(display_name: &str, time_slice: u64, ms_since_start: u64, message: &str) -> String {
    format!("{display_name}/{time_slice}/{ms_since_start}ms - {message}")
}

/// Default sink used by the binary: writes every line straight to stdout,
/// unconditionally. `-v`/`-q` only ever touch `tracing`'s diagnostic
/// filter, never this.
pub struct StdoutSink;

impl StdoutSink {
    pub fn new() -> Self {
        StdoutSink
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        StdoutSink::new()
    }
}

impl TraceSink for StdoutSink {
    fn line(&mut self, level: Level, text: &str) {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        let _ = writeln!(handle, "{}{}", level.indent(), text);
    }
}

/// In-memory sink for tests: captures every line so assertions can
/// inspect them after the fact.
#[derive(Debug, Default)]
pub struct VecSink {
    pub lines: Vec<(Level, String)>,
}

impl VecSink {
    pub fn new() -> Self {
        VecSink { lines: Vec::new() }
    }

    pub fn text_lines(&self) -> Vec<&str> {
        self.lines.iter().map(|(_, t)| t.as_str()).collect()
    }
}

impl TraceSink for VecSink {
    fn line(&mut self, level: Level, text: &str) {
        self.lines.push((level, text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_sink_captures_everything() {
        let mut sink = VecSink::new();
        sink.line(Level::Three, "deep detail");
        sink.banner("headline");
        assert_eq!(sink.lines.len(), 2);
        assert_eq!(sink.lines[1].1, "###-headline-###");
    }

    #[test]
    fn event_line_matches_the_required_shape() {
        let line = event_line("(child:3)", 7, 120, "Going to Sleep");
        assert_eq!(line, "(child:3)/7/120ms - Going to Sleep");
    }
}
