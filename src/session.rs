//! Line-oriented script transport: one command per input line, one framed
//! response per command on the output.

use std::io::{BufRead, Write};

use crate::error::AppError;
use crate::output::{Completion, OutputSink, SharedWriter, StreamSink, WireFormat};
use crate::registry::CommandBuilder;
use crate::state::AppState;

/// Counts for one finished session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub commands: usize,
    pub failed: usize,
}

/// Runs script commands serially against the app's commands and projects.
pub struct ScriptSession<'a> {
    app: &'a AppState,
    format: WireFormat,
    quiet: bool,
    strict: bool,
    index: usize,
}

impl<'a> ScriptSession<'a> {
    /// A session using the app's saved script settings.
    pub fn new(app: &'a AppState) -> Self {
        let script = app.with_settings(|s| s.script);
        Self {
            app,
            format: script.wire_format,
            quiet: script.quiet_progress,
            strict: script.strict(),
            index: 0,
        }
    }

    pub fn format(mut self, format: WireFormat) -> Self {
        self.format = format;
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Read lines until EOF, answering each command on `writer`. Blank lines
    /// and `#` comments get no response.
    pub fn run<R, W>(&mut self, reader: R, writer: W) -> Result<SessionSummary, AppError>
    where
        R: BufRead,
        W: Write + Send + 'static,
    {
        let writer = SharedWriter::new(writer);
        let mut summary = SessionSummary::default();
        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            summary.commands += 1;
            if !self.execute(trimmed, writer.clone()) {
                summary.failed += 1;
            }
        }
        tracing::info!(
            commands = summary.commands,
            failed = summary.failed,
            "script session ended"
        );
        Ok(summary)
    }

    /// Run one line with its own sink. Returns whether it succeeded.
    pub fn execute<W: Write + Send + 'static>(&mut self, line: &str, writer: W) -> bool {
        let index = self.index;
        self.index += 1;
        let sink = OutputSink::stream(StreamSink::new(writer, self.format).quiet(self.quiet))
            .strict(self.strict);

        match CommandBuilder::new(&self.app.commands).build_line(line) {
            Ok(invocation) => invocation
                .with_index(index)
                .run(self.app, Some(sink))
                .is_ok(),
            Err(e) => {
                tracing::warn!(index, line, error = %e, "rejected script line");
                let mut sink = sink;
                let message = e.to_string();
                sink.error(&message);
                sink.finish(&Completion::Failure(message));
                false
            }
        }
    }

    /// Invocations started so far, including rejected lines.
    pub fn index(&self) -> usize {
        self.index
    }
}
