//! Live status board for CI runs.

use crossterm::cursor::MoveUp;
use crossterm::queue;
use crossterm::terminal::{Clear, ClearType};
use stagerun::ci::{CiStep, CiSummary};
use stagerun::core::StepStatus;
use stagerun::report::Tone;
use std::io::{self, Write};

const RULE_WIDTH: usize = 60;
const NAME_WIDTH: usize = 25;

fn status_tone(status: StepStatus) -> Tone {
    match status {
        StepStatus::Pending => Tone::Dim,
        StepStatus::Running => Tone::Warning,
        StepStatus::Pass => Tone::Success,
        StepStatus::Fail => Tone::Error,
    }
}

/// Renders CI steps, redrawing them in place on a terminal.
pub struct Dashboard<W: Write> {
    out: W,
    interactive: bool,
    drawn: usize,
}

impl<W: Write> Dashboard<W> {
    /// Creates a board; `interactive` enables colors and in-place redraws.
    pub fn new(out: W, interactive: bool) -> Self {
        Self {
            out,
            interactive,
            drawn: 0,
        }
    }

    /// Consumes the board, returning the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn paint(&self, text: &str, tone: Tone, bold: bool) -> String {
        if self.interactive {
            tone.style(bold).apply(text).to_string()
        } else {
            text.to_string()
        }
    }

    /// Formats one board line.
    pub fn line(&self, step: &CiStep) -> String {
        let status = self.paint(step.status.label(), status_tone(step.status), false);
        let log = step
            .log_path
            .as_deref()
            .map(|path| self.paint(&format!(" → {path}"), Tone::Dim, false))
            .unwrap_or_default();
        format!("{status}  {:<NAME_WIDTH$}{log}", step.name)
    }

    /// Writes the title and rule.
    pub fn header(&mut self) -> io::Result<()> {
        let title = self.paint("Running CI Pipeline", Tone::Plain, true);
        writeln!(self.out, "\n{title}\n")?;
        writeln!(self.out, "{}\n", "─".repeat(RULE_WIDTH))?;
        self.out.flush()
    }

    /// Draws every step, replacing the previous drawing when interactive.
    pub fn draw(&mut self, steps: &[CiStep]) -> io::Result<()> {
        if self.interactive && self.drawn > 0 {
            let rows = u16::try_from(self.drawn).unwrap_or(u16::MAX);
            queue!(self.out, MoveUp(rows))?;
        }
        for step in steps {
            if self.interactive {
                queue!(self.out, Clear(ClearType::CurrentLine))?;
            }
            let line = self.line(step);
            writeln!(self.out, "{line}")?;
        }
        self.drawn = steps.len();
        self.out.flush()
    }

    /// Writes the closing rule and pass/fail line.
    pub fn summary(&mut self, summary: &CiSummary) -> io::Result<()> {
        let tone = if summary.all_passed() {
            Tone::Success
        } else {
            Tone::Error
        };
        let message = self.paint(&summary.message(), tone, true);
        writeln!(self.out, "\n{}", "─".repeat(RULE_WIDTH))?;
        writeln!(self.out, "\n{message}\n")?;
        self.out.flush()
    }
}
