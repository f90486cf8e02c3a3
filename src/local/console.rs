use colored::Colorize;
use std::io::{self, Write};

use crate::error::SinkError;
use crate::processing::messages::StimulusState;
use crate::sinks::{quantize, StimulusSink};

/// Terminal stand-in for the rivalry display.
///
/// Draws one bar per side, red for left and blue for right, and only redraws
/// when either side moves to a different step.
pub struct ConsoleSink<W: Write> {
    out: W,
    n_steps: usize,
    width: usize,
    steps: Option<(usize, usize)>,
}

impl ConsoleSink<io::Stdout> {
    pub fn stdout(n_steps: usize) -> Self {
        Self::new(io::stdout(), n_steps)
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W, n_steps: usize) -> Self {
        Self {
            out,
            n_steps: n_steps.max(1),
            width: 40,
            steps: None,
        }
    }

    fn bar(&self, step: usize) -> String {
        // To ensure |repeat| stays within the line
        let len = (step + 1) * self.width / self.n_steps;
        "|".repeat(len.min(self.width))
    }
}

impl<W: Write> StimulusSink for ConsoleSink<W> {
    fn present(&mut self, state: &StimulusState) -> Result<(), SinkError> {
        let steps = (
            quantize(state.left(), self.n_steps),
            quantize(state.right(), self.n_steps),
        );
        if self.steps == Some(steps) {
            return Ok(());
        }
        self.steps = Some(steps);

        let beat = if state.synchronous == 1.0 {
            "systole".red()
        } else {
            "       ".white()
        };
        writeln!(
            self.out,
            "{:>9.3}s {} {:<width$} {:<width$}",
            state.timestamp,
            beat,
            self.bar(steps.0).red(),
            self.bar(steps.1).blue(),
            width = self.width
        )?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.out.flush()?;
        Ok(())
    }
}
