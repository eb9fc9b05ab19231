use std::io::{self, Write};

use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;

use crate::progress::{ProgressEvent, ProgressHandler, ProgressState};

/// Messages containing this marker are solver chatter, not user-facing progress.
const SOLVER_INFO_MARKER: &str = "SOLVERINFO";
const LAYER_CONTEXT: &str = "Solving Layer";
const INITIAL_CONTEXT: &str = "Initializing";
const BAR_TEMPLATE: &str = "{msg} {wide_bar:.green} {pos:>3}/{len}%";

/// Renders the progress of a single simulation as a console progress bar.
///
/// Error messages are written verbatim to the output stream, above the bar.
pub struct ConsoleProgressHandler<W: Write + Send = io::Stderr> {
    state: Mutex<ConsoleState<W>>,
}

struct ConsoleState<W> {
    bar: ProgressBar,
    out: W,
    last_percent_complete: u32,
    last_context: String,
}

impl ConsoleProgressHandler {
    /// Creates a handler drawing to stderr.
    #[inline]
    pub fn new() -> Self {
        Self::with_output(ProgressBar::new(100), io::stderr())
    }
}

impl Default for ConsoleProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> ConsoleProgressHandler<W> {
    /// Creates a handler driving `bar` and writing error messages to `out`.
    pub fn with_output(bar: ProgressBar, out: W) -> Self {
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar.set_length(100);
        bar.set_message(INITIAL_CONTEXT);

        Self {
            state: Mutex::new(ConsoleState {
                bar,
                out,
                last_percent_complete: 0,
                last_context: INITIAL_CONTEXT.to_string(),
            }),
        }
    }

    /// A handle to the underlying progress bar.
    pub fn bar(&self) -> ProgressBar {
        self.state.lock().bar.clone()
    }

    pub fn last_context(&self) -> String {
        self.state.lock().last_context.clone()
    }

    pub fn last_percent_complete(&self) -> u32 {
        self.state.lock().last_percent_complete
    }

    /// Leaves the bar in its final state and returns the output stream.
    pub fn into_output(self) -> W {
        let state = self.state.into_inner();
        state.bar.abandon();
        state.out
    }
}

impl<W: Write + Send> ProgressHandler for ConsoleProgressHandler<W> {
    fn update(&self, event: &ProgressEvent) {
        if event.message.contains(SOLVER_INFO_MARKER) {
            return;
        }

        let mut state = self.state.lock();
        let ConsoleState {
            bar,
            out,
            last_percent_complete,
            last_context,
        } = &mut *state;

        if event.state == ProgressState::Error {
            if let Err(e) = bar.suspend(|| writeln!(out, "{}", event.message)) {
                tracing::warn!(error = %e, "failed to write simulation error message");
            }
            return;
        }

        if !event.context.is_empty() && event.context != *last_context {
            if continues_layer(last_context, &event.context) {
                bar.set_message(event.context.clone());
            } else {
                bar.reset();
                bar.set_length(100);
                bar.set_message(event.context.clone());
                *last_percent_complete = 0;
            }
            *last_context = event.context.clone();
        }

        if event.percent_complete > *last_percent_complete {
            bar.inc(u64::from(event.percent_complete - *last_percent_complete));
        }
        *last_percent_complete = event.percent_complete;
    }
}

/// The layer number of a "Solving Layer N" context.
fn solving_layer(context: &str) -> Option<u32> {
    let (_, rest) = context.split_once(LAYER_CONTEXT)?;
    let digits: String = rest
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Whether moving from `old` to `new` only advances to a later layer of the same phase.
/// Layer 1 always starts a new phase.
fn continues_layer(old: &str, new: &str) -> bool {
    match (solving_layer(old), solving_layer(new)) {
        (Some(old), Some(new)) => new != 1 && new > old,
        _ => false,
    }
}
