//! One-shot mode: bootstrap, send a single prompt, print each stage as it lands.

use crate::app::AppState;
use crate::client::{ClientConfig, ClientSession};
use crate::render;
use crate::stream::StreamError;
use crate::transcript::Entry;
use std::error::Error;
use std::io::Write;
use std::path::Path;

type AskResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

pub async fn run(config: &ClientConfig, prompt: &str, html: Option<&Path>) -> AskResult<()> {
    let mut state = AppState::new();

    let session = match ClientSession::connect(config).await {
        Ok(session) => session,
        Err(err) => {
            state.session_failed();
            tracing::warn!(%err, "session bootstrap failed");
            return Err(format!("{}: {}", state.status().text(), err).into());
        }
    };
    state.session_ready(session.session_id().to_string(), session.engine().map(String::from));

    if let Some(prompt_buffer) = state.form_mut().prompt_mut() {
        prompt_buffer.set_text(prompt);
    }
    let Some(submission) = state.submit() else {
        return Err("prompt is empty".into());
    };
    snapshot(&state, html);
    tracing::debug!(session_id = %submission.session_id, "prompt submitted");

    let outcome = match session.open_stream(&submission.message) {
        Ok(subscription) => {
            let mut stdout = std::io::stdout();
            subscription
                .run(|entry| {
                    emit(&mut stdout, &entry);
                    state.apply(entry);
                    snapshot(&state, html);
                    async {}
                })
                .await
        }
        Err(err) => {
            tracing::warn!(%err, "could not open agent stream");
            Err(StreamError::Interrupted)
        }
    };

    finish(&mut state, outcome, html)
}

/// Settles the submission and reports a failure on stderr.
fn finish(
    state: &mut AppState,
    outcome: Result<(), StreamError>,
    html: Option<&Path>,
) -> AskResult<()> {
    state.settle(&outcome);
    snapshot(state, html);

    match outcome {
        Ok(()) => Ok(()),
        Err(err) => {
            if let Some(failure) = state.transcript().last() {
                emit(&mut std::io::stderr(), failure);
            }
            Err(err.into())
        }
    }
}

fn emit(out: &mut impl Write, entry: &Entry) {
    if let Err(err) = print_entry(out, entry) {
        tracing::debug!(%err, "could not print transcript entry");
    }
}

fn print_entry(out: &mut impl Write, entry: &Entry) -> std::io::Result<()> {
    writeln!(out, "── {} ──", entry.label())?;
    writeln!(out, "{}", entry.content.trim_end())?;
    writeln!(out)?;
    out.flush()
}

fn snapshot(state: &AppState, html: Option<&Path>) {
    if let Some(path) = html {
        if let Err(err) = render::write_snapshot(path, &state.render_html()) {
            tracing::warn!(%err, path = %path.display(), "failed to write transcript html");
        }
    }
}
