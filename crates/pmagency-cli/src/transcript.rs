//! Terminal rendering of agency events.
//!
//! Messages are printed in the chat-transcript format:
//!
//! ```text
//! 👤 User 🗣️ @TechnicalProjectManager
//! What's overdue?
//!
//! 🤖 TechnicalProjectManager 🗣️ @NotionProjectAgent
//! List the overdue tasks.
//!
//! 🤖 NotionProjectAgent 🛠️ Executing Function
//! notion_get_tasks {}
//!
//! notion_get_tasks ⚙️ Function Output
//! [...]
//! ```
//!
//! Streamed answers print under a header naming who the agent is answering.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use pmagency_agent::{AgencyEvent, AgencyEventCallback};
use pmagency_agent::agency::USER;

/// Tool output longer than this is cut in the transcript.
const MAX_OUTPUT_CHARS: usize = 1500;

/// Stateful transcript writer.
pub struct Transcript<W: Write> {
    out: W,
    /// `(agent, answering)` for every delivered message still awaiting a reply.
    open: Vec<(String, String)>,
    /// Agent whose answer is currently streaming.
    streaming: Option<String>,
}

impl<W: Write> Transcript<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            open: Vec::new(),
            streaming: None,
        }
    }

    pub fn render(&mut self, event: &AgencyEvent) -> io::Result<()> {
        match event {
            AgencyEvent::MessageCreated { from, to, content } => {
                let is_reply = self
                    .open
                    .last()
                    .is_some_and(|(agent, answering)| agent == from && answering == to);
                if is_reply {
                    self.open.pop();
                    if self.streaming.take().as_deref() == Some(from.as_str()) {
                        writeln!(self.out)?;
                    } else {
                        self.end_stream()?;
                        writeln!(self.out, "\n{}\n{content}", header(from, to))?;
                    }
                } else {
                    self.end_stream()?;
                    self.open.push((to.clone(), from.clone()));
                    writeln!(self.out, "\n{}\n{content}", header(from, to))?;
                }
            }
            AgencyEvent::TextDelta { agent, delta } => {
                if self.streaming.as_deref() != Some(agent.as_str()) {
                    self.end_stream()?;
                    let answering = self
                        .open
                        .iter()
                        .rev()
                        .find(|(a, _)| a == agent)
                        .map_or(USER, |(_, answering)| answering.as_str());
                    writeln!(self.out, "\n{}", header(agent, answering))?;
                    self.streaming = Some(agent.clone());
                }
                write!(self.out, "{delta}")?;
            }
            AgencyEvent::ToolCall {
                agent,
                tool,
                arguments,
            } => {
                self.end_stream()?;
                writeln!(self.out, "\n🤖 {agent} 🛠️ Executing Function\n{tool} {arguments}")?;
            }
            AgencyEvent::ToolOutput { tool, output, .. } => {
                self.end_stream()?;
                writeln!(
                    self.out,
                    "\n{tool} ⚙️ Function Output\n{}",
                    truncate(output, MAX_OUTPUT_CHARS)
                )?;
            }
        }
        self.out.flush()
    }

    fn end_stream(&mut self) -> io::Result<()> {
        if self.streaming.take().is_some() {
            writeln!(self.out)?;
        }
        Ok(())
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send + 'static> Transcript<W> {
    /// Wrap the transcript in an agency event callback.
    pub fn into_callback(self) -> AgencyEventCallback {
        let shared = Arc::new(Mutex::new(self));
        Arc::new(move |event| {
            if let Ok(mut transcript) = shared.lock()
                && let Err(e) = transcript.render(&event)
            {
                tracing::debug!(error = %e, "failed to write transcript");
            }
        })
    }
}

fn header(from: &str, to: &str) -> String {
    if from == USER {
        format!("👤 User 🗣️ @{to}")
    } else {
        format!("🤖 {from} 🗣️ @{to}")
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}… ({} more chars)", &text[..cut], text[cut..].chars().count()),
        None => text.to_owned(),
    }
}
