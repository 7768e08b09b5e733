use anyhow::{Context, Result};
use std::io::Write;
use std::str::FromStr;
use strum::{EnumString, IntoStaticStr};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info};

use crate::conversation::{Conversation, Turn};
use crate::recommendation::{self, Recommender};

pub const TITLE: &str = "🎬 Movie Recommendation Chatbot";
pub const INTRO: &str = "Tell me about your favorite genres, actors, or movies you enjoyed, and I'll recommend something you'll like!";
const PLACEHOLDER: &str = "Describe your movie preferences here...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr)]
enum Command {
    #[strum(serialize = "/history")]
    History,
    #[strum(serialize = "/clear")]
    Clear,
    #[strum(to_string = "/quit", serialize = "/exit")]
    Quit,
}

/// State of one chat session: its conversation and the backend replies come from.
pub struct Session<R> {
    recommender: R,
    prompt_template: String,
    conversation: Conversation,
}

impl<R: Recommender> Session<R> {
    pub fn new(recommender: R, prompt_template: impl Into<String>) -> Self {
        Self {
            recommender,
            prompt_template: prompt_template.into(),
            conversation: Conversation::new(),
        }
    }

    #[cfg(test)]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn clear(&mut self) {
        self.conversation.clear();
    }

    /// Records the user's text and the reply to it, returning the reply turn.
    pub async fn submit(&mut self, text: &str) -> Turn {
        self.conversation.append(Turn::user(text));

        let reply = recommendation::request(&self.recommender, &self.prompt_template, text).await;
        let turn = Turn::assistant(reply);
        self.conversation.append(turn.clone());

        debug!(turns = self.conversation.len(), "Turn completed");
        turn
    }

    /// Reads lines from `input` until EOF or `/quit`, writing the chat to `output`.
    pub async fn run<I, O>(&mut self, input: I, output: &mut O) -> Result<()>
    where
        I: AsyncBufRead + Unpin,
        O: Write,
    {
        write_banner(output)?;

        let mut lines = input.lines();
        loop {
            write!(output, "You: ")?;
            output.flush()?;

            let Some(line) = lines.next_line().await.context("Failed to read input")? else {
                writeln!(output)?;
                break;
            };
            let line = line.trim();

            if line.is_empty() {
                continue;
            }

            // Only exact command words are commands; anything else is chat text.
            if let Ok(command) = Command::from_str(line) {
                match command {
                    Command::Quit => break,
                    Command::History => self.redraw(output)?,
                    Command::Clear => {
                        self.clear();
                        info!("Conversation cleared");
                        self.redraw(output)?;
                    }
                }
                continue;
            }

            let reply = self.submit(line).await;
            writeln!(output, "{}: {}\n", reply.speaker(), reply.text())?;
        }

        info!(turns = self.conversation.len(), "Session ended");
        Ok(())
    }

    fn redraw<O: Write>(&self, output: &mut O) -> Result<()> {
        writeln!(output, "--- Conversation ---")?;
        if self.conversation.is_empty() {
            writeln!(output, "(no messages yet)")?;
        } else {
            writeln!(output, "{}", self.conversation.transcript())?;
        }
        writeln!(output, "--------------------")?;
        Ok(())
    }
}

fn write_banner<O: Write>(output: &mut O) -> Result<()> {
    writeln!(output, "{TITLE}\n{INTRO}")?;
    writeln!(
        output,
        "({PLACEHOLDER} Commands: {}, {}, {})\n",
        <&str>::from(Command::History),
        <&str>::from(Command::Clear),
        <&str>::from(Command::Quit),
    )?;
    Ok(())
}
