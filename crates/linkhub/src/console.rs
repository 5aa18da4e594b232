// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Line-oriented console driving one [`Session`].

use std::str::FromStr;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast;

use crate::credential::coordinator::StartOutcome;
use crate::credential::{LinkEvent, LinkageSubject};
use crate::error::ErrorCode;
use crate::session::Session;
use crate::window::ManualOpener;

pub const HELP: &str = "\
commands:
  select <provider>  choose Notion, Airtable or HubSpot
  user <id>          set the user id
  org <id>           set the organization id
  connect            start the authorization handshake
  done               report the consent window closed
  refresh            refresh the access token
  load               load records
  clear              clear the loaded records
  logout             drop the linkage
  status             show the connection status
  providers          list available providers
  help               show this help
  quit               exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Select(String),
    User(String),
    Org(String),
    Connect,
    Done,
    Refresh,
    Load,
    Clear,
    Logout,
    Status,
    Providers,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let arg = |name: &str| {
            if rest.is_empty() {
                Err(format!("usage: {word} <{name}>"))
            } else {
                Ok(rest.to_owned())
            }
        };

        match word.to_lowercase().as_str() {
            "select" => arg("provider").map(Self::Select),
            "user" => arg("id").map(Self::User),
            "org" => arg("id").map(Self::Org),
            "connect" => Ok(Self::Connect),
            "done" | "close" => Ok(Self::Done),
            "refresh" => Ok(Self::Refresh),
            "load" => Ok(Self::Load),
            "clear" => Ok(Self::Clear),
            "logout" => Ok(Self::Logout),
            "status" => Ok(Self::Status),
            "providers" => Ok(Self::Providers),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(format!("unknown command: {other} (try `help`)")),
        }
    }
}

/// What the console should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue(String),
    Quit,
}

pub struct Console {
    session: Session,
    subject: LinkageSubject,
    manual: Option<Arc<ManualOpener>>,
}

impl Console {
    /// `manual` is the opener the session was built with when windows are
    /// closed by hand; `done` reports to it.
    pub fn new(session: Session, subject: LinkageSubject, manual: Option<Arc<ManualOpener>>) -> Self {
        Self { session, subject, manual }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn subject(&self) -> &LinkageSubject {
        &self.subject
    }

    pub async fn execute(&mut self, command: Command) -> Flow {
        let text = match command {
            Command::Select(name) => match self.session.select(&name, self.subject.clone()) {
                Ok(provider) => {
                    self.discard_window();
                    format!("selected {provider}")
                }
                Err(e) => format!("error: {e}"),
            },
            Command::User(id) => {
                self.subject.user_id = id;
                self.session.set_subject(self.subject.clone());
                self.discard_window();
                format!("user set to {}", self.subject.user_id)
            }
            Command::Org(id) => {
                self.subject.org_id = id;
                self.session.set_subject(self.subject.clone());
                self.discard_window();
                format!("org set to {}", self.subject.org_id)
            }
            Command::Connect => match self.session.connect().await {
                Ok(StartOutcome::Started) => self.started_message(),
                Ok(StartOutcome::Ignored(state)) => format!("already {state}"),
                Ok(StartOutcome::Cancelled) => "connection cancelled".to_owned(),
                Err(e) => format!("error: {e}"),
            },
            Command::Done => match &self.manual {
                Some(opener) if self.session.coordinator().pending_provider().is_none() => {
                    opener.discard();
                    "no authorization window is open".to_owned()
                }
                Some(opener) if opener.close() => "window closed, retrieving credentials".to_owned(),
                Some(_) => "no authorization window is open".to_owned(),
                None => "the browser window closes itself; nothing to do".to_owned(),
            },
            Command::Refresh => match self.session.refresh().await {
                Ok(_) => "access token refreshed".to_owned(),
                Err(e) => format!("error: {e}"),
            },
            Command::Load => match self.session.load().await {
                Ok(page) if page.is_empty() => "There is no data".to_owned(),
                Ok(page) => page.render(),
                Err(e) => format!("error: {e}"),
            },
            Command::Clear => {
                self.session.clear_records();
                "records cleared".to_owned()
            }
            Command::Logout => {
                self.session.logout();
                self.discard_window();
                "logged out".to_owned()
            }
            Command::Status => self.status_line(),
            Command::Providers => self
                .session
                .registry()
                .providers()
                .iter()
                .map(|p| p.display_name())
                .collect::<Vec<_>>()
                .join("\n"),
            Command::Help => HELP.to_owned(),
            Command::Quit => return Flow::Quit,
        };
        Flow::Continue(text)
    }

    /// Forget a manual window whose attempt was cancelled.
    fn discard_window(&self) {
        if let Some(opener) = &self.manual {
            opener.discard();
        }
    }

    fn started_message(&self) -> String {
        match self.manual.as_ref().and_then(|m| m.pending_url()) {
            Some(url) => format!("open this URL to authorize, then type `done`:\n{url}"),
            None => "authorization window opened".to_owned(),
        }
    }

    fn status_line(&self) -> String {
        let provider = self
            .session
            .selected()
            .map_or_else(|| "none".to_owned(), |p| p.display_name().to_owned());
        format!(
            "provider: {provider}\nuser: {}\norg: {}\nstatus: {}",
            self.subject.user_id,
            self.subject.org_id,
            self.session.status()
        )
    }

    /// Read commands from `input` until `quit` or end of input, reporting
    /// handshake outcomes as they arrive.
    pub async fn run<R, W>(&mut self, input: R, mut output: W) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        let mut events = self.session.subscribe();

        write_line(&mut output, "linkhub: type `help` for commands").await?;
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    if line.trim().is_empty() {
                        continue;
                    }
                    let text = match line.parse::<Command>() {
                        Ok(command) => match self.execute(command).await {
                            Flow::Continue(text) => text,
                            Flow::Quit => break,
                        },
                        Err(usage) => usage,
                    };
                    write_line(&mut output, &text).await?;
                }
                event = events.recv() => match event {
                    Ok(event) => {
                        if let Some(text) = describe(&event) {
                            write_line(&mut output, &text).await?;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::debug!(skipped = n, "console lagged behind link events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
        Ok(())
    }
}

/// Console text for outcomes that arrive after their command returned.
fn describe(event: &LinkEvent) -> Option<String> {
    match event {
        LinkEvent::Established { linkage } => Some(format!("{} connected", linkage.provider)),
        LinkEvent::Failed { code, error, .. } if code == ErrorCode::CredentialExchange.as_str() => {
            Some(format!("error: {error}"))
        }
        _ => None,
    }
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> anyhow::Result<()> {
    output.write_all(text.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}

#[cfg(test)]
#[path = "console_tests.rs"]
mod tests;
