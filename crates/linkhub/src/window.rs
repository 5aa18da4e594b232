// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Consent windows.
//!
//! The consent page runs out of process and sends nothing back, so the only
//! completion signal is the window going away. [`AuthWindow::is_closed`] is
//! what the coordinator polls.

use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// A window (or anything standing in for one) showing a consent page.
pub trait AuthWindow: Send + Sync {
    fn is_closed(&self) -> bool;
}

/// Opens consent windows. Must not block on the user.
pub trait WindowOpener: Send + Sync {
    fn open(&self, url: &str, title: &str) -> anyhow::Result<Box<dyn AuthWindow>>;
}

/// Launches a browser through a shell command template.
///
/// `{url}` in the template is replaced by the shell-quoted consent URL; the
/// URL is also exported as `LINKHUB_AUTH_URL`. The window counts as closed
/// once the launched process exits, so the command should block for as long
/// as the browser window is open (e.g. `firefox --new-instance {url}`).
pub struct CommandOpener {
    template: String,
}

impl CommandOpener {
    pub fn new(template: impl Into<String>) -> Self {
        Self { template: template.into() }
    }

    pub fn render(&self, url: &str) -> String {
        let quoted = shell_quote(url);
        if self.template.contains("{url}") {
            self.template.replace("{url}", &quoted)
        } else {
            format!("{} {quoted}", self.template)
        }
    }
}

impl WindowOpener for CommandOpener {
    fn open(&self, url: &str, title: &str) -> anyhow::Result<Box<dyn AuthWindow>> {
        let command = self.render(url);
        let child = Command::new("sh")
            .args(["-c", &command])
            .env("LINKHUB_AUTH_URL", url)
            .env("LINKHUB_WINDOW_TITLE", title)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()?;
        tracing::debug!(pid = child.id(), %title, "launched consent window");
        Ok(Box::new(ProcessWindow { child: Mutex::new(child) }))
    }
}

struct ProcessWindow {
    child: Mutex<Child>,
}

impl AuthWindow for ProcessWindow {
    fn is_closed(&self) -> bool {
        match self.child.lock().try_wait() {
            Ok(Some(_)) => true,
            Ok(None) => false,
            Err(e) => {
                tracing::debug!(err = %e, "lost track of consent window process");
                true
            }
        }
    }
}

impl Drop for ProcessWindow {
    fn drop(&mut self) {
        let child = self.child.get_mut();
        if let Ok(Some(_)) = child.try_wait() {
            return;
        }
        tracing::debug!(pid = child.id(), "stopping consent window process");
        if let Err(e) = child.kill() {
            tracing::debug!(err = %e, "failed to stop consent window process");
        }
        let _ = child.wait();
    }
}

/// A window the user opens themselves and reports closed via [`ManualOpener::close`].
#[derive(Default)]
pub struct ManualOpener {
    current: Mutex<Option<ManualWindow>>,
}

#[derive(Clone)]
struct ManualWindow {
    url: String,
    closed: Arc<AtomicBool>,
}

impl ManualOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// URL of the window still awaiting `close()`.
    pub fn pending_url(&self) -> Option<String> {
        self.current.lock().as_ref().map(|w| w.url.clone())
    }

    /// Mark the open window closed. Returns `false` if none was open.
    pub fn close(&self) -> bool {
        match self.current.lock().take() {
            Some(window) => {
                window.closed.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Drop the open window without reporting it closed.
    pub fn discard(&self) {
        if self.current.lock().take().is_some() {
            tracing::debug!("discarded manual consent window");
        }
    }
}

impl WindowOpener for ManualOpener {
    fn open(&self, url: &str, title: &str) -> anyhow::Result<Box<dyn AuthWindow>> {
        let window = ManualWindow { url: url.to_owned(), closed: Arc::new(AtomicBool::new(false)) };
        // A newer window supersedes one that was never reported closed.
        if let Some(previous) = self.current.lock().replace(window.clone()) {
            previous.closed.store(true, Ordering::SeqCst);
        }
        tracing::info!(%title, %url, "open this URL to authorize");
        Ok(Box::new(window))
    }
}

impl AuthWindow for ManualWindow {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Single-quote `s` for `sh`.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(test)]
#[path = "window_tests.rs"]
mod tests;
