use anyhow::{Context, Result};
use arboard::Clipboard;
use tracing::debug;

/// Read/write access to the system clipboard. Must round-trip arbitrary UTF-8
/// including the empty string; an empty or non-text clipboard reads as `""`.
pub trait ClipboardPort {
    fn read(&mut self) -> Result<String>;
    fn write(&mut self, text: &str) -> Result<()>;
}

pub struct SystemClipboard {
    clipboard: Clipboard,
}

impl SystemClipboard {
    pub fn new() -> Result<Self> {
        let clipboard = Clipboard::new().context("Failed to initialize clipboard")?;
        Ok(Self { clipboard })
    }
}

impl ClipboardPort for SystemClipboard {
    fn read(&mut self) -> Result<String> {
        match self.clipboard.get_text() {
            Ok(text) => Ok(text),
            // No text on the clipboard is a normal state, not a failure.
            Err(arboard::Error::ContentNotAvailable) => Ok(String::new()),
            Err(err) => Err(err).context("Failed to read clipboard"),
        }
    }

    fn write(&mut self, text: &str) -> Result<()> {
        self.clipboard
            .set_text(text)
            .context("Failed to write clipboard")?;
        debug!(chars = text.chars().count(), "Clipboard updated");
        Ok(())
    }
}
