use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::CaptureConfig;
use crate::input::{ClipboardPort, EditChord, KeyInjectorPort};

/// Extracts the focused application's text by simulating select-all + copy and
/// watching the clipboard. Simulated keystrokes race the target application's
/// event loop, so each attempt waits a settle delay that grows linearly, and
/// the whole operation is bounded by the configured attempt count.
pub struct SelectionCapturer {
    attempts: u32,
    settle: Duration,
}

impl SelectionCapturer {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            attempts: config.attempts.max(1),
            settle: Duration::from_millis(config.settle_ms),
        }
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle
    }

    /// Returns the captured text, or `None` when every attempt saw an empty
    /// or all-whitespace clipboard. On `None` the clipboard has been restored
    /// to its pre-capture content. Clipboard or injection failures count as
    /// failed attempts; they never abort the loop.
    pub async fn capture<C, K>(&self, clipboard: &mut C, injector: &mut K) -> Option<String>
    where
        C: ClipboardPort,
        K: KeyInjectorPort,
    {
        let snapshot = match clipboard.read() {
            Ok(content) => content,
            Err(err) => {
                warn!("Could not snapshot clipboard before capture: {err:#}");
                String::new()
            }
        };

        // Clear so a stale clipboard is never mistaken for a fresh copy.
        if let Err(err) = clipboard.write("") {
            warn!("Could not clear clipboard before capture: {err:#}");
        }

        for attempt in 1..=self.attempts {
            match self.try_capture(clipboard, injector, attempt).await {
                Ok(Some(text)) => {
                    debug!(attempt, chars = text.chars().count(), "Selection captured");
                    return Some(text);
                }
                Ok(None) => {
                    debug!(attempt, "No text on clipboard yet");
                }
                Err(err) => {
                    warn!(attempt, "Capture attempt failed: {err:#}");
                }
            }
        }

        info!("No selection found after {} attempt(s)", self.attempts);
        if let Err(err) = clipboard.write(&snapshot) {
            warn!("Could not restore clipboard after failed capture: {err:#}");
        }
        None
    }

    async fn try_capture<C, K>(
        &self,
        clipboard: &mut C,
        injector: &mut K,
        attempt: u32,
    ) -> anyhow::Result<Option<String>>
    where
        C: ClipboardPort,
        K: KeyInjectorPort,
    {
        let settle = self.settle * attempt;

        injector.send_chord(EditChord::SelectAll)?;
        tokio::time::sleep(settle).await;

        injector.send_chord(EditChord::Copy)?;
        tokio::time::sleep(settle).await;

        let text = clipboard.read()?;
        if text.trim().is_empty() {
            Ok(None)
        } else {
            Ok(Some(text))
        }
    }
}
