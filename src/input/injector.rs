use anyhow::{Context, Result};
use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use tracing::debug;

/// The editing chords the pipeline issues against the focused application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditChord {
    SelectAll,
    Copy,
    Paste,
}

impl EditChord {
    fn letter(self) -> char {
        match self {
            EditChord::SelectAll => 'a',
            EditChord::Copy => 'c',
            EditChord::Paste => 'v',
        }
    }
}

/// Fire-and-forget simulation of a modifier+key chord on the focused
/// application. The pipeline never branches on platform above this port.
pub trait KeyInjectorPort {
    fn send_chord(&mut self, chord: EditChord) -> Result<()>;
}

#[derive(Default)]
pub struct EnigoInjector;

impl EnigoInjector {
    pub fn new() -> Self {
        Self
    }
}

impl KeyInjectorPort for EnigoInjector {
    fn send_chord(&mut self, chord: EditChord) -> Result<()> {
        debug!(?chord, "Sending edit chord");

        // Initialize the virtual keyboard per chord to avoid keeping a
        // persistent virtual device active for the entire app lifetime.
        let mut enigo = Enigo::new(&Settings::default())
            .context("Failed to initialize Enigo for key injection")?;

        enigo
            .key(Key::Control, Direction::Press)
            .context("Failed to press Ctrl")?;
        let result = enigo
            .key(Key::Unicode(chord.letter()), Direction::Click)
            .with_context(|| format!("Failed to click {:?} key", chord));
        enigo
            .key(Key::Control, Direction::Release)
            .context("Failed to release Ctrl")?;

        result?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chords_map_to_standard_edit_keys() {
        assert_eq!(EditChord::SelectAll.letter(), 'a');
        assert_eq!(EditChord::Copy.letter(), 'c');
        assert_eq!(EditChord::Paste.letter(), 'v');
    }
}
