pub mod clipboard;
pub mod injector;
pub mod shortcuts;

pub use clipboard::{ClipboardPort, SystemClipboard};
pub use injector::{EditChord, EnigoInjector, KeyInjectorPort};
pub use shortcuts::{parse_chord, ChordTracker, GlobalShortcuts, HotkeyEvent};
