use anyhow::{Context, Result};
use evdev::{Device, InputEventKind, Key};
use std::collections::HashSet;
use std::io;
use std::os::fd::AsRawFd;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// One completed chord press. Carries the trigger time so downstream logging
/// can relate cycle latency back to the key press.
#[derive(Debug, Clone, Copy)]
pub struct HotkeyEvent {
    pub triggered_at: Instant,
}

/// Maps physical left/right modifier variants onto one logical key so either
/// physical key satisfies the chord.
pub fn canonical_key(key: Key) -> Key {
    match key {
        Key::KEY_RIGHTCTRL => Key::KEY_LEFTCTRL,
        Key::KEY_RIGHTSHIFT => Key::KEY_LEFTSHIFT,
        Key::KEY_RIGHTALT => Key::KEY_LEFTALT,
        Key::KEY_RIGHTMETA => Key::KEY_LEFTMETA,
        other => other,
    }
}

/// Parses a `+`-separated chord specification ("ctrl+f13") into the canonical
/// key set. Equality is set-based; the order keys are written (or pressed) in
/// never matters.
pub fn parse_chord(spec: &str) -> Result<HashSet<Key>> {
    let mut keys = HashSet::new();

    for part in spec.split('+') {
        let part = part.trim().to_uppercase();
        let key = parse_key(&part).with_context(|| format!("Failed to parse key: {part}"))?;
        keys.insert(canonical_key(key));
    }

    if keys.is_empty() {
        anyhow::bail!("Empty chord specification");
    }

    Ok(keys)
}

fn parse_key(key_str: &str) -> Result<Key> {
    match key_str {
        // Modifiers
        "SUPER" | "META" | "WIN" | "WINDOWS" => Ok(Key::KEY_LEFTMETA),
        "ALT" => Ok(Key::KEY_LEFTALT),
        "CTRL" | "CONTROL" => Ok(Key::KEY_LEFTCTRL),
        "SHIFT" => Ok(Key::KEY_LEFTSHIFT),

        // Function keys
        "F1" => Ok(Key::KEY_F1),
        "F2" => Ok(Key::KEY_F2),
        "F3" => Ok(Key::KEY_F3),
        "F4" => Ok(Key::KEY_F4),
        "F5" => Ok(Key::KEY_F5),
        "F6" => Ok(Key::KEY_F6),
        "F7" => Ok(Key::KEY_F7),
        "F8" => Ok(Key::KEY_F8),
        "F9" => Ok(Key::KEY_F9),
        "F10" => Ok(Key::KEY_F10),
        "F11" => Ok(Key::KEY_F11),
        "F12" => Ok(Key::KEY_F12),
        "F13" => Ok(Key::KEY_F13),
        "F14" => Ok(Key::KEY_F14),
        "F15" => Ok(Key::KEY_F15),
        "F16" => Ok(Key::KEY_F16),
        "F17" => Ok(Key::KEY_F17),
        "F18" => Ok(Key::KEY_F18),
        "F19" => Ok(Key::KEY_F19),
        "F20" => Ok(Key::KEY_F20),
        "F21" => Ok(Key::KEY_F21),
        "F22" => Ok(Key::KEY_F22),
        "F23" => Ok(Key::KEY_F23),
        "F24" => Ok(Key::KEY_F24),

        // Letter keys
        "A" => Ok(Key::KEY_A),
        "B" => Ok(Key::KEY_B),
        "C" => Ok(Key::KEY_C),
        "D" => Ok(Key::KEY_D),
        "E" => Ok(Key::KEY_E),
        "F" => Ok(Key::KEY_F),
        "G" => Ok(Key::KEY_G),
        "H" => Ok(Key::KEY_H),
        "I" => Ok(Key::KEY_I),
        "J" => Ok(Key::KEY_J),
        "K" => Ok(Key::KEY_K),
        "L" => Ok(Key::KEY_L),
        "M" => Ok(Key::KEY_M),
        "N" => Ok(Key::KEY_N),
        "O" => Ok(Key::KEY_O),
        "P" => Ok(Key::KEY_P),
        "Q" => Ok(Key::KEY_Q),
        "R" => Ok(Key::KEY_R),
        "S" => Ok(Key::KEY_S),
        "T" => Ok(Key::KEY_T),
        "U" => Ok(Key::KEY_U),
        "V" => Ok(Key::KEY_V),
        "W" => Ok(Key::KEY_W),
        "X" => Ok(Key::KEY_X),
        "Y" => Ok(Key::KEY_Y),
        "Z" => Ok(Key::KEY_Z),

        // Number keys
        "0" => Ok(Key::KEY_0),
        "1" => Ok(Key::KEY_1),
        "2" => Ok(Key::KEY_2),
        "3" => Ok(Key::KEY_3),
        "4" => Ok(Key::KEY_4),
        "5" => Ok(Key::KEY_5),
        "6" => Ok(Key::KEY_6),
        "7" => Ok(Key::KEY_7),
        "8" => Ok(Key::KEY_8),
        "9" => Ok(Key::KEY_9),

        // Special keys
        "SPACE" => Ok(Key::KEY_SPACE),
        "ENTER" | "RETURN" => Ok(Key::KEY_ENTER),
        "ESC" | "ESCAPE" => Ok(Key::KEY_ESC),
        "TAB" => Ok(Key::KEY_TAB),
        "BACKSPACE" => Ok(Key::KEY_BACKSPACE),
        "DELETE" | "DEL" => Ok(Key::KEY_DELETE),
        "INSERT" | "INS" => Ok(Key::KEY_INSERT),
        "HOME" => Ok(Key::KEY_HOME),
        "END" => Ok(Key::KEY_END),
        "PAGEUP" | "PGUP" => Ok(Key::KEY_PAGEUP),
        "PAGEDOWN" | "PGDOWN" => Ok(Key::KEY_PAGEDOWN),

        _ => Err(anyhow::anyhow!("Unknown key: {key_str}")),
    }
}

/// Press/release state machine over the held-key set. Completing the chord
/// fires exactly once; the chord must be broken by a release before it can
/// fire again, so key-repeat events never refire.
#[derive(Debug, Clone)]
pub struct ChordTracker {
    target: HashSet<Key>,
    pressed: HashSet<Key>,
    satisfied: bool,
}

impl ChordTracker {
    pub fn new(target: HashSet<Key>) -> Self {
        Self {
            target,
            pressed: HashSet::new(),
            satisfied: false,
        }
    }

    /// Records a key press; returns true when this press completes the chord.
    pub fn on_press(&mut self, key: Key) -> bool {
        self.pressed.insert(canonical_key(key));
        if !self.satisfied && self.target.is_subset(&self.pressed) {
            self.satisfied = true;
            return true;
        }
        false
    }

    /// Records a key release, re-arming the chord once it is broken.
    pub fn on_release(&mut self, key: Key) {
        self.pressed.remove(&canonical_key(key));
        if self.satisfied && !self.target.is_subset(&self.pressed) {
            self.satisfied = false;
        }
    }

    /// Drops all held-key state, e.g. after the device set changed under us.
    pub fn reset(&mut self) {
        self.pressed.clear();
        self.satisfied = false;
    }
}

/// Listens for the configured chord on every attached keyboard. Runs a
/// non-blocking poll loop on a dedicated thread and forwards completed
/// activations over the channel without ever blocking on the receiver.
pub struct GlobalShortcuts {
    devices: Vec<KeyboardDevice>,
    tracker: ChordTracker,
    chord_name: String,
}

struct KeyboardDevice {
    path: PathBuf,
    device: Device,
}

impl GlobalShortcuts {
    pub fn new(chord: &str) -> Result<Self> {
        let target_keys = parse_chord(chord)?;
        let devices = find_keyboard_devices()?;

        if devices.is_empty() {
            return Err(anyhow::anyhow!("No keyboard devices found"));
        }

        info!(
            "Global hotkey initialized - monitoring {} device(s) for chord: {}",
            devices.len(),
            chord
        );
        debug!("Target keys: {:?}", target_keys);

        Ok(Self {
            devices,
            tracker: ChordTracker::new(target_keys),
            chord_name: chord.to_string(),
        })
    }

    pub fn run(mut self, tx: mpsc::Sender<HotkeyEvent>, stop: Arc<AtomicBool>) -> Result<()> {
        info!("🎯 Listening for chord: {}", self.chord_name);

        'outer: loop {
            if stop.load(Ordering::Relaxed) {
                info!("Stopping hotkey listener: {}", self.chord_name);
                break;
            }

            let mut removed_devices = HashSet::new();

            for entry in &mut self.devices {
                match entry.device.fetch_events() {
                    Ok(events) => {
                        for event in events {
                            if stop.load(Ordering::Relaxed) {
                                break 'outer;
                            }
                            let InputEventKind::Key(key) = event.kind() else {
                                continue;
                            };
                            match event.value() {
                                // Key pressed
                                1 => {
                                    if self.tracker.on_press(key) {
                                        info!("✨ Chord triggered: {}", self.chord_name);
                                        // try_send keeps this thread from ever
                                        // blocking on a slow receiver.
                                        if let Err(e) = tx.try_send(HotkeyEvent {
                                            triggered_at: Instant::now(),
                                        }) {
                                            warn!("Failed to send hotkey event: {}", e);
                                        }
                                    }
                                }
                                // Key released
                                0 => self.tracker.on_release(key),
                                // Key repeat
                                _ => {}
                            }
                        }
                    }
                    Err(e) => {
                        if e.kind() != io::ErrorKind::WouldBlock {
                            error!("Error fetching events: {}", e);
                            if is_device_disconnect_error(&e) {
                                warn!("Input device went away; removing device");
                                removed_devices.insert(entry.path.clone());
                            }
                        }
                    }
                }
            }

            if !removed_devices.is_empty() {
                let before = self.devices.len();
                self.devices
                    .retain(|device| !removed_devices.contains(&device.path));
                let removed = before.saturating_sub(self.devices.len());
                if removed > 0 {
                    info!("Removed {} keyboard device(s)", removed);
                }
                self.tracker.reset();
                if self.devices.is_empty() {
                    warn!("No keyboard devices left to monitor");
                }
            }

            // Small sleep to prevent busy-waiting
            std::thread::sleep(Duration::from_millis(10));
        }

        Ok(())
    }
}

fn find_keyboard_devices() -> Result<Vec<KeyboardDevice>> {
    let mut keyboards = Vec::new();

    for (path, device) in evdev::enumerate() {
        if is_keyboard_device(&device) {
            if let Err(err) = set_device_nonblocking(&device) {
                warn!("Failed to set non-blocking mode for {:?}: {}", path, err);
            }
            let name = device.name().unwrap_or("Unknown");
            info!("Found keyboard device: {} at {:?}", name, path);
            keyboards.push(KeyboardDevice { path, device });
        }
    }

    if keyboards.is_empty() {
        warn!("No keyboard devices found!");
        warn!("Make sure you have read permissions for /dev/input/event*");
        warn!("You may need to add your user to the 'input' group");
    }

    Ok(keyboards)
}

fn is_keyboard_device(device: &Device) -> bool {
    device.supported_keys().is_some_and(|keys| {
        keys.contains(Key::KEY_A) && keys.contains(Key::KEY_S) && keys.contains(Key::KEY_D)
    })
}

fn is_device_disconnect_error(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(code) if code == libc::ENODEV || code == libc::EBADF || code == libc::ENXIO
    )
}

fn set_device_nonblocking(device: &Device) -> Result<()> {
    let fd = device.as_raw_fd();

    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(anyhow::anyhow!(
            "fcntl(F_GETFL) failed: {}",
            io::Error::last_os_error()
        ));
    }

    if (flags & libc::O_NONBLOCK) != 0 {
        return Ok(());
    }

    let result = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if result < 0 {
        return Err(anyhow::anyhow!(
            "fcntl(F_SETFL) failed: {}",
            io::Error::last_os_error()
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(spec: &str) -> ChordTracker {
        ChordTracker::new(parse_chord(spec).expect("valid chord"))
    }

    #[test]
    fn parses_ctrl_f13_chord() {
        let keys = parse_chord("ctrl+f13").expect("parse chord");
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&Key::KEY_LEFTCTRL));
        assert!(keys.contains(&Key::KEY_F13));
    }

    #[test]
    fn chord_parsing_is_order_independent() {
        let a = parse_chord("ctrl+shift+r").expect("parse");
        let b = parse_chord("R + SHIFT + CTRL").expect("parse");
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_unknown_keys_and_empty_chords() {
        assert!(parse_chord("ctrl+notakey").is_err());
        assert!(parse_chord("").is_err());
    }

    #[test]
    fn fires_once_regardless_of_press_order() {
        let mut t = tracker("ctrl+f13");
        assert!(!t.on_press(Key::KEY_F13));
        assert!(t.on_press(Key::KEY_LEFTCTRL));

        let mut t = tracker("ctrl+f13");
        assert!(!t.on_press(Key::KEY_LEFTCTRL));
        assert!(t.on_press(Key::KEY_F13));
    }

    #[test]
    fn extra_keys_do_not_refire_a_held_chord() {
        let mut t = tracker("ctrl+f13");
        t.on_press(Key::KEY_LEFTCTRL);
        assert!(t.on_press(Key::KEY_F13));
        assert!(!t.on_press(Key::KEY_A));
        // Simulated key repeat of a chord member
        assert!(!t.on_press(Key::KEY_F13));
    }

    #[test]
    fn release_and_repress_fires_a_second_activation() {
        let mut t = tracker("ctrl+f13");
        t.on_press(Key::KEY_LEFTCTRL);
        assert!(t.on_press(Key::KEY_F13));
        t.on_release(Key::KEY_F13);
        assert!(t.on_press(Key::KEY_F13));
    }

    #[test]
    fn either_physical_modifier_satisfies_the_chord() {
        let mut t = tracker("ctrl+f13");
        t.on_press(Key::KEY_RIGHTCTRL);
        assert!(t.on_press(Key::KEY_F13));
        // Swapping to the other physical ctrl re-arms and re-fires.
        t.on_release(Key::KEY_RIGHTCTRL);
        assert!(t.on_press(Key::KEY_LEFTCTRL));
    }

    #[test]
    fn reset_rearms_the_chord() {
        let mut t = tracker("ctrl+f13");
        t.on_press(Key::KEY_LEFTCTRL);
        assert!(t.on_press(Key::KEY_F13));
        t.reset();
        t.on_press(Key::KEY_LEFTCTRL);
        assert!(t.on_press(Key::KEY_F13));
    }

    #[test]
    fn detects_enodev_as_disconnect() {
        let err = io::Error::from_raw_os_error(libc::ENODEV);
        assert!(is_device_disconnect_error(&err));
    }

    #[test]
    fn does_not_treat_would_block_as_disconnect() {
        let err = io::Error::from(io::ErrorKind::WouldBlock);
        assert!(!is_device_disconnect_error(&err));
    }
}
