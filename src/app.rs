use anyhow::{Context, Result};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use tokio::sync::{mpsc, oneshot, Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, warn};

use crate::capture::SelectionCapturer;
use crate::config::Config;
use crate::input::{
    ClipboardPort, EditChord, EnigoInjector, GlobalShortcuts, HotkeyEvent, KeyInjectorPort,
    SystemClipboard,
};
use crate::rewrite::{OpenAiRewriter, RewriteRequest, Rewriter};

/// Owns the hotkey listener thread. Dropping (or stopping) it raises the stop
/// flag and joins the thread.
struct HotkeyListener {
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl HotkeyListener {
    fn spawn(chord: String, tx: mpsc::Sender<HotkeyEvent>) -> Result<Self> {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let runner_flag = Arc::clone(&stop_flag);

        // Fail fast on a malformed chord or missing devices before handing
        // the listener to its thread; the service cannot run without it.
        let shortcuts = GlobalShortcuts::new(&chord)?;

        let handle = thread::spawn(move || {
            if let Err(e) = shortcuts.run(tx, runner_flag) {
                error!("Hotkey listener error: {}", e);
            }
        });

        Ok(Self {
            stop_flag,
            handle: Some(handle),
        })
    }

    fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.join() {
                error!("Hotkey listener thread panicked: {:?}", err);
            }
        }
    }
}

impl Drop for HotkeyListener {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Tries to claim the single-cycle permit. `None` means a cycle is already in
/// flight; the activation is dropped, never queued.
fn try_begin_cycle(guard: &Arc<Semaphore>) -> Option<OwnedSemaphorePermit> {
    Arc::clone(guard).try_acquire_owned().ok()
}

/// One capture → rewrite → replace cycle. Any error propagates to the caller
/// for logging; the permit held by the caller is released on every exit path.
async fn run_cycle<C, K, R>(
    capturer: &SelectionCapturer,
    clipboard: &Mutex<C>,
    injector: &Mutex<K>,
    rewriter: &R,
    config: &Config,
) -> Result<()>
where
    C: ClipboardPort + Send,
    K: KeyInjectorPort + Send,
    R: Rewriter + Sync,
{
    let mut clipboard = clipboard.lock().await;
    let mut injector = injector.lock().await;

    let Some(text) = capturer.capture(&mut *clipboard, &mut *injector).await else {
        info!("No text selected, nothing to rewrite");
        return Ok(());
    };

    debug!("Captured text: {:.50}...", text);

    let request = RewriteRequest {
        model: config.model.clone(),
        prompt: config.prompt.clone(),
        text,
    };
    let rewritten = rewriter.rewrite_or_original(&request).await;

    clipboard
        .write(&rewritten)
        .context("Failed to place rewritten text on clipboard")?;
    tokio::time::sleep(capturer.settle_delay()).await;
    injector
        .send_chord(EditChord::Paste)
        .context("Failed to send paste chord")?;

    info!("Rewritten text pasted");
    Ok(())
}

pub struct RewordApp {
    config: Config,
    capturer: Arc<SelectionCapturer>,
    clipboard: Arc<Mutex<SystemClipboard>>,
    injector: Arc<Mutex<EnigoInjector>>,
    rewriter: Arc<OpenAiRewriter>,
    cycle_guard: Arc<Semaphore>,
    hotkey_tx: mpsc::Sender<HotkeyEvent>,
    hotkey_rx: Option<mpsc::Receiver<HotkeyEvent>>,
    listener: Option<HotkeyListener>,
}

impl RewordApp {
    pub fn new(config: Config) -> Result<Self> {
        let clipboard = SystemClipboard::new().context("Failed to initialize clipboard port")?;
        let rewriter = OpenAiRewriter::new(config.api_url.clone(), config.api_key.clone());
        let capturer = SelectionCapturer::new(&config.capture);

        let (hotkey_tx, hotkey_rx) = mpsc::channel(10);

        Ok(Self {
            config,
            capturer: Arc::new(capturer),
            clipboard: Arc::new(Mutex::new(clipboard)),
            injector: Arc::new(Mutex::new(EnigoInjector::new())),
            rewriter: Arc::new(rewriter),
            cycle_guard: Arc::new(Semaphore::new(1)),
            hotkey_tx,
            hotkey_rx: Some(hotkey_rx),
            listener: None,
        })
    }

    /// Runs until the shutdown channel fires. Each activation is handed to a
    /// spawned task so this loop (and the listener thread feeding it) is never
    /// blocked by clipboard or network I/O.
    pub async fn run(mut self, mut shutdown: oneshot::Receiver<()>) -> Result<()> {
        let mut hotkey_rx = self
            .hotkey_rx
            .take()
            .expect("hotkey receiver already consumed");

        self.listener = Some(HotkeyListener::spawn(
            self.config.hotkey.clone(),
            self.hotkey_tx.clone(),
        )?);
        info!("🚀 reword running (chord: {})", self.config.hotkey);

        loop {
            tokio::select! {
                event = hotkey_rx.recv() => {
                    match event {
                        Some(event) => self.handle_activation(event),
                        None => {
                            info!("Hotkey channel closed");
                            break;
                        }
                    }
                }
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    fn handle_activation(&self, event: HotkeyEvent) {
        let Some(permit) = try_begin_cycle(&self.cycle_guard) else {
            info!("Rewrite cycle already in flight, dropping activation");
            return;
        };

        debug!(
            latency_ms = event.triggered_at.elapsed().as_millis() as u64,
            "Activation accepted"
        );

        let capturer = Arc::clone(&self.capturer);
        let clipboard = Arc::clone(&self.clipboard);
        let injector = Arc::clone(&self.injector);
        let rewriter = Arc::clone(&self.rewriter);
        let config = self.config.clone();

        tokio::spawn(async move {
            // Permit lives for the whole cycle and is released when this task
            // ends, on success, error, or panic alike.
            let _permit = permit;
            if let Err(err) =
                run_cycle(&capturer, &clipboard, &injector, &*rewriter, &config).await
            {
                error!("Rewrite cycle failed: {err:#}");
            }
        });
    }

    /// Stops the listener, then waits for any in-flight cycle to finish by
    /// claiming its permit. New activations can no longer start.
    async fn shutdown(&mut self) {
        info!("🛑 Shutting down reword...");
        if let Some(mut listener) = self.listener.take() {
            listener.stop();
        }
        match self.cycle_guard.acquire().await {
            Ok(_) => debug!("No rewrite cycle in flight"),
            Err(_) => warn!("Cycle guard closed unexpectedly"),
        }
        info!("✅ Shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CaptureConfig;
    use std::sync::Mutex as StdMutex;

    struct FixedRewriter {
        output: Result<String, String>,
        calls: Arc<StdMutex<u32>>,
    }

    impl Rewriter for FixedRewriter {
        async fn rewrite(&self, _request: &RewriteRequest) -> Result<String> {
            *self.calls.lock().unwrap() += 1;
            match &self.output {
                Ok(text) => Ok(text.clone()),
                Err(msg) => anyhow::bail!("{msg}"),
            }
        }
    }

    /// Clipboard + injector pair wired so a Copy chord drops the scripted
    /// selection onto the clipboard, like a real application would.
    struct SharedClipboard {
        cell: Arc<StdMutex<String>>,
    }

    impl ClipboardPort for SharedClipboard {
        fn read(&mut self) -> Result<String> {
            Ok(self.cell.lock().unwrap().clone())
        }

        fn write(&mut self, text: &str) -> Result<()> {
            *self.cell.lock().unwrap() = text.to_string();
            Ok(())
        }
    }

    struct CopyAwareInjector {
        cell: Arc<StdMutex<String>>,
        selection: Option<String>,
        log: Arc<StdMutex<Vec<(EditChord, String)>>>,
    }

    impl KeyInjectorPort for CopyAwareInjector {
        fn send_chord(&mut self, chord: EditChord) -> Result<()> {
            if chord == EditChord::Copy {
                if let Some(text) = &self.selection {
                    *self.cell.lock().unwrap() = text.clone();
                }
            }
            let snapshot = self.cell.lock().unwrap().clone();
            self.log.lock().unwrap().push((chord, snapshot));
            Ok(())
        }
    }

    fn test_config() -> Config {
        Config {
            api_key: "sk-test".into(),
            capture: CaptureConfig {
                attempts: 3,
                settle_ms: 0,
            },
            ..Config::default()
        }
    }

    fn harness(
        initial_clipboard: &str,
        selection: Option<&str>,
    ) -> (
        Mutex<SharedClipboard>,
        Mutex<CopyAwareInjector>,
        Arc<StdMutex<Vec<(EditChord, String)>>>,
        Arc<StdMutex<String>>,
    ) {
        let cell = Arc::new(StdMutex::new(initial_clipboard.to_string()));
        let log = Arc::new(StdMutex::new(Vec::new()));
        let clipboard = SharedClipboard {
            cell: Arc::clone(&cell),
        };
        let injector = CopyAwareInjector {
            cell: Arc::clone(&cell),
            selection: selection.map(str::to_string),
            log: Arc::clone(&log),
        };
        (Mutex::new(clipboard), Mutex::new(injector), log, cell)
    }

    #[tokio::test]
    async fn successful_cycle_puts_rewritten_text_on_clipboard_before_paste() {
        let (clipboard, injector, log, cell) =
            harness("old clipboard", Some("this is a test sentance"));
        let calls = Arc::new(StdMutex::new(0));
        let rewriter = FixedRewriter {
            output: Ok("This is a test sentence.".into()),
            calls: Arc::clone(&calls),
        };
        let capturer = SelectionCapturer::new(&test_config().capture);

        run_cycle(&capturer, &clipboard, &injector, &rewriter, &test_config())
            .await
            .expect("cycle");

        assert_eq!(*calls.lock().unwrap(), 1);
        assert_eq!(*cell.lock().unwrap(), "This is a test sentence.");
        let log = log.lock().unwrap();
        let paste = log
            .iter()
            .find(|(chord, _)| *chord == EditChord::Paste)
            .expect("paste chord issued");
        // The rewritten text was already on the clipboard when Paste fired.
        assert_eq!(paste.1, "This is a test sentence.");
    }

    #[tokio::test]
    async fn rewrite_failure_pastes_the_original_text() {
        let (clipboard, injector, log, cell) = harness("", Some("as captured"));
        let rewriter = FixedRewriter {
            output: Err("service down".into()),
            calls: Arc::new(StdMutex::new(0)),
        };
        let capturer = SelectionCapturer::new(&test_config().capture);

        run_cycle(&capturer, &clipboard, &injector, &rewriter, &test_config())
            .await
            .expect("cycle");

        assert_eq!(*cell.lock().unwrap(), "as captured");
        assert!(log
            .lock()
            .unwrap()
            .iter()
            .any(|(chord, _)| *chord == EditChord::Paste));
    }

    #[tokio::test]
    async fn no_selection_means_no_rewrite_and_no_paste() {
        let (clipboard, injector, log, cell) = harness("previous", None);
        let calls = Arc::new(StdMutex::new(0));
        let rewriter = FixedRewriter {
            output: Ok("unused".into()),
            calls: Arc::clone(&calls),
        };
        let capturer = SelectionCapturer::new(&test_config().capture);

        run_cycle(&capturer, &clipboard, &injector, &rewriter, &test_config())
            .await
            .expect("cycle");

        assert_eq!(*calls.lock().unwrap(), 0);
        // Snapshot restored, no paste chord issued.
        assert_eq!(*cell.lock().unwrap(), "previous");
        assert!(!log
            .lock()
            .unwrap()
            .iter()
            .any(|(chord, _)| *chord == EditChord::Paste));
    }

    #[test]
    fn second_activation_is_rejected_while_permit_is_held() {
        let guard = Arc::new(Semaphore::new(1));
        let first = try_begin_cycle(&guard).expect("first activation");
        assert!(try_begin_cycle(&guard).is_none());
        drop(first);
        assert!(try_begin_cycle(&guard).is_some());
    }
}
