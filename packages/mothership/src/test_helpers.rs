use async_trait::async_trait;
use multiplexer::{Multiplexer, MultiplexerError};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::metrics::ServerMetrics;
use crate::skills::SkillRegistry;
use crate::sprite_manager::SpriteManager;
use crate::ws::{ConnectionHub, ServerMessage};

/// One recorded adapter call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeCall {
    EnsureSession {
        session: String,
    },
    CreateWindow {
        session: String,
        window: String,
        workdir: String,
    },
    SendKeys {
        session: String,
        window: String,
        keys: String,
        literal: bool,
    },
    CapturePane {
        session: String,
        window: String,
        scrollback_lines: u32,
    },
    KillWindow {
        session: String,
        window: String,
    },
}

/// In-memory [`Multiplexer`] that records every call instead of running tmux.
pub struct FakeMultiplexer {
    calls: Mutex<Vec<FakeCall>>,
    capture_text: Mutex<String>,
    capture_delay: Mutex<Option<Duration>>,
    fail_create: AtomicBool,
    fail_kill: AtomicBool,
    next_window: AtomicU32,
}

impl FakeMultiplexer {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            capture_text: Mutex::new(String::new()),
            capture_delay: Mutex::new(None),
            fail_create: AtomicBool::new(false),
            fail_kill: AtomicBool::new(false),
            // tmux's first extra window after "main" is @1
            next_window: AtomicU32::new(1),
        }
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn set_capture_text(&self, text: &str) {
        *self.capture_text.lock().unwrap() = text.to_string();
    }

    pub fn set_capture_delay(&self, delay: Duration) {
        *self.capture_delay.lock().unwrap() = Some(delay);
    }

    pub fn fail_create_window(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_kill_window(&self, fail: bool) {
        self.fail_kill.store(fail, Ordering::SeqCst);
    }

    fn record(&self, call: FakeCall) {
        self.calls.lock().unwrap().push(call);
    }
}

fn fake_exit(operation: &'static str) -> MultiplexerError {
    MultiplexerError::Exit {
        operation,
        status: "exit status: 1".to_string(),
        stderr: "fake failure".to_string(),
    }
}

#[async_trait]
impl Multiplexer for FakeMultiplexer {
    async fn ensure_session(&self, session: &str) -> Result<bool, MultiplexerError> {
        self.record(FakeCall::EnsureSession {
            session: session.to_string(),
        });
        Ok(true)
    }

    async fn create_window(
        &self,
        session: &str,
        window: &str,
        workdir: &str,
    ) -> Result<u32, MultiplexerError> {
        self.record(FakeCall::CreateWindow {
            session: session.to_string(),
            window: window.to_string(),
            workdir: workdir.to_string(),
        });
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(fake_exit("new-window"));
        }
        Ok(self.next_window.fetch_add(1, Ordering::SeqCst))
    }

    async fn send_keys(
        &self,
        session: &str,
        window: &str,
        keys: &str,
        literal: bool,
    ) -> Result<(), MultiplexerError> {
        self.record(FakeCall::SendKeys {
            session: session.to_string(),
            window: window.to_string(),
            keys: keys.to_string(),
            literal,
        });
        Ok(())
    }

    async fn capture_pane(
        &self,
        session: &str,
        window: &str,
        scrollback_lines: u32,
    ) -> Result<String, MultiplexerError> {
        self.record(FakeCall::CapturePane {
            session: session.to_string(),
            window: window.to_string(),
            scrollback_lines,
        });
        let delay = *self.capture_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.capture_text.lock().unwrap().clone())
    }

    async fn kill_window(&self, session: &str, window: &str) -> Result<(), MultiplexerError> {
        self.record(FakeCall::KillWindow {
            session: session.to_string(),
            window: window.to_string(),
        });
        if self.fail_kill.load(Ordering::SeqCst) {
            return Err(fake_exit("kill-window"));
        }
        Ok(())
    }
}

/// A `SpriteManager` on session "test" with default agent "claude" and 100
/// lines of scrollback, plus the fake it drives.
pub fn test_sprite_manager() -> (SpriteManager, Arc<FakeMultiplexer>) {
    let fake = Arc::new(FakeMultiplexer::new());
    let mgr = SpriteManager::new(
        fake.clone(),
        "test",
        "claude",
        100,
        Arc::new(ServerMetrics::new()),
    );
    (mgr, fake)
}

/// Everything the router and streamer need, wired to a fake multiplexer.
pub struct TestServer {
    pub sprites: Arc<SpriteManager>,
    pub skills: Arc<SkillRegistry>,
    pub hub: Arc<ConnectionHub>,
    pub metrics: Arc<ServerMetrics>,
    pub fake: Arc<FakeMultiplexer>,
}

impl TestServer {
    pub fn new() -> Self {
        let fake = Arc::new(FakeMultiplexer::new());
        let metrics = Arc::new(ServerMetrics::new());
        let sprites = Arc::new(SpriteManager::new(
            fake.clone(),
            "test",
            "claude",
            100,
            metrics.clone(),
        ));
        Self {
            sprites,
            skills: Arc::new(SkillRegistry::new()),
            hub: Arc::new(ConnectionHub::new(metrics.clone())),
            metrics,
            fake,
        }
    }

    /// Register a client on the hub and return its id and inbox.
    pub async fn connect(&self, id: &str) -> mpsc::Receiver<ServerMessage> {
        let (tx, rx) = mpsc::channel(crate::ws::OUTBOUND_QUEUE_CAPACITY);
        self.hub.register(id.to_string(), tx).await;
        rx
    }
}

/// Drain everything currently queued in `rx`.
pub fn drain(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}
