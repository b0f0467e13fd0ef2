//! Fake model adapter and orchestrator harness

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use muicebot::config::{BotFileConfig, LoaderKind, ModelConfig, ModelRegistry};
use muicebot::db::Database;
use muicebot::llm::{ChatHistory, LoaderRegistry, ModelAdapter};
use muicebot::muice::Muice;

/// Config file used by every harness
pub const CONFIG: &str = r#"
[bot]
default_model = "model"

[models.model]
loader = "ollama"
model_name = "fake-chat"
think = 1

[models.vision]
loader = "openai"
model_name = "fake-vision"
multimodal = true

[models.broken]
loader = "gemini"
model_name = "nope"
"#;

/// One recorded model call
#[derive(Debug, Clone)]
pub struct Call {
    pub prompt: String,
    pub history: Vec<(String, String)>,
    pub images: Vec<PathBuf>,
    pub vision: bool,
}

/// State shared by every adapter the fake loader builds
#[derive(Default)]
pub struct FakeState {
    replies: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<Call>>,
    delay_ms: AtomicU64,
    pub fail_load: AtomicBool,
    pub fail_ask: AtomicBool,
    pub loads: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue replies; once exhausted the model answers `reply to <prompt>`
    pub fn with_replies(self, replies: &[&str]) -> Self {
        self.replies
            .lock()
            .unwrap()
            .extend(replies.iter().map(|r| r.to_string()));
        self
    }

    /// Make every call take `delay`
    pub fn with_delay(self, delay: Duration) -> Self {
        self.set_delay(delay);
        self
    }

    /// Change the delay of later calls
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

/// Scripted model adapter
pub struct FakeModel {
    state: Arc<FakeState>,
    running: bool,
}

impl FakeModel {
    async fn respond(
        &self,
        prompt: &str,
        images: &[PathBuf],
        history: &ChatHistory,
        vision: bool,
    ) -> anyhow::Result<String> {
        self.state.calls.lock().unwrap().push(Call {
            prompt: prompt.to_string(),
            history: history.to_vec(),
            images: images.to_vec(),
            vision,
        });

        let now = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = self.state.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.state.fail_ask.load(Ordering::SeqCst) {
            anyhow::bail!("connection reset by peer");
        }

        let scripted = self.state.replies.lock().unwrap().pop_front();
        Ok(scripted.unwrap_or_else(|| format!("reply to {}", prompt)))
    }
}

#[async_trait]
impl ModelAdapter for FakeModel {
    async fn load(&mut self, _config: &ModelConfig) -> anyhow::Result<()> {
        self.state.loads.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_load.load(Ordering::SeqCst) {
            anyhow::bail!("backend unreachable");
        }
        self.running = true;
        Ok(())
    }

    async fn ask(&self, prompt: &str, history: &ChatHistory) -> anyhow::Result<String> {
        self.respond(prompt, &[], history, false).await
    }

    async fn ask_vision(
        &self,
        prompt: &str,
        images: &[PathBuf],
        history: &ChatHistory,
    ) -> anyhow::Result<String> {
        self.respond(prompt, images, history, true).await
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Orchestrator over a temp database and the fake model
pub struct Harness {
    pub muice: Arc<Muice>,
    pub db: Database,
    pub fake: Arc<FakeState>,
    pub config_path: PathBuf,
    _dir: TempDir,
}

impl Harness {
    /// Build without loading the model
    pub fn new(fake: FakeState) -> Self {
        Self::build(fake, None)
    }

    /// Build and load the default config
    pub async fn loaded(fake: FakeState) -> Self {
        let harness = Self::new(fake);
        assert!(harness.muice.load_model().await, "fake model failed to load");
        harness
    }

    /// Build and load with a custom inference timeout
    pub async fn loaded_with_timeout(fake: FakeState, timeout: Duration) -> Self {
        let harness = Self::build(fake, Some(timeout));
        assert!(harness.muice.load_model().await, "fake model failed to load");
        harness
    }

    fn build(fake: FakeState, timeout: Option<Duration>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join(".muice.toml");
        std::fs::write(&config_path, CONFIG).unwrap();

        let db = Database::open_at(dir.path().join("chat.db")).unwrap();
        let fake = Arc::new(fake);
        let muice = Muice::new(db.clone(), fake_loaders(&fake), registry(&config_path), "model")
            .unwrap();
        let muice = match timeout {
            Some(timeout) => muice.with_inference_timeout(timeout),
            None => muice,
        };

        Self {
            muice: Arc::new(muice),
            db,
            fake,
            config_path,
            _dir: dir,
        }
    }

    pub async fn memory(&self, user_id: &str) -> Vec<(String, String)> {
        self.muice.get_chat_memory(user_id).await.unwrap()
    }
}

fn fake_loaders(fake: &Arc<FakeState>) -> LoaderRegistry {
    let mut loaders = LoaderRegistry::new();
    for kind in LoaderKind::ALL {
        let state = Arc::clone(fake);
        loaders = loaders.with_loader(*kind, move || {
            Box::new(FakeModel {
                state: Arc::clone(&state),
                running: false,
            })
        });
    }
    loaders
}

fn registry(path: &Path) -> ModelRegistry {
    let config = BotFileConfig::load_from_path(path).unwrap();
    ModelRegistry::new(config.models).with_source(path.to_path_buf())
}

/// Owned pair for comparing against chat memory
pub fn pair(message: &str, respond: &str) -> (String, String) {
    (message.to_string(), respond.to_string())
}
