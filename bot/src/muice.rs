//! Conversation orchestrator
//!
//! [`Muice`] owns the active model and its configuration and runs every chat
//! turn: fetch history, call the model, post-process the thought, persist.
//!
//! # Locking
//!
//! - Each user has a FIFO mutex held for the whole of `ask`, `refresh`,
//!   `undo` and `reset`, so turns of one user persist in call order while
//!   different users run in parallel.
//! - The model slot sits behind an `RwLock`. Inference holds the read side;
//!   `change_model_config` and `load_model` take the write side, which waits
//!   for in-flight calls and blocks new ones until the swap is done.
//! - Lock order is always user lock, then slot lock.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};

use crate::config::{ModelConfig, ModelRegistry};
use crate::db::{Database, HistoryEntry, NewHistoryItem};
use crate::error::MuiceError;
use crate::llm::{LoaderRegistry, ModelAdapter};
use crate::thought::process_thoughts;

/// Default bound on a single model call
pub const DEFAULT_INFERENCE_TIMEOUT: Duration = Duration::from_secs(120);

/// Per-user lock table is pruned of idle entries past this size
const USER_LOCK_PRUNE_THRESHOLD: usize = 1024;

/// One inbound chat turn
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub message: String,
    pub username: String,
    pub user_id: String,
    pub group_id: Option<String>,
    pub image_paths: Vec<PathBuf>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        Self {
            message: message.into(),
            username: user_id.clone(),
            user_id,
            ..Self::default()
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    pub fn with_images(mut self, image_paths: Vec<PathBuf>) -> Self {
        self.image_paths = image_paths;
        self
    }
}

/// Active configuration and the adapter built from it
struct ModelSlot {
    config_name: String,
    config: ModelConfig,
    model: Option<Box<dyn ModelAdapter>>,
}

impl ModelSlot {
    fn running_model(&self) -> Result<&dyn ModelAdapter, MuiceError> {
        match &self.model {
            Some(model) if model.is_running() => Ok(model.as_ref()),
            _ => Err(MuiceError::ModelNotLoaded),
        }
    }

    fn is_running(&self) -> bool {
        self.running_model().is_ok()
    }
}

/// The conversation orchestrator
pub struct Muice {
    db: Database,
    loaders: LoaderRegistry,
    configs: Mutex<ModelRegistry>,
    slot: RwLock<ModelSlot>,
    user_locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
    inference_timeout: Duration,
}

impl Muice {
    /// Create an orchestrator for `config_name` without loading the model
    pub fn new(
        db: Database,
        loaders: LoaderRegistry,
        configs: ModelRegistry,
        config_name: &str,
    ) -> Result<Self, MuiceError> {
        let (config_name, config) = configs.resolve_entry(config_name)?;

        Ok(Self {
            db,
            loaders,
            configs: Mutex::new(configs),
            slot: RwLock::new(ModelSlot {
                config_name,
                config,
                model: None,
            }),
            user_locks: StdMutex::new(HashMap::new()),
            inference_timeout: DEFAULT_INFERENCE_TIMEOUT,
        })
    }

    /// Bound every model call by `timeout`
    pub fn with_inference_timeout(mut self, timeout: Duration) -> Self {
        self.inference_timeout = timeout;
        self
    }

    // ========================================================================
    // Model lifecycle
    // ========================================================================

    /// Build and load the adapter for the active config
    pub async fn load_model(&self) -> bool {
        let mut slot = self.slot.write().await;
        self.load_slot(&mut slot).await
    }

    async fn load_slot(&self, slot: &mut ModelSlot) -> bool {
        tracing::info!(
            "Loading model config {} (loader: {})",
            slot.config_name,
            slot.config.loader
        );
        slot.model = None;

        let Some(mut model) = self.loaders.create(slot.config.loader) else {
            tracing::error!("No constructor registered for loader {}", slot.config.loader);
            return false;
        };

        match model.load(&slot.config).await {
            Ok(()) if model.is_running() => {
                tracing::info!("Model loaded: {}", slot.config_name);
                slot.model = Some(model);
                true
            }
            Ok(()) => {
                tracing::error!("Loader {} finished without a running model", model.name());
                false
            }
            Err(e) => {
                let err = MuiceError::ModelLoadFailed(format!("{:#}", e));
                tracing::error!("{}", err);
                false
            }
        }
    }

    /// Switch to another named model config and load it
    pub async fn change_model_config(&self, name: &str) -> String {
        let resolved = {
            let mut configs = self.configs.lock().await;
            if let Err(e) = configs.reload() {
                tracing::warn!("Keeping previous model configs, reload failed: {:#}", e);
            }
            configs.resolve_entry(name)
        };

        let (name, config) = match resolved {
            Ok(entry) => entry,
            Err(e) => {
                tracing::error!("{}", e);
                return e.user_message();
            }
        };

        let mut slot = self.slot.write().await;
        slot.config_name = name.clone();
        slot.config = config;

        if self.load_slot(&mut slot).await {
            format!("已成功加载 {}", name)
        } else {
            format!("已切换至 {}，但模型加载失败，请检查配置项是否正确", name)
        }
    }

    // ========================================================================
    // Conversation
    // ========================================================================

    /// Run one chat turn and return the text shown to the user
    pub async fn ask(&self, request: ChatRequest) -> String {
        let lock = self.user_lock(&request.user_id);
        let _turn = lock.lock().await;

        match self.try_ask(request).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("Ask failed: {}", e);
                e.user_message()
            }
        }
    }

    async fn try_ask(&self, request: ChatRequest) -> Result<String, MuiceError> {
        let slot = self.slot.read().await;
        slot.running_model()?;

        let history = self.chat_memory(&request.user_id, None).await?;
        let (reply, result) = self
            .infer(
                &slot,
                &request.message,
                &request.image_paths,
                &history,
                slot.config.multimodal,
            )
            .await?;

        let item = NewHistoryItem {
            username: request.username,
            user_id: request.user_id,
            group_id: request.group_id,
            message: request.message,
            respond: result,
            images: request.image_paths,
        };
        self.with_db(move |db| db.add_item(item)).await?;

        Ok(reply)
    }

    /// Regenerate the user's most recent answer
    pub async fn refresh(&self, user_id: &str) -> String {
        tracing::info!("User {} requested refresh", user_id);

        let lock = self.user_lock(user_id);
        let _turn = lock.lock().await;

        match self.try_refresh(user_id).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("Refresh failed: {}", e);
                e.user_message()
            }
        }
    }

    async fn try_refresh(&self, user_id: &str) -> Result<String, MuiceError> {
        let uid = user_id.to_string();
        let last: HistoryEntry = self
            .with_db(move |db| db.get_last_item(&uid))
            .await?
            .ok_or_else(|| MuiceError::NoHistoryAvailable(user_id.to_string()))?;

        let slot = self.slot.read().await;
        slot.running_model()?;

        let history = self.chat_memory(user_id, Some(last.id)).await?;
        let vision = slot.config.multimodal && !last.images.is_empty();
        let (reply, result) = self
            .infer(&slot, &last.message, &last.images, &history, vision)
            .await?;

        let old_id = last.id;
        let item = NewHistoryItem {
            username: last.username,
            user_id: last.user_id,
            group_id: last.group_id,
            message: last.message,
            respond: result,
            images: last.images,
        };
        self.with_db(move |db| db.replace_item(old_id, item)).await?;

        Ok(reply)
    }

    /// Drop the user's most recent exchange
    pub async fn undo(&self, user_id: &str) -> String {
        let lock = self.user_lock(user_id);
        let _turn = lock.lock().await;

        let uid = user_id.to_string();
        match self.with_db(move |db| db.remove_last_item(&uid)).await {
            Ok(removed) => {
                tracing::debug!("Undo for {} removed an entry: {}", user_id, removed);
                "已成功撤销上一段对话~".to_string()
            }
            Err(e) => {
                tracing::error!("Undo failed: {}", e);
                e.user_message()
            }
        }
    }

    /// Hide all of the user's history from future turns
    pub async fn reset(&self, user_id: &str) -> String {
        let lock = self.user_lock(user_id);
        let _turn = lock.lock().await;

        let uid = user_id.to_string();
        match self.with_db(move |db| db.mark_history_unavailable(&uid)).await {
            Ok(hidden) => {
                tracing::info!("Reset {} history entries for {}", hidden, user_id);
                "已成功移除对话历史~".to_string()
            }
            Err(e) => {
                tracing::error!("Reset failed: {}", e);
                e.user_message()
            }
        }
    }

    /// Available history as `(prompt, response)` pairs, oldest first
    pub async fn get_chat_memory(&self, user_id: &str) -> Result<Vec<(String, String)>, MuiceError> {
        self.chat_memory(user_id, None).await
    }

    async fn chat_memory(
        &self,
        user_id: &str,
        exclude_id: Option<i64>,
    ) -> Result<Vec<(String, String)>, MuiceError> {
        let uid = user_id.to_string();
        let entries = self.with_db(move |db| db.get_history(&uid)).await?;

        Ok(entries
            .into_iter()
            .filter(|e| Some(e.id) != exclude_id)
            .map(|e| (e.message, e.respond))
            .collect())
    }

    /// Call the model and split the answer into `(shown, persisted)`
    async fn infer(
        &self,
        slot: &ModelSlot,
        prompt: &str,
        images: &[PathBuf],
        history: &[(String, String)],
        vision: bool,
    ) -> Result<(String, String), MuiceError> {
        let model = slot.running_model()?;

        tracing::debug!("Model call: prompt={:?} history={:?}", prompt, history);
        let started = Instant::now();

        let call = async {
            if vision {
                model.ask_vision(prompt, images, history).await
            } else {
                model.ask(prompt, history).await
            }
        };

        let raw = tokio::time::timeout(self.inference_timeout, call)
            .await
            .map_err(|_| MuiceError::ModelTimeout(self.inference_timeout.as_secs()))?
            .map_err(|e| MuiceError::Inference(format!("{:#}", e)))?;

        tracing::info!("Model call took {:.2}s", started.elapsed().as_secs_f64());
        tracing::debug!("Model returned: {}", raw);

        let (thought, result) = process_thoughts(raw.trim(), slot.config.think);
        Ok((format!("{}{}", thought, result), result))
    }

    // ========================================================================
    // Status
    // ========================================================================

    /// Multi-line status report for the `status` command
    pub async fn status(&self) -> String {
        let slot = self.slot.read().await;
        format!(
            "当前模型配置：{}\n当前模型加载器：{}\n模型加载器状态：{}\n多模态模型：{}",
            slot.config_name,
            slot.config.loader,
            if slot.is_running() { "运行中" } else { "未启动" },
            if slot.config.multimodal { "是" } else { "否" },
        )
    }

    pub async fn is_running(&self) -> bool {
        self.slot.read().await.is_running()
    }

    pub async fn is_multimodal(&self) -> bool {
        self.slot.read().await.config.multimodal
    }

    pub async fn active_config_name(&self) -> String {
        self.slot.read().await.config_name.clone()
    }

    pub async fn active_config(&self) -> ModelConfig {
        self.slot.read().await.config.clone()
    }

    /// Names of all configured models
    pub async fn config_names(&self) -> Vec<String> {
        self.configs.lock().await.names()
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .user_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if locks.len() > USER_LOCK_PRUNE_THRESHOLD {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }

        locks.entry(user_id.to_string()).or_default().clone()
    }

    /// Run a blocking database call off the async workers
    async fn with_db<T, F>(&self, f: F) -> Result<T, MuiceError>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| MuiceError::Storage(format!("database task failed: {}", e)))?
            .map_err(MuiceError::from)
    }
}
