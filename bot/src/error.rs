//! Conversation error taxonomy
//!
//! Every failure inside the orchestrator is one of these variants. None of
//! them escape to the router: each maps to a fixed reply via
//! [`MuiceError::user_message`].

/// Errors raised while serving a conversation request
#[derive(Debug, thiserror::Error)]
pub enum MuiceError {
    #[error("model is not loaded")]
    ModelNotLoaded,

    #[error("model failed to load: {0}")]
    ModelLoadFailed(String),

    #[error("model config not found: {0}")]
    ConfigNotFound(String),

    #[error("invalid model config {name}: {reason}")]
    InvalidConfig { name: String, reason: String },

    #[error("no conversation history for user {0}")]
    NoHistoryAvailable(String),

    #[error("model did not answer within {0}s")]
    ModelTimeout(u64),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl MuiceError {
    /// Reply text sent to the chat user for this failure
    pub fn user_message(&self) -> String {
        match self {
            MuiceError::ModelNotLoaded => "(模型未加载)".to_string(),
            MuiceError::ModelLoadFailed(_) => "模型加载失败，请检查配置项是否正确".to_string(),
            MuiceError::ConfigNotFound(_) => "指定的模型配置不存在".to_string(),
            MuiceError::InvalidConfig { .. } => {
                "指定的模型加载器不存在，请检查配置文件".to_string()
            }
            MuiceError::NoHistoryAvailable(_) => {
                "你都还没和我说过一句话呢，得和我至少聊上一段才能刷新哦".to_string()
            }
            MuiceError::ModelTimeout(_) => "(模型响应超时)".to_string(),
            MuiceError::Inference(_) => "(模型调用失败，请稍后再试)".to_string(),
            MuiceError::Storage(_) => "(数据库操作失败)".to_string(),
        }
    }
}

impl From<anyhow::Error> for MuiceError {
    fn from(err: anyhow::Error) -> Self {
        MuiceError::Storage(format!("{:#}", err))
    }
}
