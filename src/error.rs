use std::fmt;

use crate::key::TimerKey;

/// 定时器错误类型 (Timer Error Type)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    /// 注册表未初始化或已关闭
    /// (Registry was never created or has already been shut down)
    NotInitialized,

    /// 取消了一个不在等待中的定时器（仅记录警告，视为成功）
    /// (Cancel referenced a timer that is not pending; logged as a warning and treated as success)
    UnknownTimerOnCancel {
        key: TimerKey,
    },

    /// 触发回调返回错误或发生 panic
    /// (The fire callback returned an error or panicked)
    CallbackFailure {
        key: TimerKey,
        reason: String,
    },

    /// 注销系统通知源失败（关闭流程继续执行）
    /// (Detaching from the OS notification source failed; shutdown proceeds anyway)
    ReceiverTeardownFailure {
        reason: String,
    },

    /// 通知载荷无法解码为定时器键
    /// (Notification payload could not be decoded into a timer key)
    InvalidNotification {
        payload: String,
    },

    /// 配置验证失败 (Configuration validation failed)
    InvalidConfiguration {
        field: String,
        reason: String,
    },

    /// 当前线程没有可用的 tokio 运行时
    /// (No tokio runtime is available on the calling thread)
    RuntimeUnavailable,
}

impl fmt::Display for TimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerError::NotInitialized => {
                write!(f, "Timer registry is not initialized")
            }
            TimerError::UnknownTimerOnCancel { key } => {
                write!(f, "No pending timer {} to cancel", key)
            }
            TimerError::CallbackFailure { key, reason } => {
                write!(f, "Fire callback for timer {} failed: {}", key, reason)
            }
            TimerError::ReceiverTeardownFailure { reason } => {
                write!(f, "Failed to detach notification receiver: {}", reason)
            }
            TimerError::InvalidNotification { payload } => {
                write!(f, "Invalid timer notification payload {:?}", payload)
            }
            TimerError::InvalidConfiguration { field, reason } => {
                write!(f, "Configuration validation failed ({}): {}", field, reason)
            }
            TimerError::RuntimeUnavailable => {
                write!(f, "No tokio runtime available to run fire dispatch")
            }
        }
    }
}

impl std::error::Error for TimerError {}
