use std::fmt;

use tokio::task::JoinHandle;

use crate::key::TimerKey;

/// Error returned by a [`FireCallback`]
///
/// [`FireCallback`] 返回的错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FireError(String);

impl FireError {
    pub fn new(message: impl Into<String>) -> Self {
        FireError(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for FireError {}

impl From<&str> for FireError {
    fn from(message: &str) -> Self {
        FireError::new(message)
    }
}

impl From<String> for FireError {
    fn from(message: String) -> Self {
        FireError(message)
    }
}

/// Fire Callback Trait
///
/// Protocol engine entry point invoked once per expired timer. Runs on a
/// blocking worker thread and never while the registry lock is held, so it may
/// call back into `schedule`/`cancel`.
///
/// 协议引擎的定时器触发入口，每个到期定时器调用一次。在阻塞工作线程上运行，
/// 且不会在持有注册表锁时调用，因此可以重入 `schedule`/`cancel`。
///
/// # Examples (示例)
///
/// ```
/// use kestrel_wakeup::{FireCallback, FireError, TimerKey};
///
/// struct Engine;
///
/// impl FireCallback for Engine {
///     fn fire(&self, key: TimerKey) -> Result<(), FireError> {
///         println!("timer {} expired", key);
///         Ok(())
///     }
/// }
/// ```
pub trait FireCallback: Send + Sync + 'static {
    fn fire(&self, key: TimerKey) -> Result<(), FireError>;
}

/// Implement FireCallback for closures
///
/// 为闭包实现 FireCallback
impl<F> FireCallback for F
where
    F: Fn(TimerKey) -> Result<(), FireError> + Send + Sync + 'static,
{
    fn fire(&self, key: TimerKey) -> Result<(), FireError> {
        self(key)
    }
}

/// Final state of one fire dispatch
///
/// 一次触发派发的最终状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FireOutcome {
    /// Callback ran and returned `Ok`
    ///
    /// 回调已执行并返回 `Ok`
    Fired,
    /// Timer was cancelled or consumed before the fire unit ran; no callback
    ///
    /// 定时器在触发单元运行前被取消或已被消费；未调用回调
    Aborted,
    /// Callback returned an error or panicked
    ///
    /// 回调返回错误或发生 panic
    CallbackFailed(String),
}

/// Result of handing a notification to the registry
///
/// 将通知交给注册表后的结果
#[derive(Debug)]
pub enum Dispatch {
    /// The key was not pending: stale notification for a cancelled or superseded timer
    ///
    /// 键不在等待中：已取消或已被替换的定时器的过期通知
    Stale,
    /// A fire unit was started
    ///
    /// 已启动一个触发单元
    Spawned(FireJob),
}

/// Handle to a running fire unit
///
/// Dropping the job detaches it; the unit keeps running.
///
/// 运行中触发单元的句柄。丢弃句柄不会停止该单元。
#[derive(Debug)]
pub struct FireJob {
    key: TimerKey,
    handle: JoinHandle<FireOutcome>,
}

impl FireJob {
    pub(crate) fn new(key: TimerKey, handle: JoinHandle<FireOutcome>) -> Self {
        Self { key, handle }
    }

    #[inline]
    pub fn key(&self) -> TimerKey {
        self.key
    }

    /// Wait for the fire unit to finish
    ///
    /// 等待触发单元结束
    pub async fn join(self) -> FireOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => FireOutcome::CallbackFailed("fire unit panicked".to_string()),
            Err(_) => FireOutcome::Aborted,
        }
    }

    /// Wait for the fire unit and pair the outcome with its key
    ///
    /// 等待触发单元并将结果与键配对
    pub(crate) async fn into_report(self) -> FireReport {
        let key = self.key;
        FireReport {
            key,
            outcome: self.join().await,
        }
    }
}

/// Outcome of a fire dispatch forwarded by `TimerService`
///
/// 由 `TimerService` 转发的触发派发结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FireReport {
    pub key: TimerKey,
    pub outcome: FireOutcome,
}
