use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;

use crate::config::RegistryConfig;
use crate::error::TimerError;
use crate::key::{DispatchToken, TimerKey};
use crate::task::{Dispatch, FireCallback, FireJob, FireOutcome};
use crate::wakelock::{WakeLock, WakeLockGuard};
use crate::wakeup::{WakeupRequest, WakeupScheduler};

/// One outstanding scheduled callback
///
/// 一个待触发的定时回调
struct PendingTimer {
    request: WakeupRequest,
    scheduled_at: Instant,
}

impl PendingTimer {
    fn new(request: WakeupRequest) -> Self {
        Self {
            request,
            scheduled_at: Instant::now(),
        }
    }
}

/// `None` once the registry has been shut down
type PendingMap = Option<FxHashMap<TimerKey, PendingTimer>>;

struct Shared {
    pending: Mutex<PendingMap>,
    scheduler: Arc<dyn WakeupScheduler>,
    wake_lock: Arc<dyn WakeLock>,
    callback: Arc<dyn FireCallback>,
    wake_threshold: Duration,
    fire_limit: Option<Arc<Semaphore>>,
    runtime: Handle,
}

/// TimerRegistry - 定时器注册表
/// (TimerRegistry - maps timer keys to pending wakeup requests)
///
/// A key is pending if and only if a notification was requested for it and has
/// not yet been cancelled or consumed by a fire dispatch. All map mutations go
/// through one mutex; the fire callback never runs while it is held.
///
/// 键处于等待状态当且仅当已为其请求通知且尚未被取消或被触发派发消费。
/// 所有映射修改都经过同一把互斥锁；触发回调永远不会在持锁时运行。
///
/// The registry is a cheap [`Clone`] handle; clones share the same state.
///
/// # 示例 (Examples)
/// ```no_run
/// use kestrel_wakeup::{
///     notification_channel, CountedWakeLock, FireError, RegistryConfig, TimerKey,
///     TimerRegistry, TokioWakeupScheduler,
/// };
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let (tx, _rx) = notification_channel(64);
///     let registry = TimerRegistry::new(
///         Arc::new(TokioWakeupScheduler::new(tx)?),
///         Arc::new(CountedWakeLock::new()),
///         Arc::new(|key: TimerKey| -> Result<(), FireError> {
///             println!("timer {} fired", key);
///             Ok(())
///         }),
///         RegistryConfig::default(),
///     )?;
///
///     registry.schedule(1, 42, Duration::from_millis(500))?;
///     registry.cancel(1, 42)?;
///     registry.shutdown();
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct TimerRegistry {
    inner: Arc<Shared>,
}

impl TimerRegistry {
    /// Create a registry; must be called inside a tokio runtime
    ///
    /// 创建注册表；必须在 tokio 运行时内调用
    ///
    /// # 返回 (Returns)
    /// - `Err(TimerError::RuntimeUnavailable)`: 当前线程没有 tokio 运行时
    ///      (No tokio runtime on the calling thread)
    pub fn new(
        scheduler: Arc<dyn WakeupScheduler>,
        wake_lock: Arc<dyn WakeLock>,
        callback: Arc<dyn FireCallback>,
        config: RegistryConfig,
    ) -> Result<Self, TimerError> {
        let runtime = Handle::try_current().map_err(|_| TimerError::RuntimeUnavailable)?;
        let fire_limit = config
            .max_in_flight_fires
            .map(|cap| Arc::new(Semaphore::new(cap)));

        Ok(Self {
            inner: Arc::new(Shared {
                pending: Mutex::new(Some(FxHashMap::default())),
                scheduler,
                wake_lock,
                callback,
                wake_threshold: config.wake_threshold,
                fire_limit,
                runtime,
            }),
        })
    }

    /// Schedule timer `(heap_id, timer_id)` to fire after `delay`
    ///
    /// Rescheduling a pending key replaces its request: last schedule wins.
    /// The callback is never invoked synchronously.
    ///
    /// 调度定时器 `(heap_id, timer_id)` 在 `delay` 后触发。重复调度同一个键会替换之前的请求。
    ///
    /// # 返回 (Returns)
    /// - `Ok(())`: 请求已发出 (Request issued)
    /// - `Err(TimerError::NotInitialized)`: 注册表已关闭 (Registry was shut down)
    pub fn schedule(&self, heap_id: u32, timer_id: u32, delay: Duration) -> Result<(), TimerError> {
        let key = TimerKey::new(heap_id, timer_id);
        let mut state = self.inner.pending.lock();
        let Some(pending) = state.as_mut() else {
            tracing::error!(heap_id, timer_id, "timer registry not initialized");
            return Err(TimerError::NotInitialized);
        };

        let request = WakeupRequest::new(key, delay, self.inner.wake_threshold);
        tracing::trace!(
            heap_id,
            timer_id,
            delay_ms = delay.as_millis() as u64,
            wakes_host = request.class.wakes_host(),
            "schedule timer"
        );

        self.inner.scheduler.request_notification(&request);
        if pending.insert(key, PendingTimer::new(request)).is_some() {
            tracing::debug!(heap_id, timer_id, "rescheduled pending timer");
        }
        Ok(())
    }

    /// Cancel timer `(heap_id, timer_id)`
    ///
    /// The scheduler is always asked to drop the notification, even for keys
    /// that are not pending. Cancelling an unknown or already fired timer only
    /// logs a warning.
    ///
    /// 取消定时器。即使键不在等待中也总会请求调度器丢弃通知；取消未知或已触发的定时器只记录警告。
    pub fn cancel(&self, heap_id: u32, timer_id: u32) -> Result<(), TimerError> {
        let key = TimerKey::new(heap_id, timer_id);
        let mut state = self.inner.pending.lock();
        let Some(pending) = state.as_mut() else {
            tracing::error!(heap_id, timer_id, "timer registry not initialized");
            return Err(TimerError::NotInitialized);
        };

        let payload = match pending.remove(&key) {
            Some(timer) => timer.request.payload,
            None => {
                let err = TimerError::UnknownTimerOnCancel { key };
                tracing::warn!(heap_id, timer_id, "{}", err);
                key.to_uri()
            }
        };
        self.inner.scheduler.cancel_notification(&payload);
        Ok(())
    }

    /// Handle an inbound wakeup notification
    ///
    /// Stale notifications (cancelled or superseded timers) are discarded.
    /// Otherwise the wake lock is acquired and a fire unit is spawned; the
    /// notification path never waits for the callback.
    ///
    /// 处理到达的唤醒通知。过期通知会被丢弃；否则获取唤醒锁并启动触发单元，通知路径不会等待回调。
    ///
    /// # 返回 (Returns)
    /// - `Ok(Dispatch::Stale)`: 键不在等待中 (Key not pending)
    /// - `Ok(Dispatch::Spawned(job))`: 已启动触发单元 (Fire unit started)
    /// - `Err(TimerError::InvalidNotification)`: 载荷无法解码 (Undecodable payload)
    /// - `Err(TimerError::NotInitialized)`: 注册表已关闭 (Registry was shut down)
    pub fn on_notification(&self, payload: &str) -> Result<Dispatch, TimerError> {
        let key: TimerKey = match payload.parse() {
            Ok(key) => key,
            Err(err) => {
                tracing::warn!("{}", err);
                return Err(err);
            }
        };

        let guard = {
            let state = self.inner.pending.lock();
            let Some(pending) = state.as_ref() else {
                tracing::warn!(heap_id = key.heap_id(), timer_id = key.timer_id(), "notification after shutdown");
                return Err(TimerError::NotInitialized);
            };
            if !pending.contains_key(&key) {
                tracing::warn!(
                    heap_id = key.heap_id(),
                    timer_id = key.timer_id(),
                    "firing a cancelled timer - abort"
                );
                return Ok(Dispatch::Stale);
            }
            WakeLockGuard::acquire(Arc::clone(&self.inner.wake_lock), DispatchToken::next())
        };

        tracing::debug!(
            heap_id = key.heap_id(),
            timer_id = key.timer_id(),
            token = guard.token().as_u64(),
            "dispatch timer"
        );
        let shared = Arc::clone(&self.inner);
        let handle = self.inner.runtime.spawn(shared.run_fire(key, guard));
        Ok(Dispatch::Spawned(FireJob::new(key, handle)))
    }

    /// Detach from the notification source, cancel every pending timer and reset the wake lock
    ///
    /// Every later `schedule`, `cancel` or notification reports
    /// [`TimerError::NotInitialized`]. Calling it twice is harmless.
    ///
    /// 从通知源分离，取消所有等待中的定时器并重置唤醒锁。之后的操作都会返回 `NotInitialized`。
    pub fn shutdown(&self) {
        if self.is_initialized() {
            tracing::debug!("quit timer registry");
            if let Err(err) = self.inner.scheduler.detach() {
                tracing::error!("{}", err);
            }

            let drained = self.inner.pending.lock().take().unwrap_or_default();
            for timer in drained.into_values() {
                self.inner.scheduler.cancel_notification(&timer.request.payload);
            }

            if let Some(limit) = &self.inner.fire_limit {
                limit.close();
            }
        } else {
            tracing::debug!("timer registry already shut down");
        }

        self.inner.wake_lock.reset_all();
    }

    #[inline]
    pub(crate) fn runtime(&self) -> &Handle {
        &self.inner.runtime
    }

    /// `false` once [`TimerRegistry::shutdown`] has run
    ///
    /// 调用 [`TimerRegistry::shutdown`] 后返回 `false`
    pub fn is_initialized(&self) -> bool {
        self.inner.pending.lock().is_some()
    }

    /// Number of pending timers
    ///
    /// 等待中的定时器数量
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().as_ref().map_or(0, |p| p.len())
    }

    pub fn is_pending(&self, heap_id: u32, timer_id: u32) -> bool {
        self.inner
            .pending
            .lock()
            .as_ref()
            .is_some_and(|p| p.contains_key(&TimerKey::new(heap_id, timer_id)))
    }

    /// Sorted snapshot of the pending keys
    ///
    /// 等待中键的有序快照
    pub fn pending_keys(&self) -> Vec<TimerKey> {
        let mut keys: Vec<TimerKey> = self
            .inner
            .pending
            .lock()
            .as_ref()
            .map(|p| p.keys().copied().collect())
            .unwrap_or_default();
        keys.sort_unstable();
        keys
    }
}

impl Shared {
    /// Fire unit body
    ///
    /// Re-checks and removes the key under the lock before invoking the
    /// callback, so a cancel that lands between the notification check and this
    /// point still wins. `guard` is dropped on every path.
    async fn run_fire(self: Arc<Self>, key: TimerKey, guard: WakeLockGuard) -> FireOutcome {
        let _permit = match &self.fire_limit {
            Some(limit) => match Arc::clone(limit).acquire_owned().await {
                Ok(permit) => Some(permit),
                Err(_) => return FireOutcome::Aborted,
            },
            None => None,
        };

        let claimed = self.pending.lock().as_mut().and_then(|p| p.remove(&key));
        let Some(timer) = claimed else {
            tracing::warn!(
                heap_id = key.heap_id(),
                timer_id = key.timer_id(),
                "running a cancelled timer - abort"
            );
            return FireOutcome::Aborted;
        };

        tracing::debug!(
            heap_id = key.heap_id(),
            timer_id = key.timer_id(),
            elapsed_ms = timer.scheduled_at.elapsed().as_millis() as u64,
            "fire timer"
        );

        let callback = Arc::clone(&self.callback);
        let result = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            callback.fire(key)
        })
        .await;

        let reason = match result {
            Ok(Ok(())) => return FireOutcome::Fired,
            Ok(Err(err)) => err.to_string(),
            Err(join_err) if join_err.is_panic() => panic_message(join_err.into_panic()),
            Err(_) => "fire unit cancelled".to_string(),
        };

        let failure = TimerError::CallbackFailure {
            key,
            reason: reason.clone(),
        };
        tracing::error!("{}", failure);
        FireOutcome::CallbackFailed(reason)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("callback panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("callback panicked: {}", message)
    } else {
        "callback panicked".to_string()
    }
}
