use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::TimerError;
use crate::key::TimerKey;

/// Wakeup class of a notification request
///
/// 通知请求的唤醒类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WakeClass {
    /// Elapsed-time notification that need not wake a suspended host
    ///
    /// 基于流逝时间的通知，无需唤醒休眠中的主机
    Elapsed,
    /// Elapsed-time notification that must wake the host even if suspended
    ///
    /// 基于流逝时间的通知，即使主机休眠也必须唤醒
    ElapsedWakeup,
}

impl WakeClass {
    /// Pick the class for `delay` given the registry's wake threshold
    ///
    /// 根据注册表的唤醒阈值为 `delay` 选择类别
    #[inline]
    pub fn for_delay(delay: Duration, wake_threshold: Duration) -> Self {
        if delay < wake_threshold {
            WakeClass::Elapsed
        } else {
            WakeClass::ElapsedWakeup
        }
    }

    #[inline]
    pub fn wakes_host(&self) -> bool {
        matches!(self, WakeClass::ElapsedWakeup)
    }
}

/// A notification request handed to the [`WakeupScheduler`]
///
/// 交给 [`WakeupScheduler`] 的通知请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeupRequest {
    /// Timer the notification belongs to (通知所属的定时器)
    pub key: TimerKey,
    /// Encoded payload delivered back with the notification (随通知返回的编码载荷)
    pub payload: String,
    /// Monotonic delay before delivery (投递前的单调延迟)
    pub delay: Duration,
    /// Wakeup class (唤醒类别)
    pub class: WakeClass,
}

impl WakeupRequest {
    pub(crate) fn new(key: TimerKey, delay: Duration, wake_threshold: Duration) -> Self {
        Self {
            key,
            payload: key.to_uri(),
            delay,
            class: WakeClass::for_delay(delay, wake_threshold),
        }
    }
}

/// Wakeup Scheduler Trait
///
/// Abstraction over the OS alarm service. A request for a payload that is
/// already scheduled replaces the earlier one. Delivery is asynchronous and
/// at-least-once-or-never: a notification may still arrive after it was
/// cancelled if it was already in flight.
///
/// Methods are called while the registry lock is held and must not call back
/// into the registry synchronously.
///
/// 唤醒调度器特性：对系统闹钟服务的抽象。为已调度的载荷再次请求会替换之前的请求。
/// 投递是异步的，可能在取消后仍然到达。方法在持有注册表锁时调用，不得同步重入注册表。
pub trait WakeupScheduler: Send + Sync + 'static {
    /// Ask for `request.payload` to be delivered after `request.delay`
    ///
    /// 请求在 `request.delay` 之后投递 `request.payload`
    fn request_notification(&self, request: &WakeupRequest);

    /// Drop any pending notification carrying `payload`
    ///
    /// 丢弃携带 `payload` 的待投递通知
    fn cancel_notification(&self, payload: &str);

    /// Stop delivering notifications to this process
    ///
    /// 停止向本进程投递通知
    fn detach(&self) -> Result<(), TimerError> {
        Ok(())
    }
}

/// Create the delivery path for wakeup notifications
///
/// 创建唤醒通知的投递通道
pub fn notification_channel(capacity: usize) -> (NotificationSender, NotificationReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (NotificationSender(tx), NotificationReceiver(rx))
}

/// Sending half of the notification delivery path
///
/// 通知投递通道的发送端
#[derive(Debug, Clone)]
pub struct NotificationSender(mpsc::Sender<String>);

impl NotificationSender {
    /// Deliver a payload, waiting for channel capacity
    ///
    /// 投递载荷，通道满时等待
    pub async fn deliver(&self, payload: String) -> Result<(), TimerError> {
        self.0.send(payload).await.map_err(|_| TimerError::NotInitialized)
    }

    /// Deliver a payload without waiting
    ///
    /// 不等待地投递载荷
    pub fn try_deliver(&self, payload: String) -> Result<(), TimerError> {
        self.0.try_send(payload).map_err(|_| TimerError::NotInitialized)
    }
}

/// Receiving half of the notification delivery path, consumed by `TimerService`
///
/// 通知投递通道的接收端，由 `TimerService` 消费
#[derive(Debug)]
pub struct NotificationReceiver(pub(crate) mpsc::Receiver<String>);

struct Sleeper {
    generation: u64,
    class: WakeClass,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct SchedulerState {
    sleepers: FxHashMap<String, Sleeper>,
    next_generation: u64,
    detached: bool,
}

/// In-process wakeup scheduler backed by tokio timers
///
/// One sleeping task per payload. Tokio cannot wake a suspended host, so the
/// requested [`WakeClass`] is only recorded.
///
/// 基于 tokio 定时器的进程内唤醒调度器。每个载荷一个休眠任务。
/// tokio 无法唤醒休眠的主机，因此只记录请求的 [`WakeClass`]。
///
/// # Examples (示例)
/// ```no_run
/// use kestrel_wakeup::{notification_channel, TokioWakeupScheduler};
///
/// #[tokio::main]
/// async fn main() {
///     let (tx, _rx) = notification_channel(64);
///     let scheduler = TokioWakeupScheduler::new(tx).unwrap();
///     assert_eq!(scheduler.pending_requests(), 0);
/// }
/// ```
pub struct TokioWakeupScheduler {
    sender: NotificationSender,
    runtime: Handle,
    state: Arc<Mutex<SchedulerState>>,
}

impl TokioWakeupScheduler {
    /// Create a scheduler delivering into `sender`; must be called inside a tokio runtime
    ///
    /// 创建一个向 `sender` 投递的调度器；必须在 tokio 运行时内调用
    pub fn new(sender: NotificationSender) -> Result<Self, TimerError> {
        let runtime = Handle::try_current().map_err(|_| TimerError::RuntimeUnavailable)?;
        Ok(Self {
            sender,
            runtime,
            state: Arc::new(Mutex::new(SchedulerState::default())),
        })
    }

    /// Number of notifications waiting to be delivered
    ///
    /// 等待投递的通知数量
    pub fn pending_requests(&self) -> usize {
        self.state.lock().sleepers.len()
    }

    /// Wakeup class requested for `payload`, if still pending
    ///
    /// `payload` 的请求唤醒类别（如果仍在等待）
    pub fn requested_class(&self, payload: &str) -> Option<WakeClass> {
        self.state.lock().sleepers.get(payload).map(|s| s.class)
    }
}

impl WakeupScheduler for TokioWakeupScheduler {
    fn request_notification(&self, request: &WakeupRequest) {
        let mut state = self.state.lock();
        if state.detached {
            tracing::warn!(payload = %request.payload, "wakeup scheduler detached, request dropped");
            return;
        }

        let generation = state.next_generation;
        state.next_generation = state.next_generation.wrapping_add(1);

        let payload = request.payload.clone();
        let delay = request.delay;
        let sender = self.sender.clone();
        let shared = Arc::clone(&self.state);
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;

            {
                let mut state = shared.lock();
                if state.sleepers.get(&payload).map(|s| s.generation) == Some(generation) {
                    state.sleepers.remove(&payload);
                }
            }

            if sender.deliver(payload.clone()).await.is_err() {
                tracing::debug!(payload = %payload, "no receiver for wakeup notification");
            }
        });

        tracing::trace!(
            payload = %request.payload,
            delay_ms = delay.as_millis() as u64,
            wakes_host = request.class.wakes_host(),
            "wakeup requested"
        );

        let replaced = state.sleepers.insert(
            request.payload.clone(),
            Sleeper {
                generation,
                class: request.class,
                handle,
            },
        );
        if let Some(previous) = replaced {
            previous.handle.abort();
        }
    }

    fn cancel_notification(&self, payload: &str) {
        if let Some(sleeper) = self.state.lock().sleepers.remove(payload) {
            sleeper.handle.abort();
        }
    }

    fn detach(&self) -> Result<(), TimerError> {
        let mut state = self.state.lock();
        if state.detached {
            return Err(TimerError::ReceiverTeardownFailure {
                reason: "receiver is not registered".to_string(),
            });
        }
        state.detached = true;
        for (_, sleeper) in state.sleepers.drain() {
            sleeper.handle.abort();
        }
        Ok(())
    }
}

impl Drop for TokioWakeupScheduler {
    fn drop(&mut self) {
        for (_, sleeper) in self.state.lock().sleepers.drain() {
            sleeper.handle.abort();
        }
    }
}
