use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::{ServiceConfig, TimerConfig};
use crate::error::TimerError;
use crate::registry::TimerRegistry;
use crate::task::{Dispatch, FireCallback, FireReport};
use crate::wakelock::WakeLock;
use crate::wakeup::{NotificationReceiver, WakeupScheduler};

/// TimerService - 基于 Actor 模式的定时器服务
/// (TimerService - timer service based on Actor pattern)
///
/// 拥有一个 [`TimerRegistry`]，并运行接收唤醒通知的 Actor：每个载荷都交给
/// [`TimerRegistry::on_notification`]，派发结果再转发到报告通道。
/// (Owns a [`TimerRegistry`] and runs the actor that receives wakeup notifications: every payload
/// goes to [`TimerRegistry::on_notification`] and dispatch outcomes are forwarded to a report channel.)
///
/// # 特性 (Features)
/// - 通知路径从不等待回调执行
///      (The notification path never waits for a callback)
/// - 派发结果通过 `take_receiver()` 获取，通道满时丢弃
///      (Dispatch outcomes are available through `take_receiver()`, dropped when the channel is full)
/// - `shutdown()` 取消所有等待中的定时器并停止 Actor
///      (`shutdown()` cancels every pending timer and stops the actor)
///
/// # 示例 (Examples)
/// ```no_run
/// use kestrel_wakeup::{
///     notification_channel, CountedWakeLock, FireError, TimerConfig, TimerKey, TimerService,
///     TokioWakeupScheduler,
/// };
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = TimerConfig::default();
///     let (tx, rx) = notification_channel(config.service.notification_channel_capacity);
///
///     let mut service = TimerService::create(
///         rx,
///         Arc::new(TokioWakeupScheduler::new(tx)?),
///         Arc::new(CountedWakeLock::new()),
///         Arc::new(|key: TimerKey| -> Result<(), FireError> {
///             println!("timer {} fired", key);
///             Ok(())
///         }),
///         config,
///     )?;
///
///     service.schedule(2, 7, Duration::from_millis(100))?;
///
///     let mut reports = service.take_receiver().unwrap();
///     if let Some(report) = reports.recv().await {
///         println!("{:?}", report);
///     }
///
///     service.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct TimerService {
    /// 注册表
    registry: TimerRegistry,
    /// 报告接收端
    report_rx: Option<mpsc::Receiver<FireReport>>,
    /// Actor 任务句柄
    actor_handle: Option<JoinHandle<()>>,
    /// Actor 关闭信号发送端
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl TimerService {
    /// 启动服务，接收 `receiver` 上的通知并交给 `registry`
    /// (Start the service, feeding notifications from `receiver` into `registry`)
    pub fn start(receiver: NotificationReceiver, registry: TimerRegistry, config: ServiceConfig) -> Self {
        let (report_tx, report_rx) = mpsc::channel(config.report_channel_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let actor = ServiceActor {
            registry: registry.clone(),
            notification_rx: receiver.0,
            report_tx,
            shutdown_rx,
        };
        let actor_handle = registry.runtime().spawn(async move {
            actor.run().await;
        });

        Self {
            registry,
            report_rx: Some(report_rx),
            actor_handle: Some(actor_handle),
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// 创建注册表并启动服务（`create()`）
    /// (Create the registry and start the service)
    ///
    /// # 返回 (Returns)
    /// - `Err(TimerError::RuntimeUnavailable)`: 当前线程没有 tokio 运行时
    ///      (No tokio runtime on the calling thread)
    pub fn create(
        receiver: NotificationReceiver,
        scheduler: Arc<dyn WakeupScheduler>,
        wake_lock: Arc<dyn WakeLock>,
        callback: Arc<dyn FireCallback>,
        config: TimerConfig,
    ) -> Result<Self, TimerError> {
        let registry = TimerRegistry::new(scheduler, wake_lock, callback, config.registry)?;
        Ok(Self::start(receiver, registry, config.service))
    }

    /// 获取注册表引用 (Get registry reference)
    #[inline]
    pub fn registry(&self) -> &TimerRegistry {
        &self.registry
    }

    /// 调度定时器 (Schedule a timer)
    #[inline]
    pub fn schedule(&self, heap_id: u32, timer_id: u32, delay: Duration) -> Result<(), TimerError> {
        self.registry.schedule(heap_id, timer_id, delay)
    }

    /// 取消定时器 (Cancel a timer)
    #[inline]
    pub fn cancel(&self, heap_id: u32, timer_id: u32) -> Result<(), TimerError> {
        self.registry.cancel(heap_id, timer_id)
    }

    /// 获取派发报告接收器（转移所有权）
    ///  (Get dispatch report receiver, transfer ownership)
    ///
    /// # 注意 (Notes)
    /// 此方法只能调用一次，因为它会转移接收器的所有权
    ///  (This method can only be called once, because it transfers ownership of the receiver)
    pub fn take_receiver(&mut self) -> Option<mpsc::Receiver<FireReport>> {
        self.report_rx.take()
    }

    /// 关闭服务（`destroy()`）：关闭注册表，然后停止 Actor
    /// (Shut down the service: shut the registry down, then stop the actor)
    pub async fn shutdown(mut self) {
        self.registry.shutdown();

        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(handle) = self.actor_handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TimerService {
    fn drop(&mut self) {
        if let Some(handle) = self.actor_handle.take() {
            handle.abort();
        }
    }
}

/// ServiceActor - 内部 Actor 实现
/// (ServiceActor - internal Actor implementation)
struct ServiceActor {
    registry: TimerRegistry,
    /// 通知接收端
    notification_rx: mpsc::Receiver<String>,
    /// 报告发送端
    report_tx: mpsc::Sender<FireReport>,
    /// Actor 关闭信号接收端
    shutdown_rx: oneshot::Receiver<()>,
}

impl ServiceActor {
    async fn run(self) {
        let ServiceActor {
            registry,
            mut notification_rx,
            report_tx,
            mut shutdown_rx,
        } = self;

        // 使用 FuturesUnordered 来等待所有运行中的触发单元
        // (Use FuturesUnordered to await every running fire unit)
        let mut jobs: FuturesUnordered<BoxFuture<'static, FireReport>> = FuturesUnordered::new();

        loop {
            tokio::select! {
                // 监听高优先级的关闭信号
                // (Listen to high-priority shutdown signal)
                _ = &mut shutdown_rx => {
                    break;
                }

                // 触发单元结束，转发报告
                // (A fire unit finished, forward its report)
                Some(report) = jobs.next() => {
                    if let Err(TrySendError::Full(report)) = report_tx.try_send(report) {
                        tracing::debug!(key = %report.key, "report channel full, fire report dropped");
                    }
                }

                // 监听唤醒通知
                // (Listen to wakeup notifications)
                Some(payload) = notification_rx.recv() => {
                    // 错误已在注册表中记录 (Errors are already logged by the registry)
                    if let Ok(Dispatch::Spawned(job)) = registry.on_notification(&payload) {
                        jobs.push(Box::pin(job.into_report()));
                    }
                }

                // 没有运行中的单元且通知通道已关闭，退出循环
                // (No running units and notification channel closed, exit loop)
                else => {
                    break;
                }
            }
        }
    }
}
