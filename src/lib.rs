//! # 唤醒定时器核心 (Wakeup Timer Core)
//!
//! 在异步、尽力而为的系统唤醒通知之上，为协议引擎提供单次触发、可取消且无竞争的定时器。
//! (Single-fire, cancellable, race-free timers for a protocol engine, built on top of
//! asynchronous, best-effort OS wakeup notifications)
//!
//! ## 特性 (Features)
//!
//! - **单次触发 (Single Fire)**: 每次调度最多调用一次回调
//!   (The fire callback runs at most once per schedule)
//! - **精确取消 (Exact Cancellation)**: 取消后到达的过期通知会被丢弃
//!   (Stale notifications arriving after a cancel are discarded)
//! - **唤醒锁配对 (Paired Wake Lock)**: 唤醒锁只在回调执行期间持有，错误路径同样释放
//!   (The wake lock is held only while a callback runs and is released on error paths too)
//! - **线程安全 (Thread-Safe)**: 使用 parking_lot 互斥锁保护等待表
//!   (The pending map is guarded by a parking_lot mutex)
//!
//! ## 快速开始 (Quick Start)
//!
//! ```no_run
//! use kestrel_wakeup::{
//!     notification_channel, CountedWakeLock, FireError, TimerConfig, TimerKey, TimerService,
//!     TokioWakeupScheduler,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (tx, rx) = notification_channel(256);
//!     let service = TimerService::create(
//!         rx,
//!         Arc::new(TokioWakeupScheduler::new(tx)?),
//!         Arc::new(CountedWakeLock::new()),
//!         Arc::new(|key: TimerKey| -> Result<(), FireError> {
//!             println!("timer {} fired", key);
//!             Ok(())
//!         }),
//!         TimerConfig::default(),
//!     )?;
//!
//!     // 500ms < 1s: 不唤醒休眠主机 (does not wake a suspended host)
//!     service.schedule(1, 42, Duration::from_millis(500))?;
//!     service.cancel(1, 42)?;
//!
//!     service.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## 架构说明 (Architecture)
//!
//! - **TimerRegistry**: 等待表以及 schedule / cancel / 触发派发 / shutdown
//!   (Pending map plus schedule / cancel / fire dispatch / shutdown)
//! - **TimerService**: 接收唤醒通知并交给注册表的 Actor
//!   (Actor receiving wakeup notifications and handing them to the registry)
//! - **WakeupScheduler / WakeLock / FireCallback**: 由嵌入方提供的外部协作者
//!   (External collaborators supplied by the embedder)
//!
//! 触发派发在通知上下文中检查一次键，在触发单元中再检查并移除一次，
//! 因此在两次检查之间到达的取消仍然生效。
//! (Fire dispatch checks the key once in the notification context and checks-and-removes it again
//! inside the fire unit, so a cancel landing between the two checks still wins.)

mod config;
mod error;
mod key;
mod registry;
mod service;
mod task;
mod wakelock;
mod wakeup;

#[cfg(test)]
mod tests;

// 重新导出公共 API (Re-export public API)
pub use config::{
    RegistryConfig, RegistryConfigBuilder,
    ServiceConfig, ServiceConfigBuilder,
    TimerConfig, TimerConfigBuilder,
    DEFAULT_WAKE_THRESHOLD,
};
pub use error::TimerError;
pub use key::{DispatchToken, TimerKey};
pub use registry::TimerRegistry;
pub use service::TimerService;
pub use task::{Dispatch, FireCallback, FireError, FireJob, FireOutcome, FireReport};
pub use wakelock::{CountedWakeLock, WakeLock};
pub use wakeup::{
    notification_channel, NotificationReceiver, NotificationSender, TokioWakeupScheduler,
    WakeClass, WakeupRequest, WakeupScheduler,
};
