use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashSet;

use crate::key::DispatchToken;

/// Wake Lock Trait
///
/// Keeps the host powered while at least one holder is registered. Holders are
/// identified by [`DispatchToken`]s so several fire dispatches can hold the lock
/// at the same time.
///
/// 唤醒锁特性：只要至少有一个持有者，主机就保持唤醒。持有者通过 [`DispatchToken`]
/// 标识，因此多个触发派发可以同时持有该锁。
pub trait WakeLock: Send + Sync + 'static {
    /// Register `token` as a holder
    ///
    /// 将 `token` 注册为持有者
    fn acquire(&self, token: DispatchToken);

    /// Drop `token` from the holders; unknown tokens are ignored
    ///
    /// 移除持有者 `token`；未知令牌将被忽略
    fn release(&self, token: DispatchToken);

    /// Forget every holder and let the host sleep
    ///
    /// 清除所有持有者并允许主机休眠
    fn reset_all(&self);
}

/// RAII guard pairing one [`WakeLock::acquire`] with exactly one [`WakeLock::release`]
///
/// The release happens on drop, so it also runs when the fire callback fails or
/// panics.
///
/// RAII 守卫，保证一次 acquire 恰好对应一次 release。释放发生在 drop 时，
/// 因此回调失败或 panic 时同样会执行。
pub(crate) struct WakeLockGuard {
    lock: Arc<dyn WakeLock>,
    token: DispatchToken,
}

impl WakeLockGuard {
    pub(crate) fn acquire(lock: Arc<dyn WakeLock>, token: DispatchToken) -> Self {
        lock.acquire(token);
        Self { lock, token }
    }

    #[inline]
    pub(crate) fn token(&self) -> DispatchToken {
        self.token
    }
}

impl Drop for WakeLockGuard {
    fn drop(&mut self) {
        self.lock.release(self.token);
    }
}

/// In-process reference-counted wake lock
///
/// The host lock counts as engaged while the holder set is non-empty. Embedders
/// that own a real power primitive can wrap this type and forward the
/// transitions reported by [`CountedWakeLock::is_held`].
///
/// 进程内引用计数唤醒锁：持有者集合非空时视为已持有主机锁。
#[derive(Default)]
pub struct CountedWakeLock {
    holders: Mutex<FxHashSet<DispatchToken>>,
    acquire_count: AtomicU64,
}

impl CountedWakeLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tokens currently holding the lock
    ///
    /// 当前持有锁的令牌数量
    pub fn holders(&self) -> usize {
        self.holders.lock().len()
    }

    pub fn is_held(&self) -> bool {
        !self.holders.lock().is_empty()
    }

    /// Total number of acquisitions since creation
    ///
    /// 自创建以来的累计获取次数
    pub fn acquire_count(&self) -> u64 {
        self.acquire_count.load(Ordering::Relaxed)
    }
}

impl WakeLock for CountedWakeLock {
    fn acquire(&self, token: DispatchToken) {
        self.acquire_count.fetch_add(1, Ordering::Relaxed);
        let mut holders = self.holders.lock();
        if holders.is_empty() {
            tracing::debug!(token = token.as_u64(), "host wake lock engaged");
        }
        holders.insert(token);
    }

    fn release(&self, token: DispatchToken) {
        let mut holders = self.holders.lock();
        if holders.remove(&token) && holders.is_empty() {
            tracing::debug!(token = token.as_u64(), "host wake lock released");
        }
    }

    fn reset_all(&self) {
        let mut holders = self.holders.lock();
        if !holders.is_empty() {
            tracing::debug!(holders = holders.len(), "host wake lock reset");
        }
        holders.clear();
    }
}
