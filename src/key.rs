use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::TimerError;

/// Scheme and authority prefix of every wakeup notification payload
///
/// 每个唤醒通知载荷的协议前缀
const URI_PREFIX: &str = "timer://";

/// Global dispatch token generator
///
/// 全局派发令牌生成器
static NEXT_DISPATCH_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Composite timer key: `(heap_id, timer_id)`
///
/// The protocol engine identifies each timer by the heap that owns it and an
/// identifier unique within that heap.
///
/// 组合定时器键：`(heap_id, timer_id)`
///
/// 协议引擎通过所属的定时器堆和堆内唯一的标识符来识别每个定时器。
///
/// # Examples (示例)
///
/// ```
/// use kestrel_wakeup::TimerKey;
///
/// let key = TimerKey::new(1, 42);
/// assert_eq!(key.to_uri(), "timer://1/42");
/// assert_eq!("timer://1/42".parse::<TimerKey>().unwrap(), key);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerKey {
    heap_id: u32,
    timer_id: u32,
}

impl TimerKey {
    /// Create a key from its two components
    ///
    /// 由两个分量创建键
    #[inline]
    pub const fn new(heap_id: u32, timer_id: u32) -> Self {
        Self { heap_id, timer_id }
    }

    #[inline]
    pub const fn heap_id(&self) -> u32 {
        self.heap_id
    }

    #[inline]
    pub const fn timer_id(&self) -> u32 {
        self.timer_id
    }

    /// Pack the key into a single integer (`heap_id << 32 | timer_id`)
    ///
    /// 将键打包为单个整数（`heap_id << 32 | timer_id`）
    #[inline]
    pub const fn as_u64(&self) -> u64 {
        ((self.heap_id as u64) << 32) | self.timer_id as u64
    }

    /// Inverse of [`TimerKey::as_u64`]
    ///
    /// [`TimerKey::as_u64`] 的逆运算
    #[inline]
    pub const fn from_u64(packed: u64) -> Self {
        Self {
            heap_id: (packed >> 32) as u32,
            timer_id: packed as u32,
        }
    }

    /// Encode the key as a notification payload: `timer://<heap_id>/<timer_id>`
    ///
    /// 将键编码为通知载荷：`timer://<heap_id>/<timer_id>`
    pub fn to_uri(&self) -> String {
        format!("{}{}/{}", URI_PREFIX, self.heap_id, self.timer_id)
    }
}

impl fmt::Display for TimerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.heap_id, self.timer_id)
    }
}

impl FromStr for TimerKey {
    type Err = TimerError;

    /// Decode a `timer://<heap_id>/<timer_id>` payload
    ///
    /// Both segments must be plain decimal digits fitting in `u32`; signs,
    /// whitespace and extra path segments are rejected.
    ///
    /// 解码 `timer://<heap_id>/<timer_id>` 载荷
    ///
    /// 两个分段都必须是可以放入 `u32` 的十进制数字；符号、空白和额外的路径分段都会被拒绝。
    fn from_str(payload: &str) -> Result<Self, Self::Err> {
        let invalid = || TimerError::InvalidNotification {
            payload: payload.to_string(),
        };

        let rest = payload.strip_prefix(URI_PREFIX).ok_or_else(invalid)?;
        let (heap, timer) = rest.split_once('/').ok_or_else(invalid)?;

        Ok(Self {
            heap_id: parse_segment(heap).ok_or_else(invalid)?,
            timer_id: parse_segment(timer).ok_or_else(invalid)?,
        })
    }
}

fn parse_segment(segment: &str) -> Option<u32> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

/// Opaque token identifying one fire dispatch while it holds the wake lock
///
/// 标识一次触发派发（持有唤醒锁期间）的不透明令牌
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DispatchToken(u64);

impl DispatchToken {
    /// Mint a new process-unique token (internal use)
    ///
    /// 生成一个新的进程内唯一令牌（内部使用）
    #[inline]
    pub(crate) fn next() -> Self {
        DispatchToken(NEXT_DISPATCH_TOKEN.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}
