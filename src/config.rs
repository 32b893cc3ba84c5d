//! 定时器配置模块 (Timer Configuration Module)
//!
//! 提供分层的配置结构和 Builder 模式，用于配置注册表的唤醒策略、并发上限以及服务的通道容量。
//! (Provides hierarchical configuration structure and Builder pattern for configuring the registry's
//! wakeup policy, concurrency cap, and the service's channel capacities)

use crate::error::TimerError;
use std::time::Duration;

/// 默认唤醒阈值：低于该延迟的定时器不会唤醒休眠中的主机
/// (Default wake threshold: timers shorter than this do not wake a suspended host)
pub const DEFAULT_WAKE_THRESHOLD: Duration = Duration::from_millis(1000);

/// 注册表配置 (Registry Configuration)
///
/// # 示例 (Examples)
/// ```no_run
/// use kestrel_wakeup::RegistryConfig;
/// use std::time::Duration;
///
/// // 使用默认配置 (Use default configuration)
/// let config = RegistryConfig::default();
///
/// // 使用 Builder 自定义配置 (Use Builder to customize configuration)
/// let config = RegistryConfig::builder()
///     .wake_threshold(Duration::from_millis(500))
///     .max_in_flight_fires(Some(8))
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// 延迟小于此值时请求不唤醒主机的通知
    /// (Delays below this value request a notification that need not wake the host)
    pub wake_threshold: Duration,
    /// 同时执行中的触发回调上限，`None` 表示不限制
    /// (Cap on concurrently running fire callbacks, `None` means unbounded)
    pub max_in_flight_fires: Option<usize>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            wake_threshold: DEFAULT_WAKE_THRESHOLD,
            max_in_flight_fires: None,
        }
    }
}

impl RegistryConfig {
    /// 创建配置构建器 (Create configuration builder)
    pub fn builder() -> RegistryConfigBuilder {
        RegistryConfigBuilder::default()
    }
}

/// 注册表配置构建器 (Registry Configuration Builder)
#[derive(Debug, Clone)]
pub struct RegistryConfigBuilder {
    wake_threshold: Duration,
    max_in_flight_fires: Option<usize>,
}

impl Default for RegistryConfigBuilder {
    fn default() -> Self {
        let config = RegistryConfig::default();
        Self {
            wake_threshold: config.wake_threshold,
            max_in_flight_fires: config.max_in_flight_fires,
        }
    }
}

impl RegistryConfigBuilder {
    /// 设置唤醒阈值 (Set wake threshold)
    pub fn wake_threshold(mut self, threshold: Duration) -> Self {
        self.wake_threshold = threshold;
        self
    }

    /// 设置并发触发上限 (Set concurrent fire cap)
    pub fn max_in_flight_fires(mut self, cap: Option<usize>) -> Self {
        self.max_in_flight_fires = cap;
        self
    }

    /// 构建配置并进行验证
    ///      (Build and validate configuration)
    ///
    /// # 验证规则 (Validation Rules)
    /// - 并发触发上限如果设置，必须大于 0
    ///      (Concurrent fire cap, when set, must be greater than 0)
    pub fn build(self) -> Result<RegistryConfig, TimerError> {
        if self.max_in_flight_fires == Some(0) {
            return Err(TimerError::InvalidConfiguration {
                field: "max_in_flight_fires".to_string(),
                reason: "并发触发上限必须大于 0".to_string(),
            });
        }

        Ok(RegistryConfig {
            wake_threshold: self.wake_threshold,
            max_in_flight_fires: self.max_in_flight_fires,
        })
    }
}

/// 服务配置 (Service Configuration)
///
/// 用于配置 TimerService 的通道容量。
/// (Configuration for TimerService channel capacities)
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// 通知通道容量 (Notification channel capacity)
    pub notification_channel_capacity: usize,
    /// 触发报告通道容量 (Fire report channel capacity)
    pub report_channel_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            notification_channel_capacity: 256,
            report_channel_capacity: 1024,
        }
    }
}

impl ServiceConfig {
    /// 创建配置构建器 (Create configuration builder)
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }
}

/// 服务配置构建器 (Service Configuration Builder)
#[derive(Debug, Clone)]
pub struct ServiceConfigBuilder {
    notification_channel_capacity: usize,
    report_channel_capacity: usize,
}

impl Default for ServiceConfigBuilder {
    fn default() -> Self {
        let config = ServiceConfig::default();
        Self {
            notification_channel_capacity: config.notification_channel_capacity,
            report_channel_capacity: config.report_channel_capacity,
        }
    }
}

impl ServiceConfigBuilder {
    /// 设置通知通道容量 (Set notification channel capacity)
    pub fn notification_channel_capacity(mut self, capacity: usize) -> Self {
        self.notification_channel_capacity = capacity;
        self
    }

    /// 设置触发报告通道容量 (Set fire report channel capacity)
    pub fn report_channel_capacity(mut self, capacity: usize) -> Self {
        self.report_channel_capacity = capacity;
        self
    }

    /// 构建配置并进行验证
    ///      (Build and validate configuration)
    ///
    /// # 验证规则 (Validation Rules)
    /// - 所有通道容量必须大于 0
    ///      (All channel capacities must be greater than 0)
    pub fn build(self) -> Result<ServiceConfig, TimerError> {
        if self.notification_channel_capacity == 0 {
            return Err(TimerError::InvalidConfiguration {
                field: "notification_channel_capacity".to_string(),
                reason: "通知通道容量必须大于 0".to_string(),
            });
        }

        if self.report_channel_capacity == 0 {
            return Err(TimerError::InvalidConfiguration {
                field: "report_channel_capacity".to_string(),
                reason: "触发报告通道容量必须大于 0".to_string(),
            });
        }

        Ok(ServiceConfig {
            notification_channel_capacity: self.notification_channel_capacity,
            report_channel_capacity: self.report_channel_capacity,
        })
    }
}

/// 顶层定时器配置 (Top-level Timer Configuration)
///
/// # 示例 (Examples)
/// ```no_run
/// use kestrel_wakeup::TimerConfig;
/// use std::time::Duration;
///
/// let config = TimerConfig::builder()
///     .wake_threshold(Duration::from_secs(2))
///     .notification_channel_capacity(64)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct TimerConfig {
    /// 注册表配置 (Registry configuration)
    pub registry: RegistryConfig,
    /// 服务配置 (Service configuration)
    pub service: ServiceConfig,
}

impl TimerConfig {
    /// 创建配置构建器 (Create configuration builder)
    pub fn builder() -> TimerConfigBuilder {
        TimerConfigBuilder::default()
    }
}

/// 顶层定时器配置构建器 (Top-level Timer Configuration Builder)
#[derive(Debug, Default)]
pub struct TimerConfigBuilder {
    registry_builder: RegistryConfigBuilder,
    service_builder: ServiceConfigBuilder,
}

impl TimerConfigBuilder {
    /// 设置唤醒阈值 (Set wake threshold)
    pub fn wake_threshold(mut self, threshold: Duration) -> Self {
        self.registry_builder = self.registry_builder.wake_threshold(threshold);
        self
    }

    /// 设置并发触发上限 (Set concurrent fire cap)
    pub fn max_in_flight_fires(mut self, cap: Option<usize>) -> Self {
        self.registry_builder = self.registry_builder.max_in_flight_fires(cap);
        self
    }

    /// 设置通知通道容量 (Set notification channel capacity)
    pub fn notification_channel_capacity(mut self, capacity: usize) -> Self {
        self.service_builder = self.service_builder.notification_channel_capacity(capacity);
        self
    }

    /// 设置触发报告通道容量 (Set fire report channel capacity)
    pub fn report_channel_capacity(mut self, capacity: usize) -> Self {
        self.service_builder = self.service_builder.report_channel_capacity(capacity);
        self
    }

    /// 构建配置并进行验证
    ///      (Build and validate configuration)
    pub fn build(self) -> Result<TimerConfig, TimerError> {
        Ok(TimerConfig {
            registry: self.registry_builder.build()?,
            service: self.service_builder.build()?,
        })
    }
}
