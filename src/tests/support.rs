// Recording collaborators shared by the registry tests
//
// 注册表测试共用的记录型协作者

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::{
    CountedWakeLock, FireCallback, FireError, RegistryConfig, TimerError, TimerKey,
    TimerRegistry, WakeupRequest, WakeupScheduler,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    Requested(WakeupRequest),
    Cancelled(String),
    Detached,
}

/// Scheduler that only records what it was asked to do
///
/// 只记录调用的调度器
#[derive(Default)]
pub struct RecordingScheduler {
    events: Mutex<Vec<SchedulerEvent>>,
    fail_detach: bool,
}

impl RecordingScheduler {
    pub fn failing_detach() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail_detach: true,
        }
    }

    pub fn events(&self) -> Vec<SchedulerEvent> {
        self.events.lock().clone()
    }

    pub fn requests(&self) -> Vec<WakeupRequest> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SchedulerEvent::Requested(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn cancels(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SchedulerEvent::Cancelled(p) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }
}

impl WakeupScheduler for RecordingScheduler {
    fn request_notification(&self, request: &WakeupRequest) {
        self.events.lock().push(SchedulerEvent::Requested(request.clone()));
    }

    fn cancel_notification(&self, payload: &str) {
        self.events.lock().push(SchedulerEvent::Cancelled(payload.to_string()));
    }

    fn detach(&self) -> Result<(), TimerError> {
        self.events.lock().push(SchedulerEvent::Detached);
        if self.fail_detach {
            Err(TimerError::ReceiverTeardownFailure {
                reason: "receiver not registered".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

pub enum CallbackMode {
    Succeed,
    Fail,
    Panic,
    Sleep(Duration),
}

/// Fire callback that records every invocation
///
/// 记录每次调用的触发回调
pub struct RecordingCallback {
    mode: CallbackMode,
    fired: Mutex<Vec<TimerKey>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl RecordingCallback {
    pub fn new(mode: CallbackMode) -> Self {
        Self {
            mode,
            fired: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn fired(&self) -> Vec<TimerKey> {
        self.fired.lock().clone()
    }

    pub fn fire_count(&self) -> usize {
        self.fired.lock().len()
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

impl FireCallback for RecordingCallback {
    fn fire(&self, key: TimerKey) -> Result<(), FireError> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        self.fired.lock().push(key);

        let result = match &self.mode {
            CallbackMode::Succeed => Ok(()),
            CallbackMode::Fail => Err(FireError::from("native error")),
            CallbackMode::Panic => {
                self.active.fetch_sub(1, Ordering::SeqCst);
                panic!("native crash");
            }
            CallbackMode::Sleep(duration) => {
                std::thread::sleep(*duration);
                Ok(())
            }
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

pub struct Fixture {
    pub registry: TimerRegistry,
    pub scheduler: Arc<RecordingScheduler>,
    pub wake_lock: Arc<CountedWakeLock>,
    pub callback: Arc<RecordingCallback>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with(
            RecordingScheduler::default(),
            CallbackMode::Succeed,
            RegistryConfig::default(),
        )
    }

    pub fn with_mode(mode: CallbackMode) -> Self {
        Self::with(RecordingScheduler::default(), mode, RegistryConfig::default())
    }

    pub fn with(scheduler: RecordingScheduler, mode: CallbackMode, config: RegistryConfig) -> Self {
        let scheduler = Arc::new(scheduler);
        let wake_lock = Arc::new(CountedWakeLock::new());
        let callback = Arc::new(RecordingCallback::new(mode));
        let registry = TimerRegistry::new(
            scheduler.clone(),
            wake_lock.clone(),
            callback.clone(),
            config,
        )
        .expect("Registry should be created inside a runtime");

        Self {
            registry,
            scheduler,
            wake_lock,
            callback,
        }
    }
}
