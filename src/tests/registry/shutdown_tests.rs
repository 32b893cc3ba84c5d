use crate::key::DispatchToken;
use crate::tests::support::{CallbackMode, Fixture, RecordingScheduler, SchedulerEvent};
use crate::{Dispatch, FireOutcome, RegistryConfig, TimerError, WakeLock};
use std::time::Duration;

#[tokio::test]
async fn test_shutdown_drains_pending_timers() {
    let fx = Fixture::new();
    fx.registry.schedule(1, 1, Duration::from_millis(100)).unwrap();
    fx.registry.schedule(1, 2, Duration::from_secs(5)).unwrap();
    fx.registry.schedule(2, 1, Duration::from_secs(60)).unwrap();

    fx.registry.shutdown();

    assert!(!fx.registry.is_initialized());
    assert_eq!(fx.registry.pending_count(), 0);

    let events = fx.scheduler.events();
    let detach_at = events
        .iter()
        .position(|e| *e == SchedulerEvent::Detached)
        .expect("Receiver should be detached");
    let mut cancels = fx.scheduler.cancels();
    cancels.sort();
    assert_eq!(cancels, vec!["timer://1/1", "timer://1/2", "timer://2/1"]);
    // Detach happens before the drain (分离发生在清空之前)
    assert!(events[detach_at + 1..]
        .iter()
        .all(|e| matches!(e, SchedulerEvent::Cancelled(_))));
}

#[tokio::test]
async fn test_notification_after_shutdown_is_ignored() {
    let fx = Fixture::new();
    fx.registry.schedule(2, 7, Duration::from_secs(5)).unwrap();
    fx.registry.shutdown();

    let result = fx.registry.on_notification("timer://2/7");

    assert!(matches!(result, Err(TimerError::NotInitialized)));
    assert_eq!(fx.callback.fire_count(), 0);
    assert_eq!(fx.wake_lock.acquire_count(), 0);
}

#[tokio::test]
async fn test_queued_fire_unit_aborts_after_shutdown() {
    let fx = Fixture::new();
    fx.registry.schedule(3, 3, Duration::from_millis(100)).unwrap();

    let Dispatch::Spawned(job) = fx.registry.on_notification("timer://3/3").unwrap() else {
        panic!("Pending timer should dispatch");
    };
    fx.registry.shutdown();

    assert_eq!(job.join().await, FireOutcome::Aborted);
    assert_eq!(fx.callback.fire_count(), 0);
    assert!(!fx.wake_lock.is_held());
}

#[tokio::test]
async fn test_queued_fire_unit_waiting_for_permit_aborts_after_shutdown() {
    let config = RegistryConfig::builder()
        .max_in_flight_fires(Some(1))
        .build()
        .unwrap();
    let fx = Fixture::with(RecordingScheduler::default(), CallbackMode::Succeed, config);
    fx.registry.schedule(3, 4, Duration::from_millis(100)).unwrap();

    let Dispatch::Spawned(job) = fx.registry.on_notification("timer://3/4").unwrap() else {
        panic!("Pending timer should dispatch");
    };
    fx.registry.shutdown();

    assert_eq!(job.join().await, FireOutcome::Aborted);
    assert_eq!(fx.callback.fire_count(), 0);
}

#[tokio::test]
async fn test_shutdown_resets_wake_lock() {
    let fx = Fixture::new();
    // A holder left behind by accounting drift (计数漂移遗留的持有者)
    fx.wake_lock.acquire(DispatchToken::next());
    assert!(fx.wake_lock.is_held());

    fx.registry.shutdown();

    assert!(!fx.wake_lock.is_held());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_with_callback_in_flight() {
    let fx = Fixture::with_mode(CallbackMode::Sleep(Duration::from_millis(100)));
    fx.registry.schedule(5, 5, Duration::from_millis(10)).unwrap();

    let Dispatch::Spawned(job) = fx.registry.on_notification("timer://5/5").unwrap() else {
        panic!("Pending timer should dispatch");
    };

    // Wait until the callback is running (等待回调开始运行)
    tokio::time::timeout(Duration::from_secs(1), async {
        while fx.callback.fire_count() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("Callback should start");

    fx.registry.shutdown();
    assert!(!fx.wake_lock.is_held());

    // The running callback completes; its late release is a no-op
    // 运行中的回调正常完成；其延迟释放不产生影响
    assert_eq!(job.join().await, FireOutcome::Fired);
    assert_eq!(fx.wake_lock.holders(), 0);
}

#[tokio::test]
async fn test_detach_failure_does_not_stop_shutdown() {
    let fx = Fixture::with(
        RecordingScheduler::failing_detach(),
        CallbackMode::Succeed,
        RegistryConfig::default(),
    );
    fx.registry.schedule(6, 1, Duration::from_secs(5)).unwrap();

    fx.registry.shutdown();

    assert!(!fx.registry.is_initialized());
    assert_eq!(fx.scheduler.cancels(), vec!["timer://6/1".to_string()]);
}

#[tokio::test]
async fn test_shutdown_twice_is_harmless() {
    let fx = Fixture::new();
    fx.registry.schedule(7, 1, Duration::from_secs(5)).unwrap();

    fx.registry.shutdown();
    fx.registry.shutdown();

    let detaches = fx
        .scheduler
        .events()
        .iter()
        .filter(|e| **e == SchedulerEvent::Detached)
        .count();
    assert_eq!(detaches, 1);
    assert_eq!(fx.scheduler.cancels().len(), 1);
}
