use crate::tests::support::Fixture;
use crate::{Dispatch, FireOutcome, TimerError};
use std::time::Duration;

#[tokio::test]
async fn test_cancel_pending_timer() {
    let fx = Fixture::new();
    fx.registry.schedule(1, 42, Duration::from_millis(500)).unwrap();

    fx.registry.cancel(1, 42).unwrap();

    assert_eq!(fx.registry.pending_count(), 0);
    assert_eq!(fx.scheduler.cancels(), vec!["timer://1/42".to_string()]);

    // Stale notification is discarded (过期通知被丢弃)
    let dispatch = fx.registry.on_notification("timer://1/42").unwrap();
    assert!(matches!(dispatch, Dispatch::Stale));
    assert_eq!(fx.callback.fire_count(), 0);
    assert_eq!(fx.wake_lock.acquire_count(), 0);
}

#[tokio::test]
async fn test_cancel_unknown_timer_is_ok() {
    let fx = Fixture::new();

    let result = fx.registry.cancel(9, 9);

    assert!(result.is_ok());
    // The scheduler is still asked to cancel (仍然请求调度器取消)
    assert_eq!(fx.scheduler.cancels(), vec!["timer://9/9".to_string()]);
}

#[tokio::test]
async fn test_cancel_twice_is_idempotent() {
    let fx = Fixture::new();
    fx.registry.schedule(2, 2, Duration::from_secs(10)).unwrap();

    assert!(fx.registry.cancel(2, 2).is_ok());
    assert!(fx.registry.cancel(2, 2).is_ok());

    assert_eq!(fx.scheduler.cancels().len(), 2);
    assert_eq!(fx.wake_lock.acquire_count(), 0);
    assert_eq!(fx.wake_lock.holders(), 0);
}

#[tokio::test]
async fn test_cancel_wins_against_queued_fire_unit() {
    let fx = Fixture::new();
    fx.registry.schedule(3, 1, Duration::from_millis(100)).unwrap();

    // The notification passed the first presence check (通知已通过第一次存在性检查)
    let Dispatch::Spawned(job) = fx.registry.on_notification("timer://3/1").unwrap() else {
        panic!("Notification should dispatch");
    };
    assert!(fx.wake_lock.is_held());

    // Cancel lands before the fire unit runs (取消在触发单元运行前到达)
    fx.registry.cancel(3, 1).unwrap();

    assert_eq!(job.join().await, FireOutcome::Aborted);
    assert_eq!(fx.callback.fire_count(), 0);
    assert_eq!(fx.wake_lock.acquire_count(), 1);
    assert!(!fx.wake_lock.is_held());
}

#[tokio::test]
async fn test_last_operation_cancel_never_fires() {
    let sequences: [&[bool]; 5] = [
        &[true, false],
        &[true, true, false],
        &[true, false, true, false],
        &[false, true, false],
        &[true, false, false],
    ];

    for (i, sequence) in sequences.iter().enumerate() {
        let fx = Fixture::new();
        let timer_id = i as u32;
        for &schedule in sequence.iter() {
            if schedule {
                fx.registry.schedule(7, timer_id, Duration::from_millis(50)).unwrap();
            } else {
                fx.registry.cancel(7, timer_id).unwrap();
            }
        }

        let dispatch = fx.registry.on_notification(&format!("timer://7/{}", timer_id)).unwrap();
        assert!(matches!(dispatch, Dispatch::Stale), "sequence {:?} should not fire", sequence);
        assert_eq!(fx.callback.fire_count(), 0);
    }
}

#[tokio::test]
async fn test_cancel_then_reschedule_fires_once() {
    let fx = Fixture::new();
    fx.registry.schedule(4, 4, Duration::from_millis(50)).unwrap();
    fx.registry.cancel(4, 4).unwrap();
    fx.registry.schedule(4, 4, Duration::from_millis(50)).unwrap();

    let Dispatch::Spawned(job) = fx.registry.on_notification("timer://4/4").unwrap() else {
        panic!("Rescheduled timer should dispatch");
    };
    assert_eq!(job.join().await, FireOutcome::Fired);
    assert_eq!(fx.callback.fire_count(), 1);
}

#[tokio::test]
async fn test_cancel_after_shutdown_fails() {
    let fx = Fixture::new();
    fx.registry.shutdown();
    let cancels_before = fx.scheduler.cancels().len();

    assert_eq!(fx.registry.cancel(1, 1), Err(TimerError::NotInitialized));
    assert_eq!(fx.scheduler.cancels().len(), cancels_before);
}
