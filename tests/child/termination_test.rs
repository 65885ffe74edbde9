//! Closing children: graceful signal, escalation, and group cleanup.

use std::time::{Duration, Instant};

use childsieve::child::{ChildEvent, SupervisedChild};
use childsieve::config::GracefulSignal;
use nix::sys::signal::Signal;
use tokio::sync::oneshot;

use super::{live_group_members, quiet_config};

/// Ignores SIGTERM and HUP and leaves a grandchild doing the same.
const STUBBORN: &str = r#"trap '' TERM HUP; sh -c "trap '' TERM HUP; while :; do sleep 1; done" & while :; do sleep 1; done"#;

async fn wait_for_group_gone(pgid: u32) -> Vec<u32> {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        let live = live_group_members(pgid);
        if live.is_empty() || Instant::now() >= deadline {
            return live;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn graceful_signal_terminates_direct_child() {
    let config = quiet_config()
        .with_shell(false)
        .with_cleanup_timeout(Duration::from_secs(5));
    let child = SupervisedChild::spawn("sleep 30", config).unwrap();

    let started = Instant::now();
    let info = child.close().await.unwrap();

    assert_eq!(info.signal, Some(Signal::SIGTERM));
    assert_eq!(info.exit_code(), 128 + Signal::SIGTERM as i32);
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn configured_graceful_signal_is_used() {
    let config = quiet_config()
        .with_shell(false)
        .with_graceful_signal(GracefulSignal::Hup)
        .with_cleanup_timeout(Duration::from_secs(5));
    let child = SupervisedChild::spawn("sleep 30", config).unwrap();

    let info = child.close().await.unwrap();
    assert_eq!(info.signal, Some(Signal::SIGHUP));
}

#[tokio::test]
async fn stubborn_group_is_killed_after_timeout() {
    let timeout = Duration::from_millis(200);
    let config = quiet_config().with_cleanup_timeout(timeout);
    let mut child = SupervisedChild::spawn(STUBBORN, config).unwrap();
    let pgid = child.pid();

    // Let the shell install its traps and start the grandchild.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(live_group_members(pgid).len() >= 2);

    let started = Instant::now();
    let info = tokio::time::timeout(Duration::from_secs(5), child.close())
        .await
        .unwrap()
        .unwrap();

    assert!(started.elapsed() >= timeout);
    assert_eq!(info.signal, Some(Signal::SIGKILL));
    assert!(wait_for_group_gone(pgid).await.is_empty());

    let events = child.take_events().unwrap().collect_all().await;
    assert!(matches!(events.last(), Some(ChildEvent::Exit(i)) if *i == info));
}

#[tokio::test]
async fn grandchild_holding_stdout_is_killed_with_group() {
    // The direct child dies on SIGTERM, but its background job keeps the
    // pipe open until the group kill.
    let config = quiet_config().with_cleanup_timeout(Duration::from_millis(200));
    let child = SupervisedChild::spawn("sleep 30 & echo started; wait", config).unwrap();
    let pgid = child.pid();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let info = tokio::time::timeout(Duration::from_secs(5), child.close())
        .await
        .unwrap()
        .unwrap();

    assert!(info.signal.is_some());
    assert!(wait_for_group_gone(pgid).await.is_empty());
}

#[tokio::test]
async fn close_after_exit_returns_immediately() {
    let child = SupervisedChild::spawn("exit 0", quiet_config()).unwrap();
    let first = child.wait().await.unwrap();

    let started = Instant::now();
    let second = child.close().await.unwrap();
    assert_eq!(first, second);
    assert!(second.success());
    assert!(started.elapsed() < quiet_config().cleanup_timeout());
}

#[tokio::test]
async fn close_with_invokes_callback_once() {
    let config = quiet_config().with_shell(false);
    let child = SupervisedChild::spawn("sleep 30", config).unwrap();
    let (tx, rx) = oneshot::channel();

    child.close_with(move |info| {
        let _ = tx.send(info);
    });

    let info = tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(info.signal, Some(Signal::SIGTERM));
    assert_eq!(child.exit_info(), Some(info));
}
