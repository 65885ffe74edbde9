//! Spawning, output classification, and sending to a child.

use std::io::ErrorKind;
use std::time::Duration;

use childsieve::child::{ChildEvent, SendError, SpawnError, SupervisedChild};
use childsieve::sieve::Encoding;
use serde_json::json;
use tokio_test::{assert_err, assert_ok};

use super::{drain, quiet_config, stderr_text, stdout_events};

#[tokio::test]
async fn lines_arrive_in_order_before_exit() {
    let mut child = SupervisedChild::spawn("printf 'one\\ntwo\\nthree\\n'", quiet_config()).unwrap();
    let events = drain(&mut child).await;

    assert_eq!(
        stdout_events(&events),
        vec![
            ChildEvent::StdoutLine("one".into()),
            ChildEvent::StdoutLine("two".into()),
            ChildEvent::StdoutLine("three".into()),
        ]
    );
    let last = events.last().unwrap();
    assert!(matches!(last, ChildEvent::Exit(info) if info.success()));
    assert_eq!(events.iter().filter(|e| e.is_exit()).count(), 1);
}

#[tokio::test]
async fn json_lines_are_classified() {
    let mut child = SupervisedChild::spawn(
        r#"printf '{"a":1}\n[1,2]\nplain\n"str"\n'"#,
        quiet_config(),
    )
    .unwrap();
    let events = stdout_events(&drain(&mut child).await);

    assert_eq!(events.len(), 4);
    assert!(matches!(&events[0], ChildEvent::JsonObject(map) if map["a"] == json!(1)));
    assert_eq!(events[1], ChildEvent::JsonArray(vec![json!(1), json!(2)]));
    assert_eq!(events[2], ChildEvent::StdoutLine("plain".into()));
    assert_eq!(events[3], ChildEvent::StdoutLine("\"str\"".into()));
}

#[tokio::test]
async fn trailing_line_without_newline_precedes_exit() {
    let mut child = SupervisedChild::spawn("printf sentinel", quiet_config()).unwrap();
    let events = drain(&mut child).await;

    assert_eq!(events.len(), 2);
    assert_eq!(events[0], ChildEvent::StdoutLine("sentinel".into()));
    assert!(events[1].is_exit());
}

#[tokio::test]
async fn output_from_background_process_is_not_lost() {
    // The shell exits first; the subshell still holds stdout open.
    let mut child =
        SupervisedChild::spawn("(sleep 0.2; echo late) & echo early", quiet_config()).unwrap();
    let events = drain(&mut child).await;

    assert_eq!(
        stdout_events(&events),
        vec![
            ChildEvent::StdoutLine("early".into()),
            ChildEvent::StdoutLine("late".into()),
        ]
    );
    assert!(events.last().unwrap().is_exit());
}

#[tokio::test]
async fn stderr_is_delivered_unbuffered() {
    let mut child = SupervisedChild::spawn("printf 'no newline' >&2", quiet_config()).unwrap();
    let events = drain(&mut child).await;

    assert_eq!(stderr_text(&events), "no newline");
    assert!(stdout_events(&events).is_empty());
}

#[tokio::test]
async fn exit_code_is_reported() {
    let mut child = SupervisedChild::spawn("exit 3", quiet_config()).unwrap();
    let info = child.wait().await.unwrap();

    assert_eq!(info.code, Some(3));
    assert_eq!(info.exit_code(), 3);
    assert!(!info.success());
    assert_eq!(child.exit_info(), Some(info));
    assert!(!child.is_running());
}

#[tokio::test]
async fn send_round_trips_through_cat() {
    let mut child = SupervisedChild::spawn("cat", quiet_config()).unwrap();
    assert!(child.is_running());

    assert_ok!(child.send(&json!({"hello": "world"})).await);
    let event = child.recv().await.unwrap();
    assert!(matches!(event, ChildEvent::JsonObject(ref map) if map["hello"] == "world"));

    assert_ok!(child.send(&json!(["a", 1, null])).await);
    assert_eq!(
        child.recv().await,
        Some(ChildEvent::JsonArray(vec![json!("a"), json!(1), json!(null)]))
    );

    let info = child.close().await.unwrap();
    assert!(info.signal.is_some() || info.code.is_some());
    assert!(matches!(child.recv().await, Some(ChildEvent::Exit(_))));
    assert_eq!(child.recv().await, None);
}

#[tokio::test]
async fn send_after_exit_is_rejected() {
    let child = SupervisedChild::spawn("true", quiet_config()).unwrap();
    child.wait().await.unwrap();

    let err = assert_err!(child.send(&json!({"late": true})).await);
    assert!(matches!(err, SendError::NotRunning { pid } if pid == child.pid()));
}

#[tokio::test]
async fn missing_working_directory_fails_to_spawn() {
    let config = quiet_config().with_cwd("/nonexistent/childsieve/dir");
    let err = assert_err!(SupervisedChild::spawn("true", config));

    assert!(matches!(err, SpawnError::Io { .. }));
    assert_eq!(err.io_kind(), Some(ErrorKind::NotFound));
}

#[tokio::test]
async fn missing_program_without_shell_fails_to_spawn() {
    let config = quiet_config().with_shell(false);
    let err = assert_err!(SupervisedChild::spawn("childsieve-no-such-program --flag", config));

    assert_eq!(err.io_kind(), Some(ErrorKind::NotFound));
    assert!(err.to_string().contains("childsieve-no-such-program"));
}

#[tokio::test]
async fn missing_program_through_shell_exits_nonzero() {
    let mut child = SupervisedChild::spawn("childsieve-no-such-program", quiet_config()).unwrap();
    let events = drain(&mut child).await;

    assert!(!stderr_text(&events).is_empty());
    assert!(matches!(events.last(), Some(ChildEvent::Exit(info)) if info.code == Some(127)));
}

#[tokio::test]
async fn working_directory_is_applied() {
    let dir = tempfile::tempdir().unwrap();
    let expected = dir.path().canonicalize().unwrap();
    let mut child =
        SupervisedChild::spawn("pwd -P", quiet_config().with_cwd(dir.path())).unwrap();
    let events = stdout_events(&drain(&mut child).await);

    assert_eq!(
        events,
        vec![ChildEvent::StdoutLine(expected.display().to_string())]
    );
}

#[tokio::test]
async fn latin1_output_is_decoded() {
    let config = quiet_config().with_encoding(Encoding::Latin1);
    let mut child = SupervisedChild::spawn(r"printf 'caf\351\n'", config).unwrap();
    let events = stdout_events(&drain(&mut child).await);

    assert_eq!(events, vec![ChildEvent::StdoutLine("café".into())]);
}

#[tokio::test]
async fn kill_on_exit_registers_until_exit() {
    use childsieve::child::registered_groups;

    let config = quiet_config().with_kill_on_exit(true);
    let child = SupervisedChild::spawn("sleep 5", config).unwrap();
    assert!(registered_groups().contains(&child.pid()));

    let info = tokio::time::timeout(Duration::from_secs(5), child.close())
        .await
        .unwrap()
        .unwrap();
    assert!(info.signal.is_some() || info.code.is_some());
    assert!(!registered_groups().contains(&child.pid()));
}

#[tokio::test]
async fn blocked_send_does_not_delay_exit() {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    // The background sleep inherits stdin and never reads it.
    let mut child = SupervisedChild::spawn(
        "(sleep 30 >/dev/null 2>&1 &); echo ready; sleep 0.5; echo bye",
        quiet_config(),
    )
    .unwrap();
    let mut events = child.take_events().unwrap();
    assert_eq!(
        events.recv().await,
        Some(ChildEvent::StdoutLine("ready".into()))
    );

    // Far larger than a pipe buffer, so the write blocks.
    let payload = json!({"blob": "x".repeat(1 << 20)});
    let send = child.send(&payload);
    tokio::pin!(send);

    let mut rest = Vec::new();
    let mut send_result = None;
    let drained = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            tokio::select! {
                result = &mut send, if send_result.is_none() => send_result = Some(result),
                event = events.recv() => match event {
                    Some(event) => {
                        let done = event.is_exit();
                        rest.push(event);
                        if done {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
    })
    .await;

    assert!(drained.is_ok(), "Exit was held back by the pending write");
    assert_eq!(rest.first(), Some(&ChildEvent::StdoutLine("bye".into())));
    assert!(rest.last().is_some_and(ChildEvent::is_exit));

    // Killing the holder of stdin fails the pending write.
    let pgid = Pid::from_raw(i32::try_from(child.pid()).unwrap());
    let _ = killpg(pgid, Signal::SIGKILL);
    let result = match send_result {
        Some(result) => result,
        None => tokio::time::timeout(Duration::from_secs(5), send)
            .await
            .unwrap(),
    };
    assert!(matches!(result, Err(SendError::NotRunning { .. })));
    assert_err!(child.send(&json!({"after": "exit"})).await);
}
