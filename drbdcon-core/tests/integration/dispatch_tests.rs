//! Parallel dispatch: per-host independence, timeouts and cancellation

use std::sync::Arc;
use std::time::{Duration, Instant};

use drbdcon_core::config::ExecutorSettings;
use drbdcon_core::remote::{Reply, ScriptedTransport};
use drbdcon_core::{AsyncExecutor, ErrorCode, Host, Outcome, SessionPool, TransportError};

fn hosts(names: &[&str]) -> Vec<Arc<Host>> {
    names
        .iter()
        .map(|n| Arc::new(Host::new(*n, format!("{n}.example"))))
        .collect()
}

fn executor(transport: &ScriptedTransport, max_parallel: usize, timeout: Duration) -> AsyncExecutor {
    let settings = ExecutorSettings {
        max_parallel,
        timeout_secs: 60,
        ..ExecutorSettings::default()
    };
    let pool = Arc::new(SessionPool::new(Arc::new(transport.clone())));
    AsyncExecutor::new(pool, &settings).with_timeout(timeout)
}

#[tokio::test]
async fn every_host_reports_exactly_once() {
    let transport = ScriptedTransport::new()
        .fallback(Reply::stdout("ok"))
        .on_host("h2", Reply::error(TransportError::Connection {
            host: "h2".into(),
            message: "No route to host".into(),
        }))
        .on_host("h4", Reply::exit(3, "boom"));
    let executor = executor(&transport, 8, Duration::from_secs(5));
    let targets = hosts(&["h1", "h2", "h3", "h4", "h5"]);

    let results = executor
        .dispatch_all(&targets, |_| Ok("true".to_string()))
        .join()
        .await;

    assert_eq!(results.len(), 5);
    let mut seen: Vec<&str> = results.iter().map(|r| r.host.as_str()).collect();
    seen.sort_unstable();
    assert_eq!(seen, vec!["h1", "h2", "h3", "h4", "h5"]);

    let by_host = |h: &str| results.iter().find(|r| r.host == h).unwrap();
    assert_eq!(by_host("h2").error_code, Some(ErrorCode::Transport));
    assert_eq!(by_host("h4").error_code, Some(ErrorCode::NonZeroExit));
    assert_eq!(by_host("h4").exit_code, Some(3));
    assert!(by_host("h1").is_success());
    assert!(by_host("h5").is_success());
}

#[tokio::test]
async fn timeout_is_bounded_and_releases_handles() {
    let transport = ScriptedTransport::new()
        .fallback(Reply::stdout("late").after(Duration::from_secs(30)));
    let executor = executor(&transport, 4, Duration::from_millis(100));
    let targets = hosts(&["slow-1", "slow-2"]);

    let start = Instant::now();
    let results = executor
        .dispatch_all(&targets, |_| Ok("sleep 30".to_string()))
        .join()
        .await;

    assert!(start.elapsed() < Duration::from_secs(2));
    assert!(results.iter().all(|r| r.outcome == Outcome::Timeout));
    assert_eq!(transport.live_handles(), 0);
}

#[tokio::test]
async fn cancel_reports_queued_and_running_hosts() {
    let transport = ScriptedTransport::new()
        .fallback(Reply::stdout("slow").after(Duration::from_secs(30)))
        .on_host("fast", Reply::stdout("done"));
    let executor = executor(&transport, 1, Duration::from_secs(60));
    let targets = hosts(&["fast", "slow-1", "slow-2"]);

    let mut dispatch = executor.dispatch_all(&targets, |_| Ok("work".to_string()));
    let (first, result) = dispatch.next().await.unwrap();
    assert_eq!(first, "fast");
    assert!(result.is_success());

    dispatch.cancel();
    let mut rest = Vec::new();
    while let Some((host, result)) = dispatch.next().await {
        assert_eq!(result.outcome, Outcome::Cancelled, "{host}");
        rest.push(host);
    }
    rest.sort();
    assert_eq!(rest, vec!["slow-1", "slow-2"]);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(transport.live_handles(), 0);
    assert!(transport.commands_for("slow-2").len() <= 1);
}

#[tokio::test]
async fn dropping_dispatch_cancels_remote_work() {
    let transport = ScriptedTransport::new()
        .fallback(Reply::stdout("slow").after(Duration::from_secs(30)));
    let executor = executor(&transport, 4, Duration::from_secs(60));
    let targets = hosts(&["a", "b"]);

    let dispatch = executor.dispatch_all(&targets, |_| Ok("work".to_string()));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(transport.live_handles(), 2);
    drop(dispatch);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.live_handles(), 0);
}

#[tokio::test]
async fn commands_to_one_host_run_in_issue_order() {
    let transport = ScriptedTransport::new()
        .fallback(Reply::stdout("ok").after(Duration::from_millis(10)));
    let executor = executor(&transport, 4, Duration::from_secs(5));
    let targets = hosts(&["solo"]);

    let first = executor.dispatch_all(&targets, |_| Ok("first".to_string()));
    let second = executor.dispatch_all(&targets, |_| Ok("second".to_string()));
    let (a, b) = tokio::join!(first.join(), second.join());
    assert!(a[0].is_success() && b[0].is_success());
    assert_eq!(transport.commands_for("solo"), vec!["first", "second"]);
}

#[tokio::test]
async fn repeated_host_runs_and_reports_once() {
    let transport = ScriptedTransport::new().fallback(Reply::stdout("ok"));
    let executor = executor(&transport, 4, Duration::from_secs(5));
    let alpha = hosts(&["alpha"]).remove(0);
    let targets = vec![Arc::clone(&alpha), hosts(&["beta"]).remove(0), alpha];

    let mut dispatch = executor.dispatch_all(&targets, |_| Ok("true".to_string()));
    assert_eq!(dispatch.remaining(), 2);

    let mut seen = Vec::new();
    while let Some((host, result)) = dispatch.next().await {
        assert!(result.is_success());
        seen.push(host);
    }
    seen.sort_unstable();
    assert_eq!(seen, vec!["alpha", "beta"]);
    assert_eq!(transport.calls().len(), 2);
}
