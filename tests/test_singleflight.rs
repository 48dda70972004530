//! Integration tests for the single-flight coordinators.
//!
//! Tests cover:
//! - At most one body executing per coordinator at any instant
//! - Superseded callers receiving a definite cancellation outcome
//! - Joiners sharing one execution and its result
//! - No caller left unresolved under concurrent races

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use labelscan::{JoiningRunner, RunOutcome, SupersedingRunner};

/// Tracks how many bodies run concurrently, surviving mid-body drops.
struct ActiveGuard {
    active: Arc<AtomicUsize>,
}

impl ActiveGuard {
    fn enter(active: &Arc<AtomicUsize>, max_seen: &Arc<AtomicUsize>) -> Self {
        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
        max_seen.fetch_max(now, Ordering::SeqCst);
        Self {
            active: Arc::clone(active),
        }
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_superseding_runner_exclusivity() -> anyhow::Result<()> {
    let runner = Arc::new(SupersedingRunner::new());
    let active = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for id in 0..10 {
        let runner = Arc::clone(&runner);
        let active = Arc::clone(&active);
        let max_seen = Arc::clone(&max_seen);
        handles.push(tokio::spawn(async move {
            runner
                .run(|_cancel| async move {
                    let _guard = ActiveGuard::enter(&active, &max_seen);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    id
                })
                .await
        }));
    }

    let mut completed = 0;
    let mut superseded = 0;
    for handle in handles {
        // Every caller resolves; none hang.
        match handle.await? {
            RunOutcome::Completed(_) => completed += 1,
            RunOutcome::Superseded => superseded += 1,
        }
    }

    assert_eq!(completed + superseded, 10);
    assert!(completed >= 1, "the last uncontested task must complete");
    assert_eq!(
        max_seen.load(Ordering::SeqCst),
        1,
        "at most one body may execute at any instant"
    );
    assert_eq!(active.load(Ordering::SeqCst), 0);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_superseded_caller_observes_cancellation() -> anyhow::Result<()> {
    let runner = Arc::new(SupersedingRunner::new());

    let first = {
        let runner = Arc::clone(&runner);
        tokio::spawn(async move {
            runner
                .run(|_cancel| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "slow"
                })
                .await
        })
    };
    // Let the first task install itself before superseding it.
    tokio::time::sleep(Duration::from_millis(20)).await;

    let second = runner.run(|_cancel| async { "fast" }).await;
    assert_eq!(second, RunOutcome::Completed("fast"));
    assert_eq!(first.await?, RunOutcome::Superseded);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cancel_signal_visible_to_body() -> anyhow::Result<()> {
    let runner = Arc::new(SupersedingRunner::new());

    let outcome = runner
        .run(|cancel| async move {
            assert!(!cancel.is_cancelled());
            "done"
        })
        .await;
    assert_eq!(outcome, RunOutcome::Completed("done"));

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_joining_runner_shares_one_execution() -> anyhow::Result<()> {
    let runner = Arc::new(JoiningRunner::new());
    let executions = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..5 {
        let runner = Arc::clone(&runner);
        let executions = Arc::clone(&executions);
        handles.push(tokio::spawn(async move {
            runner
                .run(|| async move {
                    executions.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    42usize
                })
                .await
        }));
    }

    for handle in handles {
        assert_eq!(handle.await?, 42);
    }
    assert_eq!(
        executions.load(Ordering::SeqCst),
        1,
        "joiners must attach to the active execution, not duplicate it"
    );

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_joining_runner_runs_again_after_completion() -> anyhow::Result<()> {
    let runner = JoiningRunner::new();
    let executions = Arc::new(AtomicUsize::new(0));

    for _ in 0..2 {
        let executions = Arc::clone(&executions);
        let value = runner
            .run(|| async move { executions.fetch_add(1, Ordering::SeqCst) + 1 })
            .await;
        assert!(value >= 1);
    }
    assert_eq!(executions.load(Ordering::SeqCst), 2);

    Ok(())
}
