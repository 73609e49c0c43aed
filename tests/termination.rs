use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use graceful::termination::Offer;
use graceful::{
    is_termination_scope, is_terminating, open_termination_scope, resolve_shutdown, supervise,
    terminate, Cause, Scope, TerminationDescriptor,
};
use tokio_test::{assert_pending, assert_ready};

/// Resolve `scope`, asserting the handler runs exactly once
fn resolve(scope: &Scope) -> TerminationDescriptor {
    let calls = AtomicUsize::new(0);
    let desc = resolve_shutdown(scope, None, |desc| {
        calls.fetch_add(1, Ordering::SeqCst);
        desc
    });
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    desc
}

#[tokio::test]
async fn fresh_scope_resolves_to_default() {
    let scope = open_termination_scope(&Scope::root());

    assert!(!is_terminating(&scope));
    let desc = resolve(&scope);
    assert_eq!(desc, TerminationDescriptor::default());
    assert_eq!(desc.exit_code(), 0);
    assert!(desc.cause().is_none());
    assert!(desc.signal().is_none());
}

#[tokio::test]
async fn single_request_is_resolved() {
    let scope = open_termination_scope(&Scope::root());

    terminate(&scope, "disk full", 7);

    assert!(is_terminating(&scope));
    let desc = resolve(&scope);
    assert_eq!(desc.cause(), Some(&Cause::msg("disk full")));
    assert_eq!(desc.exit_code(), 7);
    assert!(desc.signal().is_none());
}

#[tokio::test]
async fn first_request_wins() {
    let scope = open_termination_scope(&Scope::root());

    assert_eq!(terminate(&scope, "some err", 1), Offer::Accepted);
    assert_eq!(terminate(&scope, "another err", 2), Offer::Discarded);

    let desc = resolve(&scope);
    assert_eq!(desc.cause(), Some(&Cause::msg("some err")));
    assert_eq!(desc.exit_code(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_keep_exactly_one() {
    let scope = open_termination_scope(&Scope::root());
    let accepted = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (0..32)
        .map(|i| {
            let scope = scope.clone();
            let accepted = Arc::clone(&accepted);
            tokio::spawn(async move {
                if terminate(&scope, format!("err {}", i), 100 + i) == Offer::Accepted {
                    accepted.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(accepted.load(Ordering::SeqCst), 1);
    assert!(scope.is_cancelled());

    let desc = resolve(&scope);
    let code = desc.exit_code();
    assert!((100..132).contains(&code));
    assert_eq!(
        desc.cause().unwrap().to_string(),
        format!("err {}", code - 100)
    );

    // Drained: a second resolution sees no recorded descriptor
    assert_eq!(resolve(&scope), TerminationDescriptor::terminated());
}

#[tokio::test]
async fn panic_is_translated_and_swallowed() {
    let scope = open_termination_scope(&Scope::root());

    let desc = resolve_shutdown(&scope, Some(Box::new("boom")), |desc| desc);

    assert_eq!(desc.cause(), Some(&Cause::msg("boom")));
    assert_eq!(desc.exit_code(), 1);
    assert!(desc.signal().is_none());
}

#[tokio::test]
async fn supervised_panic_does_not_propagate() {
    let scope = open_termination_scope(&Scope::root());

    let desc = supervise(
        &scope,
        async {
            if is_termination_scope(&scope) {
                panic!("boom");
            }
            Ok::<(), anyhow::Error>(())
        },
        |desc| desc,
    )
    .await;

    assert_eq!(desc.cause(), Some(&Cause::msg("boom")));
    assert_eq!(desc.exit_code(), 1);
}

#[tokio::test]
async fn is_terminating_is_an_observation() {
    let scope = open_termination_scope(&Scope::root());

    assert!(!is_terminating(&scope));
    assert!(!is_terminating(&scope));

    terminate(&scope, "stop", 3);
    assert!(is_terminating(&scope));
    assert!(is_terminating(&scope));

    assert_eq!(resolve(&scope).exit_code(), 3);
}

#[tokio::test]
async fn ancestry_and_cancellation_are_distinct() {
    let root = Scope::root();
    let scope = open_termination_scope(&root);
    let nested = scope.child();

    assert!(!is_termination_scope(&root));
    assert!(is_termination_scope(&scope));
    assert!(is_termination_scope(&nested));

    root.cancel();
    root.cancel();

    assert!(scope.is_cancelled());
    assert!(is_termination_scope(&scope));
    assert!(!is_terminating(&scope));
    assert_eq!(resolve(&scope), TerminationDescriptor::terminated());
}

#[tokio::test]
async fn request_wakes_cancellation_waiters() {
    let scope = open_termination_scope(&Scope::root());
    let mut waiter = tokio_test::task::spawn(scope.cancelled());

    assert_pending!(waiter.poll());

    terminate(&scope, "wake up", 2);

    assert!(waiter.is_woken());
    assert_ready!(waiter.poll());
}

#[tokio::test]
async fn independent_scopes_do_not_interfere() {
    let root = Scope::root();
    let a = open_termination_scope(&root);
    let b = open_termination_scope(&root);

    terminate(&a, "only a", 5);

    assert!(is_terminating(&a));
    assert!(!is_terminating(&b));
    assert!(!b.is_cancelled());
    assert_eq!(resolve(&b), TerminationDescriptor::default());
}

#[tokio::test]
async fn dropped_scopes_release_their_listeners() {
    let runtime = tokio::runtime::Handle::current();
    let baseline = runtime.metrics().num_alive_tasks();

    for _ in 0..10 {
        let scope = open_termination_scope(&Scope::root());
        let nested = scope.child();
        drop(scope);
        drop(nested);
    }

    tokio::time::timeout(std::time::Duration::from_secs(1), async {
        while runtime.metrics().num_alive_tasks() > baseline {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("every listener task exited");
}
