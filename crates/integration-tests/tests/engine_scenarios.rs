//! Scenario tests for the coordination engine: invariants, broadcasts,
//! cascades, heartbeat, and the reaper.

use std::sync::Arc;
use std::time::Duration;

use integration_tests::{client, FailingKillProof, StubKillProof, TestHarness};
use lfg_gateway::domain::error::codes;
use lfg_gateway::domain::requests::{CreateGroupParams, ListApplicationsParams};
use lfg_gateway::Reaper;
use lfg_types::{unix_now, Application, ApplicationUpdate, Group, GroupsUpdate, KillProof};

fn create_params(title: &str) -> CreateGroupParams {
    CreateGroupParams {
        title: title.to_string(),
        kill_proof_id: Some("li".to_string()),
        kill_proof_minimum: 150,
    }
}

#[tokio::test]
async fn one_account_owns_at_most_one_group() {
    let harness = TestHarness::new();
    let a = client("A");
    let b = client("B");

    let group = harness
        .handlers
        .groups
        .create_group(&a, create_params("raid"))
        .await
        .expect("first create succeeds");
    assert_eq!(group.creator, "A");
    assert_eq!(group.kill_proof_minimum, 150);

    let second = harness
        .handlers
        .groups
        .create_group(&a, create_params("another"))
        .await;
    assert_eq!(second.unwrap_err().code, codes::PERMISSION_DENIED);

    harness
        .handlers
        .groups
        .create_group(&b, create_params("fractals"))
        .await
        .expect("other accounts are unaffected");
}

#[tokio::test]
async fn only_the_owner_updates_a_group() {
    let harness = TestHarness::new();
    let a = client("A");
    let b = client("B");

    let group = harness
        .handlers
        .groups
        .create_group(&a, create_params("raid"))
        .await
        .unwrap();

    let (mut rx, _sub) = harness.handlers.groups.subscribe_groups(&a);

    let mut cross = group.clone();
    cross.title = "x".into();
    let denied = harness.handlers.groups.update_group(&b, cross).await;
    assert_eq!(denied.unwrap_err().code, codes::PERMISSION_DENIED);

    let mut own = group.clone();
    own.title = "x".into();
    let updated = harness.handlers.groups.update_group(&a, own).await.unwrap();
    assert_eq!(updated.title, "x");
    assert!(updated.updated_at_sec >= updated.created_at_sec);

    match rx.recv().await {
        Some(GroupsUpdate::UpdatedGroup(g)) => assert_eq!(g.title, "x"),
        other => panic!("expected UpdatedGroup, got {other:?}"),
    }
}

#[tokio::test]
async fn duplicate_applications_are_rejected() {
    let harness = TestHarness::new();
    let a = client("A");
    let b = client("B");
    let c = client("C");

    let group = harness
        .handlers
        .groups
        .create_group(&a, create_params("raid"))
        .await
        .unwrap();

    // Creator subscribes to the group's applications, B to their own.
    let (mut creator_rx, _creator_sub) = harness
        .handlers
        .applications
        .subscribe_group_applications(&a, &group.id)
        .await
        .unwrap();
    let (mut applicant_rx, _applicant_sub) = harness
        .handlers
        .applications
        .subscribe_group_applications(&b, "no-such-group")
        .await
        .unwrap();

    let first = harness
        .handlers
        .applications
        .create_application(&b, &group.id)
        .await
        .expect("first application succeeds");

    let again = harness
        .handlers
        .applications
        .create_application(&b, &group.id)
        .await;
    assert_eq!(again.unwrap_err().code, codes::ALREADY_EXISTS);

    harness
        .handlers
        .applications
        .create_application(&c, &group.id)
        .await
        .expect("other applicants are unaffected");

    // Both the group creator and the applicant observe B's application.
    match creator_rx.recv().await {
        Some(ApplicationUpdate::NewApplication(app)) => assert_eq!(app.id, first.id),
        other => panic!("expected NewApplication, got {other:?}"),
    }
    match applicant_rx.recv().await {
        Some(ApplicationUpdate::NewApplication(app)) => assert_eq!(app.id, first.id),
        other => panic!("expected NewApplication, got {other:?}"),
    }
}

#[tokio::test]
async fn self_applications_are_forbidden() {
    let harness = TestHarness::new();
    let a = client("A");

    let group = harness
        .handlers
        .groups
        .create_group(&a, create_params("raid"))
        .await
        .unwrap();

    let denied = harness
        .handlers
        .applications
        .create_application(&a, &group.id)
        .await;
    assert_eq!(denied.unwrap_err().code, codes::PERMISSION_DENIED);
}

#[tokio::test]
async fn group_delete_cascades_without_application_broadcasts() {
    let harness = TestHarness::new();
    let a = client("A");
    let b = client("B");
    let c = client("C");

    let group = harness
        .handlers
        .groups
        .create_group(&a, create_params("raid"))
        .await
        .unwrap();
    harness
        .handlers
        .applications
        .create_application(&b, &group.id)
        .await
        .unwrap();
    harness
        .handlers
        .applications
        .create_application(&c, &group.id)
        .await
        .unwrap();

    let (mut groups_rx, _gsub) = harness.handlers.groups.subscribe_groups(&a);
    let (mut apps_rx, _asub) = harness
        .handlers
        .applications
        .subscribe_group_applications(&a, &group.id)
        .await
        .unwrap();

    harness
        .handlers
        .groups
        .delete_group(&a, &group.id)
        .await
        .unwrap();

    // The store cascade removed the applications.
    assert!(harness
        .store
        .list_applications_for_group(&group.id)
        .await
        .unwrap()
        .is_empty());

    // One group removal is broadcast; the cascade emits no per-application
    // removals (the reaper path does that for expiry).
    match groups_rx.recv().await {
        Some(GroupsUpdate::RemovedGroupId(id)) => assert_eq!(id, group.id),
        other => panic!("expected RemovedGroupId, got {other:?}"),
    }
    assert!(apps_rx.try_recv().is_err());
}

#[tokio::test]
async fn deleting_an_absent_group_is_idempotent() {
    let harness = TestHarness::new();
    let a = client("A");

    let (mut rx, _sub) = harness.handlers.groups.subscribe_groups(&a);

    harness
        .handlers
        .groups
        .delete_group(&a, "no-such-group")
        .await
        .expect("absent delete succeeds");
    assert!(rx.try_recv().is_err(), "no broadcast for a no-op delete");
}

#[tokio::test]
async fn subscriber_registered_before_create_sees_the_group() {
    let harness = TestHarness::new();
    let a = client("A");
    let watcher = client("W");

    let (mut rx, _sub) = harness.handlers.groups.subscribe_groups(&watcher);

    let group = harness
        .handlers
        .groups
        .create_group(&a, create_params("raid"))
        .await
        .unwrap();

    match rx.recv().await {
        Some(GroupsUpdate::NewGroup(g)) => {
            assert_eq!(g.id, group.id);
            // The broadcast reflects durable state.
            assert!(harness.store.get_group(&g.id).await.unwrap().is_some());
        }
        other => panic!("expected NewGroup, got {other:?}"),
    }
}

#[tokio::test]
async fn a_subscriber_that_never_reads_does_not_stall_mutations() {
    let harness = TestHarness::new();
    let a = client("A");
    let sleeper = client("Sleeper");

    let (_rx, _sub) = harness.handlers.groups.subscribe_groups(&sleeper);

    // Far more updates than the buffer holds; every mutation must still
    // succeed promptly.
    for i in 0..20 {
        let group = harness
            .handlers
            .groups
            .create_group(&a, create_params(&format!("run {i}")))
            .await
            .unwrap();
        harness
            .handlers
            .groups
            .delete_group(&a, &group.id)
            .await
            .unwrap();
    }

    assert!(harness.metrics.updates_dropped_total.load(std::sync::atomic::Ordering::Relaxed) > 0);
}

#[tokio::test]
async fn list_applications_requires_exactly_one_filter() {
    let harness = TestHarness::new();
    let a = client("A");

    let none = harness
        .handlers
        .applications
        .list_applications(&a, ListApplicationsParams::default())
        .await;
    assert_eq!(none.unwrap_err().code, codes::INVALID_PARAMS);

    let both = harness
        .handlers
        .applications
        .list_applications(
            &a,
            ListApplicationsParams {
                group_id: Some("g".into()),
                account_name: Some("A".into()),
            },
        )
        .await;
    assert_eq!(both.unwrap_err().code, codes::INVALID_PARAMS);

    let mismatched = harness
        .handlers
        .applications
        .list_applications(
            &a,
            ListApplicationsParams {
                group_id: None,
                account_name: Some("B".into()),
            },
        )
        .await;
    assert_eq!(mismatched.unwrap_err().code, codes::PERMISSION_DENIED);
}

#[tokio::test]
async fn only_the_creator_lists_a_groups_applications() {
    let harness = TestHarness::new();
    let a = client("A");
    let b = client("B");

    let group = harness
        .handlers
        .groups
        .create_group(&a, create_params("raid"))
        .await
        .unwrap();
    harness
        .handlers
        .applications
        .create_application(&b, &group.id)
        .await
        .unwrap();

    let denied = harness
        .handlers
        .applications
        .list_applications(
            &b,
            ListApplicationsParams {
                group_id: Some(group.id.clone()),
                account_name: None,
            },
        )
        .await;
    assert_eq!(denied.unwrap_err().code, codes::PERMISSION_DENIED);

    let listed = harness
        .handlers
        .applications
        .list_applications(
            &a,
            ListApplicationsParams {
                group_id: Some(group.id.clone()),
                account_name: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].applicant, "B");
}

#[tokio::test]
async fn applications_are_enriched_with_kill_proof() {
    let kp = KillProof {
        li: 250,
        w5: 40,
        ..Default::default()
    };
    let harness =
        TestHarness::with_kill_proof(Arc::new(StubKillProof::new(&[("B", kp)])));
    let a = client("A");
    let b = client("B");

    let group = harness
        .handlers
        .groups
        .create_group(&a, create_params("raid"))
        .await
        .unwrap();

    let application = harness
        .handlers
        .applications
        .create_application(&b, &group.id)
        .await
        .unwrap();
    assert_eq!(application.kill_proof, Some(kp));

    // The persisted row stays unenriched.
    let stored = harness
        .store
        .get_application(&application.id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.kill_proof.is_none());

    let listed = harness
        .handlers
        .applications
        .list_applications(
            &a,
            ListApplicationsParams {
                group_id: Some(group.id),
                account_name: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(listed[0].kill_proof, Some(kp));
}

#[tokio::test]
async fn enrichment_failures_are_swallowed() {
    let harness = TestHarness::with_kill_proof(Arc::new(FailingKillProof));
    let a = client("A");
    let b = client("B");

    let group = harness
        .handlers
        .groups
        .create_group(&a, create_params("raid"))
        .await
        .unwrap();

    let application = harness
        .handlers
        .applications
        .create_application(&b, &group.id)
        .await
        .expect("application survives enrichment failure");
    assert!(application.kill_proof.is_none());
}

#[tokio::test]
async fn heartbeat_touches_and_rebroadcasts_owned_rows() {
    let harness = TestHarness::new();
    let a = client("A");
    let now = unix_now();
    let hour_ago = now - 3600;

    // A owns a stale group and a stale application on another group.
    harness
        .store
        .save_group(&Group {
            id: "g-own".into(),
            creator: "A".into(),
            title: "mine".into(),
            kill_proof_id: None,
            kill_proof_minimum: 0,
            created_at_sec: hour_ago,
            updated_at_sec: hour_ago,
        })
        .await
        .unwrap();
    harness
        .store
        .save_group(&Group {
            id: "g-other".into(),
            creator: "H".into(),
            title: "theirs".into(),
            kill_proof_id: None,
            kill_proof_minimum: 0,
            created_at_sec: hour_ago,
            updated_at_sec: hour_ago,
        })
        .await
        .unwrap();
    harness
        .store
        .save_application(
            &Application {
                id: "app-1".into(),
                group_id: "g-other".into(),
                applicant: "A".into(),
                created_at_sec: hour_ago,
                updated_at_sec: hour_ago,
                kill_proof: None,
            },
            "g-other",
        )
        .await
        .unwrap();

    let (mut groups_rx, _gsub) = harness.handlers.groups.subscribe_groups(&a);
    let (mut apps_rx, _asub) = harness
        .handlers
        .applications
        .subscribe_group_applications(&a, "g-missing")
        .await
        .unwrap();

    harness.handlers.applications.heartbeat(&a).await.unwrap();

    let touched_group = match groups_rx.recv().await {
        Some(GroupsUpdate::UpdatedGroup(g)) => g,
        other => panic!("expected UpdatedGroup, got {other:?}"),
    };
    let touched_app = match apps_rx.recv().await {
        Some(ApplicationUpdate::UpdatedApplication(app)) => app,
        other => panic!("expected UpdatedApplication, got {other:?}"),
    };

    assert_eq!(touched_group.id, "g-own");
    assert_eq!(touched_app.id, "app-1");
    // Both rows carry the same touch instant.
    assert_eq!(touched_group.updated_at_sec, touched_app.updated_at_sec);
    assert!(touched_group.updated_at_sec >= now);

    // The untouched group kept its clock.
    let other = harness.store.get_group("g-other").await.unwrap().unwrap();
    assert_eq!(other.updated_at_sec, hour_ago);

    // Exactly one broadcast each.
    assert!(groups_rx.try_recv().is_err());
    assert!(apps_rx.try_recv().is_err());
}

#[tokio::test]
async fn reaper_collects_stale_groups_and_notifies() {
    let harness = TestHarness::new();
    let now = unix_now();
    let three_hours_ago = now - 3 * 3600;

    for (id, creator) in [("g1", "A"), ("g2", "B")] {
        harness
            .store
            .save_group(&Group {
                id: id.into(),
                creator: creator.into(),
                title: "stale".into(),
                kill_proof_id: None,
                kill_proof_minimum: 0,
                created_at_sec: three_hours_ago,
                updated_at_sec: three_hours_ago,
            })
            .await
            .unwrap();
    }

    let watcher = client("W");
    let (mut rx, _sub) = harness.handlers.groups.subscribe_groups(&watcher);

    let reaper = Reaper::new(
        Arc::clone(&harness.store),
        Arc::clone(&harness.registries),
        Arc::clone(&harness.metrics),
        Duration::from_secs(2 * 3600),
    );
    reaper.step(now).await;

    let mut removed = Vec::new();
    for _ in 0..2 {
        match rx.recv().await {
            Some(GroupsUpdate::RemovedGroupId(id)) => removed.push(id),
            other => panic!("expected RemovedGroupId, got {other:?}"),
        }
    }
    removed.sort();
    assert_eq!(removed, vec!["g1", "g2"]);

    assert!(harness.handlers.groups.list_groups().await.unwrap().is_empty());
}
