//! End-to-end event scenarios against mock collaborators: one or more
//! simulated units sharing in-memory relations, driven through realistic
//! (and deliberately unrealistic) event orderings.

mod common;

use common::{Harness, MOCK_VERSION};
use syncop::event::{Event, MasterDescriptor, Outcome};
use syncop::relation::{RelationStore, CONFIG_GENERATION_KEY, RENDERED_CONFIG_KEY};
use syncop::status::UnitStatus;

/// Drive a leader unit through the happy path up to an initialized state.
async fn initialize_leader(h: &Harness) {
    h.cluster
        .seed_unit("syncop/0", "ingress-address", "10.0.0.1");
    assert_eq!(
        h.dispatch(Event::Install, true).await.unwrap(),
        Outcome::Handled
    );
    assert_eq!(
        h.dispatch(Event::ConfigChanged, true).await.unwrap(),
        Outcome::Handled
    );
    assert_eq!(
        h.dispatch(Event::DatabaseRelationJoined { requested: None }, true)
            .await
            .unwrap(),
        Outcome::Handled
    );
    let master = h.present_master();
    assert_eq!(
        h.dispatch(Event::DatabaseMasterChanged { master }, true)
            .await
            .unwrap(),
        Outcome::Handled
    );
}

#[tokio::test]
async fn leader_happy_path_converges_to_active() {
    let h = Harness::new("syncop/0");
    initialize_leader(&h).await;

    let state = h.state();
    assert!(state.fetched);
    assert!(state.database_available);
    assert!(state.initialized);
    assert_eq!(h.facade.install_calls(), 1);

    // Install seeds localhost; bootstrap adds the fqdn and our own address.
    assert_eq!(
        h.facade.trusted_domains(),
        vec!["localhost", "files.example.org", "10.0.0.1"]
    );

    assert_eq!(
        h.workload.last_status(),
        Some(UnitStatus::Active(format!("Ready (version {})", MOCK_VERSION)))
    );
}

#[tokio::test]
async fn start_defers_until_initialized_then_opens_port() {
    let h = Harness::new("syncop/0");
    h.dispatch(Event::Install, true).await.unwrap();

    assert!(matches!(
        h.dispatch(Event::Start, true).await.unwrap(),
        Outcome::Deferred(_)
    ));
    assert_eq!(h.workload.op_count("open_public_port"), 0);

    initialize_leader(&h).await;
    assert_eq!(h.dispatch(Event::Start, true).await.unwrap(), Outcome::Handled);
    assert_eq!(h.workload.op_count("open_public_port 80"), 1);
}

#[tokio::test]
async fn install_fetches_exactly_once() {
    let h = Harness::new("syncop/0");
    h.dispatch(Event::Install, true).await.unwrap();
    h.dispatch(Event::Install, true).await.unwrap();

    // Dependencies reinstall freely; the source fetch must not repeat.
    assert_eq!(h.workload.op_count("install_dependencies"), 2);
    assert_eq!(h.workload.op_count("fetch_and_extract"), 1);
}

#[tokio::test]
async fn duplicate_master_changed_installs_once() {
    let h = Harness::new("syncop/0");
    initialize_leader(&h).await;

    let master = h.present_master();
    h.dispatch(Event::DatabaseMasterChanged { master }, true)
        .await
        .unwrap();
    assert_eq!(h.facade.install_calls(), 1);
}

#[tokio::test]
async fn master_changed_for_other_database_is_ignored() {
    let h = Harness::new("syncop/0");
    h.dispatch(Event::Install, true).await.unwrap();

    let master = MasterDescriptor {
        dbname: "someone_elses_db".to_string(),
        ..h.present_master()
    };
    assert_eq!(
        h.dispatch(Event::DatabaseMasterChanged { master }, true)
            .await
            .unwrap(),
        Outcome::Handled
    );
    assert!(!h.state().database_available);
    assert_eq!(h.facade.install_calls(), 0);
}

#[tokio::test]
async fn master_changed_before_install_defers() {
    let h = Harness::new("syncop/0");
    let master = h.present_master();
    assert!(matches!(
        h.dispatch(Event::DatabaseMasterChanged { master }, true)
            .await
            .unwrap(),
        Outcome::Deferred(_)
    ));
    // A deferred event leaves no trace.
    assert!(!h.state().database_available);
}

#[tokio::test]
async fn absent_master_clears_descriptor_but_keeps_availability() {
    let h = Harness::new("syncop/0");
    initialize_leader(&h).await;
    assert!(h.state().db_host.is_some());

    let absent = MasterDescriptor::absent(&h.config.database_name);
    h.dispatch(Event::DatabaseMasterChanged { master: absent }, true)
        .await
        .unwrap();

    let state = h.state();
    assert!(state.db_host.is_none());
    assert!(state.database_available);
    assert!(state.initialized);
}

#[tokio::test]
async fn bootstrap_failure_is_fatal_and_saves_nothing() {
    let h = Harness::with_failing_install("syncop/0");
    h.dispatch(Event::Install, true).await.unwrap();

    let master = h.present_master();
    let err = h
        .dispatch(Event::DatabaseMasterChanged { master }, true)
        .await
        .unwrap_err();
    assert!(matches!(err, syncop::Error::InstallFailed(_)));

    let state = h.state();
    assert!(!state.initialized);
    assert!(!state.database_available);
    assert!(state.fetched);
}

#[tokio::test]
async fn follower_relation_joined_defers_until_leader_requests() {
    let h = Harness::new("syncop/1");
    assert!(matches!(
        h.dispatch(Event::DatabaseRelationJoined { requested: None }, false)
            .await
            .unwrap(),
        Outcome::Deferred(_)
    ));
    assert_eq!(
        h.dispatch(
            Event::DatabaseRelationJoined {
                requested: Some(h.config.database_name.clone())
            },
            false
        )
        .await
        .unwrap(),
        Outcome::Handled
    );
}

#[tokio::test]
async fn leader_relation_joined_requests_database_and_extensions() {
    let h = Harness::new("syncop/0");
    h.dispatch(Event::DatabaseRelationJoined { requested: None }, true)
        .await
        .unwrap();
    assert_eq!(
        h.database.get_app("database").await.unwrap(),
        Some(h.config.database_name.clone())
    );
    assert_eq!(
        h.database.get_app("extensions").await.unwrap(),
        Some("citext".to_string())
    );
}

#[tokio::test]
async fn follower_adopts_leader_config() {
    let leader = Harness::new("syncop/0");
    let follower = leader.peer("syncop/1");
    leader
        .cluster
        .seed_unit("syncop/1", "ingress-address", "10.0.0.2");

    follower.dispatch(Event::Install, false).await.unwrap();
    follower.dispatch(Event::ConfigChanged, false).await.unwrap();

    // Nothing published yet: the changed event must be redelivered later.
    assert!(matches!(
        follower
            .dispatch(Event::ClusterRelationChanged, false)
            .await
            .unwrap(),
        Outcome::Deferred(_)
    ));
    assert!(!follower.state().initialized);

    initialize_leader(&leader).await;
    leader.dispatch(Event::ClusterRelationJoined, true).await.unwrap();

    assert_eq!(
        follower
            .dispatch(Event::ClusterRelationChanged, false)
            .await
            .unwrap(),
        Outcome::Handled
    );

    let state = follower.state();
    assert!(state.initialized);
    assert!(state.database_available);
    assert_eq!(state.adopted_generation, 1);
    // The adopted artifact is the leader's, byte for byte.
    assert_eq!(
        follower.workload.artifact(&follower.config.config_artifact()),
        leader.workload.artifact(&leader.config.config_artifact())
    );
    // The data marker the installer would have created must exist too,
    // or facade commands fail on this unit.
    assert_eq!(
        follower.workload.artifact(&state.data_dir.join(".ocdata")),
        Some(String::new())
    );
    assert_eq!(h_status(&follower), UnitStatus::Active("Ready".to_string()));
}

fn h_status(h: &Harness) -> UnitStatus {
    syncop::status::project(&h.state())
}

#[tokio::test]
async fn follower_master_changed_waits_for_replicated_config() {
    let leader = Harness::new("syncop/0");
    let follower = leader.peer("syncop/1");

    follower.dispatch(Event::Install, false).await.unwrap();
    let master = follower.present_master();
    assert!(matches!(
        follower
            .dispatch(Event::DatabaseMasterChanged { master: master.clone() }, false)
            .await
            .unwrap(),
        Outcome::Deferred(_)
    ));
    assert_eq!(follower.facade.install_calls(), 0);

    initialize_leader(&leader).await;
    leader.dispatch(Event::LeaderElected, true).await.unwrap();

    assert_eq!(
        follower
            .dispatch(Event::DatabaseMasterChanged { master }, false)
            .await
            .unwrap(),
        Outcome::Handled
    );
    let state = follower.state();
    assert!(state.initialized);
    // The follower never installs; only the leader does.
    assert_eq!(follower.facade.install_calls(), 0);
}

#[tokio::test]
async fn stale_generation_push_is_discarded() {
    let h = Harness::new("syncop/1");
    h.dispatch(Event::Install, false).await.unwrap();

    h.cluster
        .set_app_many(&[
            (RENDERED_CONFIG_KEY, "current".to_string()),
            (CONFIG_GENERATION_KEY, "3".to_string()),
        ])
        .await
        .unwrap();
    h.dispatch(Event::ClusterRelationChanged, false).await.unwrap();
    assert_eq!(h.state().adopted_generation, 3);

    // A deposed leader's late push carries an older generation.
    h.cluster
        .set_app_many(&[
            (RENDERED_CONFIG_KEY, "stale".to_string()),
            (CONFIG_GENERATION_KEY, "1".to_string()),
        ])
        .await
        .unwrap();
    assert_eq!(
        h.dispatch(Event::ClusterRelationChanged, false).await.unwrap(),
        Outcome::Handled
    );
    assert_eq!(h.state().adopted_generation, 3);
    assert_eq!(
        h.workload.artifact(&h.config.config_artifact()),
        Some("current".to_string())
    );
}

#[tokio::test]
async fn push_rewrites_trusted_domains_from_current_peers() {
    let h = Harness::new("syncop/0");
    initialize_leader(&h).await;
    h.cluster.seed_unit("syncop/1", "ingress-address", "10.0.0.2");
    h.cluster.seed_unit("syncop/2", "ingress-address", "10.0.0.3");

    h.dispatch(Event::ClusterRelationJoined, true).await.unwrap();
    assert_eq!(
        h.facade.trusted_domains(),
        vec![
            "localhost",
            "files.example.org",
            "10.0.0.2",
            "10.0.0.3",
            "10.0.0.1"
        ]
    );
    assert_eq!(
        h.cluster.get_app(CONFIG_GENERATION_KEY).await.unwrap(),
        Some("1".to_string())
    );

    // A departed peer disappears from the next rewrite entirely.
    h.cluster.remove_unit("syncop/2");
    h.dispatch(Event::ClusterRelationDeparted, true).await.unwrap();
    assert_eq!(
        h.facade.trusted_domains(),
        vec!["localhost", "files.example.org", "10.0.0.2", "10.0.0.1"]
    );
    assert_eq!(
        h.cluster.get_app(CONFIG_GENERATION_KEY).await.unwrap(),
        Some("2".to_string())
    );
}

#[tokio::test]
async fn cluster_events_on_uninitialized_leader_defer() {
    let h = Harness::new("syncop/0");
    assert!(matches!(
        h.dispatch(Event::ClusterRelationJoined, true).await.unwrap(),
        Outcome::Deferred(_)
    ));
    assert!(matches!(
        h.dispatch(Event::ClusterRelationDeparted, true).await.unwrap(),
        Outcome::Deferred(_)
    ));
    // Broken rolls back nothing and never defers.
    assert_eq!(
        h.dispatch(Event::ClusterRelationBroken, true).await.unwrap(),
        Outcome::Handled
    );
}

#[tokio::test]
async fn storage_attach_overrides_data_dir_once() {
    let h = Harness::new("syncop/0");
    h.dispatch(
        Event::StorageAttached {
            location: "/media/syncserver/data".into(),
        },
        true,
    )
    .await
    .unwrap();
    assert_eq!(
        h.state().data_dir,
        std::path::PathBuf::from("/media/syncserver/data")
    );

    h.dispatch(
        Event::StorageAttached {
            location: "/media/other".into(),
        },
        true,
    )
    .await
    .unwrap();
    assert_eq!(
        h.state().data_dir,
        std::path::PathBuf::from("/media/syncserver/data")
    );
}

#[tokio::test]
async fn mount_starts_regardless_of_install_storage_ordering() {
    // storage-attached first, then install
    let h = Harness::new("syncop/0");
    h.dispatch(
        Event::StorageAttached {
            location: "/media/syncserver/data".into(),
        },
        true,
    )
    .await
    .unwrap();
    assert_eq!(h.workload.op_count("start_data_mount"), 0);
    h.dispatch(Event::Install, true).await.unwrap();
    assert_eq!(h.workload.op_count("start_data_mount"), 1);

    // install first, then storage-attached
    let h = Harness::new("syncop/0");
    h.dispatch(Event::Install, true).await.unwrap();
    assert_eq!(h.workload.op_count("start_data_mount"), 0);
    h.dispatch(
        Event::StorageAttached {
            location: "/media/syncserver/data".into(),
        },
        true,
    )
    .await
    .unwrap();
    assert_eq!(h.workload.op_count("start_data_mount"), 1);
}

#[tokio::test]
async fn update_status_refreshes_version_on_ready_leader() {
    let h = Harness::new("syncop/0");
    initialize_leader(&h).await;

    h.dispatch(Event::UpdateStatus, true).await.unwrap();
    assert_eq!(h.state().workload_version.as_deref(), Some(MOCK_VERSION));
    assert_eq!(
        h_status(&h),
        UnitStatus::Active(format!("Ready (version {})", MOCK_VERSION))
    );
}

#[tokio::test]
async fn overwrite_protocol_applied_only_after_init() {
    let h = Harness::new("syncop/0");
    h.dispatch(Event::Install, true).await.unwrap();
    h.dispatch(Event::ConfigChanged, true).await.unwrap();
    assert_eq!(h.facade.calls().iter().filter(|c| c.starts_with("overwriteprotocol")).count(), 0);

    initialize_leader(&h).await;
    h.dispatch(Event::ConfigChanged, true).await.unwrap();
    assert!(h
        .facade
        .calls()
        .contains(&"overwriteprotocol http".to_string()));
}
