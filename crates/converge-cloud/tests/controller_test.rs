use converge_cloud::testing::{Call, Op, Reply, ScriptedBackend, statuses};
use converge_cloud::{
    CloudError, GlobalState, KindProfile, Observation, PollTiming, ResourceController,
    ResourceKind, ResourceRef, ResourceStatus,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn fast_profile(kind: ResourceKind) -> KindProfile {
    KindProfile::for_kind(kind).with_timing(PollTiming::new(
        Duration::from_millis(10),
        Duration::from_millis(100),
    ))
}

fn controller(
    backend: ScriptedBackend,
    kind: ResourceKind,
) -> (ResourceController<ScriptedBackend>, Arc<ScriptedBackend>) {
    let backend = Arc::new(backend);
    (
        ResourceController::new(backend.clone(), fast_profile(kind)),
        backend,
    )
}

fn is_create(call: &Call) -> bool {
    matches!(call, Call::Create(..))
}

fn is_update(call: &Call) -> bool {
    matches!(call, Call::Update(..))
}

fn is_delete(call: &Call) -> bool {
    matches!(call, Call::Delete(..))
}

#[tokio::test(start_paused = true)]
async fn test_create_waits_until_active() {
    let backend =
        ScriptedBackend::new().after(Op::Create, statuses(&["creating", "creating", "active"]));
    let (controller, backend) = controller(backend, ResourceKind::DatabaseCluster);
    let mut state = GlobalState::new();

    let applied = controller
        .create(json!({"name": "main"}), &mut state, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(applied.resource.id, "database-cluster-1");
    assert_eq!(applied.snapshot.status, "active");
    assert_eq!(
        backend.calls()[..2],
        [
            Call::Resolve(ResourceKind::DatabaseCluster),
            Call::Create(ResourceKind::DatabaseCluster, json!({"name": "main"})),
        ]
    );
    assert_eq!(backend.count(|c| matches!(c, Call::Get(_))), 3);

    let entry = state.get(&applied.resource).unwrap();
    assert_eq!(entry.status, ResourceStatus::Active);
    assert_eq!(entry.last_status.as_deref(), Some("active"));
}

#[tokio::test(start_paused = true)]
async fn test_create_error_status_keeps_identifier() {
    let backend = ScriptedBackend::new().after(
        Op::Create,
        vec![
            Reply::status("creating"),
            Reply::StatusWithMessage("error_creating".into(), "quota exceeded".into()),
        ],
    );
    let (controller, _backend) = controller(backend, ResourceKind::KubernetesCluster);
    let mut state = GlobalState::new();

    let err = controller
        .create(json!({}), &mut state, &CancellationToken::new())
        .await
        .unwrap_err();

    match &err {
        CloudError::Backend {
            kind,
            id,
            status,
            message,
        } => {
            assert_eq!(*kind, ResourceKind::KubernetesCluster);
            assert_eq!(id.as_deref(), Some("kubernetes-cluster-1"));
            assert_eq!(status.as_deref(), Some("error_creating"));
            assert_eq!(message.as_deref(), Some("quota exceeded"));
        }
        other => panic!("expected Backend error, got {other:?}"),
    }

    let entry = state
        .get(&ResourceRef::new(ResourceKind::KubernetesCluster, "kubernetes-cluster-1"))
        .unwrap();
    assert_eq!(entry.status, ResourceStatus::Error);
    assert_eq!(entry.message.as_deref(), Some("quota exceeded"));
}

#[tokio::test(start_paused = true)]
async fn test_create_timeout_is_distinct_and_keeps_identifier() {
    let backend = ScriptedBackend::new().after(Op::Create, statuses(&["creating"]));
    let (controller, _backend) = controller(backend, ResourceKind::DatabaseCluster);
    let mut state = GlobalState::new();

    let err = controller
        .create(json!({}), &mut state, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(
        err.to_string(),
        "timed out waiting for database-cluster database-cluster-1 to reach active (last status: creating)"
    );
    let entry = state
        .get(&ResourceRef::new(ResourceKind::DatabaseCluster, "database-cluster-1"))
        .unwrap();
    assert_eq!(entry.status, ResourceStatus::Creating);
    assert_eq!(entry.last_status.as_deref(), Some("creating"));
}

#[tokio::test(start_paused = true)]
async fn test_validation_failure_issues_no_create() {
    let backend = ScriptedBackend::new().failing(Op::Resolve, "vpc 'office' does not exist");
    let (controller, backend) = controller(backend, ResourceKind::Route);
    let mut state = GlobalState::new();

    let err = controller
        .create(json!({"vpc": "office"}), &mut state, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, CloudError::Validation { kind: ResourceKind::Route, .. }));
    assert_eq!(backend.count(is_create), 0);
    assert!(state.resources.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_create_call_is_backend_error_without_id() {
    let backend = ScriptedBackend::new().failing(Op::Create, "insufficient balance");
    let (controller, _backend) = controller(backend, ResourceKind::Vpc);
    let mut state = GlobalState::new();

    let err = controller
        .create(json!({}), &mut state, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, CloudError::Backend { id: None, .. }));
    assert!(err.to_string().contains("insufficient balance"));
    assert!(state.resources.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_create_is_distinct_from_timeout() {
    let backend = ScriptedBackend::new().after(Op::Create, statuses(&["creating"]));
    let (controller, _backend) = controller(backend, ResourceKind::NodePool);
    let mut state = GlobalState::new();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(25)).await;
        trigger.cancel();
    });

    let err = controller
        .create(json!({}), &mut state, &cancel)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(!err.is_timeout());
    assert_eq!(
        err.to_string(),
        "cancelled while waiting for node-pool node-pool-1 to reach active|running"
    );
    // the id of the half-created pool is kept
    assert_eq!(state.by_kind(ResourceKind::NodePool).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_create_not_issued_once_cancelled() {
    let (controller, backend) = controller(ScriptedBackend::new(), ResourceKind::NodePool);
    let mut state = GlobalState::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = controller
        .create(json!({}), &mut state, &cancel)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(
        err.to_string(),
        "create of node-pool <unknown id> cancelled before it was issued"
    );
    assert_eq!(backend.count(is_create), 0);
    assert!(state.resources.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_update_and_delete_not_issued_once_cancelled() {
    let backend = ScriptedBackend::new();
    backend.script("rt-1", statuses(&["active"]));
    let (controller, backend) = controller(backend, ResourceKind::Route);
    let mut state = GlobalState::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = controller
        .update(
            "rt-1",
            &json!({"gateway": "10.0.0.1"}),
            &json!({"gateway": "10.0.0.2"}),
            &mut state,
            &cancel,
        )
        .await
        .unwrap_err();
    assert!(err.is_cancelled());

    let err = controller
        .delete("rt-1", &mut state, &cancel)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());

    assert_eq!(backend.count(is_update), 0);
    assert_eq!(backend.count(is_delete), 0);
}

#[tokio::test(start_paused = true)]
async fn test_update_issues_one_call_per_group() {
    let backend = ScriptedBackend::new().after(Op::Update, statuses(&["scaling", "active"]));
    let (controller, backend) = controller(backend, ResourceKind::NodePool);
    let mut state = GlobalState::new();

    let applied = controller
        .update(
            "np-1",
            &json!({"node_count": 3, "min_size": 1, "name": "pool"}),
            &json!({"node_count": 5, "min_size": 2, "name": "pool"}),
            &mut state,
            &CancellationToken::new(),
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(applied.snapshot.status, "active");
    let updates: Vec<Call> = backend.calls().into_iter().filter(is_update).collect();
    assert_eq!(
        updates,
        vec![
            Call::Update("np-1".into(), json!({"node_count": 5})),
            Call::Update("np-1".into(), json!({"min_size": 2})),
        ]
    );
    assert_eq!(
        state
            .get(&ResourceRef::new(ResourceKind::NodePool, "np-1"))
            .unwrap()
            .status,
        ResourceStatus::Active
    );
}

#[tokio::test(start_paused = true)]
async fn test_update_failure_aborts_remaining_groups() {
    let backend = ScriptedBackend::new().after(Op::Update, statuses(&["resizing", "error"]));
    let (controller, backend) = controller(backend, ResourceKind::DatabaseCluster);
    let mut state = GlobalState::new();

    let err = controller
        .update(
            "db-1",
            &json!({"preset_id": 1, "config_parameters": {}}),
            &json!({"preset_id": 2, "config_parameters": {"max_connections": 200}}),
            &mut state,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CloudError::Backend { .. }));
    assert_eq!(backend.count(is_update), 1);
    let entry = state
        .get(&ResourceRef::new(ResourceKind::DatabaseCluster, "db-1"))
        .unwrap();
    assert_eq!(entry.status, ResourceStatus::Error);
}

#[tokio::test(start_paused = true)]
async fn test_update_timeout_keeps_identifier() {
    let backend = ScriptedBackend::new().after(Op::Update, statuses(&["updating"]));
    let (controller, _backend) = controller(backend, ResourceKind::Vpc);
    let mut state = GlobalState::new();

    let err = controller
        .update(
            "vpc-1",
            &json!({"name": "a"}),
            &json!({"name": "b"}),
            &mut state,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    let entry = state
        .get(&ResourceRef::new(ResourceKind::Vpc, "vpc-1"))
        .unwrap();
    assert_eq!(entry.status, ResourceStatus::Updating);
}

#[tokio::test(start_paused = true)]
async fn test_update_without_changes_is_noop() {
    let (controller, backend) = controller(ScriptedBackend::new(), ResourceKind::Vpc);
    let mut state = GlobalState::new();
    let body = json!({"name": "net"});

    let applied = controller
        .update("vpc-1", &body, &body, &mut state, &CancellationToken::new())
        .await
        .unwrap();

    assert!(applied.is_none());
    assert!(backend.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_delete_of_missing_object_succeeds_without_delete_call() {
    let (controller, backend) = controller(ScriptedBackend::new(), ResourceKind::Route);
    let mut state = GlobalState::new();
    let route = ResourceRef::new(ResourceKind::Route, "rt-1");
    state.record(
        &route,
        ResourceStatus::Active,
        Observation::Unchanged,
    );

    controller
        .delete("rt-1", &mut state, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(backend.count(is_delete), 0);
    assert!(state.get(&route).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_delete_in_progress_is_not_reissued() {
    let backend = ScriptedBackend::new();
    backend.script(
        "np-9",
        vec![
            Reply::status("deleting"),
            Reply::status("deleting"),
            Reply::NotFound,
        ],
    );
    let (controller, backend) = controller(backend, ResourceKind::NodePool);
    let mut state = GlobalState::new();

    controller
        .delete("np-9", &mut state, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(backend.count(is_delete), 0);
    assert_eq!(backend.count(|c| matches!(c, Call::Get(_))), 3);
}

#[tokio::test(start_paused = true)]
async fn test_delete_waits_for_removal() {
    let backend = ScriptedBackend::new().after(
        Op::Delete,
        vec![
            Reply::status("deleting"),
            Reply::status("deleting"),
            Reply::NotFound,
        ],
    );
    backend.script("db-3", statuses(&["active"]));
    let (controller, backend) = controller(backend, ResourceKind::DatabaseReplica);
    let mut state = GlobalState::new();

    controller
        .delete("db-3", &mut state, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(backend.count(is_delete), 1);
    assert!(state.resources.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_delete_accepts_removed_status() {
    let backend = ScriptedBackend::new().after(Op::Delete, statuses(&["deleting", "deleted"]));
    backend.script("vpc-2", statuses(&["active"]));
    let (controller, _backend) = controller(backend, ResourceKind::Vpc);
    let mut state = GlobalState::new();

    controller
        .delete("vpc-2", &mut state, &CancellationToken::new())
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_delete_timeout_names_removal_target() {
    let backend = ScriptedBackend::new().after(Op::Delete, statuses(&["deleting"]));
    backend.script("k-1", statuses(&["provisioned"]));
    let (controller, _backend) = controller(backend, ResourceKind::KubernetesCluster);
    let mut state = GlobalState::new();

    let err = controller
        .delete("k-1", &mut state, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "timed out waiting for kubernetes-cluster k-1 to reach removed (last status: deleting)"
    );
    let entry = state
        .get(&ResourceRef::new(ResourceKind::KubernetesCluster, "k-1"))
        .unwrap();
    assert_eq!(entry.status, ResourceStatus::Deleting);
}

#[tokio::test(start_paused = true)]
async fn test_delete_call_not_found_is_success() {
    let backend = ScriptedBackend::new().not_found_on(Op::Delete);
    backend.script("rt-5", statuses(&["active"]));
    let (controller, _backend) = controller(backend, ResourceKind::Route);
    let mut state = GlobalState::new();

    controller
        .delete("rt-5", &mut state, &CancellationToken::new())
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_read_missing_object_forgets_it() {
    let (controller, backend) = controller(ScriptedBackend::new(), ResourceKind::Vpc);
    let mut state = GlobalState::new();
    let vpc = ResourceRef::new(ResourceKind::Vpc, "vpc-1");
    state.record(
        &vpc,
        ResourceStatus::Active,
        Observation::Unchanged,
    );

    let snapshot = controller.read("vpc-1", &mut state).await.unwrap();

    assert!(snapshot.is_none());
    assert!(state.get(&vpc).is_none());
    assert_eq!(backend.calls(), vec![Call::Get("vpc-1".into())]);
}

#[tokio::test(start_paused = true)]
async fn test_read_records_observed_status() {
    let backend = ScriptedBackend::new();
    backend.script("np-2", statuses(&["running"]));
    let (controller, _backend) = controller(backend, ResourceKind::NodePool);
    let mut state = GlobalState::new();

    let snapshot = controller.read("np-2", &mut state).await.unwrap().unwrap();

    assert_eq!(snapshot.status, "running");
    let entry = state
        .get(&ResourceRef::new(ResourceKind::NodePool, "np-2"))
        .unwrap();
    assert_eq!(entry.status, ResourceStatus::Active);
    assert_eq!(entry.attributes["id"], "np-2");
}

#[tokio::test(start_paused = true)]
async fn test_read_backend_failure_is_qualified() {
    let backend = ScriptedBackend::new();
    backend.script("db-1", vec![Reply::Fail("503 unavailable".into())]);
    let (controller, _backend) = controller(backend, ResourceKind::DatabaseCluster);
    let mut state = GlobalState::new();

    let err = controller.read("db-1", &mut state).await.unwrap_err();

    assert_eq!(
        err.to_string(),
        "database-cluster db-1: backend reported status <none> (API error: 503 unavailable)"
    );
}

#[tokio::test(start_paused = true)]
async fn test_wait_active_on_existing_object() {
    let backend = ScriptedBackend::new();
    backend.script("k-2", statuses(&["provisioning", "provisioned"]));
    let (controller, _backend) = controller(backend, ResourceKind::KubernetesCluster);
    let mut state = GlobalState::new();

    let applied = controller
        .wait_active("k-2", &mut state, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(applied.snapshot.status, "provisioned");
}

#[tokio::test(start_paused = true)]
async fn test_wait_active_names_active_target_after_delete() {
    let backend = ScriptedBackend::new();
    backend.script("vpc-1", statuses(&["pending"]));
    let (controller, _backend) = controller(backend, ResourceKind::Vpc);
    let mut state = GlobalState::new();
    let resource = ResourceRef::new(ResourceKind::Vpc, "vpc-1");
    state.record(&resource, ResourceStatus::Deleting, Observation::Unchanged);

    let err = controller
        .wait_active("vpc-1", &mut state, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "timed out waiting for vpc vpc-1 to reach active (last status: pending)"
    );
    let entry = state.get(&resource).unwrap();
    assert_eq!(entry.status, ResourceStatus::Deleting);
    assert_eq!(entry.last_status.as_deref(), Some("pending"));
}
