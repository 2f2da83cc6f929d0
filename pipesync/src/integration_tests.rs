//! End-to-end flows across modules.

use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

use crate::cancellation::CancellationToken;
use crate::core::{Collection, Operator, OrderedItem, Scope, Status};
use crate::errors::{PipesyncError, ValidationErrorKind};
use crate::graph::OperatorGraph;
use crate::positions::PositionService;
use crate::reconcile::{plan, StatusReconciler, Workflow, WorkflowHandler};
use crate::store::{InMemoryStore, ScopeLocks, Store};
use crate::testing::{
    assert_active, assert_dense_positions, assert_operator_status, modified, RecordingHandler, ScriptedWatch,
    ScriptedWatchApi, WorkflowFixture,
};
use crate::watch::{ListResult, ResourceKind, StreamItem, WatchCursor, WatchEventType, WatchHandler, WatchSession};

fn listed(items: Vec<serde_json::Value>, rv: &str) -> ListResult {
    ListResult {
        items,
        resource_version: WatchCursor::new(rv),
    }
}

#[tokio::test]
async fn test_gone_replay_matches_relist() {
    let token = CancellationToken::new();
    let relisted = vec![
        json!({"metadata": {"name": "a", "resourceVersion": "20"}, "phase": "Failed"}),
        json!({"metadata": {"name": "c", "resourceVersion": "21"}}),
    ];
    let e3 = modified("d", "22");
    let e4 = crate::watch::WatchEvent::new(
        WatchEventType::Deleted,
        json!({"metadata": {"name": "c", "resourceVersion": "23"}}),
    );

    let api = Arc::new(
        ScriptedWatchApi::new()
            .with_list(Ok(listed(vec![json!({"metadata": {"name": "a"}})], "10")))
            .with_watch(ScriptedWatch::Open(vec![
                StreamItem::Event(modified("a", "11")),
                StreamItem::Event(modified("b", "12")),
                StreamItem::Stale,
            ]))
            .with_list(Ok(listed(relisted.clone(), "21")))
            .with_watch(ScriptedWatch::events(vec![e3.clone(), e4.clone()]))
            .cancel_when_exhausted(token.clone()),
    );
    let replayed = RecordingHandler::new();
    let mut session = WatchSession::new(api, ResourceKind::workflows("anonymous"), Duration::from_secs(30), token);
    assert_ok!(session.run(&replayed).await);

    let expected = RecordingHandler::new();
    assert_ok!(expected.on_listed(&relisted).await);
    assert_ok!(expected.on_event(&e3).await);
    assert_ok!(expected.on_event(&e4).await);

    assert_eq!(replayed.view(), expected.view());
    assert_eq!(replayed.list_count(), 2);
    assert_eq!(session.cursor(), Some(&WatchCursor::new("23")));
}

#[tokio::test]
async fn test_gone_replay_converges_store() {
    let scope = Scope::Experiment(Uuid::new_v4());
    let a = Operator::new(Uuid::new_v4(), scope, Uuid::new_v4());
    let b = Operator::new(Uuid::new_v4(), scope, Uuid::new_v4()).with_dependencies([a.id]);
    let (a_id, b_id) = (a.id.to_string(), b.id.to_string());
    let workflow = || WorkflowFixture::new(scope).with_task(&a_id, &[]).with_task(&b_id, &[a_id.as_str()]);

    let stale_running = workflow()
        .with_phase("Running")
        .with_node(&a_id, "Running", None)
        .with_resource_version("11");
    let relisted = workflow()
        .with_phase("Running")
        .with_node(&a_id, "Succeeded", None)
        .with_node(&b_id, "Running", Some("ContainerCreating"))
        .with_resource_version("30");
    let finished = workflow()
        .with_phase("Failed")
        .with_node(&a_id, "Succeeded", None)
        .with_node(&b_id, "Error", Some("OOMKilled"))
        .with_resource_version("31");

    let replay_store = Arc::new(InMemoryStore::new());
    assert_ok!(replay_store.upsert_operators(vec![a.clone(), b.clone()]).await);
    let token = CancellationToken::new();
    let api = Arc::new(
        ScriptedWatchApi::new()
            .with_list(Ok(listed(Vec::new(), "10")))
            .with_watch(ScriptedWatch::Open(vec![
                StreamItem::Event(stale_running.event(WatchEventType::Modified)),
                StreamItem::Stale,
            ]))
            .with_list(Ok(listed(vec![relisted.build()], "30")))
            .with_watch(ScriptedWatch::events(vec![finished.event(WatchEventType::Modified)]))
            .cancel_when_exhausted(token.clone()),
    );
    let mut session = WatchSession::new(api, ResourceKind::workflows("anonymous"), Duration::from_secs(30), token);
    assert_ok!(session.run(&WorkflowHandler::new(replay_store.clone())).await);

    let direct_store = Arc::new(InMemoryStore::new());
    assert_ok!(direct_store.upsert_operators(vec![a.clone(), b.clone()]).await);
    let handler = WorkflowHandler::new(direct_store.clone());
    assert_ok!(handler.on_listed(&[relisted.build()]).await);
    assert_ok!(handler.on_event(&finished.event(WatchEventType::Modified)).await);

    let strip = |ops: Vec<Operator>| -> Vec<(Uuid, Status, Option<String>)> {
        ops.into_iter().map(|op| (op.id, op.status, op.status_message)).collect()
    };
    assert_eq!(strip(replay_store.all_operators()), strip(direct_store.all_operators()));

    let b_row = assert_ok!(replay_store.get_operator(b.id).await).unwrap();
    assert_operator_status(&b_row, Status::Failed, Some("OOMKilled"));
}

#[tokio::test]
async fn test_validation_then_order() {
    let store = Arc::new(InMemoryStore::new());
    let graph = OperatorGraph::new(store.clone(), Arc::new(ScopeLocks::new()));
    let scope = Scope::Experiment(Uuid::new_v4());
    let base = chrono::Utc::now();

    let a = Operator::new(Uuid::new_v4(), scope, Uuid::new_v4()).with_created_at(base);
    let b = Operator::new(Uuid::new_v4(), scope, Uuid::new_v4())
        .with_dependencies([a.id])
        .with_created_at(base + chrono::Duration::seconds(1));
    let c = Operator::new(Uuid::new_v4(), scope, Uuid::new_v4())
        .with_dependencies([a.id, b.id])
        .with_created_at(base + chrono::Duration::seconds(2));
    for op in [&a, &b, &c] {
        assert_ok!(graph.create(op.clone()).await);
    }
    assert_eq!(assert_ok!(graph.execution_order(scope).await), vec![a.id, b.id, c.id]);

    let d = Operator::new(Uuid::new_v4(), scope, Uuid::new_v4()).with_dependencies([a.id, Uuid::new_v4()]);
    match assert_err!(graph.create(d.clone()).await) {
        PipesyncError::Validation(e) => assert_eq!(e.kind, ValidationErrorKind::UnknownDependency),
        other => panic!("unexpected error: {other}"),
    }
    assert!(assert_ok!(store.get_operator(d.id).await).is_none());

    let patched = assert_ok!(graph.remove(scope, a.id).await);
    assert_eq!(patched.len(), 2);
    let c_row = assert_ok!(store.get_operator(c.id).await).unwrap();
    assert_eq!(c_row.dependencies, vec![b.id]);
    assert_eq!(assert_ok!(graph.execution_order(scope).await), vec![b.id, c.id]);
}

#[tokio::test]
async fn test_self_dependency_rejected_with_valid_deps() {
    let store = Arc::new(InMemoryStore::new());
    let graph = OperatorGraph::new(store, Arc::new(ScopeLocks::new()));
    let scope = Scope::Deployment(Uuid::new_v4());
    let a = Operator::new(Uuid::new_v4(), scope, Uuid::new_v4());
    let b = Operator::new(Uuid::new_v4(), scope, Uuid::new_v4());
    assert_ok!(graph.create(a.clone()).await);
    assert_ok!(graph.create(b.clone()).await);

    let err = assert_err!(graph.set_dependencies(scope, b.id, vec![a.id, b.id]).await);
    assert!(matches!(
        err,
        PipesyncError::Validation(ref e) if e.kind == ValidationErrorKind::SelfDependency
    ));
}

#[tokio::test]
async fn test_reconcile_is_idempotent() {
    let store = Arc::new(InMemoryStore::new());
    let scope = Scope::Experiment(Uuid::new_v4());
    let a = Operator::new(Uuid::new_v4(), scope, Uuid::new_v4());
    let b = Operator::new(Uuid::new_v4(), scope, Uuid::new_v4()).with_dependencies([a.id]);
    assert_ok!(store.upsert_operators(vec![a.clone(), b.clone()]).await);

    let workflow = assert_ok!(Workflow::from_value(
        &WorkflowFixture::new(scope)
            .with_phase("Running")
            .with_node(&a.id.to_string(), "Running", Some("ContainerCreating"))
            .with_node(&b.id.to_string(), "Failed", Some("terminated"))
            .build()
    ));
    let reconciler = StatusReconciler::new(store.clone());

    let first = assert_ok!(reconciler.apply(&plan(&workflow)).await);
    let after_once = store.all_operators();
    let second = assert_ok!(reconciler.apply(&plan(&workflow)).await);

    assert_eq!(first.operators_changed, 2);
    assert_eq!(second.operators_changed, 0);
    assert_eq!(store.all_operators(), after_once);

    let a_row = assert_ok!(store.get_operator(a.id).await).unwrap();
    assert_operator_status(&a_row, Status::Running, None);
    let b_row = assert_ok!(store.get_operator(b.id).await).unwrap();
    assert_operator_status(&b_row, Status::Terminated, None);
}

#[tokio::test]
async fn test_positions_after_mixed_operations() {
    let store = Arc::new(InMemoryStore::new());
    let service = PositionService::new(store.clone(), Arc::new(ScopeLocks::new()));
    let project = Uuid::new_v4();
    let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
    let rows = ids
        .iter()
        .enumerate()
        .map(|(i, id)| OrderedItem::new(*id, project, i))
        .collect();
    assert_ok!(store.upsert_items(Collection::Deployments, rows).await);

    let newcomer = Uuid::new_v4();
    let items = assert_ok!(
        service
            .insert(Collection::Deployments, project, OrderedItem::new(newcomer, project, 0), 10)
            .await
    );
    assert_dense_positions(&items);
    assert_eq!(items.iter().position(|i| i.id == newcomer), Some(3));
    assert_active(&items, newcomer);

    let items = assert_ok!(service.move_item(Collection::Deployments, project, ids[2], 0).await);
    assert_dense_positions(&items);
    assert_active(&items, ids[2]);

    let items = assert_ok!(service.remove(Collection::Deployments, project, ids[0]).await);
    assert_dense_positions(&items);
    assert_active(&items, newcomer);
}
