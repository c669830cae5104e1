mod common;

use common::{FakeBoardServer, json_body, object, open_engine, wait_until_drained};
use serde_json::json;
use taskboard_sync::domain::value_objects::HttpMethod;
use taskboard_sync::{
    DiscardReason, MutationMethod, ReadSource, StopReason, SyncEvent, WriteDisposition,
};
use tempfile::tempdir;

#[tokio::test]
async fn offline_board_edits_replay_in_order_and_read_back_clean() {
    let dir = tempdir().unwrap();
    let server = FakeBoardServer::new();
    let engine = open_engine(&server, &dir.path().join("sync.db"), false).await;

    server.set_online(false);
    engine.set_online(false);

    let created = engine
        .write(
            MutationMethod::Create,
            "/boards",
            json_body(json!({"id": "b1", "title": "Sprint"})),
        )
        .await
        .unwrap();
    assert!(matches!(created.disposition, WriteDisposition::Queued(_)));
    assert_eq!(created.body["id"], "b1");

    let list = engine
        .write(
            MutationMethod::Create,
            "/boards/b1/lists",
            json_body(json!({"id": "l1", "title": "Todo"})),
        )
        .await
        .unwrap();
    assert!(list.is_local());
    assert_eq!(list.status, 201);
    assert_eq!(list.body["boardId"], "b1");
    assert_eq!(list.body["isOffline"], true);

    engine
        .write(
            MutationMethod::Create,
            "/boards/b1/lists/l1/cards",
            json_body(json!({"id": "c1", "title": "Write tests"})),
        )
        .await
        .unwrap();
    for title in ["Sprint 2", "Sprint 3"] {
        engine
            .write(
                MutationMethod::PartialUpdate,
                "/boards/b1",
                json_body(json!({"title": title})),
            )
            .await
            .unwrap();
    }
    assert_eq!(engine.pending_mutations().await.unwrap(), 5);

    let offline = engine.read("/boards/b1").await.unwrap();
    assert_eq!(offline.source, ReadSource::Local);
    assert!(offline.view.has_unsynced_changes());
    let board = offline.view.body.unwrap();
    assert_eq!(board["title"], "Sprint 3");
    assert_eq!(board["isOffline"], true);
    assert_eq!(board["lists"][0]["id"], "l1");
    assert_eq!(board["lists"][0]["isOffline"], true);
    assert_eq!(board["lists"][0]["cards"][0]["title"], "Write tests");

    server.set_online(true);
    server.clear_log();
    let report = engine.sync_now().await.unwrap();
    assert_eq!(report.replayed, 5);
    assert!(report.is_drained());

    let requests: Vec<(HttpMethod, String)> = server.log();
    assert_eq!(
        requests,
        vec![
            (HttpMethod::Post, "/boards".to_string()),
            (HttpMethod::Post, "/boards/b1/lists".to_string()),
            (HttpMethod::Post, "/boards/b1/lists/l1/cards".to_string()),
            (HttpMethod::Patch, "/boards/b1".to_string()),
            (HttpMethod::Patch, "/boards/b1".to_string()),
        ]
    );

    let remote = server.resource("/boards/b1").unwrap();
    assert_eq!(remote["title"], "Sprint 3");
    assert!(object(&remote["lists"][0]).get("isOffline").is_none());

    let online = engine.read("/boards/b1").await.unwrap();
    assert_eq!(online.source, ReadSource::Network);
    assert!(!online.view.has_unsynced_changes());
    let board = online.view.body.unwrap();
    assert!(object(&board["lists"][0]).get("isOffline").is_none());
    assert_eq!(board["lists"][0]["cards"][0]["id"], "c1");

    let again = engine.sync_now().await.unwrap();
    assert_eq!(again.replayed, 0);
    assert_eq!(server.log().len(), 6);

    engine.shutdown().await;
}

#[tokio::test]
async fn deleting_an_offline_board_cancels_its_queued_writes() {
    let dir = tempdir().unwrap();
    let server = FakeBoardServer::new();
    let engine = open_engine(&server, &dir.path().join("sync.db"), false).await;

    engine.read("/boards").await.unwrap();
    server.set_online(false);

    engine
        .write(
            MutationMethod::Create,
            "/boards",
            json_body(json!({"id": "b2", "title": "Scratch"})),
        )
        .await
        .unwrap();
    engine
        .write(
            MutationMethod::Create,
            "/boards/b2/lists",
            json_body(json!({"id": "l9", "title": "Ideas"})),
        )
        .await
        .unwrap();

    let listed = engine.read("/boards").await.unwrap();
    assert_eq!(listed.view.body.unwrap()[0]["id"], "b2");

    let deleted = engine
        .write(MutationMethod::Delete, "/boards/b2", None)
        .await
        .unwrap();
    assert_eq!(deleted.status, 200);
    assert!(matches!(deleted.disposition, WriteDisposition::Compacted(ref ids) if ids.len() == 2));
    assert_eq!(engine.pending_mutations().await.unwrap(), 0);

    let listed = engine.read("/boards").await.unwrap();
    assert_eq!(listed.view.body.unwrap(), json!([]));

    server.set_online(true);
    server.clear_log();
    let report = engine.sync_now().await.unwrap();
    assert_eq!(report.replayed, 0);
    assert!(server.log().is_empty());
    assert!(server.resource("/boards/b2").is_none());

    engine.shutdown().await;
}

#[tokio::test]
async fn server_fault_stops_the_drain_until_the_next_attempt() {
    let dir = tempdir().unwrap();
    let server = FakeBoardServer::new();
    let engine = open_engine(&server, &dir.path().join("sync.db"), false).await;

    server.set_online(false);
    engine
        .write(
            MutationMethod::Create,
            "/boards",
            json_body(json!({"id": "b3", "title": "Ops"})),
        )
        .await
        .unwrap();
    engine
        .write(
            MutationMethod::PartialUpdate,
            "/boards/b3",
            json_body(json!({"title": "Operations"})),
        )
        .await
        .unwrap();

    server.set_online(true);
    server.fail_next(503);
    let report = engine.sync_now().await.unwrap();
    assert_eq!(report.replayed, 0);
    assert_eq!(report.remaining, 2);
    assert_eq!(report.stopped, Some(StopReason::ServerFault { status: 503 }));
    assert!(server.resource("/boards/b3").is_none());

    let report = engine.sync_now().await.unwrap();
    assert_eq!(report.replayed, 2);
    assert_eq!(server.resource("/boards/b3").unwrap()["title"], "Operations");

    engine.shutdown().await;
}

#[tokio::test]
async fn rejected_replay_is_reported_to_subscribers() {
    let dir = tempdir().unwrap();
    let server = FakeBoardServer::new();
    let engine = open_engine(&server, &dir.path().join("sync.db"), false).await;

    engine
        .write(
            MutationMethod::Create,
            "/boards",
            json_body(json!({"id": "b4", "title": "Roadmap"})),
        )
        .await
        .unwrap();

    server.set_online(false);
    engine
        .write(
            MutationMethod::PartialUpdate,
            "/boards/b4",
            json_body(json!({"title": ""})),
        )
        .await
        .unwrap();
    engine
        .write(
            MutationMethod::PartialUpdate,
            "/boards/b4",
            json_body(json!({"color": "green"})),
        )
        .await
        .unwrap();

    let mut events = engine.subscribe();
    server.set_online(true);
    let report = engine.sync_now().await.unwrap();
    assert_eq!(report.replayed, 1);
    assert_eq!(report.rejected_count(), 1);

    let mut discarded = Vec::new();
    let mut finished = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            SyncEvent::MutationDiscarded(mutation) => discarded.push(mutation),
            SyncEvent::DrainFinished(_) => finished += 1,
        }
    }
    assert_eq!(discarded.len(), 1);
    assert!(matches!(
        discarded[0].reason,
        DiscardReason::Rejected { status: 422, .. }
    ));
    assert_eq!(finished, 1);

    let remote = server.resource("/boards/b4").unwrap();
    assert_eq!(remote["title"], "Roadmap");
    assert_eq!(remote["color"], "green");

    engine.shutdown().await;
}

#[tokio::test]
async fn server_assigned_ids_are_followed_by_later_writes_and_reads() {
    let dir = tempdir().unwrap();
    let server = FakeBoardServer::assigning_ids();
    let engine = open_engine(&server, &dir.path().join("sync.db"), false).await;

    server.set_online(false);
    engine
        .write(
            MutationMethod::Create,
            "/boards",
            json_body(json!({"id": "tmp-board", "title": "Launch"})),
        )
        .await
        .unwrap();
    engine
        .write(
            MutationMethod::Create,
            "/boards/tmp-board/lists",
            json_body(json!({"id": "tmp-list", "title": "Checklist", "boardId": "tmp-board"})),
        )
        .await
        .unwrap();

    server.set_online(true);
    let report = engine.sync_now().await.unwrap();
    assert_eq!(report.replayed, 2);

    let remote = server.resource("/boards/srv-1").unwrap();
    assert_eq!(remote["title"], "Launch");
    assert_eq!(remote["lists"][0]["id"], "srv-2");
    assert_eq!(remote["lists"][0]["boardId"], "srv-1");

    let read = engine.read("/boards/tmp-board").await.unwrap();
    assert_eq!(read.source, ReadSource::Network);
    assert_eq!(read.view.body.unwrap()["id"], "srv-1");

    engine
        .write(
            MutationMethod::PartialUpdate,
            "/boards/tmp-board/lists/tmp-list",
            json_body(json!({"title": "Launch checklist"})),
        )
        .await
        .unwrap();
    assert_eq!(
        server.resource("/boards/srv-1/lists/srv-2").unwrap()["title"],
        "Launch checklist"
    );

    engine.shutdown().await;
}

#[tokio::test]
async fn coming_back_online_drains_automatically() {
    let dir = tempdir().unwrap();
    let server = FakeBoardServer::new();
    let engine = open_engine(&server, &dir.path().join("sync.db"), true).await;

    engine.set_online(false);
    server.set_online(false);
    let outcome = engine
        .write(
            MutationMethod::Create,
            "/boards",
            json_body(json!({"id": "b5", "title": "Backlog"})),
        )
        .await
        .unwrap();
    assert!(matches!(outcome.disposition, WriteDisposition::Queued(_)));

    server.set_online(true);
    engine.set_online(true);
    wait_until_drained(&engine).await;
    assert_eq!(server.resource("/boards/b5").unwrap()["title"], "Backlog");

    engine.shutdown().await;
}
