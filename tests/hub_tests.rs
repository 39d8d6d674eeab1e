use mosaic::hub::{Event, HubError, NotificationHub, EVENT_FILE_COMPLETED, EVENT_REGISTER};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use uuid::Uuid;

async fn next_frame(rx: &mut mpsc::Receiver<String>) -> serde_json::Value {
    let frame = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("channel closed");
    serde_json::from_str(&frame).expect("frame is not valid json")
}

#[tokio::test]
async fn test_register_pushes_register_event() {
    let hub = NotificationHub::spawn();
    let client_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::channel(8);

    hub.register(client_id, tx).await.unwrap();

    let event = next_frame(&mut rx).await;
    assert_eq!(event["e"], EVENT_REGISTER);
    assert_eq!(event["p"]["id"], client_id.to_string());
}

#[tokio::test]
async fn test_unicast_reaches_only_the_target() {
    let hub = NotificationHub::spawn();
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let (tx_a, mut rx_a) = mpsc::channel(8);
    let (tx_b, mut rx_b) = mpsc::channel(8);

    hub.register(a, tx_a).await.unwrap();
    hub.register(b, tx_b).await.unwrap();
    next_frame(&mut rx_a).await;
    next_frame(&mut rx_b).await;

    hub.unicast(a, Event::new(EVENT_FILE_COMPLETED, serde_json::json!({"id": 1})))
        .await
        .unwrap();

    let event = next_frame(&mut rx_a).await;
    assert_eq!(event["e"], EVENT_FILE_COMPLETED);

    // b got nothing
    assert!(rx_b.try_recv().is_err());
}

#[tokio::test]
async fn test_unicast_to_unknown_client_errors() {
    let hub = NotificationHub::spawn();
    let ghost = Uuid::new_v4();

    let err = hub
        .unicast(ghost, Event::new("x", serde_json::json!({})))
        .await
        .unwrap_err();
    assert_eq!(err, HubError::NotRegistered(ghost));
}

#[tokio::test]
async fn test_broadcast_reaches_everyone() {
    let hub = NotificationHub::spawn();
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let (tx_a, mut rx_a) = mpsc::channel(8);
    let (tx_b, mut rx_b) = mpsc::channel(8);

    hub.register(a, tx_a).await.unwrap();
    hub.register(b, tx_b).await.unwrap();
    next_frame(&mut rx_a).await;
    next_frame(&mut rx_b).await;

    hub.broadcast(Event::new("file:added", serde_json::json!({"slug": "x"})))
        .await
        .unwrap();

    assert_eq!(next_frame(&mut rx_a).await["e"], "file:added");
    assert_eq!(next_frame(&mut rx_b).await["e"], "file:added");
}

#[tokio::test]
async fn test_full_buffer_drops_the_client() {
    let hub = NotificationHub::spawn();
    let client_id = Uuid::new_v4();
    // room for the register event plus one more, never drained
    let (tx, mut rx) = mpsc::channel(2);

    hub.register(client_id, tx).await.unwrap();

    hub.unicast(client_id, Event::new("one", serde_json::json!({})))
        .await
        .unwrap();

    // buffer is now full: the client gets treated as disconnected
    let err = hub
        .unicast(client_id, Event::new("two", serde_json::json!({})))
        .await
        .unwrap_err();
    assert_eq!(err, HubError::BufferFull(client_id));

    // and it is gone from the registry
    let err = hub
        .unicast(client_id, Event::new("three", serde_json::json!({})))
        .await
        .unwrap_err();
    assert_eq!(err, HubError::NotRegistered(client_id));

    // the frames that made it in are still readable
    assert!(rx.recv().await.is_some());
    assert!(rx.recv().await.is_some());
}

#[tokio::test]
async fn test_unregister_removes_the_client() {
    let hub = NotificationHub::spawn();
    let client_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::channel(8);

    hub.register(client_id, tx).await.unwrap();
    next_frame(&mut rx).await;

    hub.unregister(client_id).await.unwrap();

    let err = hub
        .unicast(client_id, Event::new("x", serde_json::json!({})))
        .await
        .unwrap_err();
    assert_eq!(err, HubError::NotRegistered(client_id));
}
