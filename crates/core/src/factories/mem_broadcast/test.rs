use super::*;
use crate::default_builder;

fn msg(n: u32) -> BroadcastMessage {
    BroadcastMessage::success(
        Fingerprint::from(format!("fp{n}")),
        &serde_json::json!(n),
    )
    .unwrap()
}

async fn open(
    builder: &Arc<builder::Builder>,
    name: &str,
) -> DynBroadcastChannel {
    builder
        .broadcast
        .create(builder.clone(), name.into())
        .await
        .unwrap()
}

#[tokio::test]
async fn delivers_to_siblings_not_self() {
    let builder = default_builder().with_default_config().unwrap().build();
    let a = open(&builder, "chan").await;
    let b = open(&builder, "chan").await;
    let c = open(&builder, "chan").await;
    assert_eq!("chan", a.name());

    let mut a_recv = a.on_message().unwrap();
    let mut b_recv = b.on_message().unwrap();
    let mut c_recv = c.on_message().unwrap();

    a.send(msg(1)).await.unwrap();
    a.send(msg(2)).await.unwrap();

    assert_eq!(msg(1), b_recv.recv().await.unwrap());
    assert_eq!(msg(2), b_recv.recv().await.unwrap());
    assert_eq!(msg(1), c_recv.recv().await.unwrap());
    assert_eq!(msg(2), c_recv.recv().await.unwrap());
    assert!(a_recv.try_recv().is_err());
}

#[tokio::test]
async fn names_are_isolated() {
    let builder = default_builder().with_default_config().unwrap().build();
    let a = open(&builder, "one").await;
    let b = open(&builder, "two").await;
    let mut b_recv = b.on_message().unwrap();

    a.send(msg(1)).await.unwrap();
    assert!(b_recv.try_recv().is_err());
}

#[tokio::test]
async fn close_ends_receiver_but_not_sending() {
    let builder = default_builder().with_default_config().unwrap().build();
    let a = open(&builder, "chan").await;
    let b = open(&builder, "chan").await;
    let mut a_recv = a.on_message().unwrap();
    let mut b_recv = b.on_message().unwrap();

    b.close();
    assert!(b_recv.recv().await.is_none());

    // a closed channel can still publish
    b.send(msg(3)).await.unwrap();
    assert_eq!(msg(3), a_recv.recv().await.unwrap());

    a.send(msg(4)).await.unwrap();
    b.close();
}

#[tokio::test]
async fn drop_unsubscribes() {
    let builder = default_builder().with_default_config().unwrap().build();
    let a = open(&builder, "chan").await;
    let b = open(&builder, "chan").await;
    let mut b_recv = b.on_message().unwrap();
    drop(b);
    assert!(b_recv.recv().await.is_none());
    a.send(msg(1)).await.unwrap();
}
