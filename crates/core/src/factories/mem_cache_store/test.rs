use super::*;
use crate::default_builder;

fn fp(s: &str) -> Fingerprint {
    Fingerprint::from(s.to_string())
}

fn entry(v: u32, at: i64) -> CacheEntry {
    CacheEntry::new(serde_json::json!(v), Timestamp::from_millis(at))
}

#[tokio::test]
async fn mem_cache_store_basics() {
    let builder = default_builder().with_default_config().unwrap().build();
    let store = builder
        .cache_store
        .create(builder.clone(), "ns".into())
        .await
        .unwrap();

    assert_eq!(None, store.get(fp("a")).await.unwrap());

    store.set(fp("a"), entry(1, 10)).await.unwrap();
    store.set(fp("b"), entry(2, 20)).await.unwrap();
    store.set(fp("a"), entry(3, 30)).await.unwrap();
    assert_eq!(Some(entry(3, 30)), store.get(fp("a")).await.unwrap());

    let mut seen = Vec::new();
    store
        .iterate(&mut |k: &Fingerprint, e: &CacheEntry| {
            seen.push((k.clone(), e.clone()))
        })
        .await
        .unwrap();
    seen.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(vec![(fp("a"), entry(3, 30)), (fp("b"), entry(2, 20))], seen);

    store.remove(fp("a")).await.unwrap();
    store.remove(fp("missing")).await.unwrap();
    assert_eq!(None, store.get(fp("a")).await.unwrap());

    store.clear().await.unwrap();
    assert_eq!(None, store.get(fp("b")).await.unwrap());
}

#[tokio::test]
async fn stores_share_data_per_namespace() {
    let builder = default_builder().with_default_config().unwrap().build();
    let factory = builder.cache_store.clone();
    let a = factory.create(builder.clone(), "ns".into()).await.unwrap();
    let b = factory.create(builder.clone(), "ns".into()).await.unwrap();
    let other = factory.create(builder.clone(), "other".into()).await.unwrap();

    a.set(fp("k"), entry(1, 10)).await.unwrap();
    assert_eq!(Some(entry(1, 10)), b.get(fp("k")).await.unwrap());
    assert_eq!(None, other.get(fp("k")).await.unwrap());

    other.clear().await.unwrap();
    assert_eq!(Some(entry(1, 10)), a.get(fp("k")).await.unwrap());
}

#[tokio::test]
async fn separate_factories_do_not_share() {
    let b1 = default_builder().with_default_config().unwrap().build();
    let b2 = default_builder().with_default_config().unwrap().build();
    let s1 = b1.cache_store.create(b1.clone(), "ns".into()).await.unwrap();
    let s2 = b2.cache_store.create(b2.clone(), "ns".into()).await.unwrap();

    s1.set(fp("k"), entry(1, 10)).await.unwrap();
    assert_eq!(None, s2.get(fp("k")).await.unwrap());
}
