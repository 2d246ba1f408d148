//! Several contexts opened from one builder coordinating through the
//! shared snapshot, cache store and broadcast hub.

use rpc_cache_api::{builder::Builder, *};
use rpc_cache_core::{
    default_builder,
    factories::{
        core_request_cache::WaitSnapshot, CoreRequestCacheFactory,
        FileCacheStoreFactory, FileSnapshotStoreFactory,
    },
    file_builder,
};
use rpc_cache_test_utils::{
    enable_tracing, fetcher::TestFetcher, iter_check, locator::random_locator,
};
use std::sync::Arc;
use std::time::Duration;

const SNAPSHOT_KEY: &str = "RpcCache-state";
const CHANNEL: &str = "RpcCache-message";

async fn snapshot(builder: &Arc<Builder>) -> WaitSnapshot {
    let store = builder.snapshot_store.create(builder.clone()).await.unwrap();
    WaitSnapshot::load(&*store, SNAPSHOT_KEY).unwrap()
}

/// Record `fingerprint` as in flight, as a context that reloaded mid-fetch
/// would have left it.
async fn leave_in_flight(builder: &Arc<Builder>, fingerprint: &Fingerprint) {
    let store = builder.snapshot_store.create(builder.clone()).await.unwrap();
    let mut snap = WaitSnapshot::load(&*store, SNAPSHOT_KEY).unwrap();
    snap.insert(fingerprint.clone());
    snap.persist(&*store, SNAPSHOT_KEY).unwrap();
}

async fn wait_for_waiters(
    builder: &Arc<Builder>,
    fingerprint: &Fingerprint,
    count: usize,
) {
    iter_check!({
        if snapshot(builder).await.tokens(fingerprint).map(|t| t.len())
            == Some(count)
        {
            break;
        }
    });
}

fn spawn_resolve(
    cache: &DynRequestCache,
    fetcher: &TestFetcher,
    options: RequestOptions,
) -> tokio::task::JoinHandle<CacheResult<serde_json::Value>> {
    let cache = cache.clone();
    let fetch = fetcher.as_dyn();
    tokio::spawn(async move { cache.resolve_request(Some(fetch), options).await })
}

#[tokio::test]
async fn sibling_receives_result_without_fetching() {
    enable_tracing();
    let builder = default_builder().with_default_config().unwrap().build();
    let options = RequestOptions::new(random_locator());
    let fingerprint = options.fingerprint().unwrap();

    let ctx_a = builder.open_context().await.unwrap();
    let fetcher_a = TestFetcher::echo().gated();
    let task_a = spawn_resolve(&ctx_a, &fetcher_a, options.clone());
    iter_check!({
        if fetcher_a.calls() == 1 {
            break;
        }
    });

    // a context opened now sees the request as in flight elsewhere
    let ctx_b = builder.open_context().await.unwrap();
    let fetcher_b = TestFetcher::echo();
    let task_b = spawn_resolve(&ctx_b, &fetcher_b, options.clone());
    wait_for_waiters(&builder, &fingerprint, 1).await;

    fetcher_a.release();

    let a = task_a.await.unwrap().unwrap();
    let b = task_b.await.unwrap().unwrap();
    assert_eq!(a, b);
    assert_eq!(1, fetcher_a.calls());
    assert_eq!(0, fetcher_b.calls());

    iter_check!({
        if snapshot(&builder).await.is_empty() {
            break;
        }
    });

    // and afterwards it is served from the shared cache
    let again = ctx_b
        .resolve_request(Some(fetcher_b.as_dyn()), options)
        .await
        .unwrap();
    assert_eq!(a, again);
    assert_eq!(0, fetcher_b.calls());
}

#[tokio::test]
async fn sibling_receives_failure() {
    enable_tracing();
    let builder = default_builder().with_default_config().unwrap().build();
    let options = RequestOptions::new(random_locator());
    let fingerprint = options.fingerprint().unwrap();

    let ctx_a = builder.open_context().await.unwrap();
    let fetcher_a = TestFetcher::failing("upstream is down").gated();
    let task_a = spawn_resolve(&ctx_a, &fetcher_a, options.clone());
    iter_check!({
        if fetcher_a.calls() == 1 {
            break;
        }
    });

    let ctx_b = builder.open_context().await.unwrap();
    let fetcher_b = TestFetcher::echo();
    let task_b = spawn_resolve(&ctx_b, &fetcher_b, options);
    wait_for_waiters(&builder, &fingerprint, 1).await;

    fetcher_a.release();

    assert!(task_a.await.unwrap().is_err());
    match task_b.await.unwrap() {
        Err(CacheError::Upstream { ctx, .. }) => {
            assert_eq!("upstream is down", &*ctx)
        }
        oth => panic!("unexpected {oth:?}"),
    }
    assert_eq!(0, fetcher_b.calls());
}

/// Open a sibling while `err` is being produced by the first context and
/// return what the sibling receives.
async fn sibling_failure(err: CacheError) -> CacheResult<serde_json::Value> {
    let builder = default_builder().with_default_config().unwrap().build();
    let options = RequestOptions::new(random_locator());
    let fingerprint = options.fingerprint().unwrap();

    let ctx_a = builder.open_context().await.unwrap();
    let fetcher_a = TestFetcher::failing_with(err).gated();
    let task_a = spawn_resolve(&ctx_a, &fetcher_a, options.clone());
    iter_check!({
        if fetcher_a.calls() == 1 {
            break;
        }
    });

    let ctx_b = builder.open_context().await.unwrap();
    let fetcher_b = TestFetcher::echo();
    let task_b = spawn_resolve(&ctx_b, &fetcher_b, options);
    wait_for_waiters(&builder, &fingerprint, 1).await;

    fetcher_a.release();

    assert!(task_a.await.unwrap().is_err());
    let out = task_b.await.unwrap();
    assert_eq!(0, fetcher_b.calls());
    out
}

#[tokio::test]
async fn sibling_receives_upstream_source() {
    enable_tracing();
    let err = CacheError::upstream_src("503", std::io::Error::other("boom"));
    match sibling_failure(err.clone()).await {
        Err(got @ CacheError::Upstream { .. }) => {
            assert_eq!(err.to_string(), got.to_string())
        }
        oth => panic!("unexpected {oth:?}"),
    }
}

#[tokio::test]
async fn sibling_receives_same_error_kind() {
    enable_tracing();
    let err = CacheError::serialization_src(
        "fetch result",
        std::io::Error::other("not representable"),
    );
    match sibling_failure(err.clone()).await {
        Err(got @ CacheError::Serialization { .. }) => {
            assert_eq!(err.to_string(), got.to_string())
        }
        oth => panic!("unexpected {oth:?}"),
    }

    let err = CacheError::other("cache store unavailable");
    assert!(matches!(
        sibling_failure(err).await,
        Err(CacheError::Other { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn unsettled_sibling_times_out() {
    let builder = default_builder().with_default_config().unwrap().build();
    let options = RequestOptions::new(random_locator());
    let fingerprint = options.fingerprint().unwrap();

    leave_in_flight(&builder, &fingerprint).await;

    let ctx = builder.open_context().await.unwrap();
    let fetcher = TestFetcher::echo();
    let start = tokio::time::Instant::now();
    let tasks = (0..2)
        .map(|_| spawn_resolve(&ctx, &fetcher, options.clone()))
        .collect::<Vec<_>>();

    for res in futures::future::join_all(tasks).await {
        match res.unwrap() {
            Err(CacheError::Timeout { fingerprint: fp, after }) => {
                assert_eq!(fingerprint, fp);
                assert_eq!(Duration::from_secs(30), after);
            }
            oth => panic!("unexpected {oth:?}"),
        }
    }
    assert!(start.elapsed() >= Duration::from_secs(30));
    assert_eq!(0, fetcher.calls());
    assert!(snapshot(&builder).await.is_empty());

    // with the wait cleared, the request is fetched locally
    ctx.resolve_request(Some(fetcher.as_dyn()), options)
        .await
        .unwrap();
    assert_eq!(1, fetcher.calls());
}

#[tokio::test(start_paused = true)]
async fn unrelated_messages_do_not_extend_the_wait() {
    let builder = default_builder().with_default_config().unwrap().build();
    let options = RequestOptions::new(random_locator());
    let fingerprint = options.fingerprint().unwrap();
    leave_in_flight(&builder, &fingerprint).await;

    let ctx = builder.open_context().await.unwrap();
    let start = tokio::time::Instant::now();
    let task = spawn_resolve(&ctx, &TestFetcher::echo(), options);

    let sibling = builder
        .broadcast
        .create(builder.clone(), CHANNEL.into())
        .await
        .unwrap();
    for _ in 0..5 {
        tokio::time::sleep(Duration::from_secs(10)).await;
        let other = Fingerprint::from(random_locator());
        let _ = sibling
            .send(
                BroadcastMessage::success(other, &serde_json::json!(1))
                    .unwrap(),
            )
            .await;
        if task.is_finished() {
            break;
        }
    }

    assert!(task.await.unwrap().unwrap_err().is_timeout());
    assert!(start.elapsed() < Duration::from_secs(50));
}

#[tokio::test]
async fn malformed_broadcast_is_a_serialization_error() {
    enable_tracing();
    let builder = default_builder().with_default_config().unwrap().build();
    let options = RequestOptions::new(random_locator());
    let fingerprint = options.fingerprint().unwrap();
    leave_in_flight(&builder, &fingerprint).await;

    let ctx = builder.open_context().await.unwrap();
    let task = spawn_resolve(&ctx, &TestFetcher::echo(), options);
    wait_for_waiters(&builder, &fingerprint, 1).await;

    let sibling = builder
        .broadcast
        .create(builder.clone(), CHANNEL.into())
        .await
        .unwrap();
    sibling
        .send(BroadcastMessage {
            code: SettleCode::Success,
            fingerprint: fingerprint.clone(),
            result: "{not json".into(),
        })
        .await
        .unwrap();

    assert!(matches!(
        task.await.unwrap(),
        Err(CacheError::Serialization { .. })
    ));
    iter_check!({
        if snapshot(&builder).await.is_empty() {
            break;
        }
    });
}

#[tokio::test]
async fn shutdown_releases_cross_context_waiters() {
    enable_tracing();
    let builder = default_builder().with_default_config().unwrap().build();
    let options = RequestOptions::new(random_locator());
    let fingerprint = options.fingerprint().unwrap();
    leave_in_flight(&builder, &fingerprint).await;

    let ctx = builder.open_context().await.unwrap();
    let task = spawn_resolve(&ctx, &TestFetcher::echo(), options);
    wait_for_waiters(&builder, &fingerprint, 1).await;

    ctx.shutdown().await.unwrap();
    match task.await.unwrap() {
        Err(CacheError::Other { ctx, .. }) => {
            assert_eq!("request cache shut down", &*ctx)
        }
        oth => panic!("unexpected {oth:?}"),
    }
    assert!(snapshot(&builder).await.is_empty());

    ctx.shutdown().await.unwrap();
}

#[tokio::test]
async fn unreadable_snapshot_is_discarded() {
    enable_tracing();
    let builder = default_builder().with_default_config().unwrap().build();
    builder
        .snapshot_store
        .create(builder.clone())
        .await
        .unwrap()
        .set(SNAPSHOT_KEY, "garbage".into())
        .unwrap();

    let ctx = builder.open_context().await.unwrap();
    let fetcher = TestFetcher::echo();
    ctx.resolve_request(
        Some(fetcher.as_dyn()),
        RequestOptions::new(random_locator()),
    )
    .await
    .unwrap();
    assert_eq!(1, fetcher.calls());
    assert!(snapshot(&builder).await.is_empty());
}

#[tokio::test]
async fn reloaded_context_recovers_from_disk() {
    enable_tracing();
    let dir = tempfile::tempdir().unwrap();
    let options = RequestOptions::new(random_locator());
    let fingerprint = options.fingerprint().unwrap();

    let first = file_builder(dir.path())
        .with_default_config()
        .unwrap()
        .build();
    let ctx_a = first.open_context().await.unwrap();
    let fetcher_a = TestFetcher::echo().gated();
    let task_a = spawn_resolve(&ctx_a, &fetcher_a, options.clone());
    iter_check!({
        if fetcher_a.calls() == 1 {
            break;
        }
    });

    // a reloaded context: fresh store instances over the same directory,
    // still able to hear the context that is fetching
    let reloaded = Builder {
        config: Default::default(),
        cache_store: FileCacheStoreFactory::create(dir.path()),
        snapshot_store: FileSnapshotStoreFactory::create(dir.path()),
        broadcast: first.broadcast.clone(),
        request_cache: CoreRequestCacheFactory::create(),
    }
    .with_default_config()
    .unwrap()
    .build();
    assert!(snapshot(&reloaded).await.contains(&fingerprint));

    let ctx_b = reloaded.open_context().await.unwrap();
    let fetcher_b = TestFetcher::echo();
    let task_b = spawn_resolve(&ctx_b, &fetcher_b, options.clone());
    wait_for_waiters(&reloaded, &fingerprint, 1).await;

    fetcher_a.release();
    let a = task_a.await.unwrap().unwrap();
    assert_eq!(a, task_b.await.unwrap().unwrap());
    assert_eq!(0, fetcher_b.calls());

    // a third, unrelated builder on the same directory hits the cache
    let later = file_builder(dir.path())
        .with_default_config()
        .unwrap()
        .build();
    let ctx_c = later.open_context().await.unwrap();
    let fetcher_c = TestFetcher::echo();
    assert_eq!(
        a,
        ctx_c
            .resolve_request(Some(fetcher_c.as_dyn()), options)
            .await
            .unwrap()
    );
    assert_eq!(0, fetcher_c.calls());
}
