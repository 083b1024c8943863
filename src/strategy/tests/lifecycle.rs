use super::*;
use crate::config::{PoolConfig, StrategyConfig};
use crate::pool::WorkerPool;
use crate::strategy::test_helpers::ScriptedFetcher;
use std::sync::Arc;

#[tokio::test]
async fn test_get_records_after_shutdown_fails() {
    let (strategy, recorder) = create_test_strategy(vec![Step::succeed(0, 1)], 10, 1, RETRY);

    assert!(!strategy.is_shutdown());
    strategy.shutdown();
    assert!(strategy.is_shutdown());

    let err = strategy
        .get_records(10, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ShutDown));
    assert_eq!(recorder.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_shutdown_is_idempotent() {
    let (strategy, _recorder) = create_test_strategy(vec![], 10, 1, RETRY);
    strategy.shutdown();
    strategy.shutdown();
    assert!(strategy.is_shutdown());
    assert!(strategy.pool().is_shutdown());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_call_returns_none() {
    let (strategy, recorder) = create_test_strategy(vec![], 10, 1, RETRY);
    let strategy = Arc::new(strategy);

    let call = {
        let strategy = strategy.clone();
        tokio::spawn(async move {
            strategy
                .get_records(10, &CancellationToken::new())
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    strategy.shutdown();

    let records = call.await.unwrap().unwrap();
    settle().await;

    assert!(records.is_none());
    assert_eq!(recorder.fetches.load(Ordering::SeqCst), 2);
    assert_eq!(recorder.cancelled.load(Ordering::SeqCst), 2);
    assert_eq!(strategy.stats().calls_interrupted, 1);
}

#[tokio::test]
async fn test_new_rejects_invalid_config() {
    let mut config = StrategyConfig::for_shard(TEST_SHARD);
    config.pool.max_pool_size = 0;

    let result = AsyncRetrievalStrategy::new(ScriptedFetcher::new(vec![]), &config);
    assert!(matches!(result, Err(Error::Config { .. })));
}

#[tokio::test]
async fn test_new_names_pool_after_shard() {
    let config = StrategyConfig::for_shard(TEST_SHARD);
    let fetcher = ScriptedFetcher::new(vec![Step::succeed(0, 8)]);
    let recorder = fetcher.recorder.clone();
    let strategy = AsyncRetrievalStrategy::new(fetcher, &config).unwrap();

    assert_eq!(strategy.shard_id(), TEST_SHARD);
    assert_eq!(strategy.retry_interval(), Duration::from_secs(1));
    assert_eq!(strategy.pool().max_workers(), 10);

    let records = strategy
        .get_records(10, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(records, Some(8));
    assert_eq!(
        recorder.worker_names(),
        vec![Some(format!("get-records-worker-{TEST_SHARD}-0"))]
    );
}

#[tokio::test]
async fn test_config_builds_either_strategy() {
    let mut config = StrategyConfig::for_shard(TEST_SHARD);
    let interrupt = CancellationToken::new();

    let asynchronous = config
        .build(ScriptedFetcher::new(vec![Step::succeed(0, 1)]))
        .unwrap();
    assert_eq!(asynchronous.get_records(10, &interrupt).await.unwrap(), Some(1));

    config.asynchronous = false;
    let fetcher = ScriptedFetcher::new(vec![Step::succeed(0, 2)]);
    let recorder = fetcher.recorder.clone();
    let synchronous = config.build(fetcher).unwrap();
    assert_eq!(synchronous.get_records(10, &interrupt).await.unwrap(), Some(2));
    assert_eq!(recorder.worker_names(), vec![None], "runs on the caller's task");

    synchronous.shutdown();
    assert!(synchronous.is_shutdown());
    asynchronous.shutdown();
    assert!(matches!(
        asynchronous.get_records(10, &interrupt).await,
        Err(Error::ShutDown)
    ));
}

#[tokio::test]
async fn test_with_pool_rejects_zero_retry_interval() {
    let pool = WorkerPool::new(TEST_SHARD, &PoolConfig::default()).unwrap();

    let result = AsyncRetrievalStrategy::with_pool(
        ScriptedFetcher::new(vec![]),
        pool,
        Duration::ZERO,
        TEST_SHARD,
    );

    match result {
        Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("retry_interval")),
        other => panic!("expected a config error, got {:?}", other.err()),
    }
}
