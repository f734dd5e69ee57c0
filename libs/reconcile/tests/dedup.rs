use std::sync::Arc;
use std::time::Duration;

use autopool_reconcile::{DedupProvider, NodePoolProvider, PoolState, ProviderError};
use autopool_testing::{PodBuilder, RecordingBackend, RESOURCE_TYPE};

#[tokio::test]
async fn repeated_calls_hit_backend_once() {
    let provider = DedupProvider::new(RecordingBackend::new(), RESOURCE_TYPE);
    let pod = PodBuilder::eligible("ml", "trainer-0").build();

    provider.ensure_node_pool_for_pod(&pod).await.unwrap();
    for _ in 0..3 {
        let err = provider.ensure_node_pool_for_pod(&pod).await.unwrap_err();
        assert_eq!(err, ProviderError::DuplicateRequest(pod.key.clone()));
    }

    assert_eq!(provider.backend().calls(), 1);
    assert_eq!(provider.state(&pod.key), Some(PoolState::Created));
}

#[tokio::test]
async fn concurrent_calls_hit_backend_once() {
    let provider = Arc::new(DedupProvider::new(
        RecordingBackend::slow(Duration::from_millis(50)),
        RESOURCE_TYPE,
    ));
    let pod = PodBuilder::eligible("ml", "trainer-0").build();

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let provider = provider.clone();
            let pod = pod.clone();
            tokio::spawn(async move { provider.ensure_node_pool_for_pod(&pod).await })
        })
        .collect();

    let mut ok = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => ok += 1,
            Err(e) if e.is_duplicate() => duplicates += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(ok, 1);
    assert_eq!(duplicates, 9);
    assert_eq!(provider.backend().created().len(), 1);
}

#[tokio::test]
async fn backend_duplicate_marks_created() {
    let pod = PodBuilder::eligible("ml", "trainer-0").build();
    let provider = DedupProvider::new(
        RecordingBackend::failing(ProviderError::DuplicateRequest(pod.key.clone())),
        RESOURCE_TYPE,
    );

    let err = provider.ensure_node_pool_for_pod(&pod).await.unwrap_err();
    assert!(err.is_duplicate());
    assert_eq!(provider.state(&pod.key), Some(PoolState::Created));

    // Known to exist now; the backend is not asked again.
    provider.backend().set_failure(None);
    assert!(provider.ensure_node_pool_for_pod(&pod).await.is_err());
    assert_eq!(provider.backend().calls(), 1);
}

#[tokio::test]
async fn backend_failure_releases_claim() {
    let provider = DedupProvider::new(
        RecordingBackend::failing(ProviderError::Transient("connection reset".into())),
        RESOURCE_TYPE,
    );
    let pod = PodBuilder::eligible("ml", "trainer-0").build();

    let err = provider.ensure_node_pool_for_pod(&pod).await.unwrap_err();
    assert_eq!(err, ProviderError::Transient("connection reset".into()));
    assert!(provider.is_empty());

    provider.backend().set_failure(None);
    provider.ensure_node_pool_for_pod(&pod).await.unwrap();
    assert_eq!(provider.backend().calls(), 2);
}

#[tokio::test]
async fn invalid_pod_never_claims() {
    let provider = DedupProvider::new(RecordingBackend::new(), RESOURCE_TYPE);
    let pod = PodBuilder::eligible("ml", "trainer-0")
        .without_node_selector()
        .build();

    let err = provider.ensure_node_pool_for_pod(&pod).await.unwrap_err();
    assert!(matches!(err, ProviderError::InvalidRequest(_)));
    assert!(provider.is_empty());
    assert_eq!(provider.backend().calls(), 0);
}

#[tokio::test]
async fn forget_allows_reprovisioning() {
    let provider = DedupProvider::new(RecordingBackend::new(), RESOURCE_TYPE);
    let pod = PodBuilder::eligible("ml", "trainer-0").build();

    provider.ensure_node_pool_for_pod(&pod).await.unwrap();
    assert!(provider.forget(&pod.key));
    assert!(!provider.forget(&pod.key));

    provider.ensure_node_pool_for_pod(&pod).await.unwrap();
    assert_eq!(provider.backend().created().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn release_drops_completed_entry_only() {
    let provider = Arc::new(DedupProvider::new(
        RecordingBackend::slow(Duration::from_millis(50)),
        RESOURCE_TYPE,
    ));
    let pod = PodBuilder::eligible("ml", "trainer-0").build();

    let in_flight = tokio::spawn({
        let provider = provider.clone();
        let pod = pod.clone();
        async move { provider.ensure_node_pool_for_pod(&pod).await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    provider.release(&pod.key);
    assert_eq!(provider.state(&pod.key), Some(PoolState::InFlight));

    in_flight.await.unwrap().unwrap();
    provider.release(&pod.key);
    assert!(provider.is_empty());
}

#[tokio::test]
async fn new_uid_replaces_completed_entry() {
    let provider = DedupProvider::new(RecordingBackend::new(), RESOURCE_TYPE);
    let first = PodBuilder::eligible("ml", "trainer-0").uid("uid-a").build();
    let second = PodBuilder::eligible("ml", "trainer-0").uid("uid-b").build();

    provider.ensure_node_pool_for_pod(&first).await.unwrap();
    assert!(provider.ensure_node_pool_for_pod(&first).await.unwrap_err().is_duplicate());

    provider.ensure_node_pool_for_pod(&second).await.unwrap();
    assert_eq!(provider.backend().calls(), 2);
    assert_eq!(provider.len(), 1);
}
