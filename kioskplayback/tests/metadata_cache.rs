mod common;

use common::StubProbe;
use kioskplayback::{Metadata, MetadataCache, ProbedMetadata};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_resolve_probes_each_path_once() {
    let probe = Arc::new(StubProbe::new());
    let cache = MetadataCache::new(probe.clone());
    let path = Path::new("/videos/harbor_at-dawn.mp4");

    let first = cache.resolve(path).await;
    let second = cache.resolve(path).await;

    assert_eq!(probe.calls(), 1);
    assert_eq!(first, second);
    assert_eq!(first.title, "Harbor At Dawn");
    assert_eq!(first.duration_minutes, 2);
    assert!(cache.contains(path).await);
}

#[tokio::test]
async fn test_failed_probe_is_cached_as_degraded() {
    let path = Path::new("/videos/broken_reel.avi");
    let probe = Arc::new(StubProbe::new().failing_on(path));
    let cache = MetadataCache::new(probe.clone());

    let first = cache.resolve(path).await;
    let second = cache.resolve(path).await;

    let expected = Metadata {
        title: "Broken Reel".to_string(),
        description: String::new(),
        duration_minutes: 0,
    };
    assert_eq!(first, expected);
    assert_eq!(second, expected);
    assert_eq!(probe.calls(), 1);
}

#[tokio::test]
async fn test_embedded_metadata_wins_over_filename() {
    let path = Path::new("/videos/clip01.mkv");
    let probe = StubProbe::new().with_response(
        path,
        ProbedMetadata {
            title: Some("The Old Harbour".to_string()),
            description: Some("Archive footage, 1923".to_string()),
            duration_ms: Some(61_000),
        },
    );
    let cache = MetadataCache::new(Arc::new(probe));

    let metadata = cache.resolve(path).await;
    assert_eq!(metadata.title, "The Old Harbour");
    assert_eq!(metadata.description, "Archive footage, 1923");
    assert_eq!(metadata.duration_minutes, 2);
}

#[tokio::test]
async fn test_unknown_duration_is_zero() {
    let path = Path::new("/videos/live.mp4");
    let probe = StubProbe::new().with_response(
        path,
        ProbedMetadata {
            title: None,
            description: None,
            duration_ms: Some(-1),
        },
    );
    let cache = MetadataCache::new(Arc::new(probe));

    assert_eq!(cache.resolve(path).await.duration_minutes, 0);
}

#[tokio::test]
async fn test_concurrent_resolves_keep_a_single_entry() {
    let probe = Arc::new(StubProbe::new().with_delay(Duration::from_millis(20)));
    let cache = Arc::new(MetadataCache::new(probe.clone()));
    let path = Path::new("/videos/shared.mp4");

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.resolve(Path::new("/videos/shared.mp4")).await })
        })
        .collect();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }

    assert!(results.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(cache.len().await, 1);
    assert!(probe.calls() >= 1 && probe.calls() <= 4);

    // Une fois en cache, plus aucune analyse
    let calls = probe.calls();
    cache.resolve(path).await;
    assert_eq!(probe.calls(), calls);
}
