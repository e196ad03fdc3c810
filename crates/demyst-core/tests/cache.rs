//! Tests for the shared resolution cache

use std::sync::Arc;
use std::thread;

use demyst_core::prelude::*;

fn method(id: u64) -> Arc<dyn MethodIdentity>
{
    Arc::new(
        MethodRecord::new(id, format!("Method{id}"))
            .declared_by(TypeRef::named("Worker"))
            .parameter(ParameterInfo::new("value", TypeRef::qualified("System", "Int64"))),
    )
}

#[test]
fn test_strong_references_are_bounded()
{
    let cache = Arc::new(ResolutionCache::new(8));
    let resolver = FrameResolver::with_cache(Arc::clone(&cache));

    for id in 0..100 {
        let resolved = resolver.resolve_method(&method(id)).unwrap();
        assert_eq!(resolved.name, format!("Method{id}"));
    }

    assert_eq!(cache.capacity(), 8);
    assert!(cache.retained() <= 8);
    assert!(cache.len() <= 16);

    // Evicted keys resolve again to the right value.
    let again = resolver.resolve_method(&method(0)).unwrap();
    assert_eq!(again.name, "Method0");
}

#[test]
fn test_repeated_frames_hit_the_cache()
{
    let cache = Arc::new(ResolutionCache::new(4));
    let aggregator = TraceAggregator::with_cache(TraceOptions::default(), Arc::clone(&cache));
    let frames: Vec<RawFrame> = (0..3).map(|_| RawFrame::new(method(7))).collect();

    let document = aggregator.document(&frames);
    assert_eq!(document.frame_count(), 3);

    let (hits, misses) = cache.stats();
    assert_eq!(misses, 1);
    assert_eq!(hits, 2);

    let first = document.frame(0).and_then(ResolvedFrame::method).unwrap();
    let last = document.frame(2).and_then(ResolvedFrame::method).unwrap();
    assert!(std::ptr::eq(first, last));
}

#[test]
fn test_disabled_cache_is_not_used()
{
    let cache = Arc::new(ResolutionCache::new(4));
    let aggregator = TraceAggregator::with_cache(TraceOptions::default().with_cache(false), Arc::clone(&cache));
    aggregator.document(&[RawFrame::new(method(1))]);

    assert!(aggregator.resolver().cache().is_none());
    assert!(cache.is_empty());
}

#[test]
fn test_concurrent_resolution()
{
    let cache = Arc::new(ResolutionCache::new(16));
    let options = TraceOptions::default().with_markup(false).with_continuation_marker("");

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let aggregator = TraceAggregator::with_cache(options.clone(), Arc::clone(&cache));
            thread::spawn(move || {
                let frames: Vec<RawFrame> = (0..64).map(|id| RawFrame::new(method((id + worker) % 32))).collect();
                let text = aggregator.format_trace(&frames);
                (worker, text)
            })
        })
        .collect();

    for handle in handles {
        let (worker, text) = handle.join().unwrap();
        for (index, line) in text.lines().enumerate() {
            let id = (index as u64 + worker) % 32;
            assert_eq!(line, format!("Worker.Method{id}(v)"));
        }
    }

    assert!(cache.retained() <= 16);
}
