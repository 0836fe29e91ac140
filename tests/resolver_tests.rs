//! Travel cost resolution: short hops, cache hits, TTL and fallbacks.

mod fixtures;

use std::sync::Arc;

use chrono::Duration;

use dispatch_planner::cache::{CacheKey, TravelCache};
use dispatch_planner::haversine::{haversine_meters, CrowFlight};
use dispatch_planner::model::{LatLng, Provenance};
use dispatch_planner::resolver::{TravelCostResolver, TravelOptions};

use fixtures::*;

#[tokio::test]
async fn test_short_hop_skips_provider_and_cache() {
    let h = Harness::new();
    let resolver = h.resolver();
    let from = KHAO_SAN_ROAD.latlng();
    let to = nudged(&KHAO_SAN_ROAD, 15.0);

    let quote = resolver.resolve(from, to, base_time(), 20.0).await;

    assert_eq!(quote.provenance, Provenance::ShortHop);
    assert_eq!(quote.duration_seconds, 0);
    assert_eq!(quote.distance_meters, 15);
    assert_eq!(h.provider.calls(), 0);
    assert_eq!(h.store.cache_len(), 0);
}

#[tokio::test]
async fn test_short_hop_threshold_is_inclusive_and_zero_disables_it() {
    let h = Harness::new();
    let resolver = h.resolver();
    let from = WAT_SAKET.latlng();
    let to = nudged(&WAT_SAKET, 50.0);
    let crow = haversine_meters(from, to);

    let at_threshold = resolver.resolve(from, to, base_time(), crow).await;
    assert_eq!(at_threshold.provenance, Provenance::ShortHop);

    let disabled = resolver.resolve(from, to, base_time(), 0.0).await;
    assert_eq!(disabled.provenance, Provenance::Provider);
    assert_eq!(h.provider.calls(), 1);
}

#[tokio::test]
async fn test_second_lookup_in_same_bucket_is_a_cache_hit() {
    let h = Harness::new();
    let resolver = h.resolver();
    let from = DEMOCRACY_MONUMENT.latlng();
    let to = SIAM_PARAGON.latlng();

    let first = resolver.resolve(from, to, base_time(), 20.0).await;
    let second = resolver
        .resolve(from, to, base_time() + Duration::minutes(10), 20.0)
        .await;

    assert_eq!(first.provenance, Provenance::Provider);
    assert_eq!(second.provenance, Provenance::CacheHit);
    assert_eq!(first.duration_seconds, second.duration_seconds);
    assert_eq!(first.polyline, second.polyline);
    assert_eq!(h.provider.calls(), 1);
    assert_eq!(h.store.cache_len(), 1);
}

#[tokio::test]
async fn test_concurrent_resolves_of_one_key_leave_one_entry() {
    let h = Harness::with_provider(
        ScriptedProvider::new().with_delay(std::time::Duration::from_millis(20)),
    );
    let resolver = h.resolver();
    let from = WAT_ARUN.latlng();
    let to = CHATUCHAK_MARKET.latlng();

    let (left, right) = tokio::join!(
        resolver.resolve(from, to, base_time(), 20.0),
        resolver.resolve(from, to, base_time() + Duration::minutes(5), 20.0),
    );

    // Both missed and raced to write the same key.
    assert_eq!(h.provider.calls(), 2);
    assert_eq!(left, right);
    assert_eq!(h.store.cache_len(), 1);
    let entry = h
        .store
        .cache_entry(&CacheKey::new(from, to, base_time()))
        .unwrap();
    assert_eq!(entry.duration_seconds, left.duration_seconds);
    assert_eq!(entry.polyline, left.polyline);

    let again = resolver
        .resolve(from, to, base_time() + Duration::minutes(1), 20.0)
        .await;
    assert_eq!(again.provenance, Provenance::CacheHit);
    assert_eq!(again.duration_seconds, left.duration_seconds);
    assert_eq!(again.polyline, left.polyline);
}

#[tokio::test]
async fn test_different_bucket_misses() {
    let h = Harness::new();
    let resolver = h.resolver();
    let from = DEMOCRACY_MONUMENT.latlng();
    let to = SIAM_PARAGON.latlng();

    resolver.resolve(from, to, base_time(), 20.0).await;
    let later = resolver
        .resolve(from, to, base_time() + Duration::minutes(15), 20.0)
        .await;

    assert_eq!(later.provenance, Provenance::Provider);
    assert_eq!(h.provider.calls(), 2);
    assert_eq!(h.store.cache_len(), 2);
}

#[tokio::test]
async fn test_direction_matters() {
    let h = Harness::new();
    let resolver = h.resolver();
    let a = DEMOCRACY_MONUMENT.latlng();
    let b = LUMPHINI_PARK.latlng();

    resolver.resolve(a, b, base_time(), 20.0).await;
    let back = resolver.resolve(b, a, base_time(), 20.0).await;

    assert_eq!(back.provenance, Provenance::Provider);
    assert_eq!(h.provider.calls(), 2);
}

#[tokio::test]
async fn test_stale_entry_is_ignored_and_overwritten() {
    let h = Harness::new();
    let resolver = h.resolver();
    let from = DEMOCRACY_MONUMENT.latlng();
    let to = CHATUCHAK_MARKET.latlng();

    resolver.resolve(from, to, base_time(), 20.0).await;
    h.clock.advance(Duration::hours(25));
    let again = resolver.resolve(from, to, base_time(), 20.0).await;

    assert_eq!(again.provenance, Provenance::Provider);
    assert_eq!(h.provider.calls(), 2);
    assert_eq!(h.store.cache_len(), 1);
    let entry = h
        .store
        .cache_entry(&CacheKey::new(from, to, base_time()))
        .expect("entry present");
    assert_eq!(entry.updated_at, base_time() + Duration::hours(25));
}

#[tokio::test]
async fn test_entry_within_ttl_is_still_fresh() {
    let h = Harness::new();
    let resolver = h.resolver();
    let from = DEMOCRACY_MONUMENT.latlng();
    let to = CHATUCHAK_MARKET.latlng();

    resolver.resolve(from, to, base_time(), 20.0).await;
    h.clock.advance(Duration::hours(23));
    let again = resolver.resolve(from, to, base_time(), 20.0).await;

    assert_eq!(again.provenance, Provenance::CacheHit);
    assert_eq!(h.provider.calls(), 1);
}

#[tokio::test]
async fn test_provider_failure_falls_back_and_is_not_cached() {
    let h = Harness::with_provider(ScriptedProvider::failing());
    let resolver = h.resolver();
    let from = DEMOCRACY_MONUMENT.latlng();
    let to = SIAM_PARAGON.latlng();
    let crow = haversine_meters(from, to);

    let quote = resolver.resolve(from, to, base_time(), 20.0).await;

    assert_eq!(quote.provenance, Provenance::FallbackEstimate);
    assert_eq!(quote.polyline, None);
    assert_eq!(quote.distance_meters, crow.round() as i64);
    assert_eq!(quote.duration_seconds, CrowFlight::default().seconds_for(crow));
    assert_eq!(
        quote.duration_seconds,
        ((crow / (30_000.0 / 3600.0)).round() as i64).max(1)
    );
    assert_eq!(h.store.cache_len(), 0);

    // Recovery: the next call reaches the provider again.
    h.provider.set_failing(false);
    let recovered = resolver.resolve(from, to, base_time(), 20.0).await;
    assert_eq!(recovered.provenance, Provenance::Provider);
    assert_eq!(h.provider.calls(), 2);
}

#[tokio::test]
async fn test_invalid_coordinates_never_reach_provider() {
    let h = Harness::new();
    let resolver = h.resolver();

    let quote = resolver
        .resolve(LatLng::new(f64::NAN, 100.5), SIAM_PARAGON.latlng(), base_time(), 20.0)
        .await;

    assert_eq!(quote.provenance, Provenance::FallbackEstimate);
    assert_eq!(quote.duration_seconds, 0);
    assert_eq!(h.provider.calls(), 0);
}

#[tokio::test]
async fn test_provider_receives_departure_time() {
    let h = Harness::new();
    let resolver = h.resolver();
    let departure = base_time() + Duration::minutes(42);

    resolver
        .resolve(DEMOCRACY_MONUMENT.latlng(), LUMPHINI_PARK.latlng(), departure, 20.0)
        .await;

    let requests = h.provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].departure, Some(departure));
}

#[tokio::test]
async fn test_cache_outage_degrades_to_provider() {
    let h = Harness::new();
    let resolver = TravelCostResolver::new(
        TravelCache::new(Arc::new(UnavailableCache)),
        h.provider.clone(),
        h.clock.clone(),
    );
    let from = DEMOCRACY_MONUMENT.latlng();
    let to = SIAM_PARAGON.latlng();

    let first = resolver.resolve(from, to, base_time(), 20.0).await;
    let second = resolver.resolve(from, to, base_time(), 20.0).await;

    assert_eq!(first.provenance, Provenance::Provider);
    assert_eq!(second.provenance, Provenance::Provider);
    assert_eq!(h.provider.calls(), 2);
}

#[tokio::test]
async fn test_travel_seconds_reports_hit_flag() {
    let h = Harness::new();
    let resolver = h.resolver();
    let options = TravelOptions {
        reference_time: base_time(),
        short_hop_meters: 20.0,
    };
    let from = WAT_ARUN.latlng();
    let to = SIRIRAJ_HOSPITAL.latlng();

    let miss = resolver.travel_seconds(from, to, &options).await;
    let hit = resolver.travel_seconds(from, to, &options).await;
    let hop = resolver.travel_seconds(from, from, &options).await;

    assert!(!miss.was_cached);
    assert!(hit.was_cached);
    assert_eq!(miss.seconds, hit.seconds);
    assert_eq!(miss.seconds, h.provider.seconds_between(from, to));
    assert!(hop.was_cached);
    assert_eq!(hop.seconds, 0);
}
