use time::{Duration, OffsetDateTime};

use crate::entity::CatalogEntity;

pub fn ttl_from_hours(hours: i64) -> Duration {
	Duration::hours(hours)
}

pub fn newest_fetch(entities: &[CatalogEntity]) -> Option<OffsetDateTime> {
	entities.iter().map(|entity| entity.fetched_at).max()
}

/// An empty set is always stale. Otherwise the newest `fetched_at` must be within `ttl` of `now`.
pub fn is_stale(entities: &[CatalogEntity], now: OffsetDateTime, ttl: Duration) -> bool {
	match newest_fetch(entities) {
		Some(newest) => newest + ttl <= now,
		None => true,
	}
}
