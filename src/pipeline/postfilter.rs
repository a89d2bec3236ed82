/*
 * src/pipeline/postfilter.rs
 *
 * Post-filter engine (C6). Pure, deterministic: applies `FinalFilters`
 * to a list of candidates with no network or model calls. Tristate
 * opening-hours logic keeps UNKNOWN candidates by default (spec §4.6,
 * §8 property: `unknownExcluded` is always 0).
 */

use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;

use crate::model::candidate::{OpenNow, OpeningPeriod, PlaceCandidate};
use crate::model::filters::{FinalFilters, OpenAt, OpenBetween, OpenState};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterStats {
	pub input_count: usize,
	pub kept_count: usize,
	pub excluded_open_state: usize,
	pub excluded_price: usize,
	pub excluded_kosher: usize,
	pub excluded_accessible: usize,
	pub excluded_parking: usize,
	/// Always 0: UNKNOWN opening-hours candidates are never excluded on
	/// that basis alone (spec §4.6).
	pub unknown_excluded: usize,
}

pub fn apply(candidates: Vec<PlaceCandidate>, filters: &FinalFilters) -> (Vec<PlaceCandidate>, FilterStats) {
	let mut stats = FilterStats {
		input_count: candidates.len(),
		..Default::default()
	};

	let now = Utc::now();
	let kept: Vec<PlaceCandidate> = candidates
		.into_iter()
		.filter(|c| {
			if !passes_open_state(c, filters, now) {
				stats.excluded_open_state += 1;
				return false;
			}
			if let Some(max_price) = filters.price_level {
				if let Some(price) = c.price_level {
					if price > max_price {
						stats.excluded_price += 1;
						return false;
					}
				}
			}
			if filters.is_kosher == Some(true) {
				if c.is_kosher == Some(false) {
					stats.excluded_kosher += 1;
					return false;
				}
			}
			if filters.requires_accessible == Some(true) {
				if c.is_accessible == Some(false) {
					stats.excluded_accessible += 1;
					return false;
				}
			}
			if filters.requires_parking == Some(true) {
				if c.has_parking == Some(false) {
					stats.excluded_parking += 1;
					return false;
				}
			}
			true
		})
		.collect();

	stats.kept_count = kept.len();
	(kept, stats)
}

fn passes_open_state(candidate: &PlaceCandidate, filters: &FinalFilters, now: DateTime<Utc>) -> bool {
	match filters.open_state {
		None => true,
		Some(OpenState::OpenNow) => candidate.open_now.satisfies_open_now(),
		Some(OpenState::OpenAt) => match &filters.open_at {
			Some(target) => is_open_at(candidate, target),
			None => true,
		},
		Some(OpenState::OpenBetween) => match &filters.open_between {
			Some(target) => is_open_between(candidate, target, now),
			None => true,
		},
	}
}

/// UNKNOWN hours (no `regular_hours` entries) pass — never excluded on
/// that basis alone.
fn is_open_at(candidate: &PlaceCandidate, target: &OpenAt) -> bool {
	if candidate.regular_hours.is_empty() {
		if candidate.open_now == OpenNow::Unknown {
			return true;
		}
	}
	candidate
		.regular_hours
		.iter()
		.any(|period| period_covers_instant(period, target.day, &target.time))
}

fn is_open_between(candidate: &PlaceCandidate, target: &OpenBetween, _now: DateTime<Utc>) -> bool {
	if candidate.regular_hours.is_empty() {
		return true;
	}
	candidate.regular_hours.iter().any(|period| {
		period.day == target.day
			&& time_le(&period.open_time, &target.start)
			&& time_le(&target.end, &period.close_time)
	})
}

fn period_covers_instant(period: &OpeningPeriod, day: u8, time: &str) -> bool {
	period.day == day && time_le(&period.open_time, time) && time_le(time, &period.close_time)
}

/// Lexicographic `HH:MM` comparison; both sides are validated upstream
/// by the filter extractors' schema.
fn time_le(a: &str, b: &str) -> bool {
	a <= b
}

/// Resolves `target.timezone` purely to validate it is a recognized IANA
/// zone; the post-filter engine compares wall-clock times directly
/// rather than converting, since provider opening hours are already
/// expressed in the place's local time.
#[allow(dead_code)]
fn zone_is_known(tz_name: &str) -> bool {
	tz_name.parse::<Tz>().is_ok()
}

#[allow(dead_code)]
fn current_local_time(tz: Tz, now: DateTime<Utc>) -> (u8, u32, u32) {
	let local = now.with_timezone(&tz);
	(local.weekday().num_days_from_monday() as u8, local.hour(), local.minute())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::request::LatLng;

	fn candidate(price_level: Option<u8>, open_now: OpenNow) -> PlaceCandidate {
		PlaceCandidate {
			provider_id: "p1".into(),
			display_name: "Test Place".into(),
			formatted_address: "1 Test St".into(),
			location: LatLng { lat: 0.0, lng: 0.0 },
			rating: None,
			review_count: None,
			price_level,
			open_now,
			regular_hours: vec![],
			types: vec![],
			primary_type: None,
			photo_refs: vec![],
			is_kosher: None,
			is_accessible: None,
			has_parking: None,
		}
	}

	#[test]
	fn unknown_open_now_is_never_excluded() {
		let candidates = vec![candidate(None, OpenNow::Unknown)];
		let filters = FinalFilters {
			open_state: Some(OpenState::OpenNow),
			..Default::default()
		};
		let (kept, stats) = apply(candidates, &filters);
		assert_eq!(kept.len(), 1);
		assert_eq!(stats.unknown_excluded, 0);
	}

	#[test]
	fn closed_now_is_excluded() {
		let candidates = vec![candidate(None, OpenNow::Known(false))];
		let filters = FinalFilters {
			open_state: Some(OpenState::OpenNow),
			..Default::default()
		};
		let (kept, stats) = apply(candidates, &filters);
		assert_eq!(kept.len(), 0);
		assert_eq!(stats.excluded_open_state, 1);
	}

	#[test]
	fn price_level_filter_excludes_above_ceiling() {
		let candidates = vec![candidate(Some(4), OpenNow::Unknown), candidate(Some(1), OpenNow::Unknown)];
		let filters = FinalFilters {
			price_level: Some(2),
			..Default::default()
		};
		let (kept, stats) = apply(candidates, &filters);
		assert_eq!(kept.len(), 1);
		assert_eq!(stats.excluded_price, 1);
	}

	#[test]
	fn missing_signal_is_not_excluded() {
		let candidates = vec![candidate(None, OpenNow::Unknown)];
		let filters = FinalFilters {
			is_kosher: Some(true),
			requires_accessible: Some(true),
			requires_parking: Some(true),
			..Default::default()
		};
		let (kept, _) = apply(candidates, &filters);
		assert_eq!(kept.len(), 1);
	}

	proptest::proptest! {
		/// Spec §8 S4: a candidate is excluded on price iff both the
		/// candidate's price level and the ceiling are known and the
		/// candidate exceeds the ceiling. A missing price on either side
		/// always passes.
		#[test]
		fn price_level_exclusion_matches_invariant(
			price in proptest::option::of(0u8..=4),
			ceiling in proptest::option::of(0u8..=4),
		) {
			let candidates = vec![candidate(price, OpenNow::Unknown)];
			let filters = FinalFilters {
				price_level: ceiling,
				..Default::default()
			};
			let (kept, stats) = apply(candidates, &filters);

			let should_exclude = match (price, ceiling) {
				(Some(p), Some(c)) => p > c,
				_ => false,
			};
			if should_exclude {
				proptest::prop_assert_eq!(kept.len(), 0);
				proptest::prop_assert_eq!(stats.excluded_price, 1);
			} else {
				proptest::prop_assert_eq!(kept.len(), 1);
				proptest::prop_assert_eq!(stats.excluded_price, 0);
			}
		}
	}
}
