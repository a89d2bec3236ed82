use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpenState {
	OpenNow,
	OpenAt,
	OpenBetween,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenAt {
	pub day: u8,
	pub time: String,
	pub timezone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenBetween {
	pub day: u8,
	pub start: String,
	pub end: String,
	pub timezone: String,
}

/// Output of the base filter extractor (spec §3/§4.4).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BaseFilters {
	pub language: Option<String>,
	pub open_state: Option<OpenState>,
	pub open_at: Option<OpenAt>,
	pub open_between: Option<OpenBetween>,
	pub region_hint: Option<String>,
}

/// Output of the post-constraint extractor (spec §3/§4.4).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostConstraints {
	pub open_state: Option<OpenState>,
	pub open_at: Option<OpenAt>,
	pub open_between: Option<OpenBetween>,
	pub price_level: Option<u8>,
	pub is_kosher: Option<bool>,
	pub requires_accessible: Option<bool>,
	pub requires_parking: Option<bool>,
}

/// The tightened merge of [`BaseFilters`], [`PostConstraints`], intent
/// context, and caller region (spec §3's `FinalFilters`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinalFilters {
	pub language: Option<String>,
	pub region_hint: Option<String>,
	pub open_state: Option<OpenState>,
	pub open_at: Option<OpenAt>,
	pub open_between: Option<OpenBetween>,
	pub price_level: Option<u8>,
	pub is_kosher: Option<bool>,
	pub requires_accessible: Option<bool>,
	pub requires_parking: Option<bool>,
}

/// Forces `FinalFilters` into a consistent temporal state (spec §4.4's
/// `tighten`): `OpenNow` clears the at/between fields; setting one of
/// at/between forces the matching `open_state`.
fn tighten(mut filters: FinalFilters) -> FinalFilters {
	if filters.open_state == Some(OpenState::OpenNow) {
		filters.open_at = None;
		filters.open_between = None;
	} else if filters.open_at.is_some() {
		filters.open_state = Some(OpenState::OpenAt);
		filters.open_between = None;
	} else if filters.open_between.is_some() {
		filters.open_state = Some(OpenState::OpenBetween);
		filters.open_at = None;
	}
	filters
}

/// Deterministic merge described in spec §4.4: post-constraints win on
/// temporal fields, intent (language/region) wins on language/region
/// conflicts, then the result is tightened into a consistent state.
pub fn resolve_filters(
	base: &BaseFilters,
	post: &PostConstraints,
	intent_language: Option<&str>,
	intent_region: Option<&str>,
) -> FinalFilters {
	// The temporal triple (open_state/open_at/open_between) is selected as
	// one atomic unit: if post sets any of the three, post's whole triple
	// wins outright, base's stale fields never leak through a partial
	// per-field merge.
	let post_sets_temporal = post.open_state.is_some() || post.open_at.is_some() || post.open_between.is_some();
	let (open_state, open_at, open_between) = if post_sets_temporal {
		(post.open_state, post.open_at.clone(), post.open_between.clone())
	} else {
		(base.open_state, base.open_at.clone(), base.open_between.clone())
	};

	let merged = FinalFilters {
		language: intent_language
			.map(|s| s.to_string())
			.or_else(|| base.language.clone()),
		region_hint: intent_region
			.map(|s| s.to_string())
			.or_else(|| base.region_hint.clone()),
		open_state,
		open_at,
		open_between,
		price_level: post.price_level,
		is_kosher: post.is_kosher,
		requires_accessible: post.requires_accessible,
		requires_parking: post.requires_parking,
	};

	tighten(merged)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn open_now_clears_at_and_between() {
		let base = BaseFilters {
			open_state: Some(OpenState::OpenNow),
			..Default::default()
		};
		let post = PostConstraints {
			open_at: Some(OpenAt {
				day: 1,
				time: "10:00".into(),
				timezone: "Asia/Jerusalem".into(),
			}),
			..Default::default()
		};
		let merged = resolve_filters(&base, &post, None, None);
		assert_eq!(merged.open_state, Some(OpenState::OpenNow));
		assert!(merged.open_at.is_none());
		assert!(merged.open_between.is_none());
	}

	#[test]
	fn setting_open_at_forces_state() {
		let base = BaseFilters::default();
		let post = PostConstraints {
			open_at: Some(OpenAt {
				day: 2,
				time: "18:30".into(),
				timezone: "Asia/Jerusalem".into(),
			}),
			..Default::default()
		};
		let merged = resolve_filters(&base, &post, None, None);
		assert_eq!(merged.open_state, Some(OpenState::OpenAt));
		assert!(merged.open_between.is_none());
	}

	#[test]
	fn intent_language_wins_over_base() {
		let base = BaseFilters {
			language: Some("en".into()),
			..Default::default()
		};
		let post = PostConstraints::default();
		let merged = resolve_filters(&base, &post, Some("he"), None);
		assert_eq!(merged.language.as_deref(), Some("he"));
	}

	#[test]
	fn post_constraints_override_base_on_temporal_fields() {
		let base = BaseFilters {
			open_state: Some(OpenState::OpenNow),
			..Default::default()
		};
		let post = PostConstraints {
			open_state: Some(OpenState::OpenBetween),
			open_between: Some(OpenBetween {
				day: 3,
				start: "12:00".into(),
				end: "14:00".into(),
				timezone: "Asia/Jerusalem".into(),
			}),
			..Default::default()
		};
		let merged = resolve_filters(&base, &post, None, None);
		assert_eq!(merged.open_state, Some(OpenState::OpenBetween));
	}

	#[test]
	fn post_temporal_triple_wins_even_when_split_across_fields() {
		let base = BaseFilters {
			open_state: Some(OpenState::OpenAt),
			open_at: Some(OpenAt {
				day: 1,
				time: "10:00".into(),
				timezone: "Asia/Jerusalem".into(),
			}),
			..Default::default()
		};
		// post only sets open_between; open_state and open_at are absent,
		// but post's triple must still win outright rather than merging
		// field-by-field against base's stale open_at.
		let post = PostConstraints {
			open_between: Some(OpenBetween {
				day: 3,
				start: "18:00".into(),
				end: "20:00".into(),
				timezone: "Asia/Jerusalem".into(),
			}),
			..Default::default()
		};
		let merged = resolve_filters(&base, &post, None, None);
		assert_eq!(merged.open_state, Some(OpenState::OpenBetween));
		assert!(merged.open_at.is_none());
		assert_eq!(merged.open_between.as_ref().map(|b| b.day), Some(3));
	}
}
