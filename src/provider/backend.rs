/*
 * src/provider/backend.rs
 *
 * Thin wrapper over `google_maps::Client`, grounded on the teacher's
 * `agent/tools/research.rs` (`GeocodeTool`, `NearbySearchTool`) and
 * `controllers/fallback.rs::nearby_search`. Kept behind a trait so the
 * provider client (C5) can be exercised in tests without live
 * credentials.
 */

use async_trait::async_trait;
use google_maps::Client;
use google_maps::places_new::{Field, FieldMask, PlaceType};
use serde::Deserialize;
use serde::de::IntoDeserializer;

use crate::error::PrivateError;
use crate::model::candidate::{OpeningPeriod, PlaceCandidate};
use crate::model::request::LatLng;
use crate::model::route::ProviderParameters;

const RESULT_FIELD_MASK: &[Field] = &[
	Field::PlacesId,
	Field::PlacesDisplayName,
	Field::PlacesAdrFormatAddress,
	Field::PlacesLocation,
	Field::PlacesRating,
	Field::PlacesUserRatingCount,
	Field::PlacesPriceLevel,
	Field::PlacesCurrentOpeningHours,
	Field::PlacesRegularOpeningHours,
	Field::PlacesTypes,
	Field::PlacesPrimaryType,
	Field::PlacesPhotos,
	Field::PlacesAccessibilityOptions,
];

#[async_trait]
pub trait PlacesBackend: Send + Sync {
	async fn text_search(
		&self,
		text_query: &str,
		region: Option<&str>,
		language: &str,
		bias: Option<(f64, f64, f64)>,
	) -> Result<Vec<PlaceCandidate>, PrivateError>;

	async fn nearby_search(
		&self,
		center: LatLng,
		radius_meters: f64,
		keyword: &str,
		language: &str,
	) -> Result<Vec<PlaceCandidate>, PrivateError>;

	async fn geocode(&self, query: &str) -> Result<LatLng, PrivateError>;
}

pub struct GooglePlacesBackend {
	client: Client,
}

impl GooglePlacesBackend {
	pub fn new(api_key: &str) -> Result<Self, PrivateError> {
		let client = Client::try_new(api_key.to_string())
			.map_err(|e| PrivateError::Provider(e.to_string()))?;
		Ok(Self { client })
	}
}

#[async_trait]
impl PlacesBackend for GooglePlacesBackend {
	async fn text_search(
		&self,
		text_query: &str,
		region: Option<&str>,
		language: &str,
		bias: Option<(f64, f64, f64)>,
	) -> Result<Vec<PlaceCandidate>, PrivateError> {
		let mut request = self
			.client
			.text_search(text_query)
			.map_err(|e| PrivateError::Provider(e.to_string()))?
			.field_mask(FieldMask::Specific(RESULT_FIELD_MASK.to_vec()))
			.language_code(language);

		if let Some(region) = region {
			request = request.region_code(region);
		}
		if let Some((lat, lng, radius)) = bias {
			request = request.location_bias(lat, lng, radius);
		}

		let response = request
			.execute()
			.await
			.map_err(|e| PrivateError::Provider(e.to_string()))?;

		if let Some(err) = response.error() {
			return Err(PrivateError::Provider(err.to_string()));
		}

		Ok(response.places().into_iter().map(map_place).collect())
	}

	async fn nearby_search(
		&self,
		center: LatLng,
		radius_meters: f64,
		keyword: &str,
		language: &str,
	) -> Result<Vec<PlaceCandidate>, PrivateError> {
		let response = self
			.client
			.nearby_search((center.lat, center.lng, radius_meters))
			.map_err(|e| PrivateError::Provider(e.to_string()))?
			.field_mask(FieldMask::Specific(RESULT_FIELD_MASK.to_vec()))
			.language_code(language)
			.included_types(keyword_to_types(keyword))
			.execute()
			.await
			.map_err(|e| PrivateError::Provider(e.to_string()))?;

		if let Some(err) = response.error() {
			return Err(PrivateError::Provider(err.to_string()));
		}

		Ok(response.places().into_iter().map(map_place).collect())
	}

	async fn geocode(&self, query: &str) -> Result<LatLng, PrivateError> {
		let response = self
			.client
			.geocoding()
			.with_address(query)
			.execute()
			.await
			.map_err(|e| PrivateError::Geocoding(e.to_string()))?;

		if let Some(err) = response.error_message {
			return Err(PrivateError::Geocoding(err));
		}
		if !matches!(response.status, google_maps::geocoding::Status::Ok) {
			return Err(PrivateError::Geocoding(format!(
				"geocoding returned status {}",
				response.status
			)));
		}
		let first = response
			.results
			.first()
			.ok_or_else(|| PrivateError::Geocoding("geocoding returned no results".to_string()))?;

		Ok(LatLng {
			lat: first.geometry.location.lat.into(),
			lng: first.geometry.location.lng.into(),
		})
	}
}

/// Maps the gate/route stage's canonical English category text (spec
/// §4.3) onto the Places "new" API's `includedTypes` enum. Tries the
/// keyword as a bare type name first (`"cafe"`), then as a
/// `"<keyword>_restaurant"` cuisine type (`"pizza"` -> `PizzaRestaurant`),
/// falling back to the generic `Restaurant` type when neither
/// deserializes into a known `PlaceType` variant.
fn keyword_to_types(keyword: &str) -> Vec<PlaceType> {
	let normalized = keyword.trim().to_lowercase().replace(' ', "_");
	if normalized.is_empty() {
		return vec![PlaceType::Restaurant];
	}

	let cuisine = format!("{normalized}_restaurant");
	for candidate in [normalized.as_str(), cuisine.as_str()] {
		if let Ok(place_type) = PlaceType::deserialize(candidate.into_deserializer()) {
			return vec![place_type];
		}
	}

	vec![PlaceType::Restaurant]
}

fn map_place(place: &google_maps::places_new::Place) -> PlaceCandidate {
	let regular_hours = place
		.regular_opening_hours
		.as_ref()
		.map(|hours| {
			hours
				.periods
				.iter()
				.filter_map(period_to_opening_period)
				.collect()
		})
		.unwrap_or_default();

	PlaceCandidate {
		provider_id: place.id.clone().unwrap_or_default(),
		display_name: place
			.display_name
			.as_ref()
			.map(|n| n.text.clone())
			.unwrap_or_default(),
		formatted_address: place.formatted_address.clone().unwrap_or_default(),
		location: place
			.location
			.as_ref()
			.map(|loc| LatLng {
				lat: loc.latitude,
				lng: loc.longitude,
			})
			.unwrap_or(LatLng { lat: 0.0, lng: 0.0 }),
		rating: place.rating.map(|r| r as f32),
		review_count: place.user_rating_count.map(|c| c as u32),
		price_level: place.price_level.as_ref().and_then(price_level_to_u8),
		open_now: place
			.current_opening_hours
			.as_ref()
			.and_then(|h| h.open_now)
			.map(crate::model::candidate::OpenNow::Known)
			.unwrap_or(crate::model::candidate::OpenNow::Unknown),
		regular_hours,
		types: place.types.clone().unwrap_or_default(),
		primary_type: place.primary_type.clone(),
		photo_refs: place
			.photos
			.clone()
			.unwrap_or_default()
			.into_iter()
			.map(|p| p.name)
			.collect(),
		is_kosher: None,
		is_accessible: place
			.accessibility_options
			.as_ref()
			.and_then(|a| a.wheelchair_accessible_entrance),
		has_parking: None,
	}
}

fn period_to_opening_period(
	period: &google_maps::places_new::Period,
) -> Option<OpeningPeriod> {
	let open = period.open.as_ref()?;
	let close = period.close.as_ref();
	Some(OpeningPeriod {
		day: open.day as u8,
		open_time: format!("{:02}:{:02}", open.hour, open.minute),
		close_time: close
			.map(|c| format!("{:02}:{:02}", c.hour, c.minute))
			.unwrap_or_else(|| "23:59".to_string()),
	})
}

fn price_level_to_u8(level: &google_maps::places_new::PriceLevel) -> Option<u8> {
	use google_maps::places_new::PriceLevel::*;
	match level {
		Free | Inexpensive => Some(1),
		Moderate => Some(2),
		Expensive => Some(3),
		VeryExpensive => Some(4),
		_ => None,
	}
}
