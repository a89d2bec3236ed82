/*
 * src/provider/client.rs
 *
 * Place Provider Client (C5). Combines the tiered cache, the per-process
 * concurrency ceiling (spec §5 backpressure), and the bias-retry rule
 * (spec §4.5) on top of a `PlacesBackend`.
 */

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::error::{PipelineError, PrivateError};
use crate::model::candidate::PlaceCandidate;
use crate::model::route::{ProviderParameters, Route};
use crate::provider::backend::PlacesBackend;
use crate::provider::cache::PlaceCache;

pub struct PlaceProviderClient<B: PlacesBackend> {
	backend: Arc<B>,
	cache: Arc<PlaceCache>,
	concurrency: Arc<Semaphore>,
}

impl<B: PlacesBackend> PlaceProviderClient<B> {
	pub fn new(backend: Arc<B>, cache: Arc<PlaceCache>, concurrency_limit: usize) -> Self {
		Self {
			backend,
			cache,
			concurrency: Arc::new(Semaphore::new(concurrency_limit.max(1))),
		}
	}

	/// Runs a provider search for `params`, applying the bias-retry rule
	/// on a ≤1-result response (spec §4.5). `open_now_sensitive` controls
	/// the L2 TTL the cache layer applies.
	pub async fn search(
		&self,
		route: Route,
		params: &ProviderParameters,
		open_now_sensitive: bool,
		timeout: Duration,
	) -> Result<Vec<PlaceCandidate>, PipelineError> {
		let primary = self.fetch_cached(params, open_now_sensitive, timeout).await?;

		if primary.len() <= 1 && params.has_bias() {
			let retry_params = params.without_bias();
			let retry = self
				.fetch_cached(&retry_params, open_now_sensitive, timeout)
				.await?;
			return Ok(retry);
		}

		// LANDMARK results never carry bias fields to retry on; NEARBY
		// results are never biased text searches. Only TEXTSEARCH can
		// reach the retry branch above.
		debug_assert!(route == Route::Textsearch || !params.has_bias());
		Ok(primary)
	}

	async fn fetch_cached(
		&self,
		params: &ProviderParameters,
		open_now_sensitive: bool,
		timeout: Duration,
	) -> Result<Vec<PlaceCandidate>, PipelineError> {
		let backend = self.backend.clone();
		let semaphore = self.concurrency.clone();
		let params_owned = params.clone();

		let call = self.cache.get_or_fetch(params, open_now_sensitive, move || {
			let backend = backend.clone();
			let semaphore = semaphore.clone();
			async move {
				let _permit = semaphore
					.acquire()
					.await
					.map_err(|_| PrivateError::Provider("concurrency semaphore closed".to_string()))?;
				fetch_from_backend(backend.as_ref(), &params_owned).await
			}
		});

		match tokio::time::timeout(timeout, call).await {
			Err(_) => Err(PipelineError::ProviderError("provider call timed out".to_string())),
			Ok(Err(PrivateError::Geocoding(_))) => Err(PipelineError::GeocodingFailed),
			Ok(Err(e)) => Err(PipelineError::ProviderError(e.to_string())),
			Ok(Ok(candidates)) => Ok(candidates),
		}
	}
}

async fn fetch_from_backend<B: PlacesBackend>(
	backend: &B,
	params: &ProviderParameters,
) -> Result<Vec<PlaceCandidate>, PrivateError> {
	match params {
		ProviderParameters::TextSearch {
			text_query,
			region,
			language,
			bias,
		} => {
			let bias_tuple = bias.map(|b| (b.bias_lat, b.bias_lng, b.bias_radius_meters));
			backend
				.text_search(text_query, region.as_deref(), language, bias_tuple)
				.await
		}
		ProviderParameters::Nearby {
			center,
			radius_meters,
			keyword,
			language,
			..
		} => backend.nearby_search(*center, *radius_meters, keyword, language).await,
		ProviderParameters::Landmark {
			geocode_query,
			radius_meters,
			keyword,
		} => {
			let center = backend.geocode(geocode_query).await?;
			backend.nearby_search(center, *radius_meters, keyword, "en").await
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::request::LatLng;
	use crate::provider::cache::PlaceCache;
	use async_trait::async_trait;

	struct StubBackend {
		responses: std::sync::Mutex<Vec<Vec<PlaceCandidate>>>,
	}

	fn candidate(id: &str) -> PlaceCandidate {
		PlaceCandidate {
			provider_id: id.to_string(),
			display_name: "Stub".into(),
			formatted_address: "Nowhere".into(),
			location: LatLng { lat: 0.0, lng: 0.0 },
			rating: None,
			review_count: None,
			price_level: None,
			open_now: crate::model::candidate::OpenNow::Unknown,
			regular_hours: vec![],
			types: vec![],
			primary_type: None,
			photo_refs: vec![],
			is_kosher: None,
			is_accessible: None,
			has_parking: None,
		}
	}

	#[async_trait]
	impl PlacesBackend for StubBackend {
		async fn text_search(
			&self,
			_text_query: &str,
			_region: Option<&str>,
			_language: &str,
			_bias: Option<(f64, f64, f64)>,
		) -> Result<Vec<PlaceCandidate>, PrivateError> {
			Ok(self.responses.lock().unwrap().remove(0))
		}

		async fn nearby_search(
			&self,
			_center: LatLng,
			_radius_meters: f64,
			_keyword: &str,
			_language: &str,
		) -> Result<Vec<PlaceCandidate>, PrivateError> {
			Ok(vec![])
		}

		async fn geocode(&self, _query: &str) -> Result<LatLng, PrivateError> {
			Ok(LatLng { lat: 0.0, lng: 0.0 })
		}
	}

	#[tokio::test]
	async fn bias_retry_fires_on_single_result() {
		let backend = Arc::new(StubBackend {
			responses: std::sync::Mutex::new(vec![vec![candidate("only-one")], vec![candidate("a"), candidate("b")]]),
		});
		let cache = Arc::new(PlaceCache::new(8, 60, None, 900, 120));
		let client = PlaceProviderClient::new(backend, cache, 4);

		let params = ProviderParameters::TextSearch {
			text_query: "pizza".into(),
			region: None,
			language: "en".into(),
			bias: Some(crate::model::route::GeoBias {
				bias_lat: 1.0,
				bias_lng: 1.0,
				bias_radius_meters: 5000.0,
			}),
		};

		let result = client
			.search(Route::Textsearch, &params, false, Duration::from_secs(1))
			.await
			.unwrap();
		assert_eq!(result.len(), 2);
	}
}
