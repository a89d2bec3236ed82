#![allow(unexpected_cfgs)]

mod config;
mod controllers;
mod error;
mod global;
mod jobs;
mod llm;
mod log;
mod middleware;
mod model;
mod obs;
mod pipeline;
mod provider;
mod state;

#[cfg(not(tarpaulin_include))]
mod swagger;

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use axum::Extension;
use http::{Method, header::HeaderValue};
use langchain_rust::llm::openai::{OpenAI, OpenAIConfig};
use tower_cookies::CookieManagerLayer;
use tower_cookies::cookie::Key;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::AppConfig;
use crate::controllers::AxumRouter;
use crate::global::DEFAULT_ANALYTICS_RING_CAPACITY;
use crate::jobs::{JobStore, PushChannel, RedisJobStore};
use crate::llm::LangchainModelAdapter;
use crate::pipeline::Orchestrator;
use crate::provider::backend::GooglePlacesBackend;
use crate::provider::cache::PlaceCache;
use crate::provider::client::PlaceProviderClient;
use crate::state::{AnalyticsRing, AppState, IpRateLimiter, PipelineStats};

#[cfg(not(tarpaulin_include))]
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
	log::init_panic_handler();
	let config = AppConfig::from_env();
	log::init_logger(&config.log_level, config.log_pretty);

	// The durable store backs both the job store and the L2 place cache.
	// Per spec §4.7, if it's configured but unreachable at boot the server
	// refuses to start rather than silently degrading.
	let redis_client =
		redis::Client::open(config.l2_cache_url.as_str()).expect("invalid L2_CACHE_URL");
	let redis_conn = redis::aio::ConnectionManager::new(redis_client)
		.await
		.expect("failed to connect to the L2 cache / job store redis backend");

	let job_store: Arc<dyn JobStore> = Arc::new(RedisJobStore::new(redis_conn.clone(), config.job_ttl_seconds));

	let place_cache = Arc::new(PlaceCache::new(
		config.l1_cache_capacity,
		config.l1_cache_ttl_seconds,
		Some(redis_conn),
		config.l2_cache_ttl_seconds,
		crate::global::DEFAULT_L2_CACHE_OPEN_NOW_TTL_SECONDS,
	));

	let backend = Arc::new(
		GooglePlacesBackend::new(&config.provider_api_key).expect("failed to build place provider backend"),
	);
	let provider_client = PlaceProviderClient::new(backend, place_cache, config.provider_concurrency_limit);

	let openai_config = OpenAIConfig::new().with_api_key(config.model_api_key.clone());
	let llm = OpenAI::new(openai_config).with_model("gpt-4o-mini");
	let llm_arc: Arc<dyn langchain_rust::language_models::llm::LLM + Send + Sync> = Arc::new(llm);
	let model_adapter = Arc::new(LangchainModelAdapter::new(llm_arc, "gpt-4o-mini"));

	let push_channel = Arc::new(PushChannel::new(config.backlog_capacity, config.backlog_ttl_seconds));

	let orchestrator = Arc::new(Orchestrator::new(
		model_adapter,
		provider_client,
		job_store.clone(),
		push_channel.clone(),
		&config,
	));

	let rate_limit_window = config.rate_limit_window;
	let rate_limit_max = config.rate_limit_max;
	let config = Arc::new(config);

	let app_state = Arc::new(AppState {
		orchestrator,
		job_store,
		push_channel,
		config: config.clone(),
		analytics: Arc::new(AnalyticsRing::new(DEFAULT_ANALYTICS_RING_CAPACITY)),
		photo_rate_limiter: Arc::new(IpRateLimiter::new(rate_limit_window, rate_limit_max)),
		stats: Arc::new(PipelineStats::default()),
	});

	// Configure CORS.
	// Only the configured frontend origins may send credentialed requests;
	// an empty FRONTEND_ORIGINS allows nothing rather than falling back to a wildcard.
	let allow_origin = AllowOrigin::list(
		config
			.frontend_origins
			.iter()
			.map(|origin| origin.parse::<HeaderValue>().expect("invalid FRONTEND_ORIGINS entry"))
			.collect::<Vec<_>>(),
	);
	let cors = CorsLayer::new()
		.allow_origin(allow_origin)
		.allow_credentials(true)
		.allow_methods([Method::GET, Method::POST])
		.allow_headers([
			http::header::CONTENT_TYPE,
			http::header::ACCEPT,
			http::header::AUTHORIZATION,
			http::header::HeaderName::from_static("x-requested-with"),
		]);

	// Use an encryption/signing key for private cookies
	let cookie_key = Key::generate();

	let api_routes = AxumRouter::new()
		.nest("/search", controllers::search::search_routes())
		.nest("/auth", controllers::auth::auth_routes())
		.nest("/analytics", controllers::analytics::analytics_routes())
		.nest("/photos", controllers::photos::photo_routes())
		.nest("/ws", controllers::ws::ws_routes());

	let api_routes = AxumRouter::new().nest("/api/v1", api_routes);

	#[cfg(all(not(test), debug_assertions))]
	let api_routes = crate::swagger::merge_swagger(api_routes);

	let app = axum::Router::new()
		.merge(api_routes)
		.route("/healthz", axum::routing::get(controllers::health::healthz))
		.layer(Extension(app_state))
		.layer(Extension(cookie_key))
		.layer(CookieManagerLayer::new())
		.layer(cors);

	let addr = SocketAddr::from_str(&config.bind_address).expect("Invalid BIND_ADDRESS format");
	tracing::info!(api_base_url = %config.api_base_url, "server starting");

	let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
	axum::serve(
		listener,
		app.into_make_service_with_connect_info::<SocketAddr>(),
	)
	.await?;

	Ok(())
}
