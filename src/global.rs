pub const LOG_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/logs");
pub const CRASH_LOG: &str = "crash.log";
pub const LATEST_LOG: &str = "latest.log";

pub const GOOGLE_MAPS_API_KEY: &str = "PROVIDER_API_KEY";
pub const MODEL_API_KEY: &str = "MODEL_API_KEY";

/// Default stage timeouts, matched 1:1 to spec §6's environment variables.
pub const DEFAULT_GATE_TIMEOUT_MS: u64 = 3_000;
pub const DEFAULT_FULL_INTENT_TIMEOUT_MS: u64 = 6_000;
pub const DEFAULT_FILTER_TIMEOUT_MS: u64 = 4_000;
pub const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 3_000;

pub const DEFAULT_RATE_LIMIT_WINDOW_MS: u64 = 60_000;
pub const DEFAULT_RATE_LIMIT_MAX: u32 = 60;

pub const DEFAULT_L1_CACHE_CAPACITY: usize = 500;
pub const DEFAULT_L1_CACHE_TTL_SECONDS: u64 = 60;
pub const DEFAULT_L2_CACHE_TTL_SECONDS: u64 = 900;
pub const DEFAULT_L2_CACHE_OPEN_NOW_TTL_SECONDS: u64 = 120;

pub const DEFAULT_JOB_TTL_SECONDS: u64 = 3_600;
pub const DEFAULT_BACKLOG_CAPACITY: usize = 50;
pub const DEFAULT_BACKLOG_TTL_SECONDS: u64 = 120;

pub const DEFAULT_SESSION_COOKIE_TTL_SECONDS: i64 = 3_600;

/// Confidence required for the gate to route CORE instead of FULL (spec §4.2).
pub const GATE_CORE_CONFIDENCE_THRESHOLD: f64 = 0.85;

/// Multilingual near-me lexical markers recognized by the deterministic
/// override in spec §4.1. Matching is case-insensitive and on whole
/// tokens/phrases, never a substring of an unrelated word.
pub const NEAR_ME_MARKERS: &[&str] = &[
	// English
	"near me",
	"nearby",
	"around me",
	"close to me",
	"in my area",
	"closest",
	// Hebrew
	"לידי",
	"קרוב אלי",
	"בקרבת מקום",
	// Spanish
	"cerca de mi",
	"cerca de mí",
	"cerca mio",
	// French
	"près de moi",
	"pres de moi",
	// Arabic
	"بالقرب مني",
	"قريب مني",
];

/// Names of the async push channels the orchestrator publishes to.
pub const CHANNEL_SEARCH: &str = "search";
pub const CHANNEL_ASSISTANT: &str = "assistant";

/// Bound on the in-memory analytics ring (spec §10.5/§11). The endpoint
/// is interface-only, this just keeps it from growing unbounded.
pub const DEFAULT_ANALYTICS_RING_CAPACITY: usize = 1_000;
