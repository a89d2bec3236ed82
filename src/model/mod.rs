/*
 * src/model/mod.rs
 *
 * Data model for the search pipeline (spec §3). Every type here is a
 * plain, strictly-typed struct validated at the boundary it crosses —
 * nothing untyped propagates past the stage that produced it (spec §9).
 */

pub mod candidate;
pub mod context;
pub mod filters;
pub mod gate;
pub mod job;
pub mod request;
pub mod response;
pub mod route;

pub use candidate::PlaceCandidate;
pub use context::PipelineContext;
pub use filters::{BaseFilters, FinalFilters, OpenAt, OpenBetween, OpenState, PostConstraints};
pub use gate::{FoodSignal, GateDecision, GateRoute};
pub use job::{Job, JobStatus};
pub use request::{LatLng, SearchMode, SearchRequest};
pub use response::{AssistMessage, AssistType, ResponseMeta, SearchResponse};
pub use route::{ProviderParameters, Route};
