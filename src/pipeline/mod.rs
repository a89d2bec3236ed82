pub mod filters;
pub mod gate;
pub mod near_me;
pub mod orchestrator;
pub mod postfilter;
pub mod route;

pub use orchestrator::Orchestrator;
