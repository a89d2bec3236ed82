pub mod adapter;
pub mod schema;

pub use adapter::{CallOpts, LangchainModelAdapter, ModelAdapter, StubModelAdapter, prompt_hash};
