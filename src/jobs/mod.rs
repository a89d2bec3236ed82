pub mod channel;
pub mod store;

pub use channel::{ChannelMessage, PushChannel};
pub use store::{InMemoryJobStore, JobStore, RedisJobStore};
