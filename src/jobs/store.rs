/*
 * src/jobs/store.rs
 *
 * Job store (C7, job-lifecycle half). A durable redis-backed
 * implementation (grounded on Blokmap-backend's `session.rs`
 * `redis::AsyncCommands` usage) and a process-local fallback for tests
 * and single-process deployments, both enforcing the
 * PENDING→RUNNING→{DONE_SUCCESS,DONE_FAILED} state machine (spec §4.7).
 */

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::error::PrivateError;
use crate::model::job::{Job, JobStatus};
use crate::model::response::SearchResponse;

#[async_trait]
pub trait JobStore: Send + Sync {
	async fn create(&self, id: &str) -> Result<(), PrivateError>;
	async fn set_status(&self, id: &str, status: JobStatus) -> Result<(), PrivateError>;
	async fn set_result(&self, id: &str, result: SearchResponse) -> Result<(), PrivateError>;
	async fn set_error(&self, id: &str, error: String) -> Result<(), PrivateError>;
	async fn get(&self, id: &str) -> Result<Option<Job>, PrivateError>;
}

fn apply_transition(job: &mut Job, next: JobStatus) -> Result<(), PrivateError> {
	if !job.status.can_transition_to(next) {
		return Err(PrivateError::Internal(format!(
			"illegal job transition {:?} -> {:?}",
			job.status, next
		)));
	}
	job.status = next;
	job.updated_at = Utc::now().timestamp();
	Ok(())
}

pub struct RedisJobStore {
	conn: ConnectionManager,
	ttl_seconds: u64,
}

impl RedisJobStore {
	pub fn new(conn: ConnectionManager, ttl_seconds: u64) -> Self {
		Self { conn, ttl_seconds }
	}

	fn key(id: &str) -> String {
		format!("job:{id}")
	}

	async fn read(&self, id: &str) -> Result<Option<Job>, PrivateError> {
		let mut conn = self.conn.clone();
		let raw: Option<String> = conn.get(Self::key(id)).await?;
		match raw {
			Some(s) => Ok(Some(
				serde_json::from_str(&s).map_err(|e| PrivateError::Internal(e.to_string()))?,
			)),
			None => Ok(None),
		}
	}

	async fn write(&self, job: &Job) -> Result<(), PrivateError> {
		let mut conn = self.conn.clone();
		let serialized = serde_json::to_string(job).map_err(|e| PrivateError::Internal(e.to_string()))?;
		conn.set_ex::<_, _, ()>(Self::key(&job.id), serialized, self.ttl_seconds)
			.await?;
		Ok(())
	}
}

#[async_trait]
impl JobStore for RedisJobStore {
	async fn create(&self, id: &str) -> Result<(), PrivateError> {
		let job = Job::new(id.to_string(), Utc::now().timestamp());
		self.write(&job).await
	}

	async fn set_status(&self, id: &str, status: JobStatus) -> Result<(), PrivateError> {
		let mut job = self
			.read(id)
			.await?
			.ok_or_else(|| PrivateError::Internal(format!("job {id} not found")))?;
		apply_transition(&mut job, status)?;
		self.write(&job).await
	}

	async fn set_result(&self, id: &str, result: SearchResponse) -> Result<(), PrivateError> {
		let mut job = self
			.read(id)
			.await?
			.ok_or_else(|| PrivateError::Internal(format!("job {id} not found")))?;
		apply_transition(&mut job, JobStatus::DoneSuccess)?;
		job.result = Some(result);
		self.write(&job).await
	}

	async fn set_error(&self, id: &str, error: String) -> Result<(), PrivateError> {
		let mut job = self
			.read(id)
			.await?
			.ok_or_else(|| PrivateError::Internal(format!("job {id} not found")))?;
		apply_transition(&mut job, JobStatus::DoneFailed)?;
		job.error = Some(error);
		self.write(&job).await
	}

	async fn get(&self, id: &str) -> Result<Option<Job>, PrivateError> {
		self.read(id).await
	}
}

/// Process-local fallback: used in tests and whenever `L2_CACHE_URL` is
/// not configured as a shared durable store. TTL is enforced lazily on
/// read rather than with a background sweep.
pub struct InMemoryJobStore {
	jobs: DashMap<String, Job>,
	ttl_seconds: i64,
}

impl InMemoryJobStore {
	pub fn new(ttl_seconds: u64) -> Self {
		Self {
			jobs: DashMap::new(),
			ttl_seconds: ttl_seconds as i64,
		}
	}
}

#[async_trait]
impl JobStore for InMemoryJobStore {
	async fn create(&self, id: &str) -> Result<(), PrivateError> {
		self.jobs
			.insert(id.to_string(), Job::new(id.to_string(), Utc::now().timestamp()));
		Ok(())
	}

	async fn set_status(&self, id: &str, status: JobStatus) -> Result<(), PrivateError> {
		let mut job = self
			.jobs
			.get_mut(id)
			.ok_or_else(|| PrivateError::Internal(format!("job {id} not found")))?;
		apply_transition(&mut job, status)
	}

	async fn set_result(&self, id: &str, result: SearchResponse) -> Result<(), PrivateError> {
		let mut job = self
			.jobs
			.get_mut(id)
			.ok_or_else(|| PrivateError::Internal(format!("job {id} not found")))?;
		apply_transition(&mut job, JobStatus::DoneSuccess)?;
		job.result = Some(result);
		Ok(())
	}

	async fn set_error(&self, id: &str, error: String) -> Result<(), PrivateError> {
		let mut job = self
			.jobs
			.get_mut(id)
			.ok_or_else(|| PrivateError::Internal(format!("job {id} not found")))?;
		apply_transition(&mut job, JobStatus::DoneFailed)?;
		job.error = Some(error);
		Ok(())
	}

	async fn get(&self, id: &str) -> Result<Option<Job>, PrivateError> {
		match self.jobs.get(id) {
			Some(job) if Utc::now().timestamp() - job.created_at < self.ttl_seconds => {
				Ok(Some(job.clone()))
			}
			Some(_) => {
				self.jobs.remove(id);
				Ok(None)
			}
			None => Ok(None),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn no_back_transition_through_set_status() {
		let store = InMemoryJobStore::new(3600);
		store.create("req-1").await.unwrap();
		store.set_status("req-1", JobStatus::Running).await.unwrap();
		store
			.set_result(
				"req-1",
				crate::model::response::SearchResponse {
					request_id: "req-1".into(),
					session_id: None,
					results: vec![],
					chips: vec![],
					meta: crate::model::response::ResponseMeta {
						duration_ms: 10,
						applied_filters: Default::default(),
						failure_reason: crate::error::FailureReason::None,
						source: "pipeline".into(),
					},
					assist: None,
				},
			)
			.await
			.unwrap();

		let err = store.set_status("req-1", JobStatus::Running).await;
		assert!(err.is_err());
	}
}
