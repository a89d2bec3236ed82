use serde::{Deserialize, Serialize};

use crate::model::response::SearchResponse;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
	Pending,
	Running,
	DoneSuccess,
	DoneFailed,
}

impl JobStatus {
	/// The state machine in spec §4.7 has no back-transitions.
	pub fn can_transition_to(self, next: JobStatus) -> bool {
		use JobStatus::*;
		matches!(
			(self, next),
			(Pending, Running)
				| (Pending, DoneSuccess)
				| (Pending, DoneFailed)
				| (Running, DoneSuccess)
				| (Running, DoneFailed)
		)
	}
}

/// An async-mode job, owned by the job store (C7), spec §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
	pub id: String,
	pub status: JobStatus,
	pub result: Option<SearchResponse>,
	pub error: Option<String>,
	pub created_at: i64,
	pub updated_at: i64,
}

impl Job {
	pub fn new(id: String, now: i64) -> Self {
		Job {
			id,
			status: JobStatus::Pending,
			result: None,
			error: None,
			created_at: now,
			updated_at: now,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn no_back_transitions() {
		assert!(JobStatus::Pending.can_transition_to(JobStatus::Running));
		assert!(JobStatus::Running.can_transition_to(JobStatus::DoneSuccess));
		assert!(!JobStatus::DoneSuccess.can_transition_to(JobStatus::Running));
		assert!(!JobStatus::DoneFailed.can_transition_to(JobStatus::Pending));
	}
}
