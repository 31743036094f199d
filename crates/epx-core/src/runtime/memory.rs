// epx-core/src/runtime/memory.rs
// ============================================================================
// Module: EPX In-Memory Repositories
// Description: Map-backed repository implementations.
// Purpose: Back tests and local development without a database.
// Dependencies: crate::interfaces
// ============================================================================

//! ## Overview
//! In-memory implementations of the job and run repositories. Ids are
//! assigned from a per-repository counter starting at 1; reads return clones
//! so callers never observe shared mutation. Suitable for tests and throwaway
//! local runs only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::core::job::Job;
use crate::core::job::JobStatus;
use crate::core::run::Run;
use crate::core::run::RunStatus;
use crate::interfaces::JobRepository;
use crate::interfaces::RunRepository;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Maps a poisoned-mutex failure to a store error.
fn poisoned() -> StoreError {
    StoreError::Backend("in-memory repository mutex poisoned".to_owned())
}

// ============================================================================
// SECTION: Job Repository
// ============================================================================

/// Mutable state of the in-memory job repository.
#[derive(Debug, Default)]
struct JobState {
    /// Stored jobs by id.
    jobs: BTreeMap<i64, Job>,
    /// Next id to assign.
    next_id: i64,
}

/// Map-backed job repository.
#[derive(Debug)]
pub struct InMemoryJobRepository {
    /// Guarded repository state.
    state: Mutex<JobState>,
}

impl InMemoryJobRepository {
    /// Creates an empty repository assigning ids from 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(JobState {
                jobs: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }
}

impl Default for InMemoryJobRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRepository for InMemoryJobRepository {
    fn save(&self, job: &Job) -> Result<Job, StoreError> {
        let mut state = self.state.lock().map_err(|_| poisoned())?;
        let mut stored = job.clone();
        let id = match stored.id {
            Some(id) => id,
            None => {
                let id = state.next_id;
                state.next_id += 1;
                stored.id = Some(id);
                id
            }
        };
        state.jobs.insert(id, stored.clone());
        Ok(stored)
    }

    fn find_by_id(&self, job_id: i64) -> Result<Option<Job>, StoreError> {
        let state = self.state.lock().map_err(|_| poisoned())?;
        Ok(state.jobs.get(&job_id).cloned())
    }

    fn find_by_user_id(&self, user_id: i64) -> Result<Vec<Job>, StoreError> {
        let state = self.state.lock().map_err(|_| poisoned())?;
        Ok(state.jobs.values().filter(|job| job.user_id == user_id).cloned().collect())
    }

    fn find_by_status(&self, status: JobStatus) -> Result<Vec<Job>, StoreError> {
        let state = self.state.lock().map_err(|_| poisoned())?;
        Ok(state.jobs.values().filter(|job| job.status == status).cloned().collect())
    }

    fn find_all(&self, limit: Option<u64>, offset: u64) -> Result<Vec<Job>, StoreError> {
        let state = self.state.lock().map_err(|_| poisoned())?;
        let mut jobs: Vec<Job> = state.jobs.values().cloned().collect();
        jobs.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        let mut jobs: Vec<Job> = jobs.into_iter().skip(usize::try_from(offset).unwrap_or(usize::MAX)).collect();
        if let Some(limit) = limit {
            jobs.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }
        Ok(jobs)
    }

    fn exists(&self, job_id: i64) -> Result<bool, StoreError> {
        let state = self.state.lock().map_err(|_| poisoned())?;
        Ok(state.jobs.contains_key(&job_id))
    }

    fn delete(&self, job_id: i64) -> Result<bool, StoreError> {
        let mut state = self.state.lock().map_err(|_| poisoned())?;
        Ok(state.jobs.remove(&job_id).is_some())
    }
}

// ============================================================================
// SECTION: Run Repository
// ============================================================================

/// Mutable state of the in-memory run repository.
#[derive(Debug, Default)]
struct RunState {
    /// Stored runs by id.
    runs: BTreeMap<i64, Run>,
    /// Next id to assign.
    next_id: i64,
}

/// Map-backed run repository.
#[derive(Debug)]
pub struct InMemoryRunRepository {
    /// Guarded repository state.
    state: Mutex<RunState>,
}

impl InMemoryRunRepository {
    /// Creates an empty repository assigning ids from 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RunState {
                runs: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }
}

impl Default for InMemoryRunRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl RunRepository for InMemoryRunRepository {
    fn save(&self, run: &Run) -> Result<Run, StoreError> {
        let mut state = self.state.lock().map_err(|_| poisoned())?;
        let mut stored = run.clone();
        let id = match stored.id {
            Some(id) => id,
            None => {
                let id = state.next_id;
                state.next_id += 1;
                stored.id = Some(id);
                id
            }
        };
        state.runs.insert(id, stored.clone());
        Ok(stored)
    }

    fn find_by_id(&self, run_id: i64) -> Result<Option<Run>, StoreError> {
        let state = self.state.lock().map_err(|_| poisoned())?;
        Ok(state.runs.get(&run_id).cloned())
    }

    fn find_by_job_id(&self, job_id: i64) -> Result<Vec<Run>, StoreError> {
        let state = self.state.lock().map_err(|_| poisoned())?;
        Ok(state.runs.values().filter(|run| run.job_id == job_id).cloned().collect())
    }

    fn find_by_user_id(&self, user_id: i64) -> Result<Vec<Run>, StoreError> {
        let state = self.state.lock().map_err(|_| poisoned())?;
        Ok(state.runs.values().filter(|run| run.user_id == user_id).cloned().collect())
    }

    fn find_by_status(&self, status: RunStatus) -> Result<Vec<Run>, StoreError> {
        let state = self.state.lock().map_err(|_| poisoned())?;
        Ok(state
            .runs
            .values()
            .filter(|run| run.status.canonically_eq(status))
            .cloned()
            .collect())
    }

    fn exists(&self, run_id: i64) -> Result<bool, StoreError> {
        let state = self.state.lock().map_err(|_| poisoned())?;
        Ok(state.runs.contains_key(&run_id))
    }

    fn delete(&self, run_id: i64) -> Result<bool, StoreError> {
        let mut state = self.state.lock().map_err(|_| poisoned())?;
        Ok(state.runs.remove(&run_id).is_some())
    }
}
