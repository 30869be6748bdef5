use std::collections::HashSet;
use std::sync::Mutex;

/// Set of job ids currently owned by the dispatcher, either sitting in the
/// work queue or being processed on a host. The discovery loop consults it
/// to avoid re-enqueueing a job the fleet already has.
///
/// An id enters at enqueue time and leaves when a worker releases the job
/// after its dialogue completed, successfully or not.
#[derive(Debug, Default)]
pub struct InFlightTracker {
    ids: Mutex<HashSet<String>>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track an id. Returns false (and tracks nothing) if it is already
    /// present or empty.
    pub fn insert(&self, id: &str) -> bool {
        if id.is_empty() {
            return false;
        }
        self.lock().insert(id.to_string())
    }

    /// Stop tracking an id. Removing an id that is not present is logged
    /// but not fatal.
    pub fn remove(&self, id: &str) -> bool {
        let removed = !id.is_empty() && self.lock().remove(id);
        if !removed {
            tracing::warn!(job_id = id, "job id not in in-flight list");
        }
        removed
    }

    pub fn contains(&self, id: &str) -> bool {
        !id.is_empty() && self.lock().contains(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Current id list, for external observability.
    pub fn snapshot(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        // Held only for map operations, never across await points.
        self.ids.lock().expect("in-flight tracker mutex poisoned")
    }
}
