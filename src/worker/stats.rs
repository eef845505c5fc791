use std::collections::BTreeMap;

/// Final per-worker distributions.
///
/// Both maps are ordered: status codes ascend and error descriptions sort
/// lexically, which keeps the report deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub status_codes: BTreeMap<u16, u64>,
    pub errors: BTreeMap<String, u64>,
}

impl WorkerStats {
    pub fn record_status(&mut self, code: u16) {
        let count = self.status_codes.entry(code).or_insert(0);
        *count = count.saturating_add(1);
    }

    pub fn record_error(&mut self, description: String) {
        let count = self.errors.entry(description).or_insert(0);
        *count = count.saturating_add(1);
    }

    pub fn merge(&mut self, other: WorkerStats) {
        for (code, added) in other.status_codes {
            let count = self.status_codes.entry(code).or_insert(0);
            *count = count.saturating_add(added);
        }
        for (description, added) in other.errors {
            let count = self.errors.entry(description).or_insert(0);
            *count = count.saturating_add(added);
        }
    }

    #[must_use]
    pub fn total_responses(&self) -> u64 {
        self.status_codes
            .values()
            .fold(0u64, |total, count| total.saturating_add(*count))
    }

    #[must_use]
    pub fn total_errors(&self) -> u64 {
        self.errors
            .values()
            .fold(0u64, |total, count| total.saturating_add(*count))
    }
}
