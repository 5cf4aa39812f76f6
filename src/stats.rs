use crate::clock::SimClock;

/// Access and fault counters for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    pub total_accesses: u64,
    pub total_page_faults: u64,
}

impl Statistics {
    pub fn record_hit(&mut self) {
        self.total_accesses += 1;
    }

    /// A fault is an access too.
    pub fn record_fault(&mut self) {
        self.total_accesses += 1;
        self.total_page_faults += 1;
    }

    pub fn summary(&self, elapsed: SimClock) -> Summary {
        let seconds = elapsed.as_secs_f64();
        let access_rate = if seconds > 0.0 {
            self.total_accesses as f64 / seconds
        } else {
            0.0
        };
        let fault_rate = if self.total_accesses > 0 {
            self.total_page_faults as f64 / self.total_accesses as f64
        } else {
            0.0
        };
        Summary {
            total_accesses: self.total_accesses,
            total_page_faults: self.total_page_faults,
            access_rate,
            fault_rate,
            elapsed,
        }
    }
}

/// Final statistics of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub total_accesses: u64,
    pub total_page_faults: u64,
    /// Accesses per simulated second.
    pub access_rate: f64,
    /// Faults per access.
    pub fault_rate: f64,
    pub elapsed: SimClock,
}
