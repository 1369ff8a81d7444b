use std::num::NonZeroUsize;

use crate::types::{CarveConfig, Offset};

/// Split `offsets` into contiguous groups of `ceil(len / workers)` offsets
///
/// Concatenating the groups in order gives back the input. At most
/// `workers` groups are produced, never an empty one.
pub fn partition_offsets(offsets: &[Offset], workers: usize) -> Vec<Vec<Offset>> {
    if offsets.is_empty() {
        return Vec::new();
    }

    let workers = workers.max(1);
    let chunk_size = offsets.len().div_ceil(workers);

    offsets.chunks(chunk_size).map(<[Offset]>::to_vec).collect()
}

/// Worker count policy: `floor(available * fraction)`, at least 1
///
/// An explicit override wins over the fraction.
pub fn worker_count(available: usize, fraction: f64, explicit: Option<usize>) -> usize {
    if let Some(workers) = explicit {
        return workers.max(1);
    }
    ((available as f64 * fraction) as usize).max(1)
}

impl CarveConfig {
    /// Workers for this host, leaving headroom for the rest of the system
    pub fn effective_workers(&self) -> usize {
        let available = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        worker_count(available, self.worker_fraction, self.workers)
    }
}
