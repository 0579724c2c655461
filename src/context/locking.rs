//! Per-key lock striping
//!
//! Mutations of one index key (type, primary id) are serialized through a
//! fixed pool of mutexes selected by `primary_id % pool_size`. Unrelated keys
//! that land in the same bucket wait on each other; the pool stays bounded.
//!
//! A global read/write lock sits above the pool: every per-key guard holds it
//! shared, and type-wide deletes hold it exclusively.

use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

/// Multiplier used when the configured one is out of range
pub const DEFAULT_LOCK_MULTIPLIER: usize = 8;

/// Guard over one key's bucket
pub struct KeyGuard<'a> {
    _key: MutexGuard<'a, ()>,
    _global: RwLockReadGuard<'a, ()>,
}

/// Striped lock pool
pub struct LockingUtil {
    locks: Vec<Mutex<()>>,
    global: RwLock<()>,
}

impl LockingUtil {
    /// Pool sized to the first prime above
    /// `max(num_clusters_in_group, cpus * multiplier)`
    pub fn new(num_clusters_in_group: usize, lock_multiplier: usize) -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::with_cpus(num_clusters_in_group, lock_multiplier, cpus)
    }

    fn with_cpus(num_clusters_in_group: usize, lock_multiplier: usize, cpus: usize) -> Self {
        let multiplier = if (1..1000).contains(&lock_multiplier) {
            lock_multiplier
        } else {
            DEFAULT_LOCK_MULTIPLIER
        };
        let size = next_prime(num_clusters_in_group.max(cpus * multiplier));
        info!("Using {} locks", size);
        Self {
            locks: (0..size).map(|_| Mutex::new(())).collect(),
            global: RwLock::new(()),
        }
    }

    /// Number of buckets
    pub fn pool_size(&self) -> usize {
        self.locks.len()
    }

    /// Bucket index of a primary id
    pub fn bucket(&self, primary_id: i32) -> usize {
        primary_id.unsigned_abs() as usize % self.locks.len()
    }

    /// Lock the bucket of `primary_id` for a read-modify-write
    pub fn lock_key(&self, primary_id: i32) -> KeyGuard<'_> {
        let global = self.global.read();
        let key = self.locks[self.bucket(primary_id)].lock();
        KeyGuard {
            _key: key,
            _global: global,
        }
    }

    /// Exclude every per-key mutation
    pub fn lock_all(&self) -> RwLockWriteGuard<'_, ()> {
        self.global.write()
    }
}

/// Smallest prime strictly greater than `n`
pub fn next_prime(n: usize) -> usize {
    let mut candidate = n + 1;
    loop {
        if is_prime(candidate) {
            return candidate;
        }
        candidate += 1;
    }
}

fn is_prime(n: usize) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let mut d = 3;
    while d * d <= n {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}
