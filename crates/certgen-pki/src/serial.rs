//! Serial number allocation.

use parking_lot::Mutex;

/// Hands out certificate serial numbers for one bootstrap run.
///
/// CAs and leaves draw from the same allocator, so every serial in the run is
/// unique. The first call returns 1; zero is never issued.
#[derive(Debug, Default)]
pub struct SerialAllocator {
    last: Mutex<u64>,
}

impl SerialAllocator {
    /// Create an allocator whose first serial will be 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Next serial, strictly greater than every serial returned before.
    pub fn get(&self) -> u64 {
        let mut last = self.last.lock();
        *last += 1;
        *last
    }

    /// The most recently issued serial, or 0 if none has been issued.
    pub fn last(&self) -> u64 {
        *self.last.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_first_serial_is_one() {
        let serial = SerialAllocator::new();
        assert_eq!(serial.last(), 0);
        assert_eq!(serial.get(), 1);
        assert_eq!(serial.get(), 2);
        assert_eq!(serial.last(), 2);
    }

    #[test]
    fn test_concurrent_callers_get_unique_serials() {
        let serial = SerialAllocator::new();

        let all: Vec<u64> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| (0..250).map(|_| serial.get()).collect::<Vec<_>>()))
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });

        let unique: BTreeSet<u64> = all.iter().copied().collect();
        assert_eq!(unique.len(), 2000);
        assert_eq!(unique.iter().next(), Some(&1));
        assert_eq!(unique.iter().last(), Some(&2000));
    }

    #[test]
    fn test_serials_increase_per_thread() {
        let serial = SerialAllocator::new();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    let mut previous = 0;
                    for _ in 0..100 {
                        let next = serial.get();
                        assert!(next > previous);
                        previous = next;
                    }
                });
            }
        });
    }
}
