use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Ports currently claimed by running server instances.
///
/// Cloning yields another handle to the same set. Every reserve and release is
/// atomic with respect to the others; there is no ordering across instances
/// beyond that.
#[derive(Debug, Clone, Default)]
pub struct PortRegistry {
    reserved: Arc<Mutex<HashSet<u16>>>,
}

impl PortRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `port` if no one holds it. Returns false when already taken.
    pub fn try_reserve(&self, port: u16) -> bool {
        self.lock().insert(port)
    }

    /// Give `port` back. Releasing an unheld port is a no-op.
    pub fn release(&self, port: u16) {
        self.lock().remove(&port);
    }

    pub fn is_reserved(&self, port: u16) -> bool {
        self.lock().contains(&port)
    }

    pub fn reserved(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self.lock().iter().copied().collect();
        ports.sort_unstable();
        ports
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<u16>> {
        // The set is always consistent between statements, so a poisoned lock
        // is still safe to use.
        self.reserved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_free_port() {
        let registry = PortRegistry::new();
        assert!(registry.try_reserve(27016));
        assert!(registry.is_reserved(27016));
    }

    #[test]
    fn test_reserve_taken_port_fails() {
        let registry = PortRegistry::new();
        assert!(registry.try_reserve(27016));
        assert!(!registry.try_reserve(27016));
        assert_eq!(registry.reserved(), vec![27016]);
    }

    #[test]
    fn test_release_is_idempotent() {
        let registry = PortRegistry::new();
        registry.try_reserve(27017);
        registry.release(27017);
        registry.release(27017);
        registry.release(1234);
        assert!(registry.reserved().is_empty());
        assert!(registry.try_reserve(27017));
    }

    #[test]
    fn test_clones_share_state() {
        let a = PortRegistry::new();
        let b = a.clone();
        assert!(a.try_reserve(28960));
        assert!(!b.try_reserve(28960));
        b.release(28960);
        assert!(!a.is_reserved(28960));
    }

    #[test]
    fn test_concurrent_reservation_has_single_winner() {
        let registry = PortRegistry::new();
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let r = registry.clone();
                std::thread::spawn(move || r.try_reserve(27020))
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
