//! # Export Leases
//!
//! A lease marks one `(portable, relation)` export as running. Acquisition is
//! atomic per key through the `DashMap` entry API, so of two concurrent
//! requests exactly one obtains the lease. The lease is released when its
//! guard drops; a lease older than the TTL is treated as abandoned and may be
//! taken over.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::types::LeaseKey;

#[derive(Debug, Clone, Copy)]
struct LeaseRecord {
    token: Uuid,
    acquired_at: Instant,
}

impl LeaseRecord {
    fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.acquired_at) >= ttl
    }
}

#[derive(Debug, Clone)]
pub struct ExportLeaseRegistry {
    leases: Arc<DashMap<LeaseKey, LeaseRecord>>,
    ttl: Duration,
}

impl ExportLeaseRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            leases: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn try_acquire(&self, key: LeaseKey) -> Option<ExportLease> {
        self.try_acquire_at(key, Instant::now())
    }

    /// Acquire the lease for `key` as of `now`; `None` while a live lease exists
    pub fn try_acquire_at(&self, key: LeaseKey, now: Instant) -> Option<ExportLease> {
        let record = LeaseRecord {
            token: Uuid::new_v4(),
            acquired_at: now,
        };

        match self.leases.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get().is_expired(self.ttl, now) {
                    return None;
                }
                tracing::warn!(lease = %key, "Taking over expired export lease");
                occupied.insert(record);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(record);
            }
        }

        Some(ExportLease {
            leases: Arc::clone(&self.leases),
            key,
            token: record.token,
        })
    }

    pub fn is_held(&self, key: &LeaseKey) -> bool {
        self.leases
            .get(key)
            .is_some_and(|record| !record.is_expired(self.ttl, Instant::now()))
    }

    pub fn active_count(&self) -> usize {
        self.leases.len()
    }
}

/// Guard for a held lease; dropping it releases the key
#[derive(Debug)]
pub struct ExportLease {
    leases: Arc<DashMap<LeaseKey, LeaseRecord>>,
    key: LeaseKey,
    token: Uuid,
}

impl ExportLease {
    pub fn key(&self) -> &LeaseKey {
        &self.key
    }

    pub fn token(&self) -> Uuid {
        self.token
    }
}

impl Drop for ExportLease {
    fn drop(&mut self) {
        // Only release our own record; an expired lease may have been taken over
        let token = self.token;
        self.leases
            .remove_if(&self.key, |_, record| record.token == token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::types::Portable;

    fn key(relation: &str) -> LeaseKey {
        LeaseKey {
            portable: Portable::project(1),
            relation: relation.to_string(),
        }
    }

    #[test]
    fn test_second_acquire_is_rejected_until_release() {
        let registry = ExportLeaseRegistry::new(Duration::from_secs(60));

        let lease = registry.try_acquire(key("labels")).unwrap();
        assert!(registry.try_acquire(key("labels")).is_none());
        assert!(registry.try_acquire(key("issues")).is_some());
        assert!(registry.is_held(&key("labels")));

        drop(lease);
        assert!(!registry.is_held(&key("labels")));
        assert!(registry.try_acquire(key("labels")).is_some());
    }

    #[test]
    fn test_expired_lease_can_be_taken_over() {
        let ttl = Duration::from_secs(60);
        let registry = ExportLeaseRegistry::new(ttl);
        let start = Instant::now();

        let stale = registry.try_acquire_at(key("labels"), start).unwrap();
        assert!(registry
            .try_acquire_at(key("labels"), start + Duration::from_secs(30))
            .is_none());

        let fresh = registry
            .try_acquire_at(key("labels"), start + ttl + Duration::from_secs(1))
            .unwrap();
        assert_ne!(stale.token(), fresh.token());

        // The stale holder finishing must not release the new lease
        drop(stale);
        assert_eq!(registry.active_count(), 1);
        drop(fresh);
        assert_eq!(registry.active_count(), 0);
    }
}
