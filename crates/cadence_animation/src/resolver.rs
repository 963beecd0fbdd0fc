//! Property conflict resolution
//!
//! At most one running leaf animation drives a given (target, property) pair.
//! A leaf claims its property when it starts; the previous claimant is
//! evicted and its outermost running ancestor stopped, so a newer animation
//! always takes over from an older one.
//!
//! The registry is shared between trees, possibly on different threads.
//! Evictions of animations living in another tree cannot be applied
//! directly, so they are queued per tree and picked up by that tree's
//! [`AnimationTree::process_deferred`].

use crate::job::{AnimationId, AnimationState, DomainId};
use crate::AnimationTree;
use cadence_core::PropertyKey;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::sync::Arc;

/// The running animation driving a property
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Claim {
    pub domain: DomainId,
    pub animation: AnimationId,
}

#[derive(Debug, Default)]
struct ResolverInner {
    claims: FxHashMap<PropertyKey, Claim>,
    pending_stops: FxHashMap<DomainId, Vec<AnimationId>>,
}

/// Shared registry of property claimants
#[derive(Clone, Debug, Default)]
pub struct ConflictResolver {
    inner: Arc<Mutex<ResolverInner>>,
}

impl ConflictResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `claim` for `key` and return the evicted claimant, if any
    pub fn claim(&self, key: PropertyKey, claim: Claim) -> Option<Claim> {
        let mut inner = self.inner.lock();
        inner
            .claims
            .insert(key, claim)
            .filter(|evicted| *evicted != claim)
    }

    /// Drop the claim for `key` if `claim` still holds it
    pub fn release(&self, key: &PropertyKey, claim: Claim) -> bool {
        let mut inner = self.inner.lock();
        if inner.claims.get(key) == Some(&claim) {
            inner.claims.remove(key);
            true
        } else {
            false
        }
    }

    pub fn claimant(&self, key: &PropertyKey) -> Option<Claim> {
        self.inner.lock().claims.get(key).copied()
    }

    /// Number of claimed properties
    pub fn len(&self) -> usize {
        self.inner.lock().claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().claims.is_empty()
    }

    pub(crate) fn post_stop(&self, domain: DomainId, animation: AnimationId) {
        self.inner
            .lock()
            .pending_stops
            .entry(domain)
            .or_default()
            .push(animation);
    }

    pub(crate) fn take_pending_stops(&self, domain: DomainId) -> Vec<AnimationId> {
        self.inner
            .lock()
            .pending_stops
            .remove(&domain)
            .unwrap_or_default()
    }

    /// Forget every claim and queued stop of a tree that is going away
    pub(crate) fn release_domain(&self, domain: DomainId) {
        let mut inner = self.inner.lock();
        inner.claims.retain(|_, claim| claim.domain != domain);
        inner.pending_stops.remove(&domain);
    }

    pub(crate) fn has_pending_stops(&self, domain: DomainId) -> bool {
        self.inner
            .lock()
            .pending_stops
            .get(&domain)
            .map_or(false, |stops| !stops.is_empty())
    }
}

impl AnimationTree {
    /// Claim the property of a leaf that just started
    pub(crate) fn claim_property(&mut self, id: AnimationId) {
        let Some(key) = self.leaf_policy(id).and_then(|leaf| leaf.property_key()) else {
            return;
        };
        let claim = Claim {
            domain: self.domain(),
            animation: id,
        };
        let evicted = self.resolver.claim(key.clone(), claim);
        if let Some(node) = self.nodes.get_mut(id) {
            node.claim = Some(key.clone());
        }

        let Some(evicted) = evicted else {
            return;
        };
        tracing::debug!(
            property = %key,
            evicted = ?evicted.animation,
            claimant = ?id,
            "property animation evicted"
        );
        if evicted.domain == self.domain() {
            if let Some(node) = self.nodes.get_mut(evicted.animation) {
                node.claim = None;
            }
            self.stop_evicted(evicted.animation, Some(id));
        } else {
            self.resolver.post_stop(evicted.domain, evicted.animation);
        }
    }

    /// Release the claim held by `id`, if it still holds one
    pub(crate) fn release_claim(&mut self, id: AnimationId) {
        let Some(key) = self.nodes.get_mut(id).and_then(|n| n.claim.take()) else {
            return;
        };
        let claim = Claim {
            domain: self.domain(),
            animation: id,
        };
        if self.resolver.release(&key, claim) {
            tracing::trace!(property = %key, animation = ?id, "property claim released");
        }
    }

    /// Stop the outermost running ancestor of an evicted animation.
    ///
    /// Ancestors shared with the new claimant stay untouched so a group can
    /// hand a property over between its own children.
    fn stop_evicted(&mut self, evicted: AnimationId, claimant: Option<AnimationId>) {
        let shared: SmallVec<[AnimationId; 8]> = match claimant {
            Some(claimant) => self.ancestors_inclusive(claimant).collect(),
            None => SmallVec::new(),
        };

        let mut target = None;
        for ancestor in self.ancestors_inclusive(evicted) {
            if shared.contains(&ancestor) {
                break;
            }
            if self.state_of(ancestor) != AnimationState::Stopped {
                target = Some(ancestor);
            }
        }
        if let Some(target) = target {
            self.stop(target);
        }
    }

    /// Apply evictions other trees queued for this one
    pub(crate) fn process_conflict_stops(&mut self) {
        let stops = self.resolver.take_pending_stops(self.domain());
        for id in stops {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            // Restarted since the eviction and claimed again.
            let own = Claim {
                domain: self.domain(),
                animation: id,
            };
            let reclaimed = node
                .claim
                .as_ref()
                .map_or(false, |key| self.resolver.claimant(key) == Some(own));
            if reclaimed {
                continue;
            }
            if let Some(node) = self.nodes.get_mut(id) {
                node.claim = None;
            }
            tracing::debug!(animation = ?id, "stopping animation evicted by another tree");
            self.stop_evicted(id, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::TargetId;
    use slotmap::KeyData;

    fn claim(domain: DomainId, raw: u64) -> Claim {
        Claim {
            domain,
            animation: AnimationId::from(KeyData::from_ffi(raw)),
        }
    }

    #[test]
    fn test_claim_returns_evicted() {
        let resolver = ConflictResolver::new();
        let domain = AnimationTree::new().domain();
        let key = PropertyKey::new(TargetId::next(), "x");
        let first = claim(domain, (1 << 32) | 1);
        let second = claim(domain, (1 << 32) | 2);

        assert_eq!(resolver.claim(key.clone(), first), None);
        assert_eq!(resolver.claim(key.clone(), first), None);
        assert_eq!(resolver.claim(key.clone(), second), Some(first));
        assert_eq!(resolver.claimant(&key), Some(second));
    }

    #[test]
    fn test_release_only_by_claimant() {
        let resolver = ConflictResolver::new();
        let domain = AnimationTree::new().domain();
        let key = PropertyKey::new(TargetId::next(), "opacity");
        let first = claim(domain, (1 << 32) | 1);
        let second = claim(domain, (1 << 32) | 2);

        resolver.claim(key.clone(), first);
        resolver.claim(key.clone(), second);
        assert!(!resolver.release(&key, first));
        assert_eq!(resolver.len(), 1);
        assert!(resolver.release(&key, second));
        assert!(resolver.is_empty());
    }

    #[test]
    fn test_pending_stops_are_per_domain() {
        let resolver = ConflictResolver::new();
        let a = AnimationTree::new().domain();
        let b = AnimationTree::new().domain();
        let victim = claim(a, (1 << 32) | 3).animation;

        resolver.post_stop(a, victim);
        assert!(resolver.has_pending_stops(a));
        assert!(!resolver.has_pending_stops(b));
        assert_eq!(resolver.take_pending_stops(a), vec![victim]);
        assert!(!resolver.has_pending_stops(a));
    }

    #[test]
    fn test_dropped_tree_releases_its_claims() {
        let resolver = ConflictResolver::new();
        let tree = AnimationTree::new().with_resolver(resolver.clone());
        let other = AnimationTree::new().domain();
        let mine = PropertyKey::new(TargetId::next(), "x");
        let theirs = PropertyKey::new(TargetId::next(), "y");
        resolver.claim(mine.clone(), claim(tree.domain(), (1 << 32) | 1));
        resolver.claim(theirs.clone(), claim(other, (1 << 32) | 1));
        resolver.post_stop(tree.domain(), claim(tree.domain(), (1 << 32) | 2).animation);
        let domain = tree.domain();

        drop(tree);
        assert_eq!(resolver.claimant(&mine), None);
        assert!(resolver.claimant(&theirs).is_some());
        assert!(!resolver.has_pending_stops(domain));
    }

    #[test]
    fn test_resolver_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ConflictResolver>();
    }
}
