//! Authoritative uid-keyed resource store and the indexed link set.

use plexus_core::{Link, LinkType, Resource, Uid};
use rustc_hash::{FxHashMap, FxHashSet};

fn ns_key(namespace: Option<&str>) -> String {
    namespace.unwrap_or("").to_string()
}

/// Mapping from uid to resource record, plus a namespace index used by the
/// reciprocal selector scans. Uid-keyed so existence checks are O(1).
#[derive(Default)]
pub struct ResourceStore {
    map: FxHashMap<Uid, Resource>,
    order: Vec<Uid>,
    ns_index: FxHashMap<String, FxHashSet<Uid>>,
}

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entire contents. Used once per connection after bulk fetch.
    pub fn load(&mut self, resources: Vec<Resource>) {
        self.clear();
        for r in resources {
            self.upsert(r);
        }
    }

    /// Insert or replace by uid; returns the prior record so callers can diff.
    pub fn upsert(&mut self, resource: Resource) -> Option<Resource> {
        let uid = resource.uid;
        let ns = ns_key(resource.namespace.as_deref());
        let prev = self.map.insert(uid, resource);
        match &prev {
            Some(old) => {
                let old_ns = ns_key(old.namespace.as_deref());
                if old_ns != ns {
                    if let Some(set) = self.ns_index.get_mut(&old_ns) {
                        set.remove(&uid);
                    }
                }
            }
            None => self.order.push(uid),
        }
        self.ns_index.entry(ns).or_default().insert(uid);
        prev
    }

    pub fn remove(&mut self, uid: &Uid) -> Option<Resource> {
        let prev = self.map.remove(uid)?;
        self.order.retain(|u| u != uid);
        if let Some(set) = self.ns_index.get_mut(&ns_key(prev.namespace.as_deref())) {
            set.remove(uid);
        }
        Some(prev)
    }

    pub fn get(&self, uid: &Uid) -> Option<&Resource> {
        self.map.get(uid)
    }

    pub fn contains(&self, uid: &Uid) -> bool {
        self.map.contains_key(uid)
    }

    /// All records in insertion order.
    pub fn all(&self) -> impl Iterator<Item = &Resource> {
        self.order.iter().filter_map(|u| self.map.get(u))
    }

    /// Records in one namespace (empty key for cluster-scoped), arbitrary order.
    pub fn in_namespace(&self, namespace: Option<&str>) -> impl Iterator<Item = &Resource> {
        self.ns_index
            .get(&ns_key(namespace))
            .into_iter()
            .flat_map(|set| set.iter())
            .filter_map(|u| self.map.get(u))
    }

    /// Resolve a (kind, namespace, name) triple. Names are only meaningful
    /// within a kind and namespace, so lookups stay scoped to the ns bucket.
    pub fn find_named(&self, kind: &str, namespace: Option<&str>, name: &str) -> Option<&Resource> {
        self.in_namespace(namespace)
            .find(|r| r.kind == kind && r.name == name)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
        self.ns_index.clear();
    }
}

/// Deduplicated link set with per-endpoint indexes so cascade removal and
/// incoming-edge rewrites stay O(affected) instead of O(all links).
#[derive(Default)]
pub struct LinkSet {
    links: FxHashSet<Link>,
    by_source: FxHashMap<Uid, FxHashSet<Link>>,
    by_target: FxHashMap<Uid, FxHashSet<Link>>,
}

impl LinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace contents with pre-computed links (bulk load path).
    pub fn load(&mut self, links: Vec<Link>) {
        self.clear();
        for l in links {
            self.insert(l);
        }
    }

    /// Returns false when the identical link was already present.
    pub fn insert(&mut self, link: Link) -> bool {
        if !self.links.insert(link) {
            return false;
        }
        self.by_source.entry(link.source).or_default().insert(link);
        self.by_target.entry(link.target).or_default().insert(link);
        true
    }

    fn unindex(&mut self, link: &Link) {
        if let Some(set) = self.by_source.get_mut(&link.source) {
            set.remove(link);
            if set.is_empty() {
                self.by_source.remove(&link.source);
            }
        }
        if let Some(set) = self.by_target.get_mut(&link.target) {
            set.remove(link);
            if set.is_empty() {
                self.by_target.remove(&link.target);
            }
        }
    }

    fn remove_batch(&mut self, batch: Vec<Link>) -> usize {
        let n = batch.len();
        for l in batch {
            self.links.remove(&l);
            self.unindex(&l);
        }
        n
    }

    /// Drop every link where `uid` is source or target (resource deletion).
    pub fn remove_touching(&mut self, uid: &Uid) -> usize {
        let mut batch: Vec<Link> = self
            .by_source
            .get(uid)
            .into_iter()
            .flat_map(|s| s.iter().copied())
            .collect();
        batch.extend(
            self.by_target
                .get(uid)
                .into_iter()
                .flat_map(|s| s.iter().copied()),
        );
        self.remove_batch(batch)
    }

    /// Drop `uid`'s outgoing links of the given types, preserving the rest
    /// (the config/storage preservation rule on modify).
    pub fn remove_outgoing_of_types(&mut self, uid: &Uid, types: &[LinkType]) -> usize {
        let batch: Vec<Link> = self
            .by_source
            .get(uid)
            .into_iter()
            .flat_map(|s| s.iter())
            .filter(|l| types.contains(&l.link_type))
            .copied()
            .collect();
        self.remove_batch(batch)
    }

    /// Drop incoming links of one type (reciprocal network rewrite).
    pub fn remove_incoming_of_type(&mut self, uid: &Uid, link_type: LinkType) -> usize {
        let batch: Vec<Link> = self
            .by_target
            .get(uid)
            .into_iter()
            .flat_map(|s| s.iter())
            .filter(|l| l.link_type == link_type)
            .copied()
            .collect();
        self.remove_batch(batch)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Link> {
        self.links.iter()
    }

    pub fn contains(&self, link: &Link) -> bool {
        self.links.contains(link)
    }

    /// Canonically ordered copy for snapshots and assertions.
    pub fn sorted(&self) -> Vec<Link> {
        let mut out: Vec<Link> = self.links.iter().copied().collect();
        out.sort_unstable();
        out
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn clear(&mut self) {
        self.links.clear();
        self.by_source.clear();
        self.by_target.clear();
    }
}
