//! Link derivation rules. Pure functions over a resource and a store
//! snapshot; the store is never mutated here.

use plexus_core::{
    Link, LinkType, Resource, KIND_NODE, KIND_PVC, KIND_SERVICE, KIND_STORAGE_CLASS,
};

use crate::store::ResourceStore;

/// True when every selector key is present in `labels` with an equal value.
/// An empty selector selects nothing.
pub fn selector_matches(labels: &[(String, String)], selector: &[(String, String)]) -> bool {
    if selector.is_empty() {
        return false;
    }
    selector
        .iter()
        .all(|(k, v)| labels.iter().any(|(lk, lv)| lk == k && lv == v))
}

/// Owner, placement and network links originating at `resource`.
///
/// Owner links may dangle (targets are stable uids and heal when the owner
/// arrives). Placement and ingress-backend links resolve by name and are
/// emitted only when the target exists, since names are not stable across
/// kinds the way uids are.
pub fn derive_outgoing(resource: &Resource, store: &ResourceStore) -> Vec<Link> {
    let mut out = Vec::new();

    for owner in &resource.owner_refs {
        out.push(Link::new(resource.uid, *owner, LinkType::Owner));
    }

    if resource.is_pod() {
        if let Some(node_name) = resource.node_name.as_deref() {
            if let Some(node) = store.find_named(KIND_NODE, None, node_name) {
                out.push(Link::new(resource.uid, node.uid, LinkType::Owner));
            }
        }
    }

    if resource.is_service_like() && !resource.selector.is_empty() {
        for pod in store.in_namespace(resource.namespace.as_deref()) {
            if pod.is_pod() && selector_matches(&pod.labels, &resource.selector) {
                out.push(Link::new(resource.uid, pod.uid, LinkType::Network));
            }
        }
    }

    for backend in &resource.ingress_backends {
        if let Some(svc) = store.find_named(KIND_SERVICE, resource.namespace.as_deref(), backend) {
            out.push(Link::new(resource.uid, svc.uid, LinkType::Network));
        }
    }

    out
}

/// Config and storage reference links. Resolved by name within the
/// resource's namespace (StorageClass is cluster-scoped). These are derived
/// at bulk load and on the resource's own ADDED event, then preserved
/// verbatim across modifications.
pub fn derive_config_storage(resource: &Resource, store: &ResourceStore) -> Vec<Link> {
    let mut out = Vec::new();
    let ns = resource.namespace.as_deref();

    for r in &resource.config_refs {
        if let Some(target) = store.find_named(&r.kind, ns, &r.name) {
            out.push(Link::new(resource.uid, target.uid, LinkType::Config));
        }
    }
    for r in &resource.volume_refs {
        if r.kind == KIND_PVC {
            if let Some(target) = store.find_named(KIND_PVC, ns, &r.name) {
                out.push(Link::new(resource.uid, target.uid, LinkType::Storage));
            }
        }
    }
    if let Some(sc) = resource.storage_class.as_deref() {
        if let Some(target) = store.find_named(KIND_STORAGE_CLASS, None, sc) {
            out.push(Link::new(resource.uid, target.uid, LinkType::Storage));
        }
    }

    out
}

/// Service-side links pointing at `pod`: the reciprocal direction of the
/// selector rule, scanned only within the pod's namespace.
pub fn reciprocal_network(pod: &Resource, store: &ResourceStore) -> Vec<Link> {
    let mut out = Vec::new();
    if !pod.is_pod() {
        return out;
    }
    for svc in store.in_namespace(pod.namespace.as_deref()) {
        if svc.is_service_like() && selector_matches(&pod.labels, &svc.selector) {
            out.push(Link::new(svc.uid, pod.uid, LinkType::Network));
        }
    }
    out
}

/// Full re-derivation of the link set from the resource set alone. This is
/// the reference computation bulk sources run; the incremental path must
/// converge to it for any resource it touches.
pub fn derive_all(store: &ResourceStore) -> Vec<Link> {
    let mut out = Vec::new();
    for r in store.all() {
        out.extend(derive_outgoing(r, store));
        out.extend(derive_config_storage(r, store));
    }
    out.sort_unstable();
    out.dedup();
    out
}
