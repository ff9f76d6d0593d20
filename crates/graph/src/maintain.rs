//! Incremental link maintenance: apply one watch event and recompute only
//! the links it could have affected.

use plexus_core::{EventKind, LinkType, WatchEvent};
use tracing::{debug, trace};

use crate::classify::{classify, labels_changed, merge_partial, ChangeClass};
use crate::derive::{derive_config_storage, derive_outgoing, reciprocal_network};
use crate::store::{LinkSet, ResourceStore};

/// Outcome of applying one event. `changed: false` means consumers can skip
/// re-layout entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    pub changed: bool,
}

const REDERIVED_TYPES: &[LinkType] = &[LinkType::Owner, LinkType::Network];

/// Apply one event in delivery order. Not commutative across events for the
/// same resource; the caller owns sequencing.
pub fn apply_event(event: WatchEvent, store: &mut ResourceStore, links: &mut LinkSet) -> Applied {
    match event.kind {
        EventKind::Deleted => apply_deleted(event, store, links),
        EventKind::Added => apply_added(event, store, links),
        EventKind::Modified => apply_modified(event, store, links),
    }
}

fn apply_deleted(event: WatchEvent, store: &mut ResourceStore, links: &mut LinkSet) -> Applied {
    let uid = event.resource.uid;
    if store.remove(&uid).is_none() {
        trace!(uid = %plexus_core::uid_string(&uid), "delete for unknown uid; no-op");
        return Applied { changed: false };
    }
    // Cascade both directions. Other resources' owner links to this uid go
    // too; remaining dangling references stay dormant until their source is
    // touched again.
    let removed = links.remove_touching(&uid);
    debug!(uid = %plexus_core::uid_string(&uid), links_removed = removed, "resource deleted");
    Applied { changed: true }
}

fn apply_added(event: WatchEvent, store: &mut ResourceStore, links: &mut LinkSet) -> Applied {
    let resource = event.resource;
    let uid = resource.uid;
    if store.contains(&uid) {
        // Duplicate delivery during the bulk-load/watch race window.
        trace!(uid = %plexus_core::uid_string(&uid), "duplicate add; no-op");
        return Applied { changed: false };
    }
    let res = resource.clone();
    store.upsert(resource);
    for l in derive_outgoing(&res, store) {
        links.insert(l);
    }
    for l in derive_config_storage(&res, store) {
        links.insert(l);
    }
    // One-time reciprocal pass: a new Pod may satisfy existing Service
    // selectors in its namespace.
    for l in reciprocal_network(&res, store) {
        links.insert(l);
    }
    debug!(uid = %plexus_core::uid_string(&uid), kind = %res.kind, "resource added");
    Applied { changed: true }
}

fn apply_modified(event: WatchEvent, store: &mut ResourceStore, links: &mut LinkSet) -> Applied {
    let incoming = event.resource;
    let uid = incoming.uid;
    let Some(prev) = store.get(&uid).cloned() else {
        // Watch races can surface a modify before its add; treat as add.
        debug!(uid = %plexus_core::uid_string(&uid), "modify for unknown uid; treating as add");
        return apply_added(
            WatchEvent { kind: EventKind::Added, resource: incoming },
            store,
            links,
        );
    };

    let merged = merge_partial(&prev, incoming);
    if classify(&prev, &merged) == ChangeClass::Cosmetic {
        store.upsert(merged);
        trace!(uid = %plexus_core::uid_string(&uid), "cosmetic modify; links untouched");
        return Applied { changed: false };
    }

    // Rewrite this resource's own owner/placement/network links; config and
    // storage links are set at add time and preserved here.
    links.remove_outgoing_of_types(&uid, REDERIVED_TYPES);
    store.upsert(merged.clone());
    for l in derive_outgoing(&merged, store) {
        links.insert(l);
    }

    // Reciprocal direction, bounded to label changes on Pods: Services in
    // the namespace may start or stop selecting this Pod.
    if merged.is_pod() && labels_changed(&prev, &merged) {
        links.remove_incoming_of_type(&uid, LinkType::Network);
        for l in reciprocal_network(&merged, store) {
            links.insert(l);
        }
    }

    debug!(uid = %plexus_core::uid_string(&uid), kind = %merged.kind, "resource modified");
    Applied { changed: true }
}
