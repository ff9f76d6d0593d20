#![forbid(unsafe_code)]

use plexus_core::{
    EventKind, Health, Link, LinkType, NamedRef, Resource, Uid, WatchEvent,
};
use plexus_graph::{apply_event, LinkSet, ResourceStore};

fn uid(n: u8) -> Uid {
    let mut u = [0u8; 16];
    u[0] = n;
    u
}

fn ev(kind: EventKind, resource: Resource) -> WatchEvent {
    WatchEvent { kind, resource }
}

fn pod(n: u8, name: &str, ns: &str, labels: &[(&str, &str)]) -> Resource {
    let mut r = Resource::named(uid(n), "Pod", name, Some(ns));
    r.labels = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    r
}

fn service(n: u8, name: &str, ns: &str, selector: &[(&str, &str)]) -> Resource {
    let mut r = Resource::named(uid(n), "Service", name, Some(ns));
    r.selector = selector
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    r
}

fn node(n: u8, name: &str) -> Resource {
    Resource::named(uid(n), "Node", name, None)
}

/// Every link's source must exist in the store at all times.
fn assert_live_sources(store: &ResourceStore, links: &LinkSet) {
    for l in links.iter() {
        assert!(
            store.contains(&l.source),
            "orphan link source: {:?}",
            l
        );
    }
}

#[test]
fn added_is_idempotent() {
    let mut store = ResourceStore::new();
    let mut links = LinkSet::new();

    let mut p = pod(1, "p1", "ns", &[("app", "web")]);
    p.owner_refs = vec![uid(9)].into();

    let first = apply_event(ev(EventKind::Added, p.clone()), &mut store, &mut links);
    assert!(first.changed);
    let snapshot = (store.len(), links.sorted());

    let second = apply_event(ev(EventKind::Added, p), &mut store, &mut links);
    assert!(!second.changed);
    assert_eq!((store.len(), links.sorted()), snapshot);
    assert_live_sources(&store, &links);
}

#[test]
fn reciprocal_network_link_on_later_pod_add() {
    let mut store = ResourceStore::new();
    let mut links = LinkSet::new();

    apply_event(
        ev(EventKind::Added, service(1, "s1", "ns", &[("app", "x")])),
        &mut store,
        &mut links,
    );
    assert!(links.is_empty());

    apply_event(
        ev(EventKind::Added, pod(2, "p1", "ns", &[("app", "x")])),
        &mut store,
        &mut links,
    );
    assert!(links.contains(&Link::new(uid(1), uid(2), LinkType::Network)));
    assert_live_sources(&store, &links);
}

#[test]
fn two_services_keep_independent_links_to_one_pod() {
    let mut store = ResourceStore::new();
    let mut links = LinkSet::new();

    apply_event(ev(EventKind::Added, service(1, "s1", "ns", &[("app", "x")])), &mut store, &mut links);
    apply_event(ev(EventKind::Added, service(2, "s2", "ns", &[("app", "x")])), &mut store, &mut links);
    apply_event(ev(EventKind::Added, pod(3, "p1", "ns", &[("app", "x")])), &mut store, &mut links);

    assert!(links.contains(&Link::new(uid(1), uid(3), LinkType::Network)));
    assert!(links.contains(&Link::new(uid(2), uid(3), LinkType::Network)));
    assert_eq!(links.len(), 2);
}

#[test]
fn cascade_delete_removes_links_both_directions() {
    let mut store = ResourceStore::new();
    let mut links = LinkSet::new();

    apply_event(ev(EventKind::Added, node(1, "n1")), &mut store, &mut links);
    let mut p1 = pod(2, "p1", "ns", &[("app", "x")]);
    p1.node_name = Some("n1".into());
    let mut p2 = pod(3, "p2", "ns", &[]);
    p2.node_name = Some("n1".into());
    apply_event(ev(EventKind::Added, p1), &mut store, &mut links);
    apply_event(ev(EventKind::Added, p2), &mut store, &mut links);
    apply_event(ev(EventKind::Added, service(4, "s1", "ns", &[("app", "x")])), &mut store, &mut links);
    assert_eq!(links.len(), 3);

    let applied = apply_event(ev(EventKind::Deleted, node(1, "n1")), &mut store, &mut links);
    assert!(applied.changed);
    // both placement links gone, unrelated network link untouched
    assert_eq!(
        links.sorted(),
        vec![Link::new(uid(4), uid(2), LinkType::Network)]
    );
    assert_live_sources(&store, &links);
}

#[test]
fn delete_unknown_uid_is_a_noop() {
    let mut store = ResourceStore::new();
    let mut links = LinkSet::new();
    let applied = apply_event(ev(EventKind::Deleted, pod(7, "ghost", "ns", &[])), &mut store, &mut links);
    assert!(!applied.changed);
    assert!(store.is_empty());
}

#[test]
fn cosmetic_modify_replaces_record_without_link_work() {
    let mut store = ResourceStore::new();
    let mut links = LinkSet::new();

    let mut p = pod(1, "p1", "ns", &[("app", "x")]);
    p.status = "Pending".into();
    p.health = Health::Ok;
    apply_event(ev(EventKind::Added, p), &mut store, &mut links);
    apply_event(ev(EventKind::Added, service(2, "s1", "ns", &[("app", "x")])), &mut store, &mut links);
    let before = links.sorted();

    // partial payload: status text only
    let mut upd = Resource::named(uid(1), "Pod", "p1", Some("ns"));
    upd.status = "Running".into();
    upd.health = Health::Ok;
    let applied = apply_event(ev(EventKind::Modified, upd), &mut store, &mut links);

    assert!(!applied.changed);
    assert_eq!(links.sorted(), before);
    let stored = store.get(&uid(1)).unwrap();
    assert_eq!(stored.status, "Running");
    // merge backfilled the labels the partial payload omitted
    assert_eq!(stored.label("app"), Some("x"));
}

#[test]
fn label_key_change_rewrites_incoming_network_links() {
    let mut store = ResourceStore::new();
    let mut links = LinkSet::new();

    apply_event(ev(EventKind::Added, service(1, "s1", "ns", &[("app", "x")])), &mut store, &mut links);
    apply_event(ev(EventKind::Added, pod(2, "p1", "ns", &[("app", "x")])), &mut store, &mut links);
    assert_eq!(links.len(), 1);

    // pod gains a second label key: still selected, link retained
    let upd = pod(2, "p1", "ns", &[("app", "x"), ("tier", "front")]);
    let applied = apply_event(ev(EventKind::Modified, upd), &mut store, &mut links);
    assert!(applied.changed);
    assert!(links.contains(&Link::new(uid(1), uid(2), LinkType::Network)));

    // labels shrink to a non-matching set: link removed
    let upd = pod(2, "p1", "ns", &[("role", "canary")]);
    apply_event(ev(EventKind::Modified, upd), &mut store, &mut links);
    assert!(links.is_empty());
    assert_live_sources(&store, &links);
}

#[test]
fn modify_preserves_config_links_while_rederiving_owner() {
    let mut store = ResourceStore::new();
    let mut links = LinkSet::new();

    apply_event(ev(EventKind::Added, Resource::named(uid(1), "ConfigMap", "cm", Some("ns"))), &mut store, &mut links);
    apply_event(ev(EventKind::Added, node(2, "n1")), &mut store, &mut links);

    let mut p = pod(3, "p1", "ns", &[]);
    p.node_name = Some("n1".into());
    p.config_refs = vec![NamedRef { kind: "ConfigMap".into(), name: "cm".into() }].into();
    apply_event(ev(EventKind::Added, p), &mut store, &mut links);
    assert_eq!(links.len(), 2);

    // relevant modify: placement moves to a node that does not exist
    let mut upd = pod(3, "p1", "ns", &[]);
    upd.node_name = Some("gone".into());
    let applied = apply_event(ev(EventKind::Modified, upd), &mut store, &mut links);
    assert!(applied.changed);

    // placement link dropped, config link survived the rewrite
    assert_eq!(
        links.sorted(),
        vec![Link::new(uid(3), uid(1), LinkType::Config)]
    );
    assert_live_sources(&store, &links);
}

#[test]
fn subject_outgoing_links_ignore_unrelated_event_ordering() {
    // Per-uid order is fixed; interleaving across unrelated uids is not.
    // The subject Service's own outgoing links must come out identical.
    fn run(seq: Vec<WatchEvent>) -> Vec<Link> {
        let mut store = ResourceStore::new();
        let mut links = LinkSet::new();
        for event in seq {
            apply_event(event, &mut store, &mut links);
        }
        links
            .sorted()
            .into_iter()
            .filter(|l| l.source == uid(1))
            .collect()
    }

    let svc = || ev(EventKind::Added, service(1, "s1", "ns", &[("app", "x")]));
    let pod_add = || ev(EventKind::Added, pod(2, "p1", "ns", &[("app", "x")]));
    let pod_upd = || {
        ev(
            EventKind::Modified,
            pod(2, "p1", "ns", &[("app", "x"), ("tier", "front")]),
        )
    };
    // unrelated churn in another namespace plus a node lifecycle
    let other_add = || ev(EventKind::Added, pod(3, "q1", "other", &[("app", "x")]));
    let other_del = || ev(EventKind::Deleted, pod(3, "q1", "other", &[]));
    let node_add = || ev(EventKind::Added, node(4, "n1"));

    let first = run(vec![
        svc(),
        pod_add(),
        node_add(),
        other_add(),
        pod_upd(),
        other_del(),
    ]);
    let second = run(vec![
        other_add(),
        node_add(),
        svc(),
        other_del(),
        pod_add(),
        pod_upd(),
    ]);

    assert_eq!(first, second);
    assert_eq!(first, vec![Link::new(uid(1), uid(2), LinkType::Network)]);
}

#[test]
fn end_to_end_three_resource_scenario() {
    let mut store = ResourceStore::new();
    let mut links = LinkSet::new();

    // bulk load with zero resources
    store.load(Vec::new());
    links.load(Vec::new());

    let mut p = pod(2, "p1", "ns", &[("app", "web")]);
    p.node_name = Some("n1".into());

    for event in [
        ev(EventKind::Added, node(1, "n1")),
        ev(EventKind::Added, p),
        ev(EventKind::Added, service(3, "s1", "ns", &[("app", "web")])),
    ] {
        let applied = apply_event(event, &mut store, &mut links);
        assert!(applied.changed);
        assert_live_sources(&store, &links);
    }

    assert_eq!(store.len(), 3);
    assert_eq!(
        links.sorted(),
        vec![
            Link::new(uid(2), uid(1), LinkType::Owner),
            Link::new(uid(3), uid(2), LinkType::Network),
        ]
    );
}
