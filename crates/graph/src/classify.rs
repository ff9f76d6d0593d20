//! Change classification and partial-update merging for MODIFIED events.

use plexus_core::Resource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeClass {
    /// Display-only churn: record is replaced, links untouched, no
    /// topology-changed notification.
    Cosmetic,
    /// Identity, ownership, placement or label-shape change: link
    /// recomputation required.
    Relevant,
}

/// Classify a modification against the prior record.
///
/// Relevant iff any of: health, name, namespace, owner refs, placement
/// target, or label key count differ. Everything else (status text
/// refinements, metric values, raw payload updates) is cosmetic.
pub fn classify(prev: &Resource, next: &Resource) -> ChangeClass {
    let relevant = prev.health != next.health
        || prev.name != next.name
        || prev.namespace != next.namespace
        || prev.owner_refs != next.owner_refs
        || prev.node_name != next.node_name
        || prev.labels.len() != next.labels.len();
    if relevant {
        ChangeClass::Relevant
    } else {
        ChangeClass::Cosmetic
    }
}

/// True when the label sets differ, ignoring pair order.
pub fn labels_changed(prev: &Resource, next: &Resource) -> bool {
    if prev.labels.len() != next.labels.len() {
        return true;
    }
    !prev
        .labels
        .iter()
        .all(|(k, v)| next.label(k) == Some(v.as_str()))
}

/// Merge a (possibly partial) watch payload onto the prior full record.
///
/// Field precedence:
///
/// | field                        | wins                              |
/// |------------------------------|-----------------------------------|
/// | `uid`                        | incoming (identical by contract)  |
/// | `kind`, `name`, `status`     | incoming if non-empty, else prior |
/// | `namespace`, `node_name`,    | incoming if set, else prior       |
/// | `scale_target`               |                                   |
/// | `health`                     | incoming unless `Unset`           |
/// | `labels`, `owner_refs`,      | incoming if non-empty, else prior |
/// | `selector`, `ingress_backends` |                                 |
/// | `config_refs`, `volume_refs`,| incoming if set, else prior       |
/// | `storage_class`              | (rarely present on watch payloads)|
/// | `raw`                        | incoming if set, else prior       |
pub fn merge_partial(prev: &Resource, incoming: Resource) -> Resource {
    let mut merged = incoming;
    if merged.kind.is_empty() {
        merged.kind = prev.kind.clone();
    }
    if merged.name.is_empty() {
        merged.name = prev.name.clone();
    }
    if merged.namespace.is_none() {
        merged.namespace = prev.namespace.clone();
    }
    if merged.status.is_empty() {
        merged.status = prev.status.clone();
    }
    if merged.health == plexus_core::Health::Unset {
        merged.health = prev.health;
    }
    if merged.labels.is_empty() {
        merged.labels = prev.labels.clone();
    }
    if merged.owner_refs.is_empty() {
        merged.owner_refs = prev.owner_refs.clone();
    }
    if merged.node_name.is_none() {
        merged.node_name = prev.node_name.clone();
    }
    if merged.selector.is_empty() {
        merged.selector = prev.selector.clone();
    }
    if merged.scale_target.is_none() {
        merged.scale_target = prev.scale_target;
    }
    if merged.ingress_backends.is_empty() {
        merged.ingress_backends = prev.ingress_backends.clone();
    }
    if merged.config_refs.is_empty() {
        merged.config_refs = prev.config_refs.clone();
    }
    if merged.volume_refs.is_empty() {
        merged.volume_refs = prev.volume_refs.clone();
    }
    if merged.storage_class.is_none() {
        merged.storage_class = prev.storage_class.clone();
    }
    if merged.raw.is_none() {
        merged.raw = prev.raw.clone();
    }
    merged
}
