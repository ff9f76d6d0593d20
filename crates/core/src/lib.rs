//! Plexus core types: resources, links, watch events.

#![forbid(unsafe_code)]

use anyhow::Context;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Stable cluster-assigned object identifier (UUID bytes).
pub type Uid = [u8; 16];

pub const NIL_UID: Uid = [0u8; 16];

/// Parse a transport-format UID string (hyphenated UUID) into bytes.
pub fn parse_uid(s: &str) -> anyhow::Result<Uid> {
    let u = uuid::Uuid::parse_str(s).context("parsing uid as uuid")?;
    Ok(*u.as_bytes())
}

pub fn uid_string(uid: &Uid) -> String {
    uuid::Uuid::from_bytes(*uid).to_string()
}

/// Serde adapter: uids travel as hyphenated UUID strings on the wire.
pub mod uid_str {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(uid: &super::Uid, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::uid_string(uid))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<super::Uid, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_uid(&raw).map_err(serde::de::Error::custom)
    }
}

mod uid_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(uid: &Option<super::Uid>, s: S) -> Result<S::Ok, S::Error> {
        match uid {
            Some(u) => s.serialize_some(&super::uid_string(u)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<super::Uid>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        match raw {
            Some(s) => super::parse_uid(&s)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

mod uid_vec {
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};
    use smallvec::SmallVec;

    pub fn serialize<S: Serializer>(
        uids: &SmallVec<[super::Uid; 2]>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(uids.len()))?;
        for u in uids {
            seq.serialize_element(&super::uid_string(u))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<SmallVec<[super::Uid; 2]>, D::Error> {
        let raw: Vec<String> = Vec::deserialize(d)?;
        let mut out = SmallVec::new();
        for s in &raw {
            out.push(super::parse_uid(s).map_err(serde::de::Error::custom)?);
        }
        Ok(out)
    }
}

// Well-known kinds the link rules special-case.
pub const KIND_POD: &str = "Pod";
pub const KIND_NODE: &str = "Node";
pub const KIND_SERVICE: &str = "Service";
pub const KIND_INGRESS: &str = "Ingress";
pub const KIND_CONFIG_MAP: &str = "ConfigMap";
pub const KIND_SECRET: &str = "Secret";
pub const KIND_PVC: &str = "PersistentVolumeClaim";
pub const KIND_STORAGE_CLASS: &str = "StorageClass";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Ok,
    Warning,
    Error,
    #[default]
    Unset,
}

/// Name-scoped reference to another object (e.g. a mounted ConfigMap).
/// Resolved against the referencing resource's namespace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NamedRef {
    pub kind: String,
    pub name: String,
}

/// One tracked cluster object, shaped for link derivation.
///
/// Watch payloads are commonly partial; every non-identity field defaults so
/// a simplified record deserializes and can be merged onto the prior full one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Resource {
    #[serde(with = "uid_str")]
    pub uid: Uid,
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub health: Health,
    #[serde(default)]
    pub labels: SmallVec<[(String, String); 8]>,
    #[serde(default, with = "uid_vec")]
    pub owner_refs: SmallVec<[Uid; 2]>,
    /// Placement target for Pods (node name, not a uid).
    #[serde(default)]
    pub node_name: Option<String>,
    /// Label selector for Service-like kinds; empty means "selects nothing".
    #[serde(default)]
    pub selector: SmallVec<[(String, String); 4]>,
    /// Scaled workload target for autoscaler-like kinds.
    #[serde(default, with = "uid_opt", skip_serializing_if = "Option::is_none")]
    pub scale_target: Option<Uid>,
    /// Backend service names for Ingress-like kinds.
    #[serde(default)]
    pub ingress_backends: SmallVec<[String; 2]>,
    /// ConfigMap/Secret references (volumes, env).
    #[serde(default)]
    pub config_refs: SmallVec<[NamedRef; 2]>,
    /// PersistentVolumeClaim references (volumes).
    #[serde(default)]
    pub volume_refs: SmallVec<[NamedRef; 2]>,
    #[serde(default)]
    pub storage_class: Option<String>,
    /// Full backing payload when available. Link derivation never reads it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

impl Resource {
    /// Minimal record with identity fields set and everything else empty.
    pub fn named(uid: Uid, kind: &str, name: &str, namespace: Option<&str>) -> Self {
        Self {
            uid,
            kind: kind.to_string(),
            name: name.to_string(),
            namespace: namespace.map(|s| s.to_string()),
            status: String::new(),
            health: Health::Unset,
            labels: SmallVec::new(),
            owner_refs: SmallVec::new(),
            node_name: None,
            selector: SmallVec::new(),
            scale_target: None,
            ingress_backends: SmallVec::new(),
            config_refs: SmallVec::new(),
            volume_refs: SmallVec::new(),
            storage_class: None,
            raw: None,
        }
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_pod(&self) -> bool {
        self.kind == KIND_POD
    }

    /// Kinds whose label selector routes traffic to Pods.
    pub fn is_service_like(&self) -> bool {
        self.kind == KIND_SERVICE
    }
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    Owner,
    Network,
    Config,
    Storage,
}

/// Directed derived edge. The full link set must always be reconstructible
/// from the resource set alone.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct Link {
    #[serde(with = "uid_str")]
    pub source: Uid,
    #[serde(with = "uid_str")]
    pub target: Uid,
    #[serde(rename = "type")]
    pub link_type: LinkType,
}

impl Link {
    pub fn new(source: Uid, target: Uid, link_type: LinkType) -> Self {
        Self { source, target, link_type }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    Added,
    Modified,
    Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub resource: Resource,
}

/// Read-only merged view handed to consumers. Resources keep store insertion
/// order; links are sorted for deterministic output.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TopologySnapshot {
    pub epoch: u64,
    pub resources: Vec<Resource>,
    pub links: Vec<Link>,
}

pub mod prelude {
    pub use super::{
        EventKind, Health, Link, LinkType, NamedRef, Resource, TopologySnapshot, Uid, WatchEvent,
    };
}
