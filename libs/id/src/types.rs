//! Pod keys and derived node pool names.

use sha2::{Digest, Sha256};

use crate::IdError;

/// Maximum length of a namespace (DNS-1123 label).
pub const MAX_NAMESPACE_LEN: usize = 63;

/// Maximum length of a pod name (DNS-1123 subdomain).
pub const MAX_NAME_LEN: usize = 253;

/// Namespace-qualified pod identity.
///
/// This is the unit of deduplication: two notifications carrying the same
/// key refer to the same scheduling failure as far as provisioning goes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PodKey {
    namespace: String,
    name: String,
}

impl PodKey {
    /// Creates a key from its components, validating both.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Result<Self, IdError> {
        let namespace = namespace.into();
        let name = name.into();
        validate_namespace(&namespace)?;
        validate_name(&name)?;
        Ok(Self { namespace, name })
    }

    /// Parses a key from `{namespace}/{name}`.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        if s.is_empty() {
            return Err(IdError::Empty);
        }

        let Some((namespace, name)) = s.split_once('/') else {
            return Err(IdError::MissingSeparator(s.to_string()));
        };

        if namespace.is_empty() {
            return Err(IdError::EmptyComponent {
                component: "namespace",
                key: s.to_string(),
            });
        }
        if name.is_empty() {
            return Err(IdError::EmptyComponent {
                component: "name",
                key: s.to_string(),
            });
        }

        Self::new(namespace, name)
    }

    /// The pod's namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The pod's name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for PodKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl std::str::FromStr for PodKey {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl serde::Serialize for PodKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for PodKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

fn validate_namespace(namespace: &str) -> Result<(), IdError> {
    if namespace.is_empty() {
        return Err(IdError::EmptyComponent {
            component: "namespace",
            key: namespace.to_string(),
        });
    }
    if namespace.len() > MAX_NAMESPACE_LEN {
        return Err(invalid("namespace", namespace, "longer than 63 characters"));
    }
    if !namespace
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return Err(invalid(
            "namespace",
            namespace,
            "must consist of lowercase alphanumerics and '-'",
        ));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), IdError> {
    if name.is_empty() {
        return Err(IdError::EmptyComponent {
            component: "name",
            key: name.to_string(),
        });
    }
    if name.len() > MAX_NAME_LEN {
        return Err(invalid("name", name, "longer than 253 characters"));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'.')
    {
        return Err(invalid(
            "name",
            name,
            "must consist of lowercase alphanumerics, '-' and '.'",
        ));
    }
    Ok(())
}

fn invalid(component: &'static str, value: &str, reason: &'static str) -> IdError {
    IdError::InvalidComponent {
        component,
        value: value.to_string(),
        reason,
    }
}

/// Name of the node pool provisioned on behalf of a pod.
///
/// Derived from the pod key so it is stable across restarts and replicas.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodePoolName(String);

impl NodePoolName {
    /// Prefix shared by every generated pool name.
    pub const PREFIX: &'static str = "np";

    /// Compute the pool name for a pod.
    pub fn for_pod(key: &PodKey) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(key.namespace.as_bytes());
        hasher.update(b"/");
        hasher.update(key.name.as_bytes());
        let digest = hasher.finalize();
        Self(format!("{}-{}", Self::PREFIX, hex::encode(&digest[..12])))
    }

    /// Get the name string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodePoolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl serde::Serialize for NodePoolName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}
