//! Domain identifier types with the NewType pattern
//!
//! Type-safe wrappers for identifiers that would otherwise all be `String`:
//! the name of a registered source, and the `(namespace, name)` pair that
//! identifies a resource.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to generate NewType name wrappers with the usual traits
macro_rules! domain_name {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a name from anything string-like
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the inner string value
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Convert to inner string value
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

domain_name!(
    /// Stable key of one backend registered with the aggregator
    SourceName
);

/// Identity of a resource. Equality and ordering use `(namespace, name)` only.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub namespace: String,
    pub name: String,
}

impl ResourceRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), name: name.into() }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Proxies are addressed by their resource identity
pub type ProxyId = ResourceRef;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_name_roundtrip() {
        let name = SourceName::from("serviceRegistryA");
        assert_eq!(name.as_str(), "serviceRegistryA");
        assert_eq!(name.to_string(), "serviceRegistryA");
        assert_eq!(serde_json::to_string(&name).unwrap(), "\"serviceRegistryA\"");
    }

    #[test]
    fn test_resource_ref_orders_by_namespace_then_name() {
        let mut refs = vec![
            ResourceRef::new("ns2", "a"),
            ResourceRef::new("ns1", "b"),
            ResourceRef::new("ns1", "a"),
        ];
        refs.sort();
        assert_eq!(
            refs.iter().map(ToString::to_string).collect::<Vec<_>>(),
            vec!["ns1/a", "ns1/b", "ns2/a"]
        );
    }
}
