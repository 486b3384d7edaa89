//! Common behavior of candidate resources

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// A tenant resource candidate
pub trait Candidate: Debug + Clone + Default + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Resource name used in paths, logs and metrics (e.g., "networks")
    const RESOURCE: &'static str;

    fn id(&self) -> Option<&str>;
    fn tenant_id(&self) -> Option<&str>;
    fn name(&self) -> Option<&str>;

    /// Overlay the fields present in `delta` onto a copy of `self`.
    fn merge(&self, delta: &Self) -> Self;
}

/// Implements [`Candidate`] for a struct whose fields are all `Option`.
///
/// `name` names the field used as the display name, or `-` if the type has none.
macro_rules! candidate {
    ($ty:ident, $resource:literal, name = $name:tt; $($field:ident),+ $(,)?) => {
        impl $crate::candidate::Candidate for $ty {
            const RESOURCE: &'static str = $resource;

            fn id(&self) -> Option<&str> {
                self.id.as_deref()
            }

            fn tenant_id(&self) -> Option<&str> {
                self.tenant_id.as_deref()
            }

            fn name(&self) -> Option<&str> {
                candidate!(@name self, $name)
            }

            fn merge(&self, delta: &Self) -> Self {
                Self {
                    $($field: delta.$field.clone().or_else(|| self.$field.clone()),)+
                }
            }
        }
    };
    (@name $self:ident, -) => {
        None
    };
    (@name $self:ident, $field:ident) => {
        $self.$field.as_deref()
    };
}

pub(crate) use candidate;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Network;

    #[test]
    fn test_merge_overlays_present_fields_only() {
        let original = Network {
            id: Some("6b9570f2-17b1-4fc3-99ec-1b7f7778a29a".to_string()),
            tenant_id: Some("0f2e1d3c-4b5a-6978-8a9b-0c1d2e3f4a5b".to_string()),
            name: Some("net1".to_string()),
            router_external: Some(false),
            ..Default::default()
        };
        let delta = Network {
            router_external: Some(true),
            ..Default::default()
        };

        let merged = original.merge(&delta);
        assert_eq!(merged.router_external, Some(true));
        assert_eq!(merged.name(), Some("net1"));
        assert_eq!(merged.id(), original.id());
    }

    #[test]
    fn test_candidates_deserialize_from_camel_case() {
        let network: Network = serde_json::from_value(serde_json::json!({
            "id": "6b9570f217b14fc399ec1b7f7778a29a",
            "tenantId": "0f2e1d3c4b5a69788a9b0c1d2e3f4a5b",
            "name": "net1",
            "external": true
        }))
        .unwrap();
        assert_eq!(network.router_external, Some(true));
        assert_eq!(network.tenant_id(), Some("0f2e1d3c4b5a69788a9b0c1d2e3f4a5b"));
        assert_eq!(Network::RESOURCE, "networks");
    }
}
