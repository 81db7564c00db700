//! Strongly-typed identifiers for CAPIF entities
//!
//! Ids travel on the wire as plain strings, so every id is a transparent
//! newtype over `String`. Generated ids embed a UUID and are never reused.

use crate::provider::FunctionRole;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Identifier of a registered API provider domain
    DomainId
);
string_id!(
    /// Identifier of a provider function (publisher, exposer or manager)
    FunctionId
);
string_id!(
    /// Identifier of a published service API
    ApiId
);
string_id!(
    /// Identifier of an onboarded API invoker; doubles as its onboarding id
    ApiInvokerId
);
string_id!(
    /// Identifier of an event subscription
    SubscriptionId
);

impl DomainId {
    pub fn generate() -> Self {
        Self(format!("domain_{}", Uuid::new_v4().simple()))
    }
}

impl FunctionId {
    /// Generate a function id prefixed with the function's role
    pub fn generate(role: FunctionRole) -> Self {
        Self(format!("{}_{}", role.id_prefix(), Uuid::new_v4().simple()))
    }
}

impl ApiId {
    pub fn generate() -> Self {
        Self(format!("api_id_{}", Uuid::new_v4().simple()))
    }
}

impl ApiInvokerId {
    pub fn generate() -> Self {
        Self(format!("api_invoker_id_{}", Uuid::new_v4().simple()))
    }
}

impl SubscriptionId {
    /// Subscription ids are scoped by subscriber and a per-registry sequence
    pub fn for_subscriber(subscriber_id: &str, sequence: u64) -> Self {
        Self(format!("{}{}", subscriber_id, sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(ApiId::generate(), ApiId::generate());
        assert_ne!(DomainId::generate(), DomainId::generate());
    }

    #[test]
    fn test_function_id_carries_role_prefix() {
        assert!(FunctionId::generate(FunctionRole::Exposer)
            .as_str()
            .starts_with("AEF_"));
        assert!(FunctionId::generate(FunctionRole::Publisher)
            .as_str()
            .starts_with("APF_"));
        assert!(FunctionId::generate(FunctionRole::Manager)
            .as_str()
            .starts_with("AMF_"));
    }

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let id = ApiInvokerId::new("api_invoker_id_1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"api_invoker_id_1\"");
        assert_eq!(id.to_string(), "api_invoker_id_1");
    }
}
