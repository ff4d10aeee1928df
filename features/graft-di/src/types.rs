use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

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
                Self(id.to_string())
            }
        }
    };
}

identifier!(
    /// Canonical identity of a type, as handed over by the extraction front-end
    TypeName
);
identifier!(
    /// Identity of an injector
    InjectorId
);
identifier!(
    /// Identity of a specification
    SpecificationId
);
identifier!(
    /// Identity of a dependency interface
    InterfaceId
);
identifier!(
    /// Opaque source location token, passed through to diagnostics untouched
    Location
);

/// Discriminator between several bindings of the same type
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Qualifier {
    /// A named label string
    Label(String),
    /// Identity of a qualifier attribute
    Attribute(String),
}
impl Qualifier {
    pub fn label(label: impl Into<String>) -> Self {
        Qualifier::Label(label.into())
    }

    pub fn attribute(attribute: impl Into<String>) -> Self {
        Qualifier::Attribute(attribute.into())
    }

    pub(crate) fn is_empty(&self) -> bool {
        match self {
            Qualifier::Label(text) | Qualifier::Attribute(text) => text.is_empty(),
        }
    }
}
impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Qualifier::Label(label) => write!(f, "\"{label}\""),
            Qualifier::Attribute(attribute) => write!(f, "@{attribute}"),
        }
    }
}

/// Type plus optional qualifier - the unit every binding is looked up by.
///
/// Two keys are equal iff type and qualifier both match, so an unqualified
/// key never matches a qualified binding of the same type.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeKey {
    #[serde(rename = "type")]
    pub ty: TypeName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<Qualifier>,
}
impl TypeKey {
    pub fn of(ty: impl Into<String>) -> Self {
        Self {
            ty: TypeName::new(ty),
            qualifier: None,
        }
    }

    pub fn qualified(ty: impl Into<String>, qualifier: Qualifier) -> Self {
        Self {
            ty: TypeName::new(ty),
            qualifier: Some(qualifier),
        }
    }

    /// Same type, different qualifier
    pub fn with_qualifier(&self, qualifier: Option<Qualifier>) -> Self {
        Self {
            ty: self.ty.clone(),
            qualifier,
        }
    }
}
impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "{} {}", self.ty, qualifier),
            None => write!(f, "{}", self.ty),
        }
    }
}

/// Caching discipline of a factory
#[derive(Debug, Clone, Copy, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FabricationMode {
    /// One instance per injector instance
    Scoped,
    /// A fresh instance per request
    #[default]
    Recurrent,
}
