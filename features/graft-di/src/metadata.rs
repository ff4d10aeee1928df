//! Normalized input handed over by the extraction front-end.
//!
//! Nothing in here is ever mutated by the resolver. Every declaration carries
//! an optional [`Location`] which is passed through to diagnostics untouched.

use serde::{Deserialize, Serialize};

use crate::types::{
    FabricationMode, InjectorId, InterfaceId, Location, SpecificationId, TypeKey, TypeName,
};

/// The whole closed world of one compilation unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataModel {
    pub injectors: Vec<InjectorMetadata>,
    pub specifications: Vec<SpecificationMetadata>,
    pub interfaces: Vec<DependencyInterfaceMetadata>,
    pub types: Vec<TypeMetadata>,
}

/// How a factory produces its value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactoryKind {
    #[default]
    Method,
    Property,
    Reference,
}

/// Whether a factory may replace competing factories for its key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverridePolicy {
    #[default]
    None,
    Replace,
}

/// A declared provider of one key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactoryMetadata {
    pub name: String,
    #[serde(default)]
    pub kind: FactoryKind,
    pub provides: TypeKey,
    #[serde(default)]
    pub mode: FabricationMode,
    #[serde(default)]
    pub parameters: Vec<TypeKey>,
    #[serde(default)]
    pub override_policy: OverridePolicy,
    #[serde(default)]
    pub location: Option<Location>,
}

/// A declared mutator completing an externally supplied instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderMetadata {
    pub name: String,
    pub target: TypeKey,
    #[serde(default)]
    pub parameters: Vec<TypeKey>,
    #[serde(default)]
    pub location: Option<Location>,
}

/// How a link treats the qualifier of the request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualifierMapping {
    /// Only `target` exactly matches, `source` is used as declared
    #[default]
    Declared,
    /// Any qualifier of `target`'s type matches and is carried over to `source`'s type
    Inherit,
}

/// Alias: requests for `target` are satisfied with the binding for `source`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkMetadata {
    pub target: TypeKey,
    pub source: TypeKey,
    #[serde(default)]
    pub qualifier: QualifierMapping,
    #[serde(default)]
    pub location: Option<Location>,
}

/// A named collection of factory, builder and link declarations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecificationMetadata {
    pub id: SpecificationId,
    /// Other specifications composed into this one
    #[serde(default)]
    pub includes: Vec<SpecificationId>,
    #[serde(default)]
    pub factories: Vec<FactoryMetadata>,
    #[serde(default)]
    pub builders: Vec<BuilderMetadata>,
    #[serde(default)]
    pub links: Vec<LinkMetadata>,
    #[serde(default)]
    pub location: Option<Location>,
}

/// Keys a child injector expects to be supplied from outside
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyInterfaceMetadata {
    pub id: InterfaceId,
    #[serde(default)]
    pub keys: Vec<TypeKey>,
    #[serde(default)]
    pub location: Option<Location>,
}

/// A constructor or factory-equivalent static method of a type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructorMetadata {
    /// Set for factory-equivalent methods, `None` for plain constructors
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parameters: Vec<TypeKey>,
    /// Annotated for implicit generation
    #[serde(default)]
    pub implicit: bool,
    #[serde(default)]
    pub mode: FabricationMode,
}

/// An injectable property of a type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyMetadata {
    pub name: String,
    pub key: TypeKey,
    /// Must be supplied after construction
    #[serde(default)]
    pub required: bool,
}

/// What the front-end knows about a type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeMetadata {
    pub name: TypeName,
    /// Types this one can be assigned to
    #[serde(default)]
    pub supertypes: Vec<TypeName>,
    #[serde(default)]
    pub constructors: Vec<ConstructorMetadata>,
    #[serde(default)]
    pub properties: Vec<PropertyMetadata>,
    #[serde(default)]
    pub location: Option<Location>,
}
impl TypeMetadata {
    pub fn required_properties(&self) -> impl Iterator<Item = &PropertyMetadata> {
        self.properties.iter().filter(|property| property.required)
    }
}

/// Provider method on the injector surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMethod {
    pub name: String,
    pub key: TypeKey,
    #[serde(default)]
    pub location: Option<Location>,
}

/// Builder method on the injector surface - accepts an instance of `key` and completes it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderMethod {
    pub name: String,
    pub key: TypeKey,
    #[serde(default)]
    pub location: Option<Location>,
}

/// Accessor method yielding a child injector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildAccessor {
    pub name: String,
    pub injector: InjectorId,
    #[serde(default)]
    pub location: Option<Location>,
}

/// A composition root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectorMetadata {
    pub id: InjectorId,
    #[serde(default)]
    pub specifications: Vec<SpecificationId>,
    /// Dependency interfaces this injector requires from its parent
    #[serde(default)]
    pub dependencies: Vec<InterfaceId>,
    #[serde(default)]
    pub providers: Vec<ProviderMethod>,
    #[serde(default)]
    pub builders: Vec<BuilderMethod>,
    #[serde(default)]
    pub children: Vec<ChildAccessor>,
    #[serde(default)]
    pub location: Option<Location>,
}

impl FactoryMetadata {
    pub fn new(name: impl Into<String>, provides: TypeKey) -> Self {
        Self {
            name: name.into(),
            kind: FactoryKind::Method,
            provides,
            mode: FabricationMode::Recurrent,
            parameters: Vec::new(),
            override_policy: OverridePolicy::None,
            location: None,
        }
    }

    pub fn kind(mut self, kind: FactoryKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn scoped(mut self) -> Self {
        self.mode = FabricationMode::Scoped;
        self
    }

    pub fn parameter(mut self, key: TypeKey) -> Self {
        self.parameters.push(key);
        self
    }

    pub fn replacing(mut self) -> Self {
        self.override_policy = OverridePolicy::Replace;
        self
    }

    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(Location::new(location));
        self
    }
}

impl BuilderMetadata {
    pub fn new(name: impl Into<String>, target: TypeKey) -> Self {
        Self {
            name: name.into(),
            target,
            parameters: Vec::new(),
            location: None,
        }
    }

    pub fn parameter(mut self, key: TypeKey) -> Self {
        self.parameters.push(key);
        self
    }
}

impl LinkMetadata {
    pub fn new(target: TypeKey, source: TypeKey) -> Self {
        Self {
            target,
            source,
            qualifier: QualifierMapping::Declared,
            location: None,
        }
    }

    pub fn inherit_qualifier(mut self) -> Self {
        self.qualifier = QualifierMapping::Inherit;
        self
    }

    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(Location::new(location));
        self
    }
}

impl SpecificationMetadata {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: SpecificationId::new(id),
            includes: Vec::new(),
            factories: Vec::new(),
            builders: Vec::new(),
            links: Vec::new(),
            location: None,
        }
    }

    pub fn include(mut self, id: impl Into<String>) -> Self {
        self.includes.push(SpecificationId::new(id));
        self
    }

    pub fn factory(mut self, factory: FactoryMetadata) -> Self {
        self.factories.push(factory);
        self
    }

    pub fn builder(mut self, builder: BuilderMetadata) -> Self {
        self.builders.push(builder);
        self
    }

    pub fn link(mut self, link: LinkMetadata) -> Self {
        self.links.push(link);
        self
    }
}

impl DependencyInterfaceMetadata {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: InterfaceId::new(id),
            keys: Vec::new(),
            location: None,
        }
    }

    pub fn key(mut self, key: TypeKey) -> Self {
        self.keys.push(key);
        self
    }
}

impl ConstructorMetadata {
    /// An implicit, recurrent constructor
    pub fn implicit() -> Self {
        Self {
            name: None,
            parameters: Vec::new(),
            implicit: true,
            mode: FabricationMode::Recurrent,
        }
    }

    /// A constructor not eligible for auto-binding
    pub fn explicit() -> Self {
        Self {
            implicit: false,
            ..Self::implicit()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn scoped(mut self) -> Self {
        self.mode = FabricationMode::Scoped;
        self
    }

    pub fn parameter(mut self, key: TypeKey) -> Self {
        self.parameters.push(key);
        self
    }
}

impl TypeMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: TypeName::new(name),
            supertypes: Vec::new(),
            constructors: Vec::new(),
            properties: Vec::new(),
            location: None,
        }
    }

    pub fn supertype(mut self, name: impl Into<String>) -> Self {
        self.supertypes.push(TypeName::new(name));
        self
    }

    pub fn constructor(mut self, constructor: ConstructorMetadata) -> Self {
        self.constructors.push(constructor);
        self
    }

    pub fn property(mut self, name: impl Into<String>, key: TypeKey, required: bool) -> Self {
        self.properties.push(PropertyMetadata {
            name: name.into(),
            key,
            required,
        });
        self
    }
}

impl InjectorMetadata {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: InjectorId::new(id),
            specifications: Vec::new(),
            dependencies: Vec::new(),
            providers: Vec::new(),
            builders: Vec::new(),
            children: Vec::new(),
            location: None,
        }
    }

    pub fn specification(mut self, id: impl Into<String>) -> Self {
        self.specifications.push(SpecificationId::new(id));
        self
    }

    pub fn dependency(mut self, id: impl Into<String>) -> Self {
        self.dependencies.push(InterfaceId::new(id));
        self
    }

    pub fn provider(mut self, name: impl Into<String>, key: TypeKey) -> Self {
        self.providers.push(ProviderMethod {
            name: name.into(),
            key,
            location: None,
        });
        self
    }

    pub fn builder(mut self, name: impl Into<String>, key: TypeKey) -> Self {
        self.builders.push(BuilderMethod {
            name: name.into(),
            key,
            location: None,
        });
        self
    }

    pub fn child(mut self, name: impl Into<String>, injector: impl Into<String>) -> Self {
        let name = name.into();
        self.children.push(ChildAccessor {
            location: Some(Location::new(format!("{}::{}", self.id, name))),
            name,
            injector: InjectorId::new(injector),
        });
        self
    }
}
