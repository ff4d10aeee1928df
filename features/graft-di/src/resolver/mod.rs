use crate::{
    catalog::Catalog,
    errors::ResolveError,
    registry::{BuilderEntry, FactoryEntry, SpecificationRegistry},
    types::{FabricationMode, InterfaceId, Location, TypeKey},
};

pub mod auto;
pub mod link;

use auto::{AutoBuilder, AutoFactory};
use link::LinkChain;

/// Where the value for a key comes from
#[derive(Debug, Clone, Copy)]
pub enum Provider<'a> {
    /// An explicitly declared factory
    Factory(FactoryEntry<'a>),
    /// A factory synthesized from an implicit constructor
    Auto(AutoFactory<'a>),
    /// Supplied from outside through a dependency interface
    External(&'a InterfaceId),
}
impl<'a> Provider<'a> {
    /// Keys the provider needs before it can produce its value
    pub fn dependencies(&self) -> Vec<&'a TypeKey> {
        match self {
            Provider::Factory(entry) => entry.factory.parameters.iter().collect(),
            Provider::Auto(auto) => auto.dependencies().collect(),
            Provider::External(_) => Vec::new(),
        }
    }

    /// Caching discipline, external values are never constructed by the injector
    pub fn mode(&self) -> Option<FabricationMode> {
        match self {
            Provider::Factory(entry) => Some(entry.factory.mode),
            Provider::Auto(auto) => Some(auto.mode()),
            Provider::External(_) => None,
        }
    }

    pub fn location(&self) -> Option<&'a Location> {
        match self {
            Provider::Factory(entry) => entry.factory.location.as_ref(),
            Provider::Auto(auto) => auto.ty.location.as_ref(),
            Provider::External(_) => None,
        }
    }
}

/// Outcome of resolving one request
#[derive(Debug, Clone)]
pub struct Resolved<'a> {
    /// Key the provider was found for - differs from the request when links were followed
    pub key: TypeKey,
    /// Link aliases passed on the way, starting with the request
    pub via: Vec<TypeKey>,
    pub provider: Provider<'a>,
}

/// How an externally supplied instance gets completed
#[derive(Debug, Clone, Copy)]
pub enum BuilderProvider<'a> {
    Explicit(BuilderEntry<'a>),
    Auto(AutoBuilder<'a>),
}
impl<'a> BuilderProvider<'a> {
    pub fn dependencies(&self) -> Vec<&'a TypeKey> {
        match self {
            BuilderProvider::Explicit(entry) => entry.builder.parameters.iter().collect(),
            BuilderProvider::Auto(auto) => auto.properties().map(|property| &property.key).collect(),
        }
    }

    pub fn location(&self) -> Option<&'a Location> {
        match self {
            BuilderProvider::Explicit(entry) => entry.builder.location.as_ref(),
            BuilderProvider::Auto(auto) => auto.ty.location.as_ref(),
        }
    }
}

/// Resolves single keys against one injector's registry
///
/// Pure: holds nothing but shared references, so resolving never changes any state.
#[derive(Clone, Copy)]
pub struct BindingResolver<'r, 'a> {
    catalog: &'r Catalog<'a>,
    registry: &'r SpecificationRegistry<'a>,
    auto_binding: bool,
}

impl<'r, 'a> BindingResolver<'r, 'a> {
    pub fn new(
        catalog: &'r Catalog<'a>,
        registry: &'r SpecificationRegistry<'a>,
        auto_binding: bool,
    ) -> Self {
        Self {
            catalog,
            registry,
            auto_binding,
        }
    }

    /// Find the provider for `key`
    ///
    /// Looks for an explicit factory, then a dependency interface, then follows links,
    /// and only falls back to auto-binding if none of these produced a result.
    pub fn resolve(&self, key: &TypeKey) -> Result<Resolved<'a>, ResolveError> {
        let mut chain = LinkChain::new(key);

        loop {
            let current = chain.current();

            if let Some(entry) = self.registry.lookup(current) {
                return Ok(finish(chain, Provider::Factory(entry)));
            }

            if let Some(interface) = self.registry.external(current) {
                return Ok(finish(chain, Provider::External(interface)));
            }

            if let Some(entry) = self.registry.link(current) {
                chain.follow(self.catalog, entry)?;
                continue;
            }

            if self.auto_binding {
                if let Some(auto) = auto::synthesize(self.catalog, current)? {
                    return Ok(finish(chain, Provider::Auto(auto)));
                }
            }

            return Err(ResolveError::MissingBinding {
                key: current.clone(),
            });
        }

        fn finish<'a>(chain: LinkChain, provider: Provider<'a>) -> Resolved<'a> {
            let (key, via) = chain.into_parts();
            Resolved { key, via, provider }
        }
    }

    /// Find the builder completing instances of `key`
    pub fn resolve_builder(&self, key: &TypeKey) -> Result<BuilderProvider<'a>, ResolveError> {
        if let Some(entry) = self.registry.builder(key) {
            return Ok(BuilderProvider::Explicit(entry));
        }

        if self.auto_binding {
            if let Some(auto) = auto::synthesize_builder(self.catalog, key) {
                return Ok(BuilderProvider::Auto(auto));
            }
        }

        Err(ResolveError::MissingBinding { key: key.clone() })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::{
        errors::LinkProblem,
        metadata::{
            ConstructorMetadata, FactoryMetadata, InjectorMetadata, LinkMetadata, MetadataModel,
            SpecificationMetadata, TypeMetadata,
        },
        types::Qualifier,
    };

    fn resolve(model: &MetadataModel, key: TypeKey, auto_binding: bool) -> Result<Resolved<'_>, ResolveError> {
        let catalog = Catalog::new(model).unwrap();
        let specifications = catalog.specification_closure(&model.injectors[0]);
        let registry = SpecificationRegistry::register(&specifications, &[]).unwrap();
        BindingResolver::new(&catalog, &registry, auto_binding).resolve(&key)
    }

    fn model(specification: SpecificationMetadata, types: Vec<TypeMetadata>) -> MetadataModel {
        MetadataModel {
            injectors: vec![InjectorMetadata::new("App").specification(specification.id.as_str())],
            specifications: vec![specification],
            interfaces: vec![],
            types,
        }
    }

    #[rstest]
    fn links_are_transitive() {
        let model = model(
            SpecificationMetadata::new("Core")
                .link(LinkMetadata::new(TypeKey::of("X"), TypeKey::of("Y")))
                .link(LinkMetadata::new(TypeKey::of("Y"), TypeKey::of("Z")))
                .factory(FactoryMetadata::new("make_z", TypeKey::of("Z"))),
            vec![],
        );

        let via_link = resolve(&model, TypeKey::of("X"), true).unwrap();
        let direct = resolve(&model, TypeKey::of("Z"), true).unwrap();

        assert_eq!(via_link.key, TypeKey::of("Z"));
        assert_eq!(via_link.via, vec![TypeKey::of("X"), TypeKey::of("Y")]);
        let (Provider::Factory(a), Provider::Factory(b)) = (via_link.provider, direct.provider) else {
            panic!("both must resolve to the declared factory");
        };
        assert!(std::ptr::eq(a.factory, b.factory));
    }

    #[rstest]
    fn alias_cycles_are_invalid_links() {
        let model = model(
            SpecificationMetadata::new("Core")
                .link(LinkMetadata::new(TypeKey::of("A"), TypeKey::of("B")))
                .link(LinkMetadata::new(TypeKey::of("B"), TypeKey::of("A")).at("core.src:9")),
            vec![],
        );

        let error = resolve(&model, TypeKey::of("A"), true).unwrap_err();
        assert_eq!(
            error,
            ResolveError::InvalidLink {
                key: TypeKey::of("A"),
                problem: LinkProblem::Cycle {
                    chain: vec![TypeKey::of("A"), TypeKey::of("B"), TypeKey::of("A")],
                },
                location: Some("core.src:9".into()),
            }
        );
    }

    #[rstest]
    fn links_must_respect_supertypes() {
        let model = model(
            SpecificationMetadata::new("Core")
                .link(LinkMetadata::new(TypeKey::of("Logger"), TypeKey::of("FileLogger")))
                .link(LinkMetadata::new(TypeKey::of("Clock"), TypeKey::of("FileLogger"))),
            vec![TypeMetadata::new("FileLogger")
                .supertype("Logger")
                .constructor(ConstructorMetadata::implicit())],
        );

        assert!(resolve(&model, TypeKey::of("Logger"), true).is_ok());
        assert!(matches!(
            resolve(&model, TypeKey::of("Clock"), true),
            Err(ResolveError::InvalidLink {
                problem: LinkProblem::TypeMismatch { .. },
                ..
            })
        ));
    }

    #[rstest]
    fn inheriting_links_forward_the_qualifier() {
        let primary = Qualifier::attribute("Primary");
        let model = model(
            SpecificationMetadata::new("Core")
                .link(LinkMetadata::new(TypeKey::of("Db"), TypeKey::of("PgDb")).inherit_qualifier())
                .factory(FactoryMetadata::new("primary", TypeKey::qualified("PgDb", primary.clone()))),
            vec![],
        );

        let resolved = resolve(&model, TypeKey::qualified("Db", primary.clone()), true).unwrap();
        assert_eq!(resolved.key, TypeKey::qualified("PgDb", primary));
        assert!(matches!(
            resolve(&model, TypeKey::of("Db"), true),
            Err(ResolveError::MissingBinding { key }) if key == TypeKey::of("PgDb")
        ));
    }

    #[rstest]
    fn explicit_factories_win_over_auto_binding() {
        let model = model(
            SpecificationMetadata::new("Core").factory(FactoryMetadata::new("clock", TypeKey::of("Clock"))),
            vec![TypeMetadata::new("Clock").constructor(ConstructorMetadata::implicit())],
        );

        let resolved = resolve(&model, TypeKey::of("Clock"), true).unwrap();
        assert!(matches!(resolved.provider, Provider::Factory(_)));
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn auto_binding_can_be_disabled(#[case] enabled: bool) {
        let model = model(
            SpecificationMetadata::new("Core"),
            vec![TypeMetadata::new("Clock").constructor(ConstructorMetadata::implicit())],
        );

        let result = resolve(&model, TypeKey::of("Clock"), enabled);
        assert_eq!(matches!(result, Ok(Resolved { provider: Provider::Auto(_), .. })), enabled);
    }

    #[rstest]
    fn several_implicit_constructors_are_ambiguous() {
        let model = model(
            SpecificationMetadata::new("Core"),
            vec![TypeMetadata::new("Clock")
                .constructor(ConstructorMetadata::implicit())
                .constructor(ConstructorMetadata::implicit().named("system"))
                .constructor(ConstructorMetadata::explicit().named("fixed"))],
        );

        let error = resolve(&model, TypeKey::of("Clock"), true).unwrap_err();
        assert!(matches!(
            error,
            ResolveError::DuplicateBinding { candidates, .. }
                if candidates == ["Clock::new", "Clock::system"]
        ));
    }

    #[rstest]
    fn qualified_requests_never_auto_bind() {
        let model = model(
            SpecificationMetadata::new("Core"),
            vec![TypeMetadata::new("Clock").constructor(ConstructorMetadata::implicit())],
        );

        assert!(matches!(
            resolve(&model, TypeKey::qualified("Clock", Qualifier::label("utc")), true),
            Err(ResolveError::MissingBinding { .. })
        ));
    }
}
