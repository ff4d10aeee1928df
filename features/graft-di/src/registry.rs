use std::collections::BTreeMap;

use crate::{
    errors::ResolveError,
    metadata::{
        BuilderMetadata, DependencyInterfaceMetadata, FactoryMetadata, LinkMetadata,
        OverridePolicy, QualifierMapping, SpecificationMetadata,
    },
    types::{InterfaceId, Location, SpecificationId, TypeKey, TypeName},
};

/// A factory, together with the specification declaring it
#[derive(Debug, Clone, Copy)]
pub struct FactoryEntry<'a> {
    pub specification: &'a SpecificationId,
    pub factory: &'a FactoryMetadata,
}

#[derive(Debug, Clone, Copy)]
pub struct BuilderEntry<'a> {
    pub specification: &'a SpecificationId,
    pub builder: &'a BuilderMetadata,
}

#[derive(Debug, Clone, Copy)]
pub struct LinkEntry<'a> {
    pub specification: &'a SpecificationId,
    pub link: &'a LinkMetadata,
}

/// Union of all bindings an injector's specifications contribute
///
/// Links are only stored here - following them is up to the
/// [`BindingResolver`](crate::resolver::BindingResolver).
#[derive(Debug, Default)]
pub struct SpecificationRegistry<'a> {
    factories: BTreeMap<&'a TypeKey, FactoryEntry<'a>>,
    builders: BTreeMap<&'a TypeKey, BuilderEntry<'a>>,
    /// Links matching exactly one key
    declared_links: BTreeMap<&'a TypeKey, LinkEntry<'a>>,
    /// Links matching every qualifier of a type
    inherited_links: BTreeMap<&'a TypeName, LinkEntry<'a>>,
    /// Keys supplied from outside through dependency interfaces
    externals: BTreeMap<&'a TypeKey, &'a InterfaceId>,
}

impl<'a> SpecificationRegistry<'a> {
    /// Index all bindings, reporting every conflict at once
    pub fn register(
        specifications: &[&'a SpecificationMetadata],
        interfaces: &[&'a DependencyInterfaceMetadata],
    ) -> Result<Self, Vec<ResolveError>> {
        let mut errors = Vec::new();
        let mut registry = SpecificationRegistry::default();

        let mut factory_candidates: BTreeMap<&TypeKey, Vec<FactoryEntry>> = BTreeMap::new();
        let mut builder_candidates: BTreeMap<&TypeKey, Vec<BuilderEntry>> = BTreeMap::new();
        let mut declared_candidates: BTreeMap<&TypeKey, Vec<LinkEntry>> = BTreeMap::new();
        let mut inherited_candidates: BTreeMap<&TypeName, Vec<LinkEntry>> = BTreeMap::new();

        for specification in specifications.iter().copied() {
            let id = &specification.id;
            for factory in &specification.factories {
                factory_candidates
                    .entry(&factory.provides)
                    .or_default()
                    .push(FactoryEntry {
                        specification: id,
                        factory,
                    });
            }
            for builder in &specification.builders {
                builder_candidates
                    .entry(&builder.target)
                    .or_default()
                    .push(BuilderEntry {
                        specification: id,
                        builder,
                    });
            }
            for link in &specification.links {
                let entry = LinkEntry {
                    specification: id,
                    link,
                };
                match link.qualifier {
                    QualifierMapping::Declared => declared_candidates
                        .entry(&link.target)
                        .or_default()
                        .push(entry),
                    QualifierMapping::Inherit => inherited_candidates
                        .entry(&link.target.ty)
                        .or_default()
                        .push(entry),
                }
            }
        }

        for (key, candidates) in factory_candidates {
            match pick_factory(&candidates) {
                Some(entry) => {
                    registry.factories.insert(key, entry);
                }
                None => errors.push(duplicate(
                    key,
                    candidates
                        .iter()
                        .map(|c| (describe(c.specification, &c.factory.name), c.factory.location.as_ref())),
                )),
            }
        }

        for (key, candidates) in builder_candidates {
            match candidates.as_slice() {
                [single] => {
                    registry.builders.insert(key, *single);
                }
                _ => errors.push(duplicate(
                    key,
                    candidates
                        .iter()
                        .map(|c| (describe(c.specification, &c.builder.name), c.builder.location.as_ref())),
                )),
            }
        }

        for (key, candidates) in declared_candidates {
            match candidates.as_slice() {
                [single] => {
                    registry.declared_links.insert(key, *single);
                }
                _ => errors.push(duplicate(key, candidates.iter().map(describe_link))),
            }
        }

        for (ty, candidates) in inherited_candidates {
            match candidates.as_slice() {
                [single] => {
                    registry.inherited_links.insert(ty, *single);
                }
                _ => errors.push(duplicate(
                    &candidates[0].link.target,
                    candidates.iter().map(describe_link),
                )),
            }
        }

        for interface in interfaces.iter().copied() {
            for key in &interface.keys {
                if let Some(entry) = registry.factories.get(key) {
                    errors.push(duplicate(
                        key,
                        [
                            (describe(entry.specification, &entry.factory.name), entry.factory.location.as_ref()),
                            (format!("interface '{}'", interface.id), interface.location.as_ref()),
                        ],
                    ));
                    continue;
                }
                // The same key in several interfaces still names one external value
                registry.externals.entry(key).or_insert(&interface.id);
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        tracing::debug!(
            "Registered {} factories, {} builders, {} links and {} external keys from {} specifications",
            registry.factories.len(),
            registry.builders.len(),
            registry.declared_links.len() + registry.inherited_links.len(),
            registry.externals.len(),
            specifications.len()
        );

        Ok(registry)
    }

    /// Explicit factory for exactly this key
    pub fn lookup(&self, key: &TypeKey) -> Option<FactoryEntry<'a>> {
        self.factories.get(key).copied()
    }

    /// Dependency interface declaring this key
    pub fn external(&self, key: &TypeKey) -> Option<&'a InterfaceId> {
        self.externals.get(key).copied()
    }

    /// Link whose target matches the key - an exact link wins over a qualifier-inheriting one
    pub fn link(&self, key: &TypeKey) -> Option<LinkEntry<'a>> {
        self.declared_links
            .get(key)
            .or_else(|| self.inherited_links.get(&key.ty))
            .copied()
    }

    pub fn builder(&self, key: &TypeKey) -> Option<BuilderEntry<'a>> {
        self.builders.get(key).copied()
    }
}

/// A single factory, or the single replacing factory among several
fn pick_factory<'a>(candidates: &[FactoryEntry<'a>]) -> Option<FactoryEntry<'a>> {
    if let [single] = candidates {
        return Some(*single);
    }

    let mut replacing = candidates
        .iter()
        .filter(|c| c.factory.override_policy == OverridePolicy::Replace);
    match (replacing.next(), replacing.next()) {
        (Some(winner), None) => {
            tracing::debug!(
                "Factory '{}' replaces {} other factories for '{}'",
                winner.factory.name,
                candidates.len() - 1,
                winner.factory.provides
            );
            Some(*winner)
        }
        _ => None,
    }
}

fn duplicate<'l>(
    key: &TypeKey,
    candidates: impl IntoIterator<Item = (String, Option<&'l Location>)>,
) -> ResolveError {
    let (names, locations): (Vec<_>, Vec<_>) = candidates.into_iter().unzip();
    ResolveError::DuplicateBinding {
        key: key.clone(),
        candidates: names,
        // Point at the first declaration that clashes
        location: locations.into_iter().skip(1).flatten().next().cloned(),
    }
}

fn describe(specification: &SpecificationId, name: &str) -> String {
    format!("{specification}::{name}")
}

fn describe_link<'l>(entry: &LinkEntry<'l>) -> (String, Option<&'l Location>) {
    (
        format!("{}::link({} => {})", entry.specification, entry.link.target, entry.link.source),
        entry.link.location.as_ref(),
    )
}
