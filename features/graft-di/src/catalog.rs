use std::collections::{BTreeMap, BTreeSet};

use crate::{
    errors::MetadataError,
    metadata::{
        ChildAccessor, DependencyInterfaceMetadata, InjectorMetadata, MetadataModel,
        SpecificationMetadata, TypeMetadata,
    },
    types::{InjectorId, InterfaceId, Location, SpecificationId, TypeKey, TypeName},
};

/// Validated, indexed view of a [`MetadataModel`]
///
/// Building the catalog is the ingestion step: every structural precondition is
/// checked once here, so the later stages only ever see well-formed records.
pub struct Catalog<'a> {
    injectors: BTreeMap<&'a InjectorId, &'a InjectorMetadata>,
    specifications: BTreeMap<&'a SpecificationId, &'a SpecificationMetadata>,
    interfaces: BTreeMap<&'a InterfaceId, &'a DependencyInterfaceMetadata>,
    types: BTreeMap<&'a TypeName, &'a TypeMetadata>,
    /// Child injector -> (parent, accessor yielding the child)
    parents: BTreeMap<&'a InjectorId, Vec<(&'a InjectorId, &'a ChildAccessor)>>,
}

impl<'a> Catalog<'a> {
    pub fn new(model: &'a MetadataModel) -> Result<Self, MetadataError> {
        let mut catalog = Catalog {
            injectors: index("Injector", &model.injectors, |i| &i.id)?,
            specifications: index("Specification", &model.specifications, |s| &s.id)?,
            interfaces: index("Interface", &model.interfaces, |i| &i.id)?,
            types: index("Type", &model.types, |t| &t.name)?,
            parents: BTreeMap::new(),
        };

        check_keys(model)?;
        catalog.check_references()?;
        catalog.parents = catalog.collect_parents();
        catalog.check_hierarchy()?;

        tracing::debug!(
            "Catalogued {} injectors, {} specifications, {} interfaces and {} types",
            catalog.injectors.len(),
            catalog.specifications.len(),
            catalog.interfaces.len(),
            catalog.types.len()
        );

        Ok(catalog)
    }

    /// All injectors, ordered by id
    pub fn injectors(&self) -> impl Iterator<Item = &'a InjectorMetadata> + '_ {
        self.injectors.values().copied()
    }

    pub fn injector(&self, id: &InjectorId) -> Option<&'a InjectorMetadata> {
        self.injectors.get(id).copied()
    }

    pub fn specification(&self, id: &SpecificationId) -> Option<&'a SpecificationMetadata> {
        self.specifications.get(id).copied()
    }

    pub fn interface(&self, id: &InterfaceId) -> Option<&'a DependencyInterfaceMetadata> {
        self.interfaces.get(id).copied()
    }

    pub fn type_metadata(&self, name: &TypeName) -> Option<&'a TypeMetadata> {
        self.types.get(name).copied()
    }

    /// Injectors holding an accessor to `child`, with that accessor
    pub fn parents(&self, child: &InjectorId) -> &[(&'a InjectorId, &'a ChildAccessor)] {
        self.parents.get(child).map(Vec::as_slice).unwrap_or_default()
    }

    /// Every specification reachable from the injector, each one exactly once, in declaration order
    pub fn specification_closure(
        &self,
        injector: &InjectorMetadata,
    ) -> Vec<&'a SpecificationMetadata> {
        let mut seen = BTreeSet::new();
        let mut closure = Vec::new();
        let mut stack: Vec<&SpecificationId> = injector.specifications.iter().rev().collect();

        while let Some(id) = stack.pop() {
            let Some(specification) = self.specification(id) else {
                continue;
            };
            if !seen.insert(&specification.id) {
                continue;
            }
            closure.push(specification);
            stack.extend(specification.includes.iter().rev());
        }

        closure
    }

    /// Dependency interfaces of the injector
    pub fn dependency_interfaces(
        &self,
        injector: &InjectorMetadata,
    ) -> Vec<&'a DependencyInterfaceMetadata> {
        injector
            .dependencies
            .iter()
            .filter_map(|id| self.interface(id))
            .collect()
    }

    /// Whether a value of type `from` can stand in for `to`
    ///
    /// Returns `None` if nothing is known about `from`
    pub fn is_assignable(&self, from: &TypeName, to: &TypeName) -> Option<bool> {
        if from == to {
            return Some(true);
        }
        self.type_metadata(from)?;

        let mut seen = BTreeSet::new();
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if current == to {
                return Some(true);
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(metadata) = self.type_metadata(current) {
                stack.extend(metadata.supertypes.iter());
            }
        }

        Some(false)
    }

    fn check_references(&self) -> Result<(), MetadataError> {
        for specification in self.specifications.values() {
            for included in &specification.includes {
                if !self.specifications.contains_key(included) {
                    return Err(MetadataError::UnknownSpecification {
                        owner: format!("specification '{}'", specification.id),
                        id: included.clone(),
                    });
                }
            }
        }

        for injector in self.injectors.values() {
            for id in &injector.specifications {
                if !self.specifications.contains_key(id) {
                    return Err(MetadataError::UnknownSpecification {
                        owner: format!("injector '{}'", injector.id),
                        id: id.clone(),
                    });
                }
            }
            for id in &injector.dependencies {
                if !self.interfaces.contains_key(id) {
                    return Err(MetadataError::UnknownInterface {
                        injector: injector.id.clone(),
                        id: id.clone(),
                    });
                }
            }
            for accessor in &injector.children {
                if !self.injectors.contains_key(&accessor.injector) {
                    return Err(MetadataError::UnknownInjector {
                        injector: injector.id.clone(),
                        accessor: accessor.name.clone(),
                        id: accessor.injector.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    fn collect_parents(&self) -> BTreeMap<&'a InjectorId, Vec<(&'a InjectorId, &'a ChildAccessor)>> {
        let mut parents: BTreeMap<_, Vec<_>> = BTreeMap::new();
        for injector in self.injectors.values().copied() {
            for accessor in &injector.children {
                parents
                    .entry(&accessor.injector)
                    .or_default()
                    .push((&injector.id, accessor));
            }
        }
        parents
    }

    /// The hierarchy must be a DAG, otherwise ancestor walks would never end
    fn check_hierarchy(&self) -> Result<(), MetadataError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Visit {
            Active,
            Done,
        }

        let mut visits: BTreeMap<&InjectorId, Visit> = BTreeMap::new();
        for root in self.injectors.keys().copied() {
            if visits.contains_key(root) {
                continue;
            }

            // (injector, index of the next child to visit)
            let mut path: Vec<(&InjectorId, usize)> = vec![(root, 0)];
            visits.insert(root, Visit::Active);

            while let Some(&(current, next)) = path.last() {
                let children = self
                    .injector(current)
                    .map(|injector| injector.children.as_slice())
                    .unwrap_or_default();

                let Some(accessor) = children.get(next) else {
                    visits.insert(current, Visit::Done);
                    path.pop();
                    continue;
                };
                if let Some(top) = path.last_mut() {
                    top.1 += 1;
                }

                let child = &accessor.injector;
                match visits.get(child) {
                    Some(Visit::Done) => {}
                    Some(Visit::Active) => {
                        let start = path.iter().position(|(id, _)| *id == child).unwrap_or(0);
                        let mut chain: Vec<InjectorId> =
                            path[start..].iter().map(|(id, _)| (*id).clone()).collect();
                        chain.push(child.clone());
                        return Err(MetadataError::HierarchyCycle { chain });
                    }
                    None => {
                        visits.insert(child, Visit::Active);
                        path.push((child, 0));
                    }
                }
            }
        }

        Ok(())
    }
}

fn index<'a, T, Id>(
    kind: &'static str,
    items: &'a [T],
    id_of: impl Fn(&'a T) -> &'a Id,
) -> Result<BTreeMap<&'a Id, &'a T>, MetadataError>
where
    Id: Ord + ToString + 'a,
{
    let mut map = BTreeMap::new();
    for item in items {
        let id = id_of(item);
        if map.insert(id, item).is_some() {
            return Err(MetadataError::DuplicateId {
                kind,
                id: id.to_string(),
            });
        }
    }
    Ok(map)
}

/// Every key anywhere in the model must name a type
fn check_keys(model: &MetadataModel) -> Result<(), MetadataError> {
    for specification in &model.specifications {
        for factory in &specification.factories {
            let owner = format!("factory '{}' of '{}'", factory.name, specification.id);
            check_key(&factory.provides, &owner, factory.location.as_ref())?;
            for parameter in &factory.parameters {
                check_key(parameter, &owner, factory.location.as_ref())?;
            }
        }
        for builder in &specification.builders {
            let owner = format!("builder '{}' of '{}'", builder.name, specification.id);
            check_key(&builder.target, &owner, builder.location.as_ref())?;
            for parameter in &builder.parameters {
                check_key(parameter, &owner, builder.location.as_ref())?;
            }
        }
        for link in &specification.links {
            let owner = format!("link in '{}'", specification.id);
            check_key(&link.target, &owner, link.location.as_ref())?;
            check_key(&link.source, &owner, link.location.as_ref())?;
        }
    }

    for interface in &model.interfaces {
        let owner = format!("interface '{}'", interface.id);
        for key in &interface.keys {
            check_key(key, &owner, interface.location.as_ref())?;
        }
    }

    for metadata in &model.types {
        let owner = format!("type '{}'", metadata.name);
        let location = metadata.location.as_ref();
        if metadata.name.as_str().is_empty() || metadata.supertypes.iter().any(|s| s.as_str().is_empty()) {
            return Err(MetadataError::EmptyTypeName {
                owner,
                location: location.cloned(),
            });
        }
        for constructor in &metadata.constructors {
            for parameter in &constructor.parameters {
                check_key(parameter, &owner, location)?;
            }
        }
        for property in &metadata.properties {
            check_key(&property.key, &owner, location)?;
        }
    }

    for injector in &model.injectors {
        for provider in &injector.providers {
            let owner = format!("provider '{}' of '{}'", provider.name, injector.id);
            check_key(&provider.key, &owner, provider.location.as_ref())?;
        }
        for builder in &injector.builders {
            let owner = format!("builder '{}' of '{}'", builder.name, injector.id);
            check_key(&builder.key, &owner, builder.location.as_ref())?;
        }
    }

    Ok(())
}

fn check_key(key: &TypeKey, owner: &str, location: Option<&Location>) -> Result<(), MetadataError> {
    if key.ty.as_str().is_empty() {
        return Err(MetadataError::EmptyTypeName {
            owner: owner.to_string(),
            location: location.cloned(),
        });
    }
    if key.qualifier.as_ref().is_some_and(|q| q.is_empty()) {
        return Err(MetadataError::EmptyQualifier {
            owner: owner.to_string(),
            location: location.cloned(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::metadata::ProviderMethod;

    fn injector(id: &str, children: &[&str]) -> InjectorMetadata {
        InjectorMetadata {
            id: id.into(),
            specifications: vec![],
            dependencies: vec![],
            providers: vec![],
            builders: vec![],
            children: children
                .iter()
                .map(|child| ChildAccessor {
                    name: format!("open_{child}"),
                    injector: (*child).into(),
                    location: None,
                })
                .collect(),
            location: None,
        }
    }

    #[rstest]
    fn parents_are_derived_from_accessors() {
        let model = MetadataModel {
            injectors: vec![injector("App", &["Request"]), injector("Request", &[])],
            ..Default::default()
        };
        let catalog = Catalog::new(&model).unwrap();

        let parents = catalog.parents(&"Request".into());
        assert_eq!(parents.len(), 1);
        assert_eq!(parents[0].0.as_str(), "App");
        assert!(catalog.parents(&"App".into()).is_empty());
    }

    #[rstest]
    fn hierarchy_cycles_are_fatal() {
        let model = MetadataModel {
            injectors: vec![
                injector("A", &["B"]),
                injector("B", &["C"]),
                injector("C", &["A"]),
            ],
            ..Default::default()
        };

        let Err(MetadataError::HierarchyCycle { chain }) = Catalog::new(&model) else {
            panic!("expected a hierarchy cycle");
        };
        let chain: Vec<_> = chain.iter().map(InjectorId::as_str).collect();
        assert_eq!(chain, ["A", "B", "C", "A"]);
    }

    #[rstest]
    fn untyped_keys_are_fatal() {
        let mut app = injector("App", &[]);
        app.providers.push(ProviderMethod {
            name: "broken".into(),
            key: TypeKey::of(""),
            location: Some("app.src:3".into()),
        });
        let model = MetadataModel {
            injectors: vec![app],
            ..Default::default()
        };

        assert!(matches!(
            Catalog::new(&model),
            Err(MetadataError::EmptyTypeName { location: Some(_), .. })
        ));
    }

    #[rstest]
    fn duplicate_ids_are_fatal() {
        let model = MetadataModel {
            injectors: vec![injector("App", &[]), injector("App", &[])],
            ..Default::default()
        };

        assert_eq!(
            Catalog::new(&model).err(),
            Some(MetadataError::DuplicateId {
                kind: "Injector",
                id: "App".into(),
            })
        );
    }

    #[rstest]
    fn specification_closure_is_deduplicated() {
        let specification = |id: &str, includes: &[&str]| SpecificationMetadata {
            id: id.into(),
            includes: includes.iter().map(|i| (*i).into()).collect(),
            factories: vec![],
            builders: vec![],
            links: vec![],
            location: None,
        };
        let mut app = injector("App", &[]);
        app.specifications = vec!["Web".into(), "Core".into()];
        let model = MetadataModel {
            injectors: vec![app],
            specifications: vec![
                specification("Core", &[]),
                specification("Web", &["Core", "Web"]),
            ],
            ..Default::default()
        };
        let catalog = Catalog::new(&model).unwrap();

        let closure: Vec<_> = catalog
            .specification_closure(catalog.injector(&"App".into()).unwrap())
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(closure, ["Web", "Core"]);
    }
}
