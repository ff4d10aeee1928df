use std::collections::BTreeSet;

use crate::{
    catalog::Catalog,
    errors::{LinkProblem, ResolveError},
    metadata::QualifierMapping,
    registry::LinkEntry,
    types::TypeKey,
};

/// Alias chain walked while resolving one request
///
/// Every key entered is remembered, so a chain looping back onto itself is
/// reported as soon as the loop closes instead of spinning forever.
#[derive(Debug, Clone)]
pub struct LinkChain {
    aliases: Vec<TypeKey>,
    current: TypeKey,
    visited: BTreeSet<TypeKey>,
}

impl LinkChain {
    pub fn new(requested: &TypeKey) -> Self {
        Self {
            aliases: Vec::new(),
            current: requested.clone(),
            visited: BTreeSet::from([requested.clone()]),
        }
    }

    /// Key the chain currently points at
    pub fn current(&self) -> &TypeKey {
        &self.current
    }

    /// Keys passed so far, excluding the current one
    pub fn aliases(&self) -> &[TypeKey] {
        &self.aliases
    }

    pub fn into_parts(self) -> (TypeKey, Vec<TypeKey>) {
        (self.current, self.aliases)
    }

    /// Follow `entry` from the current key
    pub fn follow(&mut self, catalog: &Catalog, entry: LinkEntry) -> Result<&TypeKey, ResolveError> {
        let link = entry.link;
        let next = match link.qualifier {
            QualifierMapping::Declared => link.source.clone(),
            QualifierMapping::Inherit => link.source.with_qualifier(self.current.qualifier.clone()),
        };

        if catalog.is_assignable(&next.ty, &self.current.ty) == Some(false) {
            return Err(ResolveError::InvalidLink {
                key: self.current.clone(),
                problem: LinkProblem::TypeMismatch {
                    target: self.current.ty.clone(),
                    linked: next.ty,
                },
                location: link.location.clone(),
            });
        }

        if !self.visited.insert(next.clone()) {
            let mut chain = self.aliases.clone();
            chain.push(self.current.clone());
            chain.push(next);
            return Err(ResolveError::InvalidLink {
                key: chain[0].clone(),
                problem: LinkProblem::Cycle { chain },
                location: link.location.clone(),
            });
        }

        tracing::trace!("Following link '{}' => '{next}'", self.current);
        let previous = std::mem::replace(&mut self.current, next);
        self.aliases.push(previous);
        Ok(&self.current)
    }
}
