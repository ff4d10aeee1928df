use crate::{
    catalog::Catalog,
    errors::ResolveError,
    metadata::{ConstructorMetadata, PropertyMetadata, TypeMetadata},
    types::{FabricationMode, TypeKey},
};

/// Factory synthesized from a type's implicit constructor
#[derive(Debug, Clone, Copy)]
pub struct AutoFactory<'a> {
    pub ty: &'a TypeMetadata,
    pub constructor: &'a ConstructorMetadata,
}
impl<'a> AutoFactory<'a> {
    /// Constructor parameters, followed by the required properties
    pub fn dependencies(&self) -> impl Iterator<Item = &'a TypeKey> {
        let (ty, constructor) = (self.ty, self.constructor);
        constructor
            .parameters
            .iter()
            .chain(ty.required_properties().map(|property| &property.key))
    }

    pub fn properties(&self) -> impl Iterator<Item = &'a PropertyMetadata> {
        let ty = self.ty;
        ty.required_properties()
    }

    pub fn mode(&self) -> FabricationMode {
        self.constructor.mode
    }

    pub fn name(&self) -> String {
        match &self.constructor.name {
            Some(name) => format!("{}::{}", self.ty.name, name),
            None => format!("{}::new", self.ty.name),
        }
    }
}

/// Try to synthesize a factory for `key`
///
/// Only unqualified keys are eligible - a qualifier always asks for a declared binding.
/// Returns `Ok(None)` if the type has no implicit constructor.
pub(crate) fn synthesize<'a>(
    catalog: &Catalog<'a>,
    key: &TypeKey,
) -> Result<Option<AutoFactory<'a>>, ResolveError> {
    if key.qualifier.is_some() {
        return Ok(None);
    }
    let Some(ty) = catalog.type_metadata(&key.ty) else {
        return Ok(None);
    };

    let eligible: Vec<_> = ty.constructors.iter().filter(|c| c.implicit).collect();
    match eligible.as_slice() {
        [] => Ok(None),
        [constructor] => {
            tracing::trace!("Synthesized implicit factory for '{key}'");
            Ok(Some(AutoFactory { ty, constructor }))
        }
        several => Err(ResolveError::DuplicateBinding {
            key: key.clone(),
            candidates: several
                .iter()
                .map(|constructor| AutoFactory { ty, constructor }.name())
                .collect(),
            location: ty.location.clone(),
        }),
    }
}

/// Builder synthesized from a type's required properties
#[derive(Debug, Clone, Copy)]
pub struct AutoBuilder<'a> {
    pub ty: &'a TypeMetadata,
}
impl<'a> AutoBuilder<'a> {
    pub fn properties(&self) -> impl Iterator<Item = &'a PropertyMetadata> {
        let ty = self.ty;
        ty.required_properties()
    }
}

pub(crate) fn synthesize_builder<'a>(catalog: &Catalog<'a>, key: &TypeKey) -> Option<AutoBuilder<'a>> {
    if key.qualifier.is_some() {
        return None;
    }
    let ty = catalog.type_metadata(&key.ty)?;
    ty.required_properties().next()?;
    Some(AutoBuilder { ty })
}
