use std::fmt;

use thiserror::Error;

use crate::types::{InjectorId, InterfaceId, Location, SpecificationId, TypeKey, TypeName};

/// Malformed input metadata.
///
/// Violates a structural precondition of the resolver and aborts the whole batch,
/// as opposed to [`ResolveError`] which is reported per injector.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    #[error("A key without a type was declared by '{owner}'")]
    EmptyTypeName {
        owner: String,
        location: Option<Location>,
    },
    #[error("An empty qualifier was declared by '{owner}'")]
    EmptyQualifier {
        owner: String,
        location: Option<Location>,
    },
    #[error("{kind} '{id}' is declared more than once")]
    DuplicateId { kind: &'static str, id: String },
    #[error("'{owner}' references the unknown specification '{id}'")]
    UnknownSpecification { owner: String, id: SpecificationId },
    #[error("Injector '{injector}' depends on the unknown interface '{id}'")]
    UnknownInterface {
        injector: InjectorId,
        id: InterfaceId,
    },
    #[error("Accessor '{accessor}' of '{injector}' yields the unknown injector '{id}'")]
    UnknownInjector {
        injector: InjectorId,
        accessor: String,
        id: InjectorId,
    },
    #[error("The injector hierarchy is cyclic: {}", join(.chain, " -> "))]
    HierarchyCycle { chain: Vec<InjectorId> },
}

/// Why a link could not be followed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkProblem {
    #[error("the alias chain {} loops back on itself", join(.chain, " -> "))]
    Cycle { chain: Vec<TypeKey> },
    #[error("'{linked}' cannot stand in for '{target}'")]
    TypeMismatch { target: TypeName, linked: TypeName },
}

/// Failure to resolve a key within one injector
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("No explicit, linked or implicit provider exists for '{key}'")]
    MissingBinding { key: TypeKey },
    #[error("'{key}' is provided more than once: {}", .candidates.join(", "))]
    DuplicateBinding {
        key: TypeKey,
        candidates: Vec<String>,
        location: Option<Location>,
    },
    #[error("Link for '{key}' is invalid - {problem}")]
    InvalidLink {
        key: TypeKey,
        problem: LinkProblem,
        location: Option<Location>,
    },
    #[error("'{key}' depends on itself before its construction completes")]
    CyclicBinding { key: TypeKey },
    #[error("'{key}' required by child injector '{child}' is supplied neither by '{parent}' nor by any of its ancestors")]
    IncompleteDependencyInterface {
        parent: InjectorId,
        child: InjectorId,
        key: TypeKey,
    },
}
impl ResolveError {
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            ResolveError::MissingBinding { .. } => DiagnosticKind::MissingBinding,
            ResolveError::DuplicateBinding { .. } => DiagnosticKind::DuplicateBinding,
            ResolveError::InvalidLink { .. } => DiagnosticKind::InvalidLink,
            ResolveError::CyclicBinding { .. } => DiagnosticKind::CyclicBinding,
            ResolveError::IncompleteDependencyInterface { .. } => {
                DiagnosticKind::IncompleteDependencyInterface
            }
        }
    }

    /// Location of the offending declaration, if the error knows it
    pub fn location(&self) -> Option<&Location> {
        match self {
            ResolveError::DuplicateBinding { location, .. }
            | ResolveError::InvalidLink { location, .. } => location.as_ref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiagnosticKind {
    MissingBinding,
    DuplicateBinding,
    InvalidLink,
    CyclicBinding,
    IncompleteDependencyInterface,
}
impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DiagnosticKind::MissingBinding => "missing binding",
            DiagnosticKind::DuplicateBinding => "duplicate binding",
            DiagnosticKind::InvalidLink => "invalid link",
            DiagnosticKind::CyclicBinding => "cyclic binding",
            DiagnosticKind::IncompleteDependencyInterface => "incomplete dependency interface",
        })
    }
}

/// A user-facing failure, attributed to one injector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub injector: InjectorId,
    pub kind: DiagnosticKind,
    pub message: String,
    pub location: Option<Location>,
    /// Keys leading from a resolution root to the failure
    pub chain: Vec<TypeKey>,
}
impl Diagnostic {
    pub(crate) fn new(
        injector: &InjectorId,
        error: &ResolveError,
        chain: Vec<TypeKey>,
        fallback_location: Option<&Location>,
    ) -> Self {
        Diagnostic {
            injector: injector.clone(),
            kind: error.kind(),
            message: error.to_string(),
            location: error.location().or(fallback_location).cloned(),
            chain,
        }
    }
}
impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.injector, self.kind, self.message)?;
        if let Some(location) = &self.location {
            write!(f, " at {location}")?;
        }
        if !self.chain.is_empty() {
            write!(f, " (via {})", join(&self.chain, " -> "))?;
        }
        Ok(())
    }
}

/// All diagnostics of a batch
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct Diagnostics {
    pub diagnostics: Vec<Diagnostic>,
}
impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut display = Vec::new();
        display.push("Resolution had one or more errors:".to_string());
        for diagnostic in &self.diagnostics {
            display.push(format!("- {}", diagnostic));
        }
        f.write_str(&display.join("\n"))
    }
}

fn join<T: fmt::Display>(items: &[T], separator: &str) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(separator)
}
