//! Graft DI resolves dependency-injection metadata into verified construction graphs.
//!
//! Everything happens ahead of time: the front-end extracts a [`MetadataModel`]
//! from annotated sources, Graft checks it and hands one [`InjectionGraph`] per
//! injector to the code emitter. Nothing here ever runs at injection time.
//!
//! Graft DI is split into a few parts:
//! 1. Catalog: Validates and indexes the metadata
//! 2. Registry: The bindings visible to one injector
//! 3. Resolver: Finds the provider for a single key
//! 4. Graph builder: Resolves all roots of one injector into a node graph
//! 5. Hierarchy: Supplies child injectors from their ancestors
//! 6. Validator: Drives a whole batch and collects the diagnostics
//!
//! # Examples
//!
//! ```rust
//! use graft_di::{
//!     FactoryMetadata, InjectorMetadata, ModelBuilder, SpecificationMetadata, TypeKey,
//! };
//!
//! let resolution = ModelBuilder::new()
//!     .add_specification(
//!         SpecificationMetadata::new("Core")
//!             .factory(FactoryMetadata::new("config", TypeKey::of("Config")).scoped())
//!             .factory(FactoryMetadata::new("db", TypeKey::of("Db")).parameter(TypeKey::of("Config"))),
//!     )
//!     .add_injector(
//!         InjectorMetadata::new("App")
//!             .specification("Core")
//!             .provider("db", TypeKey::of("Db")),
//!     )
//!     .resolve()
//!     .unwrap();
//!
//! assert!(resolution.ensure_clean().is_ok());
//! let graph = resolution.graph("App").unwrap();
//! assert_eq!(graph.scoped_slots.len(), 1);
//! ```

pub mod builder;
pub mod cancel;
pub mod catalog;
pub mod container;
pub mod dependency_graph;
pub mod errors;
mod graph_builder;
mod hierarchy;
pub mod metadata;
pub mod registry;
pub mod resolver;
pub mod types;
pub mod validator;

pub use builder::ModelBuilder;
pub use cancel::CancelToken;
pub use container::Resolution;
pub use dependency_graph::{
    Binding, BuilderBinding, BuilderImpl, ChildImpl, Expr, InjectionGraph, Node, NodeId,
    ProviderImpl, ScopedSlot, SlotId,
};
pub use errors::{Diagnostic, DiagnosticKind, Diagnostics, LinkProblem, MetadataError, ResolveError};
pub use graft_config::config::ResolverConfig;
pub use metadata::{
    BuilderMetadata, ChildAccessor, ConstructorMetadata, DependencyInterfaceMetadata,
    FactoryKind, FactoryMetadata, InjectorMetadata, LinkMetadata, MetadataModel, OverridePolicy,
    PropertyMetadata, QualifierMapping, SpecificationMetadata, TypeMetadata,
};
pub use types::{
    FabricationMode, InjectorId, InterfaceId, Location, Qualifier, SpecificationId, TypeKey,
    TypeName,
};
pub use validator::{resolve_all, Validator};
