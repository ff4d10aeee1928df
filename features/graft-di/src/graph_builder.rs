use std::collections::{BTreeMap, BTreeSet};

use crate::{
    cancel::{CancelToken, Cancelled},
    catalog::Catalog,
    dependency_graph::{Binding, BuilderBinding, GraphDraft, InjectionGraph, Node, NodeId},
    errors::{Diagnostic, ResolveError},
    metadata::{ChildAccessor, InjectorMetadata},
    registry::SpecificationRegistry,
    resolver::{BindingResolver, BuilderProvider, Provider, Resolved},
    types::{InjectorId, Location, TypeKey},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Memo {
    /// On the resolution stack - meeting it again closes a cycle
    InProgress,
    Done(NodeId),
    /// Already reported, dependents fail silently
    Failed,
}

/// One key waiting for its dependencies
struct Frame<'a> {
    key: TypeKey,
    /// Link aliases resolving to the same node
    aliases: Vec<TypeKey>,
    provider: Provider<'a>,
    dependencies: Vec<&'a TypeKey>,
    args: Vec<NodeId>,
}

enum Opened<'a> {
    Frame(Frame<'a>),
    Existing(NodeId),
    /// Resolved to a key which failed before
    Failed,
}

#[derive(Debug, Default)]
struct Walk {
    node: Option<NodeId>,
    errors: Vec<Diagnostic>,
    /// The requested key itself has no provider in this injector
    root_missing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Argument {
    Resolved(NodeId),
    /// Left for the ancestors of this injector
    Pending,
    Failed,
}

struct ChildDraft<'a> {
    accessor: &'a ChildAccessor,
    args: Vec<(TypeKey, Argument)>,
}

/// A dependency-interface key of a child the injector cannot supply on its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingRequirement {
    pub child: usize,
    pub argument: usize,
    pub key: TypeKey,
}

/// Builds the graph of a single injector
///
/// Resolution runs on an explicit stack, so arbitrarily deep dependency chains
/// never exhaust the thread's stack. Every key is resolved at most once: the memo
/// maps link aliases and their target to the same node.
pub(crate) struct GraphBuilder<'c, 'a> {
    catalog: &'c Catalog<'a>,
    injector: &'a InjectorMetadata,
    registry: SpecificationRegistry<'a>,
    auto_binding: bool,

    nodes: Vec<Node>,
    memo: BTreeMap<TypeKey, Memo>,
    /// Keys added to the memo, in order - allows undoing a speculative walk
    journal: Vec<TypeKey>,

    providers: Vec<(String, TypeKey, NodeId)>,
    builders: Vec<(String, TypeKey, BuilderBinding, Vec<NodeId>)>,
    children: Vec<ChildDraft<'a>>,
    exports: BTreeMap<TypeKey, NodeId>,
    diagnostics: Vec<Diagnostic>,
}

impl<'c, 'a> GraphBuilder<'c, 'a> {
    /// Registers the injector's specifications
    ///
    /// Conflicting declarations make every lookup ambiguous, so they fail the injector right away.
    pub(crate) fn new(
        catalog: &'c Catalog<'a>,
        injector: &'a InjectorMetadata,
        auto_binding: bool,
    ) -> Result<Self, Vec<Diagnostic>> {
        let specifications = catalog.specification_closure(injector);
        let interfaces = catalog.dependency_interfaces(injector);

        let registry =
            SpecificationRegistry::register(&specifications, &interfaces).map_err(|errors| {
                errors
                    .iter()
                    .map(|error| {
                        Diagnostic::new(&injector.id, error, Vec::new(), injector.location.as_ref())
                    })
                    .collect::<Vec<_>>()
            })?;

        Ok(Self {
            catalog,
            injector,
            registry,
            auto_binding,
            nodes: Vec::new(),
            memo: BTreeMap::new(),
            journal: Vec::new(),
            providers: Vec::new(),
            builders: Vec::new(),
            children: Vec::new(),
            exports: BTreeMap::new(),
            diagnostics: Vec::new(),
        })
    }

    pub(crate) fn id(&self) -> &'a InjectorId {
        &self.injector.id
    }

    fn resolver(&self) -> BindingResolver<'_, 'a> {
        BindingResolver::new(self.catalog, &self.registry, self.auto_binding)
    }

    /// Resolve every root of the injector: providers, builders and child accessors
    pub(crate) fn build_local(&mut self, cancel: &CancelToken) -> Result<(), Cancelled> {
        let injector = self.injector;
        tracing::debug!(
            "Building '{}' with {} providers, {} builders and {} children",
            injector.id,
            injector.providers.len(),
            injector.builders.len(),
            injector.children.len()
        );

        for method in &injector.providers {
            let walk = self.walk(&method.key, None, method.location.as_ref(), cancel)?;
            self.diagnostics.extend(walk.errors);
            if let Some(node) = walk.node {
                self.providers
                    .push((method.name.clone(), method.key.clone(), node));
            }
        }

        for method in &injector.builders {
            cancel.check()?;
            let builder = match self.resolver().resolve_builder(&method.key) {
                Ok(builder) => builder,
                Err(error) => {
                    self.diagnostics.push(Diagnostic::new(
                        &injector.id,
                        &error,
                        vec![method.key.clone()],
                        method.location.as_ref(),
                    ));
                    continue;
                }
            };

            let location = builder.location().or(method.location.as_ref());
            let mut args = Vec::new();
            for dependency in builder.dependencies() {
                let walk = self.walk(dependency, Some(&method.key), location, cancel)?;
                self.diagnostics.extend(walk.errors);
                args.extend(walk.node);
            }
            if args.len() == builder.dependencies().len() {
                self.builders.push((
                    method.name.clone(),
                    method.key.clone(),
                    builder_binding(builder),
                    args,
                ));
            }
        }

        let mut missing = BTreeSet::new();
        for accessor in &injector.children {
            let mut args = Vec::new();
            for key in self.required_by(&accessor.injector) {
                let walk = self.walk(key, None, accessor.location.as_ref(), cancel)?;
                let argument = match walk.node {
                    Some(node) => Argument::Resolved(node),
                    // Maybe an ancestor can help out
                    None if walk.root_missing || missing.contains(key) => {
                        missing.insert(key);
                        Argument::Pending
                    }
                    None => {
                        self.diagnostics.extend(walk.errors);
                        Argument::Failed
                    }
                };
                args.push((key.clone(), argument));
            }
            self.children.push(ChildDraft { accessor, args });
        }

        Ok(())
    }

    /// Keys of all dependency interfaces of the child, each one once
    fn required_by(&self, child: &InjectorId) -> Vec<&'a TypeKey> {
        let Some(child) = self.catalog.injector(child) else {
            return Vec::new();
        };

        let mut seen = BTreeSet::new();
        self.catalog
            .dependency_interfaces(child)
            .into_iter()
            .flat_map(|interface| interface.keys.iter())
            .filter(|key| seen.insert(*key))
            .collect()
    }

    /// Child requirements left for the ancestors
    pub(crate) fn pending(&self) -> Vec<PendingRequirement> {
        self.children
            .iter()
            .enumerate()
            .flat_map(|(child, draft)| {
                draft
                    .args
                    .iter()
                    .enumerate()
                    .filter(|(_, (_, argument))| *argument == Argument::Pending)
                    .map(move |(argument, (key, _))| PendingRequirement {
                        child,
                        argument,
                        key: key.clone(),
                    })
            })
            .collect()
    }

    /// Hand an inherited value to the child waiting for it
    pub(crate) fn satisfy(&mut self, requirement: &PendingRequirement) {
        let node = self.inherit(&requirement.key);
        if let Some((_, argument)) = self
            .children
            .get_mut(requirement.child)
            .and_then(|draft| draft.args.get_mut(requirement.argument))
        {
            *argument = Argument::Resolved(node);
        }
    }

    /// Report a child requirement nobody up the hierarchy supplies
    pub(crate) fn unsatisfied(&mut self, requirement: &PendingRequirement) {
        let Some(draft) = self.children.get_mut(requirement.child) else {
            return;
        };
        if let Some((_, argument)) = draft.args.get_mut(requirement.argument) {
            *argument = Argument::Failed;
        }

        let error = ResolveError::IncompleteDependencyInterface {
            parent: self.injector.id.clone(),
            child: draft.accessor.injector.clone(),
            key: requirement.key.clone(),
        };
        self.diagnostics.push(Diagnostic::new(
            &self.injector.id,
            &error,
            vec![requirement.key.clone()],
            draft.accessor.location.as_ref(),
        ));
    }

    /// Try to supply `key` to a descendant from this injector's own bindings
    ///
    /// A failed attempt leaves no trace: neither nodes nor diagnostics are kept.
    pub(crate) fn export(
        &mut self,
        key: &TypeKey,
        cancel: &CancelToken,
    ) -> Result<Option<NodeId>, Cancelled> {
        let checkpoint = (self.nodes.len(), self.journal.len());
        let walk = self.walk(key, None, None, cancel)?;

        match walk.node {
            Some(node) => {
                tracing::trace!("'{}' exports '{}'", self.injector.id, key);
                self.exports.insert(key.clone(), node);
                Ok(Some(node))
            }
            None => {
                self.rollback(checkpoint);
                Ok(None)
            }
        }
    }

    /// Supply `key` with a value drawn from an ancestor and pass it on to descendants
    pub(crate) fn forward(&mut self, key: &TypeKey) {
        let node = self.inherit(key);
        self.exports.insert(key.clone(), node);
    }

    fn inherit(&mut self, key: &TypeKey) -> NodeId {
        if let Some(Memo::Done(node)) = self.memo.get(key) {
            return *node;
        }

        let node = NodeId(self.nodes.len());
        self.nodes.push(Node {
            key: key.clone(),
            binding: Binding::Inherited,
            dependencies: Vec::new(),
            location: None,
        });
        self.remember(key.clone(), Memo::Done(node));
        node
    }

    fn rollback(&mut self, (nodes, journal): (usize, usize)) {
        self.nodes.truncate(nodes);
        for key in self.journal.drain(journal..) {
            self.memo.remove(&key);
        }
    }

    fn remember(&mut self, key: TypeKey, memo: Memo) {
        if self.memo.insert(key.clone(), memo).is_none() {
            self.journal.push(key);
        }
    }

    /// Resolve `root` and everything it depends on
    fn walk(
        &mut self,
        root: &TypeKey,
        requested_by: Option<&TypeKey>,
        location: Option<&Location>,
        cancel: &CancelToken,
    ) -> Result<Walk, Cancelled> {
        let mut walk = Walk::default();
        match self.memo.get(root).copied() {
            Some(Memo::Done(node)) => {
                walk.node = Some(node);
                return Ok(walk);
            }
            Some(Memo::Failed | Memo::InProgress) => return Ok(walk),
            None => {}
        }

        let mut stack: Vec<Frame<'a>> = Vec::new();
        let mut request = Some(root.clone());

        loop {
            if let Some(key) = request.take() {
                cancel.check()?;

                let node = match self.open(&key) {
                    Ok(Opened::Frame(frame)) => {
                        stack.push(frame);
                        continue;
                    }
                    Ok(Opened::Existing(node)) => node,
                    Ok(Opened::Failed) => {
                        self.remember(key, Memo::Failed);
                        self.abandon(stack);
                        return Ok(walk);
                    }
                    Err(error) => {
                        walk.root_missing =
                            stack.is_empty() && matches!(error, ResolveError::MissingBinding { .. });
                        let location = requester_location(&stack).or(location);
                        walk.errors.push(Diagnostic::new(
                            &self.injector.id,
                            &error,
                            chain(requested_by, &stack, &key),
                            location,
                        ));
                        self.remember(key, Memo::Failed);
                        self.abandon(stack);
                        return Ok(walk);
                    }
                };

                match stack.last_mut() {
                    Some(parent) => parent.args.push(node),
                    None => {
                        walk.node = Some(node);
                        return Ok(walk);
                    }
                }
                continue;
            }

            let Some(frame) = stack.last_mut() else {
                return Ok(walk);
            };

            if let Some(&dependency) = frame.dependencies.get(frame.args.len()) {
                match self.memo.get(dependency).copied() {
                    Some(Memo::Done(node)) => frame.args.push(node),
                    None => request = Some(dependency.clone()),
                    Some(Memo::InProgress) => {
                        let error = ResolveError::CyclicBinding {
                            key: dependency.clone(),
                        };
                        let location = requester_location(&stack).or(location);
                        walk.errors.push(Diagnostic::new(
                            &self.injector.id,
                            &error,
                            chain(requested_by, &stack, dependency),
                            location,
                        ));
                        self.abandon(stack);
                        return Ok(walk);
                    }
                    Some(Memo::Failed) => {
                        self.abandon(stack);
                        return Ok(walk);
                    }
                }
                continue;
            }

            // Every dependency is available
            let Some(frame) = stack.pop() else {
                return Ok(walk);
            };
            let node = self.push_node(frame);
            match stack.last_mut() {
                Some(parent) => parent.args.push(node),
                None => {
                    walk.node = Some(node);
                    return Ok(walk);
                }
            }
        }
    }

    /// Find the provider of `key` and put it on the stack, unless its node already exists
    fn open(&mut self, key: &TypeKey) -> Result<Opened<'a>, ResolveError> {
        let Resolved {
            key: target,
            via,
            provider,
        } = self.resolver().resolve(key)?;

        match self.memo.get(&target).copied() {
            Some(Memo::Done(node)) => {
                for alias in via {
                    self.remember(alias, Memo::Done(node));
                }
                return Ok(Opened::Existing(node));
            }
            Some(Memo::InProgress) => return Err(ResolveError::CyclicBinding { key: target }),
            Some(Memo::Failed) => {
                for alias in via {
                    self.remember(alias, Memo::Failed);
                }
                return Ok(Opened::Failed);
            }
            None => {}
        }

        self.remember(target.clone(), Memo::InProgress);
        for alias in &via {
            self.remember(alias.clone(), Memo::InProgress);
        }

        Ok(Opened::Frame(Frame {
            key: target,
            aliases: via,
            dependencies: provider.dependencies(),
            provider,
            args: Vec::new(),
        }))
    }

    /// Mark every key still on the stack as failed
    fn abandon(&mut self, stack: Vec<Frame<'a>>) {
        for frame in stack {
            for alias in frame.aliases {
                self.remember(alias, Memo::Failed);
            }
            self.remember(frame.key, Memo::Failed);
        }
    }

    fn push_node(&mut self, frame: Frame<'a>) -> NodeId {
        let binding = match frame.provider {
            Provider::Factory(entry) => Binding::Factory {
                specification: entry.specification.clone(),
                factory: entry.factory.name.clone(),
                kind: entry.factory.kind,
                mode: entry.factory.mode,
            },
            Provider::Auto(auto) => Binding::Auto {
                ty: auto.ty.name.clone(),
                constructor: auto.constructor.name.clone(),
                mode: auto.mode(),
                properties: auto.properties().map(|property| property.name.clone()).collect(),
            },
            Provider::External(interface) => Binding::External {
                interface: interface.clone(),
            },
        };

        let node = NodeId(self.nodes.len());
        self.nodes.push(Node {
            key: frame.key.clone(),
            binding,
            dependencies: frame.args,
            location: frame.provider.location().cloned(),
        });

        tracing::trace!("Resolved '{}' as node {}", frame.key, node.0);
        for alias in frame.aliases {
            self.remember(alias, Memo::Done(node));
        }
        self.remember(frame.key, Memo::Done(node));
        node
    }

    /// Freeze the injector into its final graph, or hand back everything that went wrong
    pub(crate) fn finish(self) -> Result<InjectionGraph, Vec<Diagnostic>> {
        if !self.diagnostics.is_empty() {
            return Err(self.diagnostics);
        }

        let keys = self
            .memo
            .iter()
            .filter_map(|(key, memo)| match memo {
                Memo::Done(node) => Some((key.clone(), *node)),
                _ => None,
            })
            .collect();

        let children = self
            .children
            .into_iter()
            .filter_map(|draft| {
                let args = draft
                    .args
                    .into_iter()
                    .map(|(key, argument)| match argument {
                        Argument::Resolved(node) => Some((key, node)),
                        Argument::Pending | Argument::Failed => None,
                    })
                    .collect::<Option<Vec<_>>>()?;
                Some((draft.accessor.name.clone(), draft.accessor.injector.clone(), args))
            })
            .collect();

        let graph = GraphDraft {
            nodes: self.nodes,
            keys,
            providers: self.providers,
            builders: self.builders,
            children,
            exports: self.exports,
        }
        .freeze(self.injector.id.clone());

        tracing::debug!(
            "Resolved '{}' into {} nodes with {} scoped slots",
            graph.injector,
            graph.nodes.len(),
            graph.scoped_slots.len()
        );

        Ok(graph)
    }
}

fn builder_binding(builder: BuilderProvider<'_>) -> BuilderBinding {
    match builder {
        BuilderProvider::Explicit(entry) => BuilderBinding::Explicit {
            specification: entry.specification.clone(),
            builder: entry.builder.name.clone(),
        },
        BuilderProvider::Auto(auto) => BuilderBinding::Auto {
            properties: auto.properties().map(|property| property.name.clone()).collect(),
        },
    }
}

/// Location of the declaration asking for the key on top of the stack
fn requester_location<'s>(stack: &'s [Frame<'_>]) -> Option<&'s Location> {
    stack.last().and_then(|frame| frame.provider.location())
}

fn chain(requested_by: Option<&TypeKey>, stack: &[Frame<'_>], last: &TypeKey) -> Vec<TypeKey> {
    requested_by
        .into_iter()
        .chain(stack.iter().map(|frame| &frame.key))
        .chain(std::iter::once(last))
        .cloned()
        .collect()
}
