use std::collections::BTreeMap;

use crate::{
    metadata::FactoryKind,
    types::{FabricationMode, InjectorId, InterfaceId, Location, SpecificationId, TypeKey, TypeName},
};

/// Index of a node in an [`InjectionGraph`]
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Index of a per-instance storage slot of a Scoped node
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct SlotId(pub usize);

/// How the value of a node is produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// Declared factory
    Factory {
        specification: SpecificationId,
        factory: String,
        kind: FactoryKind,
        mode: FabricationMode,
    },
    /// Implicit constructor, followed by required property injections
    Auto {
        ty: TypeName,
        /// `None` for a plain constructor
        constructor: Option<String>,
        mode: FabricationMode,
        properties: Vec<String>,
    },
    /// Handed in through a dependency interface
    External { interface: InterfaceId },
    /// Drawn from an ancestor injector
    Inherited,
}
impl Binding {
    pub fn is_scoped(&self) -> bool {
        matches!(
            self,
            Binding::Factory {
                mode: FabricationMode::Scoped,
                ..
            } | Binding::Auto {
                mode: FabricationMode::Scoped,
                ..
            }
        )
    }
}

/// One resolved key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub key: TypeKey,
    pub binding: Binding,
    /// Resolved parameters, in declaration order
    pub dependencies: Vec<NodeId>,
    pub location: Option<Location>,
}

/// Construction expression handed to the emitter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Call the node's factory or constructor with the given arguments
    Invoke { node: NodeId, args: Vec<Expr> },
    /// Read the cached value of a Scoped node
    Scoped(SlotId),
    /// Build a fresh value of a Recurrent node from its entry in [`InjectionGraph::recipes`]
    Recurrent(NodeId),
    /// Value supplied through a dependency interface
    External { key: TypeKey },
    /// Value supplied by an ancestor injector
    Inherited { key: TypeKey },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderImpl {
    pub method: String,
    pub key: TypeKey,
    pub node: NodeId,
    pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuilderBinding {
    Explicit {
        specification: SpecificationId,
        builder: String,
    },
    /// Inject the listed required properties
    Auto { properties: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderImpl {
    pub method: String,
    pub key: TypeKey,
    pub builder: BuilderBinding,
    pub args: Vec<Expr>,
}

/// Accessor constructing a child injector, with the values for its dependency interfaces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildImpl {
    pub method: String,
    pub child: InjectorId,
    pub args: Vec<(TypeKey, Expr)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedSlot {
    pub slot: SlotId,
    pub node: NodeId,
    /// The single construction call site of the node
    pub init: Expr,
}

/// Fully validated graph of one injector
///
/// Nodes are stored in dependency order: every node only depends on nodes with a lower id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionGraph {
    pub injector: InjectorId,
    pub nodes: Vec<Node>,
    /// Every resolved key, link aliases included
    pub keys: BTreeMap<TypeKey, NodeId>,
    pub providers: Vec<ProviderImpl>,
    pub builders: Vec<BuilderImpl>,
    pub children: Vec<ChildImpl>,
    pub scoped_slots: Vec<ScopedSlot>,
    /// The `Invoke` of every constructed Recurrent node, referenced by [`Expr::Recurrent`]
    pub recipes: BTreeMap<NodeId, Expr>,
    /// Keys descendant injectors draw from this one
    pub exports: BTreeMap<TypeKey, NodeId>,
}

impl InjectionGraph {
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn node_for(&self, key: &TypeKey) -> Option<&Node> {
        self.keys.get(key).and_then(|id| self.node(*id))
    }

    pub fn slot_for(&self, node: NodeId) -> Option<SlotId> {
        self.scoped_slots
            .iter()
            .find(|slot| slot.node == node)
            .map(|slot| slot.slot)
    }

    /// Nodes constructed by this injector - external and inherited values are only referenced
    pub fn constructed_nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| {
                matches!(node.binding, Binding::Factory { .. } | Binding::Auto { .. })
            })
            .map(|(index, node)| (NodeId(index), node))
    }
}

/// Root records collected while building, before expressions exist
#[derive(Debug, Clone, Default)]
pub(crate) struct GraphDraft {
    pub nodes: Vec<Node>,
    pub keys: BTreeMap<TypeKey, NodeId>,
    pub providers: Vec<(String, TypeKey, NodeId)>,
    pub builders: Vec<(String, TypeKey, BuilderBinding, Vec<NodeId>)>,
    pub children: Vec<(String, InjectorId, Vec<(TypeKey, NodeId)>)>,
    pub exports: BTreeMap<TypeKey, NodeId>,
}

impl GraphDraft {
    /// Turn the node arena into expressions
    ///
    /// Scoped nodes get exactly one slot whose initializer is their only `Invoke`,
    /// every consumer reads the slot instead. Recurrent nodes get one recipe and
    /// consumers refer to it, so no expression is nested deeper than one call.
    pub fn freeze(self, injector: InjectorId) -> InjectionGraph {
        let mut scoped_slots = Vec::new();
        let mut recipes = BTreeMap::new();
        // Expression used by consumers of each node
        let mut uses: Vec<Expr> = Vec::with_capacity(self.nodes.len());

        // Dependencies always have a lower id, so a single pass suffices
        for (index, node) in self.nodes.iter().enumerate() {
            let id = NodeId(index);
            let used = match &node.binding {
                Binding::External { .. } => Expr::External {
                    key: node.key.clone(),
                },
                Binding::Inherited => Expr::Inherited {
                    key: node.key.clone(),
                },
                Binding::Factory { .. } | Binding::Auto { .. } => {
                    let invoke = Expr::Invoke {
                        node: id,
                        args: node
                            .dependencies
                            .iter()
                            .map(|dependency| uses[dependency.0].clone())
                            .collect(),
                    };
                    if node.binding.is_scoped() {
                        let slot = SlotId(scoped_slots.len());
                        scoped_slots.push(ScopedSlot {
                            slot,
                            node: id,
                            init: invoke,
                        });
                        Expr::Scoped(slot)
                    } else {
                        recipes.insert(id, invoke);
                        Expr::Recurrent(id)
                    }
                }
            };
            uses.push(used);
        }

        // Roots spell out their own call
        let expr_of = |id: NodeId| {
            recipes
                .get(&id)
                .cloned()
                .unwrap_or_else(|| uses[id.0].clone())
        };

        InjectionGraph {
            providers: self
                .providers
                .into_iter()
                .map(|(method, key, node)| ProviderImpl {
                    method,
                    key,
                    node,
                    expr: expr_of(node),
                })
                .collect(),
            builders: self
                .builders
                .into_iter()
                .map(|(method, key, builder, args)| BuilderImpl {
                    method,
                    key,
                    builder,
                    args: args.into_iter().map(expr_of).collect(),
                })
                .collect(),
            children: self
                .children
                .into_iter()
                .map(|(method, child, args)| ChildImpl {
                    method,
                    child,
                    args: args
                        .into_iter()
                        .map(|(key, node)| (key, expr_of(node)))
                        .collect(),
                })
                .collect(),
            injector,
            nodes: self.nodes,
            keys: self.keys,
            scoped_slots,
            recipes,
            exports: self.exports,
        }
    }
}
