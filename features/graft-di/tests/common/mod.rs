//! Shared metadata builders for the integration tests

#![allow(dead_code)]

use graft_di::{
    CancelToken, Expr, FactoryMetadata, InjectionGraph, MetadataModel, NodeId, Qualifier,
    Resolution, ResolverConfig, TypeKey, Validator,
};

pub fn key(ty: &str) -> TypeKey {
    TypeKey::of(ty)
}

pub fn labelled(ty: &str, label: &str) -> TypeKey {
    TypeKey::qualified(ty, Qualifier::label(label))
}

/// Recurrent factory `make_<ty>` for an unqualified key
pub fn factory(ty: &str, parameters: &[&str]) -> FactoryMetadata {
    parameters.iter().fold(
        FactoryMetadata::new(format!("make_{}", ty.to_lowercase()), key(ty)),
        |factory, parameter| factory.parameter(key(parameter)),
    )
}

pub fn resolve(model: &MetadataModel) -> Resolution {
    resolve_with(model, ResolverConfig::default())
}

pub fn resolve_with(model: &MetadataModel, config: ResolverConfig) -> Resolution {
    Validator::new(config)
        .resolve_all(model, &CancelToken::new())
        .expect("model is well formed")
}

pub fn parallel() -> ResolverConfig {
    ResolverConfig {
        parallel: true,
        worker_threads: Some(4),
        ..ResolverConfig::default()
    }
}

/// How often the node is constructed across all expressions of the graph
///
/// A recipe's own call is its definition, only the references inside it count.
pub fn invocations(graph: &InjectionGraph, node: NodeId) -> usize {
    fn count(expr: &Expr, node: NodeId) -> usize {
        match expr {
            Expr::Invoke { node: invoked, args } => {
                usize::from(*invoked == node) + args.iter().map(|arg| count(arg, node)).sum::<usize>()
            }
            Expr::Recurrent(referenced) => usize::from(*referenced == node),
            _ => 0,
        }
    }

    let recipe_args = graph
        .recipes
        .values()
        .filter_map(|recipe| match recipe {
            Expr::Invoke { args, .. } => Some(args),
            _ => None,
        })
        .flatten();

    graph
        .providers
        .iter()
        .map(|provider| &provider.expr)
        .chain(graph.scoped_slots.iter().map(|slot| &slot.init))
        .chain(graph.builders.iter().flat_map(|builder| builder.args.iter()))
        .chain(graph.children.iter().flat_map(|child| child.args.iter().map(|(_, expr)| expr)))
        .chain(recipe_args)
        .map(|expr| count(expr, node))
        .sum()
}
