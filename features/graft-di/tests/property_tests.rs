//! Property-based tests for graph resolution
//!
//! Uses proptest to verify invariants over randomly wired models:
//! 1. Determinism - the same model always yields the same resolution, sequential or parallel
//! 2. Ordering - nodes only depend on nodes created before them
//! 3. Scoped singularity - a scoped node is constructed exactly once
//! 4. Qualifier isolation - a qualified request only ever matches its own qualifier

mod common;

use std::collections::BTreeSet;

use common::{invocations, key, labelled, parallel, resolve, resolve_with};
use graft_di::{FactoryMetadata, InjectorMetadata, MetadataModel, ModelBuilder, SpecificationMetadata};
use proptest::{prelude::*, sample::Index};

/// Per type: whether it is scoped, and which other types it takes as parameters
fn layers() -> impl Strategy<Value = Vec<(bool, Vec<Index>)>> {
    prop::collection::vec(
        (any::<bool>(), prop::collection::vec(any::<Index>(), 0..3)),
        1..8,
    )
}

/// `T<i>` for every layer, each one exposed by a provider
///
/// When `acyclic` is set, parameters only point at lower layers.
fn wired_model(layers: &[(bool, Vec<Index>)], acyclic: bool) -> MetadataModel {
    let mut specification = SpecificationMetadata::new("Core");
    for (layer, (scoped, parameters)) in layers.iter().enumerate() {
        let mut factory = FactoryMetadata::new(format!("make_t{layer}"), key(&format!("T{layer}")));
        if *scoped {
            factory = factory.scoped();
        }
        let bound = if acyclic { layer } else { layers.len() };
        if bound > 0 {
            for parameter in parameters {
                factory = factory.parameter(key(&format!("T{}", parameter.index(bound))));
            }
        }
        specification = specification.factory(factory);
    }

    let injector = (0..layers.len()).fold(
        InjectorMetadata::new("App").specification("Core"),
        |injector, layer| injector.provider(format!("t{layer}"), key(&format!("T{layer}"))),
    );

    ModelBuilder::new()
        .add_specification(specification)
        .add_injector(injector)
        .build()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn resolution_is_deterministic(layers in layers(), acyclic in any::<bool>()) {
        let model = wired_model(&layers, acyclic);

        let first = resolve(&model);
        prop_assert_eq!(&first, &resolve(&model));
        prop_assert_eq!(&first, &resolve_with(&model, parallel()));
    }

    #[test]
    fn acyclic_models_resolve_in_dependency_order(layers in layers()) {
        let model = wired_model(&layers, true);

        let resolution = resolve(&model);
        prop_assert!(resolution.diagnostics.is_empty());

        let graph = resolution.graph("App").unwrap();
        prop_assert_eq!(graph.nodes.len(), layers.len());
        for (index, node) in graph.nodes.iter().enumerate() {
            for dependency in &node.dependencies {
                prop_assert!(dependency.0 < index);
            }
        }
        for slot in &graph.scoped_slots {
            prop_assert_eq!(invocations(graph, slot.node), 1);
        }
    }

    #[test]
    fn qualified_requests_only_match_their_qualifier(
        declared in prop::collection::btree_set("[a-d]", 0..4),
        requested in "[a-d]",
    ) {
        let specification = declared.iter().fold(SpecificationMetadata::new("Ports"), |specification, label| {
            specification.factory(FactoryMetadata::new(format!("port_{label}"), labelled("int", label)))
        });
        let model = ModelBuilder::new()
            .add_specification(specification)
            .add_injector(
                InjectorMetadata::new("App")
                    .specification("Ports")
                    .provider("port", labelled("int", &requested)),
            )
            .build();

        let resolution = resolve(&model);
        match resolution.graph("App") {
            Some(graph) => {
                prop_assert!(declared.contains(&requested));
                prop_assert_eq!(&graph.nodes[0].key, &labelled("int", &requested));
            }
            None => prop_assert!(!declared.contains(&requested)),
        }

        // Requests never resolve to a neighbour's binding
        let keys: BTreeSet<_> = resolution
            .graphs
            .values()
            .flat_map(|graph| graph.keys.keys().cloned())
            .collect();
        prop_assert!(keys.iter().all(|key| key == &labelled("int", &requested)));
    }
}
