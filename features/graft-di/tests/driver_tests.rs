//! Batch driving: metadata loading, config, cancellation and parallel resolution

mod common;

use common::{factory, key, parallel, resolve, resolve_with};
use std::{thread::sleep, time::Duration};

use graft_config::provider::ConfigProvider;
use graft_di::{
    Binding, CancelToken, DependencyInterfaceMetadata, DiagnosticKind, Expr, InjectorMetadata,
    MetadataModel, ModelBuilder, ResolverConfig, SlotId, SpecificationMetadata, Validator,
};
use rstest::*;

fn shop() -> MetadataModel {
    serde_json::from_str(include_str!("fixtures/shop.json")).expect("fixture is valid JSON")
}

/// A dozen injectors, a few of them broken, some of them nested
fn batch() -> MetadataModel {
    let mut builder = ModelBuilder::new()
        .add_interface(DependencyInterfaceMetadata::new("Host").key(key("Clock")))
        .add_specification(
            SpecificationMetadata::new("Core")
                .factory(factory("Clock", &[]).scoped())
                .factory(factory("Db", &["Clock"]))
                .factory(factory("Cache", &["Db", "Clock"])),
        )
        .add_specification(SpecificationMetadata::new("Broken").factory(factory("Mailer", &["Smtp"])));

    for index in 0..12 {
        let mut injector = InjectorMetadata::new(format!("App{index:02}"))
            .specification("Core")
            .provider("cache", key("Cache"));
        if index % 4 == 0 {
            injector = injector
                .specification("Broken")
                .provider("mailer", key("Mailer"));
        }
        if index % 3 == 0 {
            injector = injector.child("plugin", format!("Plugin{index:02}"));
            builder = builder.add_injector(
                InjectorMetadata::new(format!("Plugin{index:02}"))
                    .dependency("Host")
                    .provider("clock", key("Clock")),
            );
        }
        builder = builder.add_injector(injector);
    }

    builder.build()
}

#[rstest]
fn json_metadata_resolves() {
    // Arrange
    let model = shop();

    // Act
    let resolution = resolve(&model);

    // Assert
    resolution.ensure_clean().unwrap();

    let shop = resolution.graph("Shop").unwrap();
    let catalog = shop.keys[&key("Catalog")];
    assert_eq!(
        shop.children[0].args,
        vec![(
            key("Catalog"),
            Expr::Invoke {
                node: catalog,
                args: vec![Expr::Scoped(SlotId(0))],
            }
        )]
    );

    let web = resolution.graph("Web").unwrap();
    let handler = web.node_for(&key("Handler")).unwrap();
    assert!(matches!(&handler.binding, Binding::Auto { ty, .. } if ty.as_str() == "CatalogHandler"));
    assert_eq!(
        web.providers[0].expr,
        Expr::Invoke {
            node: web.keys[&key("CatalogHandler")],
            args: vec![Expr::External { key: key("Catalog") }],
        }
    );
}

#[rstest]
fn diagnostics_render_as_a_list() {
    let model = ModelBuilder::new()
        .add_injector(InjectorMetadata::new("App").provider("db", key("Db")))
        .build();

    let error = resolve(&model).ensure_clean().unwrap_err();
    let rendered = error.to_string();
    assert!(rendered.starts_with("Resolution had one or more errors:"));
    assert!(rendered.contains("- [App] missing binding:"));
    assert!(rendered.contains("(via Db)"));
}

#[rstest]
fn cancelled_batches_produce_neither_graphs_nor_diagnostics() {
    // Arrange
    let model = batch();
    let cancel = CancelToken::new();
    cancel.cancel();

    // Act
    let resolution = Validator::default().resolve_all(&model, &cancel).unwrap();

    // Assert
    assert!(resolution.graphs.is_empty());
    assert!(resolution.diagnostics.is_empty());
    assert_eq!(resolution.cancelled.len(), model.injectors.len());
    assert!(!resolution.is_complete());
}

#[rstest]
fn configured_timeouts_do_not_outlive_their_batch() {
    // Arrange
    let model = shop();
    let cancel = CancelToken::new();
    let bounded = Validator::new(ResolverConfig {
        timeout_ms: Some(20),
        ..ResolverConfig::default()
    });

    // Act
    bounded.resolve_all(&model, &cancel).unwrap();
    sleep(Duration::from_millis(60));
    let second = Validator::default().resolve_all(&model, &cancel).unwrap();

    // Assert
    assert!(!cancel.is_cancelled());
    assert!(second.cancelled.is_empty());
    assert_eq!(second.graphs.len(), 2);
}

#[rstest]
fn expired_timeouts_cancel_the_batch_only() {
    let cancel = CancelToken::new();
    let expired = Validator::new(ResolverConfig {
        timeout_ms: Some(0),
        ..ResolverConfig::default()
    });

    let resolution = expired.resolve_all(&batch(), &cancel).unwrap();

    assert!(resolution.graphs.is_empty());
    assert_eq!(resolution.cancelled.len(), batch().injectors.len());
    assert!(!cancel.is_cancelled());
}

#[rstest]
fn parallel_resolution_matches_sequential_resolution() {
    let model = batch();

    let sequential = resolve(&model);
    let parallel = resolve_with(&model, parallel());

    assert_eq!(sequential, parallel);
    assert_eq!(sequential.graphs.len(), 9 + 4);
    assert!(sequential
        .diagnostics
        .iter()
        .all(|diagnostic| diagnostic.kind == DiagnosticKind::MissingBinding));
    assert_eq!(
        sequential
            .diagnostics
            .iter()
            .map(|diagnostic| diagnostic.injector.as_str())
            .collect::<Vec<_>>(),
        vec!["App00", "App04", "App08"]
    );
}

#[rstest]
fn resolution_is_repeatable() {
    let model = batch();
    assert_eq!(resolve(&model), resolve(&model));
}

#[rstest]
fn layered_config_steers_the_validator() {
    // Arrange
    let mut provider = ConfigProvider::initialize();
    provider
        .add_json("graft.json", r#"{ "parallel": true, "worker_threads": 2 }"#)
        .unwrap()
        .add_env_vars([("GRAFT_AUTO_BINDING", "off"), ("PATH", "/usr/bin")])
        .unwrap();
    let config = provider.resolve();

    // Act
    let resolution = Validator::new(config).resolve_all(&shop(), &CancelToken::new()).unwrap();

    // Assert
    assert!(resolution.graph("Shop").is_some());
    assert_eq!(resolution.diagnostics.len(), 1);
    assert_eq!(resolution.diagnostics[0].injector.as_str(), "Web");
    assert_eq!(resolution.diagnostics[0].kind, DiagnosticKind::MissingBinding);
}
