use std::collections::BTreeMap;

use graft_config::config::ResolverConfig;
use rayon::prelude::*;

use crate::{
    cancel::{CancelToken, Cancelled},
    catalog::Catalog,
    container::Resolution,
    errors::MetadataError,
    graph_builder::GraphBuilder,
    hierarchy::{self, InjectorState},
    metadata::{InjectorMetadata, MetadataModel},
};

/// Runs a whole batch of injectors through resolution
///
/// 1. Every injector is built on its own, optionally on a worker pool
/// 2. Child requirements are settled against the ancestors, in injector id order
/// 3. Each injector is frozen into its graph, or reports its diagnostics
///
/// The outcome only depends on the model and the config, never on scheduling.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    config: ResolverConfig,
}

impl Validator {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve every injector of the model
    ///
    /// Fails only if the model itself is malformed - problems of single injectors
    /// end up as diagnostics of the returned [`Resolution`].
    pub fn resolve_all(
        &self,
        model: &MetadataModel,
        cancel: &CancelToken,
    ) -> Result<Resolution, MetadataError> {
        let catalog = Catalog::new(model)?;

        // The batch gets its own deadline, the caller's token stays reusable
        let batch = match self.config.timeout() {
            Some(timeout) => cancel.child_with_timeout(timeout),
            None => cancel.clone(),
        };
        let cancel = &batch;

        let injectors: Vec<&InjectorMetadata> = catalog.injectors().collect();
        tracing::info!(
            "Resolving {} injectors{}",
            injectors.len(),
            if self.config.parallel { " in parallel" } else { "" }
        );

        let built = self.build_all(&catalog, &injectors, cancel);
        let mut states: BTreeMap<_, _> = injectors
            .iter()
            .map(|&injector| &injector.id)
            .zip(built)
            .collect();

        if hierarchy::link(&catalog, &mut states, cancel).is_err() {
            tracing::warn!("Resolution was cancelled while linking the injector hierarchy");
            for state in states.values_mut() {
                *state = InjectorState::Cancelled;
            }
        }

        let mut resolution = Resolution::default();
        for (id, state) in states {
            match state {
                InjectorState::Building(builder) => match builder.finish() {
                    Ok(graph) => {
                        resolution.graphs.insert(id.clone(), graph);
                    }
                    Err(diagnostics) => resolution.diagnostics.extend(diagnostics),
                },
                InjectorState::Failed(diagnostics) => resolution.diagnostics.extend(diagnostics),
                InjectorState::Cancelled => resolution.cancelled.push(id.clone()),
            }
        }

        if let Some(timeout) = self.config.timeout() {
            if batch.is_expired() && !resolution.cancelled.is_empty() {
                tracing::warn!("Resolution timed out after {:?}", timeout);
            }
        }

        tracing::info!(
            "Resolved {} injectors with {} diagnostics, {} cancelled",
            resolution.graphs.len(),
            resolution.diagnostics.len(),
            resolution.cancelled.len()
        );

        Ok(resolution)
    }

    fn build_all<'c, 'a>(
        &self,
        catalog: &'c Catalog<'a>,
        injectors: &[&'a InjectorMetadata],
        cancel: &CancelToken,
    ) -> Vec<InjectorState<'c, 'a>> {
        let auto_binding = self.config.auto_binding;
        let sequential = || -> Vec<InjectorState<'c, 'a>> {
            injectors
                .iter()
                .map(|&injector| build_one(catalog, injector, auto_binding, cancel))
                .collect()
        };

        if !self.config.parallel {
            return sequential();
        }

        let parallel = || -> Vec<InjectorState<'c, 'a>> {
            injectors
                .par_iter()
                .map(|&injector| build_one(catalog, injector, auto_binding, cancel))
                .collect()
        };

        match self.config.worker_threads {
            None => parallel(),
            Some(threads) => match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
                Ok(pool) => pool.install(parallel),
                Err(error) => {
                    tracing::warn!(
                        "Could not start {} worker threads, resolving sequentially: {}",
                        threads,
                        error
                    );
                    sequential()
                }
            },
        }
    }
}

/// Build the local graph of one injector
fn build_one<'c, 'a>(
    catalog: &'c Catalog<'a>,
    injector: &'a InjectorMetadata,
    auto_binding: bool,
    cancel: &CancelToken,
) -> InjectorState<'c, 'a> {
    if cancel.is_cancelled() {
        return InjectorState::Cancelled;
    }
    let _span = tracing::debug_span!("injector", id = %injector.id).entered();

    let mut builder = match GraphBuilder::new(catalog, injector, auto_binding) {
        Ok(builder) => builder,
        Err(diagnostics) => {
            tracing::debug!(
                "'{}' has {} conflicting declarations",
                injector.id,
                diagnostics.len()
            );
            return InjectorState::Failed(diagnostics);
        }
    };

    match builder.build_local(cancel) {
        Ok(()) => InjectorState::Building(builder),
        Err(Cancelled) => {
            tracing::debug!("Building '{}' was cancelled", builder.id());
            InjectorState::Cancelled
        }
    }
}

/// Resolve every injector of the model with the default config
pub fn resolve_all(model: &MetadataModel, cancel: &CancelToken) -> Result<Resolution, MetadataError> {
    Validator::default().resolve_all(model, cancel)
}
