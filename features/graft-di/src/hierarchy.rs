use std::collections::BTreeMap;

use crate::{
    cancel::{CancelToken, Cancelled},
    catalog::Catalog,
    errors::Diagnostic,
    graph_builder::GraphBuilder,
    types::{InjectorId, TypeKey},
};

/// Where an injector stands between building and freezing
pub(crate) enum InjectorState<'c, 'a> {
    Building(GraphBuilder<'c, 'a>),
    /// Registration failed, nothing was resolved
    Failed(Vec<Diagnostic>),
    Cancelled,
}

/// Satisfies child requirements from the ancestors of the requesting injector
///
/// A key counts as supplied by an injector if it resolves there, or if every parent
/// of that injector supplies it. Results are memoized per injector and key.
struct Linker<'l, 'c, 'a> {
    catalog: &'c Catalog<'a>,
    cancel: &'l CancelToken,
    supplied: BTreeMap<(&'a InjectorId, TypeKey), bool>,
}

/// Settle every pending child requirement, in injector id order
pub(crate) fn link<'c, 'a>(
    catalog: &'c Catalog<'a>,
    states: &mut BTreeMap<&'a InjectorId, InjectorState<'c, 'a>>,
    cancel: &CancelToken,
) -> Result<(), Cancelled> {
    cancel.check()?;

    let mut linker = Linker {
        catalog,
        cancel,
        supplied: BTreeMap::new(),
    };

    let ids: Vec<&'a InjectorId> = states.keys().copied().collect();
    for id in ids {
        let pending = match states.get(id) {
            Some(InjectorState::Building(builder)) => builder.pending(),
            _ => continue,
        };
        if pending.is_empty() {
            continue;
        }

        tracing::debug!(
            "Looking up {} child requirements of '{}' in its ancestors",
            pending.len(),
            id
        );

        for requirement in pending {
            let supplied = linker.from_parents(states, id, &requirement.key)?;
            let Some(InjectorState::Building(builder)) = states.get_mut(id) else {
                continue;
            };
            if supplied {
                builder.satisfy(&requirement);
            } else {
                builder.unsatisfied(&requirement);
            }
        }
    }

    Ok(())
}

impl<'l, 'c, 'a> Linker<'l, 'c, 'a> {
    /// Whether all parents of `injector` supply `key` - a root has nobody to ask
    fn from_parents(
        &mut self,
        states: &mut BTreeMap<&'a InjectorId, InjectorState<'c, 'a>>,
        injector: &InjectorId,
        key: &TypeKey,
    ) -> Result<bool, Cancelled> {
        let catalog = self.catalog;
        let parents = catalog.parents(injector);
        if parents.is_empty() {
            return Ok(false);
        }

        for &(parent, _) in parents {
            if !self.supply(states, parent, key)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn supply(
        &mut self,
        states: &mut BTreeMap<&'a InjectorId, InjectorState<'c, 'a>>,
        injector: &'a InjectorId,
        key: &TypeKey,
    ) -> Result<bool, Cancelled> {
        if let Some(known) = self.supplied.get(&(injector, key.clone())) {
            return Ok(*known);
        }

        // Injectors without a graph pass nothing on, not even what their parents hold
        let local = match states.get_mut(injector) {
            Some(InjectorState::Building(builder)) => builder.export(key, self.cancel)?.is_some(),
            _ => {
                self.supplied.insert((injector, key.clone()), false);
                return Ok(false);
            }
        };

        let supplied = local || {
            let inherited = self.from_parents(states, injector, key)?;
            if inherited {
                if let Some(InjectorState::Building(builder)) = states.get_mut(injector) {
                    builder.forward(key);
                }
            }
            inherited
        };

        self.supplied.insert((injector, key.clone()), supplied);
        Ok(supplied)
    }
}
