use std::{collections::BTreeMap, fmt::Debug};

use crate::{
    dependency_graph::InjectionGraph,
    errors::{Diagnostic, Diagnostics},
    types::InjectorId,
};

/// Outcome of one resolution batch
///
/// Every injector ends up in exactly one of three places: it has a graph, it has
/// diagnostics, or it was cancelled before it could finish.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub graphs: BTreeMap<InjectorId, InjectionGraph>,
    /// Ordered by injector id, then by discovery
    pub diagnostics: Vec<Diagnostic>,
    pub cancelled: Vec<InjectorId>,
}
impl Debug for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut states: BTreeMap<&InjectorId, &str> = BTreeMap::new();
        for injector in self.graphs.keys() {
            states.insert(injector, "resolved");
        }
        for diagnostic in &self.diagnostics {
            states.insert(&diagnostic.injector, "failed");
        }
        for injector in &self.cancelled {
            states.insert(injector, "cancelled");
        }

        let mut map = f.debug_struct("Resolution");
        for (injector, state) in states {
            map.field(injector.as_str(), &state);
        }
        map.finish()
    }
}

impl Resolution {
    pub fn graph(&self, injector: &str) -> Option<&InjectionGraph> {
        self.graphs.get(&InjectorId::from(injector))
    }

    pub fn diagnostics_for<'r>(&'r self, injector: &'r str) -> impl Iterator<Item = &'r Diagnostic> {
        self.diagnostics
            .iter()
            .filter(move |diagnostic| diagnostic.injector.as_str() == injector)
    }

    /// Nothing failed and nothing was cancelled
    pub fn is_complete(&self) -> bool {
        self.diagnostics.is_empty() && self.cancelled.is_empty()
    }

    /// Fails with all diagnostics of the batch, if there are any
    pub fn ensure_clean(&self) -> Result<(), Diagnostics> {
        if self.diagnostics.is_empty() {
            return Ok(());
        }
        Err(Diagnostics {
            diagnostics: self.diagnostics.clone(),
        })
    }
}
