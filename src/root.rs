use std::sync::Arc;

use crate::error::LivefigError;
use crate::merge;
use crate::notify::ChangeNotifier;
use crate::provider::StoreProvider;
use crate::snapshot::Snapshot;

/// The layered view over all providers, in priority-ascending order: the
/// last provider wins where several hold the same path.
///
/// Reloads are the single place that signals change: every consumer that
/// cares about fresh data subscribes to this root's source on the notifier.
#[derive(Debug)]
pub struct ConfigurationRoot {
    source: String,
    providers: Vec<Arc<StoreProvider>>,
    notifier: ChangeNotifier,
}

impl ConfigurationRoot {
    pub fn new(source: impl Into<String>, notifier: ChangeNotifier) -> Self {
        Self {
            source: source.into(),
            providers: Vec::new(),
            notifier,
        }
    }

    pub fn add_provider(&mut self, provider: StoreProvider) -> Arc<StoreProvider> {
        let provider = Arc::new(provider);
        self.providers.push(Arc::clone(&provider));
        provider
    }

    /// Name this root notifies under.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    pub fn providers(&self) -> &[Arc<StoreProvider>] {
        &self.providers
    }

    /// The merged section across providers.
    pub fn section(&self, section: &str) -> Snapshot {
        self.providers
            .iter()
            .fold(Snapshot::new(), |merged, p| merge::overlay(merged, &p.section(section)))
    }

    /// Whether any provider holds something under `section`.
    pub fn has_prefix(&self, section: &str) -> bool {
        self.providers.iter().any(|p| p.has_prefix(section))
    }

    /// Reload every provider and notify unconditionally.
    pub fn reload(&self) -> Result<(), LivefigError> {
        let result = self.load_all();
        self.notifier.notify(&self.source);
        result.map(|_| ())
    }

    /// Reload every provider and notify only if something changed. Returns
    /// whether it did.
    pub fn refresh(&self) -> Result<bool, LivefigError> {
        let changed = self.load_all()?;
        if changed {
            self.notifier.notify(&self.source);
        }
        Ok(changed)
    }

    fn load_all(&self) -> Result<bool, LivefigError> {
        let mut changed = false;
        for provider in &self.providers {
            changed |= provider.load()?;
        }
        tracing::debug!(source = %self.source, changed, "reloaded providers");
        Ok(changed)
    }
}
