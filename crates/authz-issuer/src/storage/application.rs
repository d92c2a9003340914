//! Application lookup.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::IssuanceResult;
use crate::types::Application;

/// Resolves applications by identifier.
///
/// Persistent handle stores keep only the application id and use this trait
/// to rehydrate the audience, lifetime, and signing credential.
#[async_trait]
pub trait ApplicationStorage: Send + Sync {
    /// Finds an application by its identifier.
    ///
    /// Returns `None` if the application is not registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_id(&self, id: &str) -> IssuanceResult<Option<Application>>;
}

/// Fixed set of applications loaded at startup.
#[derive(Debug, Default, Clone)]
pub struct StaticApplicationStorage {
    applications: HashMap<String, Application>,
}

impl StaticApplicationStorage {
    /// Creates storage from a list of applications.
    ///
    /// A later application with a duplicate id replaces the earlier one.
    #[must_use]
    pub fn new(applications: impl IntoIterator<Item = Application>) -> Self {
        Self {
            applications: applications
                .into_iter()
                .map(|app| (app.id.clone(), app))
                .collect(),
        }
    }

    /// Adds or replaces an application.
    #[must_use]
    pub fn with_application(mut self, application: Application) -> Self {
        self.applications
            .insert(application.id.clone(), application);
        self
    }
}

#[async_trait]
impl ApplicationStorage for StaticApplicationStorage {
    async fn find_by_id(&self, id: &str) -> IssuanceResult<Option<Application>> {
        Ok(self.applications.get(id).cloned())
    }
}
