//! Client and scope types.

use serde::{Deserialize, Serialize};

/// Registered OAuth 2.0 client.
///
/// Clients are owned by configuration and referenced, never mutated, by
/// requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    /// Unique client identifier.
    pub client_id: String,
}

impl Client {
    /// Creates a client reference.
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
        }
    }
}

/// Named permission unit granted to a client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    /// Scope name, e.g. `read`.
    pub name: String,
}

impl Scope {
    /// Creates a scope.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Builds an ordered scope list from names, keeping duplicates.
    #[must_use]
    pub fn list<I, S>(names: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names.into_iter().map(Self::new).collect()
    }
}
