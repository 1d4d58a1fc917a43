use chrono::Local;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{
    derive_id, load_config, read_config, save_config, AppConfig, ConnectionInput,
    ConnectionProfile, QueryInput, SavedQuery,
};
use crate::entity::resolve_entity;
use crate::error::{LitehouseError, Result};

/// Handle to the persisted application state
///
/// Every mutation runs load-mutate-persist under one lock: the backing file is
/// re-read, the change is applied to that copy, the copy is written atomically,
/// and only then does the in-memory state move forward. A failed write leaves
/// both the file and memory at the previous state.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    state: Mutex<AppConfig>,
}

impl ConfigStore {
    /// Open the store, creating the backing file with defaults if absent
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let config = load_config(&path)?;
        Ok(Self {
            path,
            state: Mutex::new(config),
        })
    }

    /// Path of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the current state
    #[must_use]
    pub fn snapshot(&self) -> AppConfig {
        self.state.lock().clone()
    }

    #[must_use]
    pub fn secret_key(&self) -> String {
        self.state.lock().secret_key.clone()
    }

    /// All connections, sorted by name
    #[must_use]
    pub fn connections(&self) -> Vec<ConnectionProfile> {
        let mut connections: Vec<_> = self.state.lock().connections.values().cloned().collect();
        connections.sort_by(|a, b| a.name.cmp(&b.name));
        connections
    }

    pub fn connection(&self, id: &str) -> Result<ConnectionProfile> {
        self.state.lock().connections.get(id).cloned().ok_or_else(|| connection_not_found(id))
    }

    /// The connection queries should run against
    ///
    /// Fails when no connection is enabled, or when the enabled id no longer
    /// names a stored connection.
    pub fn enabled_connection(&self) -> Result<ConnectionProfile> {
        let state = self.state.lock();

        if state.enabled_connection.is_empty() {
            return Err(LitehouseError::no_enabled_connection());
        }

        state.connections.get(&state.enabled_connection).cloned().ok_or_else(|| {
            LitehouseError::not_found(format!(
                "The current enabled connection ({}) no longer exists. \
                 Please enable a valid connection.",
                state.enabled_connection
            ))
        })
    }

    /// Add a connection and make it the enabled one
    ///
    /// Returns the new connection id. Fails with `Conflict` if a connection with
    /// the same derived id already exists; the store is left unchanged.
    pub fn create_connection(&self, input: ConnectionInput) -> Result<String> {
        input.validate()?;
        let id = derive_id(&input.name);

        self.mutate(|config| {
            let name = input.name.trim();
            // a renamed connection keeps its old id, so check names as well
            if config.connections.contains_key(&id)
                || config.connections.values().any(|c| c.name.trim() == name)
            {
                return Err(LitehouseError::conflict(format!(
                    "This connection ({name}) already exists and cannot be added."
                )));
            }

            let profile = input.into_profile(id.clone());
            info!(id = %id, name = %profile.name, "connection created");
            config.connections.insert(id.clone(), profile);
            config.enabled_connection = id.clone();
            Ok(id)
        })
    }

    /// Replace the connection stored under `id`
    ///
    /// The id and the enabled pointer do not change. Renaming onto the name of
    /// another connection, or onto a name whose derived id another connection
    /// holds, fails with `Conflict`.
    pub fn update_connection(&self, id: &str, input: ConnectionInput) -> Result<()> {
        input.validate()?;

        self.mutate(|config| {
            if !config.connections.contains_key(id) {
                return Err(connection_not_found(id));
            }

            let name = input.name.trim();
            let name_id = derive_id(name);
            let taken = (name_id != id && config.connections.contains_key(&name_id))
                || config.connections.values().any(|c| c.id != id && c.name.trim() == name);
            if taken {
                return Err(LitehouseError::conflict(format!(
                    "Another connection is already named ({name})."
                )));
            }

            let profile = input.into_profile(id.to_string());
            info!(id = %id, name = %profile.name, "connection updated");
            config.connections.insert(id.to_string(), profile);
            Ok(())
        })
    }

    /// Remove a connection, returning it
    ///
    /// If it was enabled, the enabled pointer moves to the remaining connection
    /// with the lowest id, or is cleared when none remain.
    pub fn delete_connection(&self, id: &str) -> Result<ConnectionProfile> {
        self.mutate(|config| {
            let removed = config.connections.remove(id).ok_or_else(|| connection_not_found(id))?;

            if config.enabled_connection == id {
                config.enabled_connection =
                    config.connections.keys().next().cloned().unwrap_or_default();
            }

            info!(
                id = %id,
                name = %removed.name,
                enabled = %config.enabled_connection,
                "connection deleted"
            );
            Ok(removed)
        })
    }

    pub fn set_enabled_connection(&self, id: &str) -> Result<()> {
        self.mutate(|config| {
            if !config.connections.contains_key(id) {
                return Err(connection_not_found(id));
            }
            config.enabled_connection = id.to_string();
            info!(id = %id, "connection enabled");
            Ok(())
        })
    }

    /// All saved queries, newest first
    #[must_use]
    pub fn saved_queries(&self) -> Vec<SavedQuery> {
        let mut queries: Vec<_> = self.state.lock().saved_queries.values().cloned().collect();
        queries.sort_by(|a, b| b.save_date.cmp(&a.save_date).then_with(|| a.name.cmp(&b.name)));
        queries
    }

    pub fn saved_query(&self, id: &str) -> Result<SavedQuery> {
        self.state.lock().saved_queries.get(id).cloned().ok_or_else(|| query_not_found(id))
    }

    /// Persist a query definition, labelling it with its root entity
    ///
    /// Fails with `Conflict` if a query with the same derived id exists.
    pub fn save_query(&self, input: QueryInput) -> Result<String> {
        input.validate()?;
        let id = derive_id(&input.name);

        self.mutate(|config| {
            if config.saved_queries.contains_key(&id) {
                return Err(LitehouseError::conflict(format!(
                    "This query ({}) already exists and cannot be added.",
                    input.name.trim()
                )));
            }

            let query = SavedQuery {
                id: id.clone(),
                name: input.name.trim().to_string(),
                entity: resolve_entity(&input.text),
                text: input.text,
                limit: input.limit,
                offset: input.offset,
                save_date: Local::now().naive_local(),
            };
            info!(id = %id, name = %query.name, entity = %query.entity, "query saved");
            config.saved_queries.insert(id.clone(), query);
            Ok(id)
        })
    }

    /// Remove a saved query, returning it
    pub fn delete_query(&self, id: &str) -> Result<SavedQuery> {
        self.mutate(|config| {
            let removed = config.saved_queries.remove(id).ok_or_else(|| query_not_found(id))?;
            info!(id = %id, name = %removed.name, "query deleted");
            Ok(removed)
        })
    }

    fn mutate<T>(&self, operation: impl FnOnce(&mut AppConfig) -> Result<T>) -> Result<T> {
        let mut state = self.state.lock();

        let mut next = if self.path.exists() {
            read_config(&self.path)?
        } else {
            state.clone()
        };
        let value = operation(&mut next)?;

        save_config(&self.path, &next)?;
        *state = next;
        Ok(value)
    }
}

fn connection_not_found(id: &str) -> LitehouseError {
    LitehouseError::not_found(format!("connection '{id}' does not exist"))
}

fn query_not_found(id: &str) -> LitehouseError {
    LitehouseError::not_found(format!("saved query '{id}' does not exist"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthMode;

    fn input(name: &str) -> ConnectionInput {
        ConnectionInput {
            name: name.to_string(),
            base_url: format!("https://{}.example.com", name.to_lowercase()),
            username: "user".to_string(),
            password: "pass".to_string(),
            auth_mode: AuthMode::Basic,
            ..Default::default()
        }
    }

    fn open_temp() -> (tempfile::TempDir, ConfigStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::open(dir.path().join("config.json")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_create_enables_new_connection() {
        let (_dir, store) = open_temp();
        let first = store.create_connection(input("Alpha")).unwrap();
        assert_eq!(store.snapshot().enabled_connection, first);

        let second = store.create_connection(input("Beta")).unwrap();
        assert_eq!(store.snapshot().enabled_connection, second);
        assert_eq!(store.enabled_connection().unwrap().name, "Beta");
    }

    #[test]
    fn test_update_keeps_id_and_enabled_pointer() {
        let (_dir, store) = open_temp();
        let alpha = store.create_connection(input("Alpha")).unwrap();
        let beta = store.create_connection(input("Beta")).unwrap();

        let mut changed = input("Alpha Renamed");
        changed.rest_version = Some("3.0".to_string());
        store.update_connection(&alpha, changed).unwrap();

        let updated = store.connection(&alpha).unwrap();
        assert_eq!(updated.id, alpha);
        assert_eq!(updated.name, "Alpha Renamed");
        assert_eq!(updated.rest_version, "3.0");
        assert_eq!(store.snapshot().enabled_connection, beta);
    }

    #[test]
    fn test_update_rejects_duplicate_name() {
        let (_dir, store) = open_temp();
        let alpha = store.create_connection(input("Alpha")).unwrap();
        store.create_connection(input("Beta")).unwrap();

        let err = store.update_connection(&alpha, input("Beta")).unwrap_err();
        assert!(matches!(err, LitehouseError::Conflict(_)));
        assert_eq!(store.connection(&alpha).unwrap().name, "Alpha");
    }

    #[test]
    fn test_update_rejects_name_owning_another_id() {
        let (_dir, store) = open_temp();
        let alpha = store.create_connection(input("Alpha")).unwrap();
        store.update_connection(&alpha, input("Gamma")).unwrap();
        let beta = store.create_connection(input("Beta")).unwrap();

        // "Alpha" is free as a name but its derived id still belongs to Gamma
        let err = store.update_connection(&beta, input("Alpha")).unwrap_err();
        assert!(matches!(err, LitehouseError::Conflict(_)));
        assert_eq!(store.connection(&beta).unwrap().name, "Beta");

        // renaming back onto its own derived id is allowed
        store.update_connection(&alpha, input("Alpha")).unwrap();
        assert_eq!(store.connection(&alpha).unwrap().name, "Alpha");
    }

    #[test]
    fn test_create_rejects_name_taken_by_rename() {
        let (_dir, store) = open_temp();
        let alpha = store.create_connection(input("Alpha")).unwrap();
        store.update_connection(&alpha, input("Gamma")).unwrap();

        let err = store.create_connection(input("Gamma")).unwrap_err();
        assert!(matches!(err, LitehouseError::Conflict(_)));
        assert_eq!(store.connections().len(), 1);
    }

    #[test]
    fn test_unknown_ids_are_not_found() {
        let (_dir, store) = open_temp();
        assert!(matches!(
            store.update_connection("nope", input("X")),
            Err(LitehouseError::NotFound(_))
        ));
        assert!(matches!(store.delete_connection("nope"), Err(LitehouseError::NotFound(_))));
        assert!(matches!(store.set_enabled_connection("nope"), Err(LitehouseError::NotFound(_))));
        assert!(matches!(store.delete_query("nope"), Err(LitehouseError::NotFound(_))));
        assert!(matches!(store.saved_query("nope"), Err(LitehouseError::NotFound(_))));
    }

    #[test]
    fn test_enabled_connection_when_none() {
        let (_dir, store) = open_temp();
        let err = store.enabled_connection().unwrap_err();
        assert_eq!(err.hint(), Some("Please create and enable a connection."));
    }

    #[test]
    fn test_save_query_resolves_entity() {
        let (_dir, store) = open_temp();
        let id = store
            .save_query(QueryInput {
                name: "Open invoices".to_string(),
                text: "SELECT Id FROM invoice WHERE Status = 'OPEN'".to_string(),
                limit: 50,
                offset: 0,
            })
            .unwrap();

        let saved = store.saved_query(&id).unwrap();
        assert_eq!(saved.entity, "INVOICE");
        assert_eq!(saved.limit, 50);
        assert_eq!(store.saved_queries().len(), 1);
    }
}
