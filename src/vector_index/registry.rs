//! Named index registry with build reservations.

use std::collections::HashMap;
use std::sync::Arc;

use log::{info, warn};
use parking_lot::RwLock;

use crate::error::{Result, VantageError};
use crate::vector_index::builder::IndexBuilder;
use crate::vector_index::index::Index;
use crate::vector_search::batch::BatchResults;
use crate::vector_search::result::SearchResult;

/// Lifecycle of a named index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Empty,
    Building,
    Built,
}

#[derive(Debug)]
enum RegistryEntry {
    Building,
    Built(Arc<Index>),
}

#[derive(Debug, Default)]
pub struct IndexRegistry {
    entries: RwLock<HashMap<String, RegistryEntry>>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `name` for a build in progress.
    ///
    /// The name stays in the `Building` state until the reservation is
    /// committed; dropping it uncommitted releases the name.
    pub fn reserve(&self, name: &str) -> Result<Reservation<'_>> {
        if name.is_empty() {
            return Err(VantageError::invalid_parameter(
                "index identifier must not be empty",
            ));
        }

        let mut guard = self.entries.write();
        if guard.contains_key(name) {
            return Err(VantageError::duplicate_name(name));
        }
        guard.insert(name.to_string(), RegistryEntry::Building);

        Ok(Reservation {
            registry: self,
            name: name.to_string(),
            committed: false,
        })
    }

    /// Build `builder` under `name` and publish the result.
    pub fn build(&self, builder: &IndexBuilder, name: &str) -> Result<Arc<Index>> {
        let reservation = self.reserve(name)?;
        match builder.build(name) {
            Ok(index) => {
                reservation.commit(Arc::clone(&index))?;
                Ok(index)
            }
            Err(e) => {
                warn!("Build of index {name} failed: {e}");
                Err(e)
            }
        }
    }

    /// Publish an already built index under its own name.
    pub fn register(&self, index: Arc<Index>) -> Result<()> {
        let mut guard = self.entries.write();
        if guard.contains_key(index.name()) {
            return Err(VantageError::duplicate_name(index.name()));
        }
        info!("Registered index {}", index.name());
        guard.insert(index.name().to_string(), RegistryEntry::Built(index));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<Index>> {
        match self.entries.read().get(name) {
            Some(RegistryEntry::Built(index)) => Ok(Arc::clone(index)),
            Some(RegistryEntry::Building) => Err(VantageError::not_built(name)),
            None => Err(VantageError::not_found(format!("index {name}"))),
        }
    }

    pub fn state(&self, name: &str) -> IndexState {
        match self.entries.read().get(name) {
            Some(RegistryEntry::Built(_)) => IndexState::Built,
            Some(RegistryEntry::Building) => IndexState::Building,
            None => IndexState::Empty,
        }
    }

    pub fn search(&self, name: &str, query: &[f32], k: usize) -> Result<SearchResult> {
        self.get(name)?.search(query, k)
    }

    pub fn search_batched<Q>(
        &self,
        name: &str,
        queries: &[Q],
        k: usize,
        parallel: bool,
    ) -> Result<BatchResults>
    where
        Q: AsRef<[f32]> + Sync,
    {
        self.get(name)?.search_batched(queries, k, parallel)
    }

    /// Remove a built index; in-flight readers keep their `Arc`.
    pub fn unregister(&self, name: &str) -> Result<Arc<Index>> {
        let mut guard = self.entries.write();
        match guard.remove(name) {
            Some(RegistryEntry::Built(index)) => {
                info!("Unregistered index {name}");
                Ok(index)
            }
            Some(RegistryEntry::Building) => {
                guard.insert(name.to_string(), RegistryEntry::Building);
                Err(VantageError::not_built(name))
            }
            None => Err(VantageError::not_found(format!("index {name}"))),
        }
    }

    /// Names of built indexes, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .read()
            .iter()
            .filter(|(_, entry)| matches!(entry, RegistryEntry::Built(_)))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Number of built indexes.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .values()
            .filter(|entry| matches!(entry, RegistryEntry::Built(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A claimed registry name awaiting its index.
#[derive(Debug)]
pub struct Reservation<'a> {
    registry: &'a IndexRegistry,
    name: String,
    committed: bool,
}

impl Reservation<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Publish `index` under the reserved name.
    ///
    /// The index must have been built under that same name; otherwise the
    /// reservation is released and nothing is published.
    pub fn commit(mut self, index: Arc<Index>) -> Result<()> {
        if index.name() != self.name {
            return Err(VantageError::invalid_parameter(format!(
                "index {} cannot be published under reserved name {}",
                index.name(),
                self.name
            )));
        }

        info!("Registered index {}", self.name);
        self.registry
            .entries
            .write()
            .insert(self.name.clone(), RegistryEntry::Built(index));
        self.committed = true;
        Ok(())
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.registry.entries.write().remove(&self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::DistanceMeasure;
    use crate::vector_index::builder::create_builder;

    fn builder() -> IndexBuilder {
        create_builder(
            (0..20u64).map(|i| (i, vec![i as f32, 1.0])).collect(),
            3,
            DistanceMeasure::SquaredL2,
        )
        .unwrap()
    }

    #[test]
    fn test_build_and_search() {
        let registry = IndexRegistry::new();
        registry.build(&builder(), "numbers").unwrap();

        assert_eq!(registry.state("numbers"), IndexState::Built);
        assert_eq!(registry.names(), vec!["numbers".to_string()]);
        let result = registry.search("numbers", &[4.0, 1.0], 1).unwrap();
        assert_eq!(result.ids(), vec![4]);
    }

    #[test]
    fn test_duplicate_name() {
        let registry = IndexRegistry::new();
        registry.build(&builder(), "numbers").unwrap();
        assert!(matches!(
            registry.build(&builder(), "numbers"),
            Err(VantageError::DuplicateName(_))
        ));

        let other = builder().build("numbers").unwrap();
        assert!(matches!(
            registry.register(other),
            Err(VantageError::DuplicateName(_))
        ));
    }

    #[test]
    fn test_building_entry_is_not_built() {
        let registry = IndexRegistry::new();
        let reservation = registry.reserve("pending").unwrap();

        assert_eq!(registry.state("pending"), IndexState::Building);
        assert!(matches!(
            registry.get("pending"),
            Err(VantageError::NotBuilt(_))
        ));
        assert!(matches!(
            registry.search("pending", &[0.0, 0.0], 1),
            Err(VantageError::NotBuilt(_))
        ));
        assert!(matches!(
            registry.build(&builder(), "pending"),
            Err(VantageError::DuplicateName(_))
        ));
        assert!(registry.is_empty());

        drop(reservation);
        assert_eq!(registry.state("pending"), IndexState::Empty);
    }

    #[test]
    fn test_commit_rejects_index_built_under_another_name() {
        let registry = IndexRegistry::new();
        let reservation = registry.reserve("pending").unwrap();
        let other = builder().build("elsewhere").unwrap();

        assert!(matches!(
            reservation.commit(other),
            Err(VantageError::InvalidParameter(_))
        ));
        assert_eq!(registry.state("pending"), IndexState::Empty);
        assert_eq!(registry.state("elsewhere"), IndexState::Empty);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_failed_build_releases_name() {
        let registry = IndexRegistry::new();
        let bad = builder().with_partitioning(0, 1, 5, 1);
        assert!(registry.build(&bad, "numbers").is_err());
        assert_eq!(registry.state("numbers"), IndexState::Empty);
        assert!(registry.build(&builder(), "numbers").is_ok());
    }

    #[test]
    fn test_unregister() {
        let registry = IndexRegistry::new();
        let index = registry.build(&builder(), "numbers").unwrap();
        let removed = registry.unregister("numbers").unwrap();
        assert_eq!(removed.build_id(), index.build_id());
        assert!(matches!(
            registry.get("numbers"),
            Err(VantageError::NotFound(_))
        ));
        assert!(registry.unregister("numbers").is_err());

        // The name can be rebuilt once released.
        registry.build(&builder(), "numbers").unwrap();
        assert_eq!(registry.len(), 1);
    }
}
