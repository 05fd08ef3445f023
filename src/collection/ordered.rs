use crate::core::{Record, Result, StoreError};
use std::collections::HashSet;

/// Identifier index plus explicit insertion order.
///
/// Both halves are persistent structures, so `clone` is cheap: mutations are
/// staged on a clone and only swapped in once the new state has been persisted.
#[derive(Debug, Clone)]
pub struct OrderedCollection<R: Record> {
    index: im::HashMap<R::Id, R>,
    order: im::Vector<R::Id>,
}

impl<R: Record> Default for OrderedCollection<R> {
    fn default() -> Self {
        Self {
            index: im::HashMap::new(),
            order: im::Vector::new(),
        }
    }
}

impl<R: Record> OrderedCollection<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a collection from an ordered sequence. A repeated identifier keeps
    /// the position of its first occurrence and the value of its last.
    pub fn from_records(records: impl IntoIterator<Item = R>) -> Self {
        let mut collection = Self::new();
        for record in records {
            collection.upsert(record);
        }
        collection
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, id: &R::Id) -> Option<&R> {
        self.index.get(id)
    }

    pub fn contains(&self, id: &R::Id) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &R> + '_ {
        self.order.iter().filter_map(move |id| self.index.get(id))
    }

    pub fn to_vec(&self) -> Vec<R> {
        self.iter().cloned().collect()
    }

    pub fn insert(&mut self, record: R) -> Result<()> {
        let id = record.id().clone();
        if self.index.contains_key(&id) {
            return Err(StoreError::already_exists(&id));
        }
        self.order.push_back(id.clone());
        self.index.insert(id, record);
        Ok(())
    }

    /// Returns `true` when the record was newly appended.
    pub fn upsert(&mut self, record: R) -> bool {
        let id = record.id().clone();
        let appended = !self.index.contains_key(&id);
        if appended {
            self.order.push_back(id.clone());
        }
        self.index.insert(id, record);
        appended
    }

    pub fn update(&mut self, record: R) -> Result<()> {
        let id = record.id().clone();
        match self.index.get_mut(&id) {
            Some(slot) => {
                *slot = record;
                Ok(())
            }
            None => Err(StoreError::not_found(&id)),
        }
    }

    pub fn remove(&mut self, id: &R::Id) -> Result<R> {
        let removed = self
            .index
            .remove(id)
            .ok_or_else(|| StoreError::not_found(id))?;
        if let Some(position) = self.order.iter().position(|candidate| candidate == id) {
            self.order.remove(position);
        }
        Ok(removed)
    }

    /// Removes every id or none of them: the first absent id fails the call
    /// before anything is touched.
    pub fn remove_many(&mut self, ids: &[R::Id]) -> Result<()> {
        if let Some(missing) = ids.iter().find(|id| !self.index.contains_key(*id)) {
            return Err(StoreError::not_found(missing));
        }
        let doomed: HashSet<&R::Id> = ids.iter().collect();
        for id in &doomed {
            self.index.remove(*id);
        }
        self.order.retain(|id| !doomed.contains(id));
        Ok(())
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.order.clear();
    }
}

impl<R: Record> PartialEq for OrderedCollection<R> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}
