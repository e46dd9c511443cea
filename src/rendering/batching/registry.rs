use std::{
    collections::{BTreeSet, HashMap},
    fmt::Debug,
    hash::Hash,
};

use crate::{
    error::RenderResult,
    rendering::{
        backend::GraphicsBackend,
        batching::{group_key::AttributeGroupKey, line_batch::LineBatch, path_entry::PathEntry},
        render_context::RenderContext,
    },
};

/// Where a placed path lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLocation {
    pub group: usize,
    pub batch: usize,
}

/// All batches sharing one attribute group key
#[derive(Debug)]
struct BatchGroup<K> {
    key: AttributeGroupKey,
    batches: Vec<LineBatch<K>>,
    // Indices into `batches` that are not full
    spare: BTreeSet<usize>,
}

impl<K: Copy + Eq + Debug> BatchGroup<K> {
    fn new(key: AttributeGroupKey) -> Self {
        Self {
            key,
            batches: Vec::new(),
            spare: BTreeSet::new(),
        }
    }

    fn path_count(&self) -> usize {
        self.batches.iter().map(LineBatch::len).sum()
    }
}

/// Outcome of one [`BatchRegistry::render_all`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderSummary {
    pub drawn: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Places paths into line batches keyed by their visual attributes.
///
/// Placement is first-fit: a path goes into the lowest-indexed non-full batch
/// of its group, and a new batch is created only when there is none.
#[derive(Debug)]
pub struct BatchRegistry<K> {
    capacity: usize,
    groups: Vec<BatchGroup<K>>,
    group_index: HashMap<AttributeGroupKey, usize>,
    owners: HashMap<K, BatchLocation>,
}

impl<K: Copy + Eq + Hash + Debug> BatchRegistry<K> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            groups: Vec::new(),
            group_index: HashMap::new(),
            owners: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Adds `entry` to a batch of `group_key`. An entry already placed is moved.
    pub fn place(
        &mut self,
        entry: PathEntry<K>,
        group_key: AttributeGroupKey,
    ) -> RenderResult<BatchLocation> {
        let key = entry.key();
        if self.owners.contains_key(&key) {
            log::debug!("{:?} placed twice, moving it", key);
            self.remove(key);
        }

        let group = match self.group_index.get(&group_key) {
            Some(&group) => group,
            None => {
                self.groups.push(BatchGroup::new(group_key));
                let group = self.groups.len() - 1;
                self.group_index.insert(group_key, group);
                group
            }
        };

        let capacity = self.capacity;
        let batch_group = &mut self.groups[group];

        let batch = loop {
            match batch_group.spare.first().copied() {
                Some(batch) if batch_group.batches[batch].is_full() => {
                    batch_group.spare.remove(&batch);
                }
                Some(batch) => break batch,
                None => {
                    batch_group.batches.push(LineBatch::new(capacity, group_key));
                    let batch = batch_group.batches.len() - 1;
                    batch_group.spare.insert(batch);
                    log::debug!("Created batch {} in group {}", batch, group);
                    break batch;
                }
            }
        };

        batch_group.batches[batch].add_path(entry)?;
        if batch_group.batches[batch].is_full() {
            batch_group.spare.remove(&batch);
        }

        let location = BatchLocation { group, batch };
        self.owners.insert(key, location);
        Ok(location)
    }

    /// Detaches the entry for `key`. Returns `None` if it was not placed.
    pub fn remove(&mut self, key: K) -> Option<PathEntry<K>> {
        let location = self.owners.remove(&key)?;
        let group = &mut self.groups[location.group];
        let entry = group.batches[location.batch].remove_path(key);
        group.spare.insert(location.batch);
        entry
    }

    /// Moves `key` to `group_key` if it is placed under a different key.
    /// Returns whether the path moved.
    pub fn regroup(&mut self, key: K, group_key: AttributeGroupKey) -> RenderResult<bool> {
        let Some(location) = self.owners.get(&key).copied() else {
            return Ok(false);
        };

        if self.groups[location.group].key == group_key {
            return Ok(false);
        }

        let Some(entry) = self.remove(key) else {
            return Ok(false);
        };

        log::debug!("Regrouping {:?}", key);
        self.place(entry, group_key)?;
        Ok(true)
    }

    pub fn contains(&self, key: K) -> bool {
        self.owners.contains_key(&key)
    }

    pub fn location_of(&self, key: K) -> Option<BatchLocation> {
        self.owners.get(&key).copied()
    }

    pub fn group_key_of(&self, key: K) -> Option<AttributeGroupKey> {
        self.owners
            .get(&key)
            .map(|location| self.groups[location.group].key)
    }

    pub fn batch(&self, location: BatchLocation) -> Option<&LineBatch<K>> {
        self.groups.get(location.group)?.batches.get(location.batch)
    }

    pub fn batch_of(&self, key: K) -> Option<&LineBatch<K>> {
        self.location_of(key).and_then(|location| self.batch(location))
    }

    pub fn entry_mut(&mut self, key: K) -> Option<&mut PathEntry<K>> {
        let location = self.owners.get(&key)?;
        self.groups[location.group].batches[location.batch].entry_mut(key)
    }

    /// Every batch in draw order: group creation order, then batch order.
    pub fn batches(&self) -> impl Iterator<Item = &LineBatch<K>> {
        self.groups.iter().flat_map(|group| group.batches.iter())
    }

    /// Batches of `group_key` that currently have room.
    pub fn spare_batches(&self, group_key: AttributeGroupKey) -> Vec<usize> {
        self.group_index
            .get(&group_key)
            .map(|&group| self.groups[group].spare.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn batch_count(&self) -> usize {
        self.groups.iter().map(|group| group.batches.len()).sum()
    }

    pub fn empty_batch_count(&self) -> usize {
        self.batches().filter(|batch| batch.is_empty()).count()
    }

    pub fn path_count(&self) -> usize {
        self.owners.len()
    }

    pub fn row_count(&self) -> usize {
        self.batches().map(LineBatch::row_count).sum()
    }

    /// Renders every batch. A batch that fails is logged and skipped.
    pub fn render_all(
        &mut self,
        rc: &mut RenderContext,
        backend: &mut dyn GraphicsBackend,
    ) -> RenderSummary {
        let mut summary = RenderSummary::default();

        for (group_index, group) in self.groups.iter_mut().enumerate() {
            for (batch_index, batch) in group.batches.iter_mut().enumerate() {
                match batch.render(rc, backend) {
                    Ok(true) => summary.drawn += 1,
                    Ok(false) => summary.skipped += 1,
                    Err(err) => {
                        summary.failed += 1;
                        log::warn!(
                            "Abandoned draw of batch {} in group {}: {}",
                            batch_index,
                            group_index,
                            err
                        );
                    }
                }
            }
        }

        summary
    }

    /// Drops empty batches beyond `max_per_group` in every group, and groups
    /// that no longer hold any path.
    pub fn prune_empty_batches(&mut self, max_per_group: usize) {
        let mut changed = false;

        self.groups.retain_mut(|group| {
            if group.path_count() == 0 {
                changed = true;
                return false;
            }

            let mut empties_kept = 0;
            let before = group.batches.len();
            group.batches.retain(|batch| {
                if !batch.is_empty() {
                    return true;
                }
                empties_kept += 1;
                empties_kept <= max_per_group
            });

            if group.batches.len() != before {
                changed = true;
                group.spare = group
                    .batches
                    .iter()
                    .enumerate()
                    .filter(|(_, batch)| !batch.is_full())
                    .map(|(index, _)| index)
                    .collect();
            }

            true
        });

        if changed {
            self.reindex();
        }
    }

    pub fn clear(&mut self) {
        self.groups.clear();
        self.group_index.clear();
        self.owners.clear();
    }

    fn reindex(&mut self) {
        self.group_index.clear();
        self.owners.clear();

        for (group_index, group) in self.groups.iter().enumerate() {
            self.group_index.insert(group.key, group_index);
            for (batch_index, batch) in group.batches.iter().enumerate() {
                for entry in batch.entries() {
                    self.owners.insert(
                        entry.key(),
                        BatchLocation {
                            group: group_index,
                            batch: batch_index,
                        },
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;
    use crate::{
        math::{color::Color, geo::Position},
        rendering::batching::tessellate::PathType,
        shapes::attributes::ShapeAttributes,
    };

    fn key_for(color: Color) -> AttributeGroupKey {
        AttributeGroupKey::new(&ShapeAttributes::default().with_color(color), false, false)
    }

    fn entry(key: u32) -> PathEntry<u32> {
        PathEntry::new(
            key,
            vec![Position::new(0.0, 0.0, 0.0), Position::new(1.0, 1.0, 0.0)],
            PathType::GreatCircle,
            2,
            Color::WHITE,
            1.0,
        )
    }

    fn assert_consistent(registry: &BatchRegistry<u32>) {
        let mut seen = HashSet::new();

        for (group_index, group) in registry.groups.iter().enumerate() {
            assert_eq!(registry.group_index.get(&group.key), Some(&group_index));

            for (batch_index, batch) in group.batches.iter().enumerate() {
                assert!(batch.len() <= batch.capacity());
                assert_eq!(batch.is_full(), batch.len() == batch.capacity());
                assert_eq!(group.spare.contains(&batch_index), !batch.is_full());

                for entry in batch.entries() {
                    assert!(seen.insert(entry.key()), "{} is in two batches", entry.key());
                    assert_eq!(
                        registry.location_of(entry.key()),
                        Some(BatchLocation {
                            group: group_index,
                            batch: batch_index
                        })
                    );
                }
            }
        }

        assert_eq!(seen.len(), registry.path_count());
    }

    #[test]
    fn test_first_fit_placement() {
        let mut registry = BatchRegistry::new(2);
        let red = key_for(Color::RED);

        for key in 0..5 {
            registry.place(entry(key), red).unwrap();
        }

        assert_eq!(registry.batch_count(), 3);
        assert_eq!(registry.location_of(0).unwrap().batch, 0);
        assert_eq!(registry.location_of(1).unwrap().batch, 0);
        assert_eq!(registry.location_of(4).unwrap().batch, 2);

        // A hole in the first batch is filled before the last batch
        registry.remove(1);
        assert_eq!(registry.spare_batches(red), vec![0, 2]);
        registry.place(entry(5), red).unwrap();
        assert_eq!(registry.location_of(5).unwrap().batch, 0);
        assert_consistent(&registry);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut registry: BatchRegistry<u32> = BatchRegistry::new(4);
        assert!(registry.remove(3).is_none());
        assert_eq!(registry.batch_count(), 0);
    }

    #[test]
    fn test_regroup_scenario() {
        let mut registry = BatchRegistry::new(2);
        let white = key_for(Color::WHITE);

        registry.place(entry(1), white).unwrap();
        registry.place(entry(2), white).unwrap();
        assert_eq!(registry.location_of(1), registry.location_of(2));
        let original = registry.location_of(1).unwrap();
        assert!(registry.batch(original).unwrap().is_full());

        // Same key: nothing moves
        assert!(!registry.regroup(1, white).unwrap());

        assert!(registry.regroup(2, key_for(Color::RED)).unwrap());
        assert_ne!(registry.location_of(1), registry.location_of(2));
        assert!(!registry.batch(original).unwrap().is_full());
        assert_eq!(registry.group_key_of(2), Some(key_for(Color::RED)));
        assert_consistent(&registry);
    }

    #[test]
    fn test_empty_batches_are_retained_then_pruned() {
        let mut registry = BatchRegistry::new(1);
        let red = key_for(Color::RED);

        for key in 0..4 {
            registry.place(entry(key), red).unwrap();
        }
        for key in 1..4 {
            registry.remove(key);
        }

        assert_eq!(registry.batch_count(), 4);
        assert_eq!(registry.empty_batch_count(), 3);

        // Empty batches are reused before anything new is created
        registry.place(entry(9), red).unwrap();
        assert_eq!(registry.batch_count(), 4);
        registry.remove(9);

        registry.prune_empty_batches(1);
        assert_eq!(registry.batch_count(), 2);
        assert_eq!(registry.empty_batch_count(), 1);
        assert_consistent(&registry);

        registry.remove(0);
        registry.prune_empty_batches(1);
        assert_eq!(registry.group_count(), 0);
        assert_eq!(registry.batch_count(), 0);
    }

    #[test]
    fn test_prune_keeps_locations_valid() {
        let mut registry = BatchRegistry::new(1);
        let red = key_for(Color::RED);
        let blue = key_for(Color::BLUE);

        for key in 0..3 {
            registry.place(entry(key), red).unwrap();
        }
        registry.place(entry(10), blue).unwrap();
        registry.remove(0);
        registry.remove(1);

        registry.prune_empty_batches(0);
        assert_eq!(registry.empty_batch_count(), 0);
        assert!(registry.batch_of(2).unwrap().contains(2));
        assert!(registry.batch_of(10).unwrap().contains(10));
        assert_consistent(&registry);
    }

    #[test]
    fn test_membership_invariants_under_random_churn() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let keys = [
            key_for(Color::RED),
            key_for(Color::GREEN),
            key_for(Color::BLUE),
        ];
        let mut registry = BatchRegistry::new(3);

        for step in 0..2000 {
            let path = rng.gen_range(0..40u32);
            match rng.gen_range(0..4) {
                0 | 1 => {
                    let group = keys[rng.gen_range(0..keys.len())];
                    registry.place(entry(path), group).unwrap();
                }
                2 => {
                    registry.remove(path);
                }
                _ => {
                    let group = keys[rng.gen_range(0..keys.len())];
                    registry.regroup(path, group).unwrap();
                }
            }

            if step % 100 == 0 {
                registry.prune_empty_batches(1);
            }

            assert_consistent(&registry);
        }
    }
}
