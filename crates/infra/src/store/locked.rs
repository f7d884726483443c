use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use stockyard_core::{DomainError, DomainResult};

type Row<V> = Arc<Mutex<V>>;

/// In-memory table with one mutex per row.
///
/// The map lock is only held long enough to look rows up; row locks are then
/// taken with the map lock released, so writers on different rows never block
/// each other. Every mutation runs on a working copy that is written back only
/// when the closure returns `Ok`.
///
/// Multi-row operations lock rows in ascending key order. Callers must never
/// re-enter the same store from inside a closure.
#[derive(Debug)]
pub struct LockedStore<K, V> {
    entity: &'static str,
    rows: RwLock<HashMap<K, Row<V>>>,
}

impl<K, V> LockedStore<K, V>
where
    K: Clone + Eq + Hash + Ord + Display,
    V: Clone,
{
    /// `entity` names the rows in `NotFound`/`Conflict` errors.
    pub fn new(entity: &'static str) -> Self {
        Self {
            entity,
            rows: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, key: K, value: V) -> DomainResult<()> {
        let mut rows = self.write_map()?;
        if rows.contains_key(&key) {
            return Err(DomainError::conflict(format!(
                "{} {key} already exists",
                self.entity
            )));
        }
        rows.insert(key, Arc::new(Mutex::new(value)));
        Ok(())
    }

    pub fn contains(&self, key: &K) -> bool {
        self.rows
            .read()
            .map(|rows| rows.contains_key(key))
            .unwrap_or(false)
    }

    /// Snapshot of a single row.
    pub fn get(&self, key: &K) -> Option<V> {
        let row = self.row(key)?;
        let guard = row.lock().ok()?;
        Some(guard.clone())
    }

    /// Snapshot of every row (each row read under its own lock).
    pub fn list(&self) -> Vec<V> {
        self.filter(|_| true)
    }

    /// Snapshot of every row matching `pred`.
    pub fn filter<P>(&self, pred: P) -> Vec<V>
    where
        P: Fn(&V) -> bool,
    {
        let rows: Vec<Row<V>> = match self.rows.read() {
            Ok(map) => map.values().cloned().collect(),
            Err(_) => return vec![],
        };

        rows.iter()
            .filter_map(|row| row.lock().ok().map(|guard| guard.clone()))
            .filter(|v| pred(v))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove a row if `guard` accepts its current value.
    ///
    /// The row lock is held while deciding, so no concurrent update can slip in
    /// between the check and the removal.
    pub fn remove_if<G>(&self, key: &K, guard: G) -> DomainResult<V>
    where
        G: FnOnce(&V) -> DomainResult<()>,
    {
        let mut rows = self.write_map()?;
        let row = rows
            .get(key)
            .cloned()
            .ok_or_else(|| DomainError::not_found(self.entity, key))?;

        let value = {
            let current = self.lock_row(key, &row)?;
            guard(&current)?;
            current.clone()
        };
        rows.remove(key);
        Ok(value)
    }

    /// Run `f` against one row; the result is kept only on `Ok`.
    pub fn update<R, F>(&self, key: &K, f: F) -> DomainResult<R>
    where
        F: FnOnce(&mut V) -> DomainResult<R>,
    {
        let row = self
            .row(key)
            .ok_or_else(|| DomainError::not_found(self.entity, key))?;
        let mut guard = self.lock_row(key, &row)?;

        let mut working = guard.clone();
        let out = f(&mut working)?;
        *guard = working;
        Ok(out)
    }

    /// Run `f` against several existing rows at once, all or nothing.
    ///
    /// Keys are de-duplicated; any missing key fails with `NotFound` before a
    /// single row is locked.
    pub fn update_many<R, F>(&self, keys: &[K], f: F) -> DomainResult<R>
    where
        F: FnOnce(&mut BTreeMap<K, V>) -> DomainResult<R>,
    {
        let rows = self.collect_rows(keys, None::<fn(&K) -> V>)?;
        self.run_locked(&rows, f)
    }

    /// Like [`update_many`](Self::update_many), but missing rows are first
    /// materialized with `empty` so the closure always sees every key.
    ///
    /// If the closure fails, rows of this unit that still equal `empty` and
    /// that no other caller holds are dropped again.
    pub fn transact<R, E, F>(&self, keys: &[K], empty: E, f: F) -> DomainResult<R>
    where
        V: PartialEq,
        E: Fn(&K) -> V,
        F: FnOnce(&mut BTreeMap<K, V>) -> DomainResult<R>,
    {
        let rows = self.collect_rows(keys, Some(&empty))?;
        let result = self.run_locked(&rows, f);
        if result.is_err() {
            self.prune_vacant(rows, &empty);
        }
        result
    }

    fn row(&self, key: &K) -> Option<Row<V>> {
        self.rows.read().ok()?.get(key).cloned()
    }

    fn write_map(&self) -> DomainResult<std::sync::RwLockWriteGuard<'_, HashMap<K, Row<V>>>> {
        self.rows
            .write()
            .map_err(|_| DomainError::conflict(format!("{} table lock poisoned", self.entity)))
    }

    fn lock_row<'a>(&self, key: &K, row: &'a Mutex<V>) -> DomainResult<MutexGuard<'a, V>> {
        row.lock().map_err(|_| {
            DomainError::conflict(format!("{} {key} lock poisoned", self.entity))
        })
    }

    /// Resolve rows for `keys` in ascending key order.
    fn collect_rows<E>(&self, keys: &[K], empty: Option<E>) -> DomainResult<Vec<(K, Row<V>)>>
    where
        E: Fn(&K) -> V,
    {
        let mut sorted: Vec<K> = keys.to_vec();
        sorted.sort();
        sorted.dedup();

        let empty = {
            let rows = self
                .rows
                .read()
                .map_err(|_| DomainError::conflict(format!("{} table lock poisoned", self.entity)))?;
            let missing: Option<K> = sorted.iter().find(|k| !rows.contains_key(*k)).cloned();
            match (missing, empty) {
                (None, _) => {
                    return Ok(sorted
                        .into_iter()
                        .filter_map(|k| rows.get(&k).cloned().map(|row| (k, row)))
                        .collect());
                }
                (Some(k), None) => return Err(DomainError::not_found(self.entity, k)),
                (Some(_), Some(empty)) => empty,
            }
        };

        let mut rows = self.write_map()?;
        Ok(sorted
            .into_iter()
            .map(|k| {
                let row = rows
                    .entry(k.clone())
                    .or_insert_with(|| Arc::new(Mutex::new(empty(&k))))
                    .clone();
                (k, row)
            })
            .collect())
    }

    fn prune_vacant<E>(&self, rows: Vec<(K, Row<V>)>, empty: &E)
    where
        V: PartialEq,
        E: Fn(&K) -> V,
    {
        let Ok(mut map) = self.rows.write() else {
            return;
        };
        for (key, row) in rows {
            // Held only by the map and by this call.
            let unshared = Arc::strong_count(&row) == 2
                && map.get(&key).is_some_and(|current| Arc::ptr_eq(current, &row));
            let vacant = unshared && row.try_lock().is_ok_and(|value| *value == empty(&key));
            if vacant {
                map.remove(&key);
            }
        }
    }

    fn run_locked<R, F>(&self, rows: &[(K, Row<V>)], f: F) -> DomainResult<R>
    where
        F: FnOnce(&mut BTreeMap<K, V>) -> DomainResult<R>,
    {
        let mut guards = Vec::with_capacity(rows.len());
        for (key, row) in rows {
            guards.push((key, self.lock_row(key, row)?));
        }

        let mut working: BTreeMap<K, V> = guards
            .iter()
            .map(|(key, guard)| ((*key).clone(), (**guard).clone()))
            .collect();

        let out = f(&mut working)?;

        for (key, guard) in guards.iter_mut() {
            if let Some(value) = working.remove(*key) {
                **guard = value;
            }
        }
        Ok(out)
    }
}
