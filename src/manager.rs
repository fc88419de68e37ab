// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Loaded-bag bookkeeping for interactive multi-selection.
//!
//! [`BagManager`] owns the set of currently loaded containers and the
//! topic set algebra across them. It is a plain single-writer state
//! store for the front-end context: mutations happen here, and exactly
//! one [`BagEvent`] is emitted to observers after each effective
//! mutation has been applied. Observers receive the event, never the
//! container itself, so a notification can never re-enter the state it
//! describes.
//!
//! Worker threads never see the manager; they get immutable
//! [`BagIndex`] snapshots taken at job-submission time, so a filter job
//! cannot observe a bag being unloaded mid-flight.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::core::Result;
use crate::io::{BagIndex, BagReader};

/// One loaded container.
#[derive(Debug, Clone)]
pub struct LoadedBag {
    /// Path the container was loaded from
    pub path: PathBuf,
    /// Index built at load time
    pub index: BagIndex,
    /// Whether the bag participates in `common_topics`
    pub selected: bool,
}

/// Change notification emitted after each effective mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum BagEvent {
    /// A container was loaded
    Loaded(PathBuf),
    /// A container was unloaded
    Unloaded(PathBuf),
    /// A container's selection flag changed
    SelectionChanged(PathBuf, bool),
    /// All containers were unloaded at once
    Cleared,
}

type Observer = Box<dyn FnMut(&BagEvent)>;

/// Aggregates channel sets and metadata across loaded containers.
#[derive(Default)]
pub struct BagManager {
    bags: BTreeMap<PathBuf, LoadedBag>,
    observers: Vec<Observer>,
    default_whitelists: BTreeMap<String, PathBuf>,
}

impl BagManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager carrying the configured default whitelist paths.
    pub fn with_config(config: &Config) -> Self {
        Self {
            default_whitelists: config.whitelists.clone(),
            ..Self::default()
        }
    }

    /// Register an observer invoked once per effective mutation, after
    /// the mutation is applied.
    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: FnMut(&BagEvent) + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    fn notify(&mut self, event: BagEvent) {
        for observer in &mut self.observers {
            observer(&event);
        }
    }

    /// Load a container and register it, keyed by path.
    ///
    /// Loading an already-loaded path is idempotent: the existing entry
    /// is returned without reopening the file and without notification.
    /// Open errors propagate to the caller; nothing is registered on
    /// failure.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<&LoadedBag> {
        let path = path.as_ref().to_path_buf();

        if !self.bags.contains_key(&path) {
            // The reader handle is released as soon as the index is
            // built; workers re-open from an index snapshot.
            let reader = BagReader::open(&path)?;
            let index = reader.index().clone();
            self.bags.insert(
                path.clone(),
                LoadedBag {
                    path: path.clone(),
                    index,
                    selected: true,
                },
            );
            self.notify(BagEvent::Loaded(path.clone()));
        }

        Ok(self.bags.get(&path).expect("entry inserted above"))
    }

    /// Unload a container. Unloading an unknown path is a no-op and
    /// emits no notification.
    pub fn unload<P: AsRef<Path>>(&mut self, path: P) {
        let path = path.as_ref().to_path_buf();
        if self.bags.remove(&path).is_some() {
            self.notify(BagEvent::Unloaded(path));
        }
    }

    /// Set a bag's selection flag. Returns true when the flag changed;
    /// setting the current value mutates nothing and emits nothing.
    pub fn set_selected<P: AsRef<Path>>(&mut self, path: P, selected: bool) -> bool {
        let path = path.as_ref().to_path_buf();
        match self.bags.get_mut(&path) {
            Some(bag) if bag.selected != selected => {
                bag.selected = selected;
                self.notify(BagEvent::SelectionChanged(path, selected));
                true
            }
            _ => false,
        }
    }

    /// Unload everything.
    pub fn clear(&mut self) {
        if !self.bags.is_empty() {
            self.bags.clear();
            self.notify(BagEvent::Cleared);
        }
    }

    /// Look up one loaded bag.
    pub fn get<P: AsRef<Path>>(&self, path: P) -> Option<&LoadedBag> {
        self.bags.get(path.as_ref())
    }

    /// Loaded bags in path order.
    pub fn bags(&self) -> impl Iterator<Item = &LoadedBag> {
        self.bags.values()
    }

    /// Number of loaded bags.
    pub fn len(&self) -> usize {
        self.bags.len()
    }

    /// Whether no bags are loaded.
    pub fn is_empty(&self) -> bool {
        self.bags.is_empty()
    }

    /// Immutable index snapshot for job submission.
    pub fn snapshot<P: AsRef<Path>>(&self, path: P) -> Option<BagIndex> {
        self.bags.get(path.as_ref()).map(|bag| bag.index.clone())
    }

    /// Intersection of channel names across all selected bags.
    ///
    /// Bags load selected; deselecting narrows the intersection. With
    /// zero selected bags the result is the empty set.
    pub fn common_topics(&self) -> BTreeSet<String> {
        let mut selected = self.bags.values().filter(|bag| bag.selected);

        let mut common = match selected.next() {
            Some(bag) => bag.index.channel_names(),
            None => return BTreeSet::new(),
        };

        for bag in selected {
            let names = bag.index.channel_names();
            common.retain(|name| names.contains(name));
        }

        common
    }

    /// Union of channel names across all loaded bags, annotated with how
    /// many bags contain each channel.
    pub fn union_topics(&self) -> BTreeMap<String, usize> {
        let mut union = BTreeMap::new();
        for bag in self.bags.values() {
            for name in bag.index.channels.keys() {
                *union.entry(name.clone()).or_insert(0) += 1;
            }
        }
        union
    }

    /// Default whitelist paths from the configuration, keyed by name.
    pub fn default_whitelists(&self) -> &BTreeMap<String, PathBuf> {
        &self.default_whitelists
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_topics_empty_manager() {
        let manager = BagManager::new();
        assert!(manager.common_topics().is_empty());
        assert!(manager.union_topics().is_empty());
        assert!(manager.is_empty());
    }

    #[test]
    fn test_load_error_propagates_and_registers_nothing() {
        let mut manager = BagManager::new();
        let result = manager.load("/nonexistent/file.bag");
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().kind(), "open");
        assert!(manager.is_empty());
    }

    #[test]
    fn test_unload_unknown_is_noop() {
        let mut manager = BagManager::new();
        let events = std::rc::Rc::new(std::cell::RefCell::new(0usize));
        let counter = events.clone();
        manager.subscribe(move |_| *counter.borrow_mut() += 1);

        manager.unload("/never/loaded.bag");
        manager.clear();
        assert_eq!(*events.borrow(), 0);
    }

    #[test]
    fn test_set_selected_on_unknown_path() {
        let mut manager = BagManager::new();
        assert!(!manager.set_selected("/never/loaded.bag", false));
    }

    #[test]
    fn test_with_config_carries_whitelists() {
        let config = crate::config::Config::from_toml(
            "[whitelists]\nsensors = \"/etc/bagsift/sensors.txt\"\n",
        )
        .unwrap();
        let manager = BagManager::with_config(&config);
        assert_eq!(
            manager.default_whitelists().get("sensors"),
            Some(&PathBuf::from("/etc/bagsift/sensors.txt"))
        );
    }
}
