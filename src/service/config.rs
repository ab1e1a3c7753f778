//! The ordered set of units handed to the manager.

use crate::error::{AppdError, OrderingList, Result};
use crate::service::unit::Unit;
use crate::service::Service;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::Span;

#[derive(Deserialize)]
struct RawConfig {
    #[serde(default)]
    units: Vec<Unit>,
}

impl TryFrom<RawConfig> for Config {
    type Error = AppdError;

    fn try_from(raw: RawConfig) -> Result<Self> {
        let mut config = Config::new();
        for unit in raw.units {
            unit.validate()?;
            config.add_unit(unit)?;
        }
        Ok(config)
    }
}

/// Units in insertion order, indexed by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "RawConfig")]
pub struct Config {
    units: Vec<Unit>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Config {
    /// Creates an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a unit, rejecting duplicate names.
    pub fn add_unit(&mut self, unit: Unit) -> Result<()> {
        if self.index.contains_key(&unit.name) {
            return Err(AppdError::DuplicateUnit { name: unit.name });
        }
        self.index.insert(unit.name.clone(), self.units.len());
        self.units.push(unit);
        Ok(())
    }

    /// Returns the units in insertion order.
    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    /// Looks up a unit by name.
    pub fn get(&self, name: &str) -> Option<&Unit> {
        self.index.get(name).map(|&i| &self.units[i])
    }

    /// Returns the number of units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns true if no units are configured.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Checks that every `before`/`after` entry names a configured unit.
    pub fn validate(&self) -> Result<()> {
        for unit in &self.units {
            let lists = [
                (OrderingList::Before, &unit.before),
                (OrderingList::After, &unit.after),
            ];
            for (list, names) in lists {
                if let Some(missing) = names.iter().find(|n| !self.index.contains_key(*n)) {
                    return Err(AppdError::DanglingReference {
                        unit: unit.name.clone(),
                        list,
                        missing: missing.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Validates the config, assigns each unit its 1-based `seq` and returns
    /// one service per unit.
    ///
    /// Units keep their insertion order: `before`, `after` and `priority` are
    /// checked but do not reorder anything.
    pub fn services(&mut self, span: &Span) -> Result<Vec<Service>> {
        self.validate()?;
        for (i, unit) in self.units.iter_mut().enumerate() {
            unit.seq = i + 1;
        }
        Ok(self
            .units
            .iter()
            .map(|unit| Service::new(unit.seq, unit.clone(), span))
            .collect())
    }
}
