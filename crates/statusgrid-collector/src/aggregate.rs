//! Outage classification and display grouping.
//!
//! Both functions are pure and depend only on the order of their input,
//! so repeated calls over the same result set always agree.

use std::fmt;

use serde::Serialize;

use statusgrid_config::DEFAULT_GROUP;

use crate::types::ServiceResult;

/// Aggregate health of all configured services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outage {
    /// Every service is passing (or none are configured).
    None,
    /// Some, but not all, services are failing.
    Partial,
    /// Every service is failing.
    Full,
}

impl Outage {
    pub fn label(self) -> &'static str {
        match self {
            Outage::None => "None",
            Outage::Partial => "Partial",
            Outage::Full => "Full",
        }
    }

    /// Severity as a number, for metrics: 0 none, 1 partial, 2 full.
    pub fn level(self) -> u8 {
        match self {
            Outage::None => 0,
            Outage::Partial => 1,
            Outage::Full => 2,
        }
    }
}

impl fmt::Display for Outage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classify a result set by how many services are passing.
///
/// An empty set is `None`: with nothing configured, nothing is down.
pub fn classify(results: &[ServiceResult]) -> Outage {
    let passing = results.iter().filter(|r| r.status).count();

    if passing == results.len() {
        Outage::None
    } else if passing == 0 {
        Outage::Full
    } else {
        Outage::Partial
    }
}

/// Results sharing a display group, in configuration order.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceGroup {
    pub name: String,
    pub results: Vec<ServiceResult>,
}

impl ServiceGroup {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            results: Vec::new(),
        }
    }

    pub fn passing(&self) -> usize {
        self.results.iter().filter(|r| r.status).count()
    }
}

/// Group results by their service's display group.
///
/// The default group always comes first, even when empty. Every other group
/// appears in the order it is first seen.
pub fn group(results: &[ServiceResult]) -> Vec<ServiceGroup> {
    let mut groups = vec![ServiceGroup::new(DEFAULT_GROUP)];

    for result in results {
        let name = result.group_name();
        match groups.iter_mut().find(|g| g.name == name) {
            Some(g) => g.results.push(result.clone()),
            None => {
                let mut g = ServiceGroup::new(name);
                g.results.push(result.clone());
                groups.push(g);
            }
        }
    }

    groups
}
