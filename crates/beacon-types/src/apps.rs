//! Application collections returned by registry read views.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::instance::InstanceInfo;

/// All instances of one application, as seen by a read view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    /// Application name.
    pub name: String,
    instances: Vec<InstanceInfo>,
}

impl Application {
    /// Create an empty application.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instances: Vec::new(),
        }
    }

    /// Add an instance, replacing any previous one with the same id.
    pub fn add_instance(&mut self, instance: InstanceInfo) {
        if let Some(existing) = self.instances.iter_mut().find(|i| i.instance_id == instance.instance_id) {
            *existing = instance;
        } else {
            self.instances.push(instance);
        }
    }

    /// Append an instance without deduplicating by id.
    ///
    /// Change replays need one entry per recorded mutation, so a
    /// register-then-cancel of the same instance keeps both records in
    /// order.
    pub fn push_instance(&mut self, instance: InstanceInfo) {
        self.instances.push(instance);
    }

    /// Look up an instance by id.
    pub fn get_by_instance_id(&self, instance_id: &str) -> Option<&InstanceInfo> {
        self.instances.iter().find(|i| i.instance_id == instance_id)
    }

    /// All instances of this application.
    pub fn instances(&self) -> &[InstanceInfo] {
        &self.instances
    }

    /// Number of instances.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// True when no instances are present.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

/// A set of applications plus the versioning metadata delta clients use to
/// detect drift.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Applications {
    /// Monotonic version installed from the response cache counters on
    /// delta reads; 1 on full snapshots.
    pub version: u64,
    /// Reconcile hash of the snapshot this set was derived from.
    pub apps_hash_code: String,
    applications: BTreeMap<String, Application>,
}

impl Applications {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an application, replacing any previous one with the same name.
    pub fn add_application(&mut self, app: Application) {
        self.applications.insert(app.name.clone(), app);
    }

    /// Look up an application by name.
    pub fn get_registered_application(&self, name: &str) -> Option<&Application> {
        self.applications.get(name)
    }

    /// Look up or create the application with the given name.
    pub fn get_or_insert(&mut self, name: &str) -> &mut Application {
        self.applications
            .entry(name.to_string())
            .or_insert_with(|| Application::new(name))
    }

    /// Iterate all applications in name order.
    pub fn registered_applications(&self) -> impl Iterator<Item = &Application> {
        self.applications.values()
    }

    /// Number of applications.
    pub fn len(&self) -> usize {
        self.applications.len()
    }

    /// True when no applications are present.
    pub fn is_empty(&self) -> bool {
        self.applications.is_empty()
    }

    /// Total instance count across all applications.
    pub fn instance_count(&self) -> usize {
        self.applications.values().map(Application::len).sum()
    }

    /// Status-distribution fingerprint of this set.
    ///
    /// One `STATUS_count_` segment per status present, in status-name
    /// order. Clients compare it against the hash shipped with deltas to
    /// detect drift, so the format is frozen.
    pub fn reconcile_hash(&self) -> String {
        let mut counts: BTreeMap<&'static str, u64> = BTreeMap::new();
        for app in self.applications.values() {
            for instance in app.instances() {
                *counts.entry(instance.status.as_str()).or_insert(0) += 1;
            }
        }
        let mut hash = String::new();
        for (status, count) in counts {
            hash.push_str(status);
            hash.push('_');
            hash.push_str(&count.to_string());
            hash.push('_');
        }
        hash
    }
}
