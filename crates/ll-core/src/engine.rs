//! # Marketplace
//!
//! The assembled engine handed to UI collaborators. All four parts share one
//! [`EntityStore`] and hold no state of their own between calls, so any number of
//! instances can run against the same gateway.

use std::sync::Arc;

use crate::catalog::Catalog;
use crate::moderation::Moderation;
use crate::notify::Notifier;
use crate::store::EntityStore;
use crate::traits::DocumentStore;
use crate::workflow::Workflow;

#[derive(Clone)]
pub struct Marketplace {
    pub catalog: Catalog,
    pub workflow: Workflow,
    pub moderation: Moderation,
    pub notifications: Notifier,
}

impl Marketplace {
    pub fn new(gateway: Arc<dyn DocumentStore>) -> Self {
        let store = EntityStore::new(gateway);
        let notifications = Notifier::new(store.clone());
        Self {
            catalog: Catalog::new(store.clone()),
            workflow: Workflow::new(store.clone(), notifications.clone()),
            moderation: Moderation::new(store, notifications.clone()),
            notifications,
        }
    }
}
