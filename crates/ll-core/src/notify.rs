//! # Notification Dispatch
//!
//! Creates one Notification per cross-party transition. Creation is crate-private:
//! only engine transitions fan out notifications, collaborators can only read and
//! acknowledge them.

use chrono::Utc;
use tracing::{error, info};

use crate::error::Result;
use crate::models::{Notification, NotificationKind};
use crate::patch::NotificationRead;
use crate::policy::{authorize, load_actor, Action, Target};
use crate::store::{EntityStore, Versioned};

#[derive(Clone)]
pub struct Notifier {
    store: EntityStore,
}

impl Notifier {
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }

    /// Writes a fresh unread notification for `recipient`.
    ///
    /// Called after the transition it reports has committed. A failure here is
    /// logged and returned; the transition itself stays committed.
    pub(crate) async fn dispatch(
        &self,
        recipient: &str,
        kind: NotificationKind,
        message: String,
    ) -> Result<Notification> {
        let draft = Notification {
            id: String::new(),
            recipient_user_id: recipient.to_string(),
            message,
            kind,
            read: false,
            created_at: Utc::now(),
        };
        match self.store.create(&draft).await {
            Ok(created) => {
                info!(recipient, ?kind, notification = %created.id, "notification sent");
                Ok(created.into_inner())
            }
            Err(err) => {
                error!(recipient, ?kind, %err, "notification could not be written");
                Err(err)
            }
        }
    }

    /// Inbox for one user: unread before read, newest first within each group.
    pub async fn list_for_user(&self, user_id: &str, unread_only: bool) -> Result<Vec<Notification>> {
        let mut inbox: Vec<Notification> = self
            .store
            .list_where(|n: &Notification| {
                n.recipient_user_id == user_id && (!unread_only || !n.read)
            })
            .await?
            .into_iter()
            .map(Versioned::into_inner)
            .collect();
        inbox.sort_by(|a, b| a.read.cmp(&b.read).then(b.created_at.cmp(&a.created_at)));
        Ok(inbox)
    }

    /// Marks one notification read. Idempotent; only the recipient may do it.
    pub async fn mark_read(&self, notification_id: &str, actor_id: &str) -> Result<Notification> {
        let actor = load_actor(&self.store, actor_id).await?;
        let current = self.store.get::<Notification>(notification_id).await?;
        authorize(Action::ReadNotification, &actor, Target::Notification(&current.entity))?;
        if current.read {
            return Ok(current.into_inner());
        }
        let updated = self
            .store
            .overwrite::<Notification, _>(notification_id, &NotificationRead { read: true })
            .await?;
        Ok(updated.into_inner())
    }

    /// Marks every unread notification of the actor read; returns how many changed.
    pub async fn mark_all_read(&self, actor_id: &str) -> Result<usize> {
        let actor = load_actor(&self.store, actor_id).await?;
        let unread = self
            .store
            .list_where(|n: &Notification| n.recipient_user_id == actor.id && !n.read)
            .await?;
        for note in &unread {
            self.store
                .overwrite::<Notification, _>(&note.id, &NotificationRead { read: true })
                .await?;
        }
        Ok(unread.len())
    }
}
