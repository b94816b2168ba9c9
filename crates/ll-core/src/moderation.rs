//! # Moderation & Rewards Engine
//!
//! Admin-side operations on users, posts and tool requests. Each of these is a
//! small state machine of its own:
//!
//! ```text
//! User.blocked:       false <-> true
//! Post.deleted:       false <-> true      (owner or admin deletes, admin restores)
//! ToolRequest.status: pending -> approved | denied
//! ```

use std::collections::BTreeSet;

use chrono::Utc;
use tracing::info;

use crate::catalog::ensure_email_free;
use crate::error::{AppError, Result};
use crate::models::{
    AdminSearch, NewToolRequest, NotificationKind, Post, Role, ToolRequest, ToolRequestStatus,
    User, UserEdit,
};
use crate::notify::Notifier;
use crate::patch::{PostVisibility, ToolRequestResolution, UserBadges, UserBlock, UserPoints};
use crate::policy::{authorize, load_actor, Action, Target};
use crate::store::{EntityStore, Versioned};
use crate::validate;

#[derive(Clone)]
pub struct Moderation {
    store: EntityStore,
    notifier: Notifier,
}

impl Moderation {
    pub fn new(store: EntityStore, notifier: Notifier) -> Self {
        Self { store, notifier }
    }

    async fn admin(&self, actor_id: &str) -> Result<User> {
        let actor = load_actor(&self.store, actor_id).await?;
        authorize(Action::Moderate, &actor, Target::None)?;
        Ok(actor)
    }

    // ── Users ───────────────────────────────────────────────────────────────

    pub async fn block_user(&self, user_id: &str, actor_id: &str) -> Result<User> {
        self.set_blocked(user_id, actor_id, true).await
    }

    pub async fn unblock_user(&self, user_id: &str, actor_id: &str) -> Result<User> {
        self.set_blocked(user_id, actor_id, false).await
    }

    async fn set_blocked(&self, user_id: &str, actor_id: &str, blocked: bool) -> Result<User> {
        let admin = self.admin(actor_id).await?;
        if blocked && admin.id == user_id {
            return Err(AppError::validation("you cannot block your own account"));
        }
        let user = self
            .store
            .transition::<User, _, _>(user_id, |_| Ok(UserBlock { blocked }))
            .await?
            .into_inner();
        info!(user = %user.id, blocked, admin = %admin.id, "user block flag set");
        Ok(user)
    }

    /// Hard removal of the account together with every post it owns, listed or not.
    /// Posts go first, so an interrupted call never leaves a post without its owner.
    /// Requests and offers it made stay as history.
    pub async fn delete_user(&self, user_id: &str, actor_id: &str) -> Result<()> {
        let admin = self.admin(actor_id).await?;
        if admin.id == user_id {
            return Err(AppError::validation("you cannot delete your own account"));
        }
        self.store.get::<User>(user_id).await?;

        let mut posts = self.remove_posts_of(user_id).await?;
        self.store.remove::<User>(user_id).await?;
        // Sweeps a post published while the account was going away.
        posts += self.remove_posts_of(user_id).await?;
        info!(user = user_id, admin = %admin.id, posts, "user deleted");
        Ok(())
    }

    async fn remove_posts_of(&self, owner_id: &str) -> Result<usize> {
        let posts = self
            .store
            .list_where(|p: &Post| p.owner_user_id == owner_id)
            .await?;
        for post in &posts {
            match self.store.remove::<Post>(&post.id).await {
                Ok(()) | Err(AppError::NotFound { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(posts.len())
    }

    /// Toggles `badge` on the user.
    pub async fn assign_badge(&self, user_id: &str, actor_id: &str, badge: &str) -> Result<User> {
        let admin = self.admin(actor_id).await?;
        let badge = validate::required("badge", badge)?;
        let user = self
            .store
            .transition::<User, _, _>(user_id, |user| {
                let mut badges: BTreeSet<String> = user.badges.clone();
                if !badges.remove(&badge) {
                    badges.insert(badge.clone());
                }
                Ok(UserBadges { badges })
            })
            .await?
            .into_inner();
        info!(user = %user.id, badge = %badge, held = user.badges.contains(&badge), admin = %admin.id, "badge toggled");
        Ok(user)
    }

    /// Adds `amount` (possibly negative) to the user's points; the balance never drops below zero.
    pub async fn grant_points(&self, user_id: &str, actor_id: &str, amount: i64) -> Result<User> {
        let admin = self.admin(actor_id).await?;
        let user = self
            .store
            .transition::<User, _, _>(user_id, |user| {
                match user.points.checked_add(amount) {
                    Some(points) if points >= 0 => Ok(UserPoints { points }),
                    _ => Err(AppError::validation(format!(
                        "cannot grant {amount} points: balance is {}",
                        user.points
                    ))),
                }
            })
            .await?
            .into_inner();
        info!(user = %user.id, amount, points = user.points, admin = %admin.id, "points granted");
        Ok(user)
    }

    /// Profile edit by an admin; a changed email must stay unique.
    pub async fn update_user(&self, user_id: &str, actor_id: &str, edit: UserEdit) -> Result<User> {
        let admin = self.admin(actor_id).await?;
        let edit = UserEdit {
            name: edit
                .name
                .map(|n| validate::required("name", &n))
                .transpose()?,
            email: edit.email.map(|e| validate::email(&e)).transpose()?,
            role: edit.role,
        };
        if let Some(email) = edit.email.as_deref() {
            ensure_email_free(&self.store, email, Some(user_id)).await?;
        }
        let user = self
            .store
            .transition::<User, _, _>(user_id, |_| Ok(edit))
            .await?
            .into_inner();
        info!(user = %user.id, admin = %admin.id, "user updated");
        Ok(user)
    }

    pub async fn list_users(&self, actor_id: &str) -> Result<Vec<User>> {
        self.admin(actor_id).await?;
        let mut users: Vec<User> = self
            .store
            .list::<User>()
            .await?
            .into_iter()
            .map(Versioned::into_inner)
            .collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    /// Makes sure at least one admin exists. The account with `email` is created
    /// or promoted; if some admin already exists nothing changes.
    pub async fn bootstrap_admin(&self, email: &str, name: &str) -> Result<User> {
        let email = validate::email(email)?;
        let name = validate::required("name", name)?;
        if let Some(existing) = self
            .store
            .list_where(|u: &User| u.is_admin())
            .await?
            .into_iter()
            .next()
        {
            return Ok(existing.into_inner());
        }

        let holder = self
            .store
            .list_where(|u: &User| u.email == email)
            .await?
            .into_iter()
            .next();
        let admin = match holder {
            Some(user) => {
                let promote = UserEdit {
                    role: Some(Role::Admin),
                    ..UserEdit::default()
                };
                self.store.commit(&user, &promote).await?.into_inner()
            }
            None => {
                let draft = User {
                    id: String::new(),
                    email,
                    name,
                    role: Role::Admin,
                    blocked: false,
                    badges: BTreeSet::new(),
                    points: 0,
                };
                self.store.create(&draft).await?.into_inner()
            }
        };
        info!(user = %admin.id, email = %admin.email, "admin account bootstrapped");
        Ok(admin)
    }

    // ── Posts ───────────────────────────────────────────────────────────────

    /// Soft delete by the owner or an admin.
    pub async fn delete_post(&self, post_id: &str, actor_id: &str) -> Result<Post> {
        let actor = load_actor(&self.store, actor_id).await?;
        let post = self
            .store
            .transition::<Post, _, _>(post_id, |post| {
                authorize(Action::DeletePost, &actor, Target::Post(post))?;
                if post.deleted {
                    return Err(AppError::invalid_state(format!(
                        "post {post_id} is already deleted"
                    )));
                }
                Ok(PostVisibility { deleted: true })
            })
            .await?
            .into_inner();
        info!(post = %post.id, actor = %actor.id, "post deleted");
        Ok(post)
    }

    /// Restores a soft-deleted post. Admin only.
    pub async fn repost(&self, post_id: &str, actor_id: &str) -> Result<Post> {
        let actor = load_actor(&self.store, actor_id).await?;
        let post = self
            .store
            .transition::<Post, _, _>(post_id, |post| {
                authorize(Action::RestorePost, &actor, Target::Post(post))?;
                if !post.deleted {
                    return Err(AppError::invalid_state(format!(
                        "post {post_id} is not deleted"
                    )));
                }
                Ok(PostVisibility { deleted: false })
            })
            .await?
            .into_inner();
        info!(post = %post.id, admin = %actor.id, "post restored");
        Ok(post)
    }

    // ── Tool requests ───────────────────────────────────────────────────────

    pub async fn submit_tool_request(
        &self,
        actor_id: &str,
        input: NewToolRequest,
    ) -> Result<ToolRequest> {
        let actor = load_actor(&self.store, actor_id).await?;
        authorize(Action::SubmitToolRequest, &actor, Target::None)?;
        let draft = ToolRequest {
            id: String::new(),
            requester_user_id: actor.id.clone(),
            tool_name: validate::required("tool name", &input.tool_name)?,
            description: input.description.trim().to_string(),
            status: ToolRequestStatus::Pending,
            submitted_at: Utc::now(),
        };
        let request = self.store.create(&draft).await?.into_inner();
        info!(tool_request = %request.id, requester = %actor.id, tool = %request.tool_name, "tool request submitted");
        Ok(request)
    }

    /// pending -> approved | denied, then tells the requester.
    pub async fn resolve_tool_request(
        &self,
        tool_request_id: &str,
        actor_id: &str,
        approved: bool,
    ) -> Result<ToolRequest> {
        let admin = self.admin(actor_id).await?;
        let status = if approved {
            ToolRequestStatus::Approved
        } else {
            ToolRequestStatus::Denied
        };
        let resolved = self
            .store
            .transition::<ToolRequest, _, _>(tool_request_id, |request| {
                if request.status != ToolRequestStatus::Pending {
                    return Err(AppError::invalid_state(format!(
                        "tool request {tool_request_id} was already resolved"
                    )));
                }
                Ok(ToolRequestResolution { status })
            })
            .await?
            .into_inner();
        info!(tool_request = %resolved.id, ?status, admin = %admin.id, "tool request resolved");

        let verdict = if approved { "approved" } else { "denied" };
        self.notifier
            .dispatch(
                &resolved.requester_user_id,
                NotificationKind::ToolRequest,
                format!("Your tool request '{}' was {verdict}.", resolved.tool_name),
            )
            .await?;
        Ok(resolved)
    }

    /// Tool requests, pending ones first, oldest first within each status.
    pub async fn list_tool_requests(&self, actor_id: &str) -> Result<Vec<ToolRequest>> {
        self.admin(actor_id).await?;
        let mut requests: Vec<ToolRequest> = self
            .store
            .list::<ToolRequest>()
            .await?
            .into_iter()
            .map(Versioned::into_inner)
            .collect();
        requests.sort_by(|a, b| {
            let pending = |r: &ToolRequest| r.status != ToolRequestStatus::Pending;
            pending(a)
                .cmp(&pending(b))
                .then(a.submitted_at.cmp(&b.submitted_at))
        });
        Ok(requests)
    }

    // ── Search ──────────────────────────────────────────────────────────────

    /// Case-insensitive search: users by name or email, posts by title, tool requests by tool name.
    pub async fn admin_search(&self, actor_id: &str, term: &str) -> Result<AdminSearch> {
        self.admin(actor_id).await?;
        let term = term.trim().to_lowercase();
        let hit = |text: &str| text.to_lowercase().contains(&term);

        let users = self
            .store
            .list_where(|u: &User| hit(u.name.as_str()) || hit(u.email.as_str()))
            .await?;
        let posts = self.store.list_where(|p: &Post| hit(p.title.as_str())).await?;
        let tool_requests = self
            .store
            .list_where(|t: &ToolRequest| hit(t.tool_name.as_str()))
            .await?;

        Ok(AdminSearch {
            users: users.into_iter().map(Versioned::into_inner).collect(),
            posts: posts.into_iter().map(Versioned::into_inner).collect(),
            tool_requests: tool_requests
                .into_iter()
                .map(Versioned::into_inner)
                .collect(),
        })
    }
}
