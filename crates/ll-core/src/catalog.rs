//! # Catalog
//!
//! Users and the posts they publish: registration, principal resolution, post
//! publishing and editing, discovery, and the per-user reaction sets.

use std::collections::BTreeSet;

use chrono::Utc;
use tracing::info;

use crate::error::{AppError, Result};
use crate::models::{NewPost, NewUser, Post, PostEdit, PostQuery, Role, User, UserId};
use crate::patch::{PostFavorites, PostLikes, PostReports};
use crate::policy::{authorize, load_actor, Action, Target};
use crate::store::{EntityStore, Versioned};
use crate::traits::Principal;
use crate::validate;

#[derive(Clone)]
pub struct Catalog {
    store: EntityStore,
}

/// Which per-user set on a post a reaction toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    Like,
    Favorite,
    Report,
}

impl Catalog {
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }

    // ── Users ───────────────────────────────────────────────────────────────

    /// Creates a plain member. The email must be unused.
    pub async fn register_user(&self, input: NewUser) -> Result<User> {
        let email = validate::email(&input.email)?;
        let name = validate::required("name", &input.name)?;
        ensure_email_free(&self.store, &email, None).await?;

        let draft = User {
            id: String::new(),
            email,
            name,
            role: Role::User,
            blocked: false,
            badges: BTreeSet::new(),
            points: 0,
        };
        let user = self.store.create(&draft).await?.into_inner();
        info!(user = %user.id, email = %user.email, "user registered");
        Ok(user)
    }

    /// Normalizes `email` and fails with `Validation` when a User already holds it.
    /// Callers that mint credentials check this first so they never shadow an account.
    pub async fn email_available(&self, email: &str) -> Result<String> {
        let email = validate::email(email)?;
        ensure_email_free(&self.store, &email, None).await?;
        Ok(email)
    }

    /// Maps an authenticated principal onto its User by email.
    pub async fn resolve_principal(&self, principal: &Principal) -> Result<User> {
        let email = principal.email.trim().to_lowercase();
        self.store
            .list_where(|u: &User| u.email == email)
            .await?
            .into_iter()
            .next()
            .map(Versioned::into_inner)
            .ok_or_else(|| AppError::not_found("user", principal.email.clone()))
    }

    pub async fn get_user(&self, user_id: &str) -> Result<User> {
        Ok(self.store.get::<User>(user_id).await?.into_inner())
    }

    // ── Posts ───────────────────────────────────────────────────────────────

    pub async fn create_post(&self, actor_id: &str, input: NewPost) -> Result<Post> {
        let actor = load_actor(&self.store, actor_id).await?;
        authorize(Action::CreatePost, &actor, Target::None)?;

        let draft = Post {
            id: String::new(),
            owner_user_id: actor.id.clone(),
            title: validate::required("title", &input.title)?,
            description: validate::required("description", &input.description)?,
            category: input.category,
            price: validate::amount("price", input.price)?,
            price_unit: input.price_unit.trim().to_string(),
            location: input.location.trim().to_string(),
            availability: input.availability.trim().to_string(),
            rating: 0.0,
            likes: BTreeSet::new(),
            favorites: BTreeSet::new(),
            reports: BTreeSet::new(),
            deleted: false,
            created_at: Utc::now(),
        };
        let post = self.store.create(&draft).await?.into_inner();
        info!(post = %post.id, owner = %actor.id, category = %post.category, "post published");
        Ok(post)
    }

    /// Owner or admin edit of a listed post. Only the fields present in `edit` change.
    pub async fn update_post(&self, post_id: &str, actor_id: &str, edit: PostEdit) -> Result<Post> {
        let actor = load_actor(&self.store, actor_id).await?;
        let edit = clean_edit(edit)?;
        let post = self
            .store
            .transition::<Post, _, _>(post_id, |post| {
                authorize(Action::EditPost, &actor, Target::Post(post))?;
                if post.deleted {
                    return Err(AppError::invalid_state(format!(
                        "post {post_id} has been deleted"
                    )));
                }
                Ok(edit)
            })
            .await?
            .into_inner();
        info!(post = %post.id, editor = %actor.id, "post updated");
        Ok(post)
    }

    pub async fn get_post(&self, post_id: &str) -> Result<Post> {
        Ok(self.store.get::<Post>(post_id).await?.into_inner())
    }

    /// Listed posts matching `query`, newest first.
    pub async fn discover_posts(&self, query: &PostQuery) -> Result<Vec<Post>> {
        let term = query
            .term
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase);
        let posts = self
            .store
            .list_where(|p: &Post| {
                !p.deleted
                    && query.category.map_or(true, |c| p.category == c)
                    && term.as_deref().map_or(true, |t| {
                        p.title.to_lowercase().contains(t)
                            || p.description.to_lowercase().contains(t)
                    })
            })
            .await?;
        Ok(newest_first(posts))
    }

    /// Every post including soft-deleted ones. Admin only.
    pub async fn list_all_posts(&self, actor_id: &str) -> Result<Vec<Post>> {
        let actor = load_actor(&self.store, actor_id).await?;
        authorize(Action::Moderate, &actor, Target::None)?;
        Ok(newest_first(self.store.list::<Post>().await?))
    }

    /// Posts published by one user, deleted ones included.
    pub async fn posts_by(&self, owner_id: &str) -> Result<Vec<Post>> {
        let posts = self
            .store
            .list_where(|p: &Post| p.owner_user_id == owner_id)
            .await?;
        Ok(newest_first(posts))
    }

    // ── Reactions ───────────────────────────────────────────────────────────

    pub async fn like_post(&self, post_id: &str, actor_id: &str) -> Result<Post> {
        self.react(post_id, actor_id, Reaction::Like).await
    }

    pub async fn favorite_post(&self, post_id: &str, actor_id: &str) -> Result<Post> {
        self.react(post_id, actor_id, Reaction::Favorite).await
    }

    pub async fn report_post(&self, post_id: &str, actor_id: &str) -> Result<Post> {
        self.react(post_id, actor_id, Reaction::Report).await
    }

    /// Toggles the actor's membership in one reaction set. Two toggles cancel out.
    pub async fn react(&self, post_id: &str, actor_id: &str, reaction: Reaction) -> Result<Post> {
        let actor = load_actor(&self.store, actor_id).await?;
        authorize(Action::ReactToPost, &actor, Target::None)?;
        let current = self.store.get::<Post>(post_id).await?;
        if current.deleted {
            return Err(AppError::invalid_state(format!(
                "post {post_id} has been deleted"
            )));
        }

        let updated = match reaction {
            Reaction::Like => {
                let likes = toggled(&current.likes, &actor.id);
                self.store.commit(&current, &PostLikes { likes }).await?
            }
            Reaction::Favorite => {
                let favorites = toggled(&current.favorites, &actor.id);
                self.store
                    .commit(&current, &PostFavorites { favorites })
                    .await?
            }
            Reaction::Report => {
                let reports = toggled(&current.reports, &actor.id);
                self.store.commit(&current, &PostReports { reports }).await?
            }
        };
        info!(post = post_id, user = %actor.id, ?reaction, "post reaction toggled");
        Ok(updated.into_inner())
    }
}

fn toggled(set: &BTreeSet<UserId>, user_id: &str) -> BTreeSet<UserId> {
    let mut next = set.clone();
    if !next.remove(user_id) {
        next.insert(user_id.to_string());
    }
    next
}

fn newest_first(posts: Vec<Versioned<Post>>) -> Vec<Post> {
    let mut posts: Vec<Post> = posts.into_iter().map(Versioned::into_inner).collect();
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    posts
}

fn clean_edit(edit: PostEdit) -> Result<PostEdit> {
    Ok(PostEdit {
        title: edit
            .title
            .map(|t| validate::required("title", &t))
            .transpose()?,
        description: edit
            .description
            .map(|d| validate::required("description", &d))
            .transpose()?,
        category: edit.category,
        price: edit
            .price
            .map(|p| validate::amount("price", p))
            .transpose()?,
        price_unit: edit.price_unit.map(|s| s.trim().to_string()),
        location: edit.location.map(|s| s.trim().to_string()),
        availability: edit.availability.map(|s| s.trim().to_string()),
    })
}

/// Fails with `Validation` if another user (not `except`) already holds `email`.
///
/// Developer Note: check-then-create. Two registrations with the same address
/// racing each other can both pass; the gateway has no unique index to stop them.
pub(crate) async fn ensure_email_free(
    store: &EntityStore,
    email: &str,
    except: Option<&str>,
) -> Result<()> {
    let taken = store
        .list_where(|u: &User| u.email == email && Some(u.id.as_str()) != except)
        .await?;
    if taken.is_empty() {
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "email {email} is already registered"
        )))
    }
}
