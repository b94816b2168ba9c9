//! Demo data: one admin, one member and two sample posts.
//!
//! Safe to run against a durable store more than once; accounts and posts that
//! already exist are left alone. Credentials live in the identity plugin's memory,
//! so they are registered again on every start.

use ll_config::SeedSettings;
use ll_core::models::{Category, NewPost, NewUser, User};
use ll_core::traits::{IdentityProvider, Principal};
use ll_core::{AppError, Marketplace};
use secrecy::ExposeSecret;
use tracing::{info, warn};

const MEMBER_EMAIL: &str = "user1@example.com";

pub async fn run(
    market: &Marketplace,
    identity: &dyn IdentityProvider,
    seed: &SeedSettings,
) -> anyhow::Result<()> {
    let password = seed
        .admin_password
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("seed.admin_password is not set"))?;

    // 1. Admin account
    credentials(identity, &seed.admin_email, password.expose_secret()).await;
    let admin = market
        .moderation
        .bootstrap_admin(&seed.admin_email, "Admin User")
        .await?;
    if admin.points == 0 {
        market
            .moderation
            .assign_badge(&admin.id, &admin.id, "verified")
            .await?;
        market.moderation.grant_points(&admin.id, &admin.id, 100).await?;
    }

    // 2. Regular member
    match seed.member_password.as_ref() {
        Some(member_password) => {
            credentials(identity, MEMBER_EMAIL, member_password.expose_secret()).await
        }
        None => info!(email = MEMBER_EMAIL, "seed.member_password not set, member cannot sign in"),
    }
    let member = member(market, &admin).await?;

    // 3. Sample posts
    if market.catalog.posts_by(&member.id).await?.is_empty() {
        for post in sample_posts() {
            market.catalog.create_post(&member.id, post).await?;
        }
    }

    info!(admin = %admin.email, member = %member.email, "seed data in place");
    Ok(())
}

async fn credentials(identity: &dyn IdentityProvider, email: &str, password: &str) {
    if let Err(err) = identity.register(email, password).await {
        warn!(email, %err, "seed credentials not registered");
    }
}

async fn member(market: &Marketplace, admin: &User) -> anyhow::Result<User> {
    let principal = Principal {
        uid: String::new(),
        email: MEMBER_EMAIL.to_string(),
    };
    let member = match market.catalog.resolve_principal(&principal).await {
        Ok(existing) => return Ok(existing),
        Err(AppError::NotFound { .. }) => {
            market
                .catalog
                .register_user(NewUser {
                    email: MEMBER_EMAIL.to_string(),
                    name: "John Doe".to_string(),
                })
                .await?
        }
        Err(err) => return Err(err.into()),
    };
    Ok(market
        .moderation
        .grant_points(&member.id, &admin.id, 50)
        .await?)
}

fn sample_posts() -> Vec<NewPost> {
    vec![
        NewPost {
            title: "House Cleaning Service".into(),
            description: "Professional cleaning services for homes and offices.".into(),
            category: Category::Cleaning,
            price: 20.0,
            price_unit: "per hour".into(),
            location: "New York".into(),
            availability: "Weekdays 9am-5pm".into(),
        },
        NewPost {
            title: "Plumbing Repair".into(),
            description: "Fix leaks, install pipes, and more.".into(),
            category: Category::Repair,
            price: 50.0,
            price_unit: "per job".into(),
            location: "Los Angeles".into(),
            availability: "24/7".into(),
        },
    ]
}
