use std::sync::Arc;

use integration_tests::World;
use ll_core::models::{Category, NewUser, PostEdit, PostQuery};
use ll_core::traits::{MockDocumentStore, Principal};
use ll_core::{AppError, Marketplace};

#[tokio::test]
async fn registration_normalizes_and_rejects_duplicates() -> anyhow::Result<()> {
    let world = World::memory();
    let user = world
        .market
        .catalog
        .register_user(NewUser {
            email: " Sarah@Example.COM ".into(),
            name: " Sarah ".into(),
        })
        .await?;
    assert_eq!(user.email, "sarah@example.com");
    assert_eq!(user.name, "Sarah");
    assert!(!user.is_admin());
    assert_eq!(user.points, 0);

    for (email, name) in [("SARAH@example.com", "Other"), ("not-an-email", "X"), ("x@y.z", "  ")] {
        let err = world
            .market
            .catalog
            .register_user(NewUser {
                email: email.into(),
                name: name.into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)), "{email}: {err:?}");
    }

    let err = world
        .market
        .catalog
        .email_available("SARAH@example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(
        world.market.catalog.email_available(" New@Example.com ").await?,
        "new@example.com"
    );
    Ok(())
}

#[tokio::test]
async fn principals_resolve_by_email() -> anyhow::Result<()> {
    let world = World::memory();
    let user = world.user("John").await?;

    let found = world
        .market
        .catalog
        .resolve_principal(&Principal {
            uid: "abc".into(),
            email: "JOHN@example.com".into(),
        })
        .await?;
    assert_eq!(found.id, user.id);

    let err = world
        .market
        .catalog
        .resolve_principal(&Principal {
            uid: "def".into(),
            email: "nobody@example.com".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound { kind: "user", .. }));
    Ok(())
}

#[tokio::test]
async fn reactions_toggle_per_user() -> anyhow::Result<()> {
    let world = World::memory();
    let owner = world.user("Olive").await?;
    let ann = world.user("Ann").await?;
    let bob = world.user("Bob").await?;
    let post = world.post(&owner, "House Cleaning", Category::Cleaning).await?;

    let post_after = world.market.catalog.like_post(&post.id, &ann.id).await?;
    assert_eq!(post_after.like_count(), 1);
    let post_after = world.market.catalog.like_post(&post.id, &bob.id).await?;
    assert_eq!(post_after.like_count(), 2);
    let post_after = world.market.catalog.like_post(&post.id, &ann.id).await?;
    assert_eq!(post_after.like_count(), 1);
    assert!(post_after.likes.contains(&bob.id));

    let post_after = world.market.catalog.favorite_post(&post.id, &ann.id).await?;
    assert!(post_after.favorites.contains(&ann.id));
    let post_after = world.market.catalog.report_post(&post.id, &bob.id).await?;
    assert!(post_after.reports.contains(&bob.id));
    // Sets are independent of each other.
    assert_eq!(post_after.like_count(), 1);
    assert_eq!(post_after.favorites.len(), 1);
    Ok(())
}

#[tokio::test]
async fn reacting_to_a_deleted_post_is_invalid_state() -> anyhow::Result<()> {
    let world = World::memory();
    let owner = world.user("Olive").await?;
    let fan = world.user("Fan").await?;
    let post = world.post(&owner, "House Cleaning", Category::Cleaning).await?;
    world.market.moderation.delete_post(&post.id, &owner.id).await?;

    let err = world.market.catalog.like_post(&post.id, &fan.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
    let err = world.market.catalog.like_post("missing", &fan.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound { kind: "post", .. }));
    Ok(())
}

#[tokio::test]
async fn discovery_filters_and_orders() -> anyhow::Result<()> {
    let world = World::memory();
    let owner = world.user("Olive").await?;
    let cleaning = world.post(&owner, "House Cleaning", Category::Cleaning).await?;
    let plumbing = world.post(&owner, "Plumbing Repair", Category::Repair).await?;
    let windows = world.post(&owner, "Window Cleaning", Category::Cleaning).await?;

    let all = world.market.catalog.discover_posts(&PostQuery::default()).await?;
    let ids: Vec<&str> = all.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids.len(), 3);
    assert!(all.windows(2).all(|w| w[0].created_at >= w[1].created_at));

    let cleaning_only = world
        .market
        .catalog
        .discover_posts(&PostQuery {
            term: None,
            category: Some(Category::Cleaning),
        })
        .await?;
    assert_eq!(cleaning_only.len(), 2);
    assert!(cleaning_only.iter().all(|p| p.category == Category::Cleaning));

    let by_term = world
        .market
        .catalog
        .discover_posts(&PostQuery {
            term: Some("  PLUMB ".into()),
            category: None,
        })
        .await?;
    assert_eq!(by_term.len(), 1);
    assert_eq!(by_term[0].id, plumbing.id);

    // The description is searched too.
    let by_description = world
        .market
        .catalog
        .discover_posts(&PostQuery {
            term: Some("done right".into()),
            category: Some(Category::Cleaning),
        })
        .await?;
    assert_eq!(by_description.len(), 2);

    world.market.moderation.delete_post(&windows.id, &owner.id).await?;
    let listed = world
        .market
        .catalog
        .discover_posts(&PostQuery {
            term: None,
            category: Some(Category::Cleaning),
        })
        .await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, cleaning.id);

    assert_eq!(world.market.catalog.posts_by(&owner.id).await?.len(), 3);
    Ok(())
}

#[tokio::test]
async fn post_edits_check_owner_input_and_state() -> anyhow::Result<()> {
    let world = World::memory();
    let admin = world.admin().await?;
    let owner = world.user("Olive").await?;
    let stranger = world.user("Sam").await?;
    let post = world.post(&owner, "House Cleaning", Category::Cleaning).await?;

    let edit = || PostEdit {
        price: Some(65.0),
        price_unit: Some(" per hour ".into()),
        ..PostEdit::default()
    };

    let err = world
        .market
        .catalog
        .update_post(&post.id, &stranger.id, edit())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)));

    let err = world
        .market
        .catalog
        .update_post(
            &post.id,
            &owner.id,
            PostEdit {
                title: Some("   ".into()),
                ..PostEdit::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let updated = world.market.catalog.update_post(&post.id, &owner.id, edit()).await?;
    assert_eq!(updated.price, 65.0);
    assert_eq!(updated.price_unit, "per hour");
    assert_eq!(updated.title, post.title);
    assert_eq!(updated.created_at, post.created_at);

    let by_admin = world
        .market
        .catalog
        .update_post(
            &post.id,
            &admin.id,
            PostEdit {
                category: Some(Category::Other),
                ..PostEdit::default()
            },
        )
        .await?;
    assert_eq!(by_admin.category, Category::Other);

    world.market.moderation.delete_post(&post.id, &owner.id).await?;
    let err = world
        .market
        .catalog
        .update_post(&post.id, &owner.id, edit())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
    Ok(())
}

#[tokio::test]
async fn gateway_outage_surfaces_as_internal() {
    let mut gateway = MockDocumentStore::new();
    gateway
        .expect_list()
        .returning(|_| Err(anyhow::anyhow!("connection refused")));
    gateway.expect_create().never();
    let market = Marketplace::new(Arc::new(gateway));

    let err = market
        .catalog
        .discover_posts(&PostQuery::default())
        .await
        .unwrap_err();
    assert!(matches!(&err, AppError::Internal(msg) if msg.contains("connection refused")));

    let err = market
        .catalog
        .register_user(NewUser {
            email: "ann@example.com".into(),
            name: "Ann".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Internal(_)));
}
