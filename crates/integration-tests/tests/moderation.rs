use integration_tests::World;
use ll_core::models::{
    Category, NewToolRequest, NotificationKind, PostQuery, Role, ToolRequestStatus, UserEdit,
};
use ll_core::AppError;

#[tokio::test]
async fn grant_points_never_goes_negative() -> anyhow::Result<()> {
    let world = World::memory();
    let admin = world.admin().await?;
    let user = world.user("John").await?;
    let user = world.market.moderation.grant_points(&user.id, &admin.id, 50).await?;
    assert_eq!(user.points, 50);

    let err = world
        .market
        .moderation
        .grant_points(&user.id, &admin.id, -1000)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(world.market.catalog.get_user(&user.id).await?.points, 50);

    let user = world.market.moderation.grant_points(&user.id, &admin.id, 10).await?;
    assert_eq!(user.points, 60);

    let user = world.market.moderation.grant_points(&user.id, &admin.id, -60).await?;
    assert_eq!(user.points, 0);
    Ok(())
}

#[tokio::test]
async fn delete_and_repost_scenario() -> anyhow::Result<()> {
    let world = World::memory();
    let admin = world.admin().await?;
    let owner = world.user("Olive").await?;
    let stranger = world.user("Sam").await?;
    let post = world.post(&owner, "House Cleaning", Category::Cleaning).await?;

    let err = world
        .market
        .moderation
        .delete_post(&post.id, &stranger.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)));

    let deleted = world.market.moderation.delete_post(&post.id, &owner.id).await?;
    assert!(deleted.deleted);
    let err = world
        .market
        .moderation
        .delete_post(&post.id, &owner.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let listed = world.market.catalog.discover_posts(&PostQuery::default()).await?;
    assert!(listed.is_empty());
    let all = world.market.catalog.list_all_posts(&admin.id).await?;
    assert_eq!(all.len(), 1);

    let err = world.market.moderation.repost(&post.id, &owner.id).await.unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)));

    let restored = world.market.moderation.repost(&post.id, &admin.id).await?;
    assert!(!restored.deleted);
    let err = world.market.moderation.repost(&post.id, &admin.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
    assert_eq!(
        world
            .market
            .catalog
            .discover_posts(&PostQuery::default())
            .await?
            .len(),
        1
    );
    Ok(())
}

#[tokio::test]
async fn admin_may_delete_any_post() -> anyhow::Result<()> {
    let world = World::memory();
    let admin = world.admin().await?;
    let owner = world.user("Olive").await?;
    let post = world.post(&owner, "Tutoring", Category::Tutoring).await?;
    assert!(world.market.moderation.delete_post(&post.id, &admin.id).await?.deleted);
    Ok(())
}

#[tokio::test]
async fn blocked_users_cannot_act_until_unblocked() -> anyhow::Result<()> {
    let world = World::memory();
    let admin = world.admin().await?;
    let requester = world.user("Ravi").await?;
    let offerer = world.user("Amara").await?;
    let request = world.request(&requester, None).await?;
    world.offer(&request, &offerer, 40.0).await?;

    let blocked = world.market.moderation.block_user(&requester.id, &admin.id).await?;
    assert!(blocked.blocked);

    let err = world.request(&requester, None).await.unwrap_err();
    assert_eq!(err, AppError::Authorization("account is blocked".into()));

    // The inbox stays usable.
    let inbox = world.inbox(&requester).await?;
    let read = world
        .market
        .notifications
        .mark_read(&inbox[0].id, &requester.id)
        .await?;
    assert!(read.read);

    world.market.moderation.unblock_user(&requester.id, &admin.id).await?;
    world.request(&requester, None).await?;

    let err = world
        .market
        .moderation
        .block_user(&admin.id, &admin.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    Ok(())
}

#[tokio::test]
async fn moderation_is_admin_only() -> anyhow::Result<()> {
    let world = World::memory();
    let user = world.user("Uma").await?;
    let other = world.user("Otto").await?;

    let attempts = [
        world.market.moderation.block_user(&other.id, &user.id).await.err(),
        world.market.moderation.grant_points(&other.id, &user.id, 5).await.err(),
        world
            .market
            .moderation
            .assign_badge(&other.id, &user.id, "verified")
            .await
            .err(),
        world.market.moderation.delete_user(&other.id, &user.id).await.err(),
        world.market.moderation.list_users(&user.id).await.err(),
        world.market.catalog.list_all_posts(&user.id).await.err(),
    ];
    for err in attempts {
        assert!(matches!(err, Some(AppError::Authorization(_))), "{err:?}");
    }

    let err = world
        .market
        .moderation
        .block_user(&other.id, "ghost")
        .await
        .unwrap_err();
    assert_eq!(err, AppError::Authorization("unknown actor".into()));
    Ok(())
}

#[tokio::test]
async fn badges_toggle() -> anyhow::Result<()> {
    let world = World::memory();
    let admin = world.admin().await?;
    let user = world.user("John").await?;

    let user = world
        .market
        .moderation
        .assign_badge(&user.id, &admin.id, "verified")
        .await?;
    assert!(user.badges.contains("verified"));
    let user = world
        .market
        .moderation
        .assign_badge(&user.id, &admin.id, "verified")
        .await?;
    assert!(user.badges.is_empty());
    Ok(())
}

#[tokio::test]
async fn deleted_users_are_gone() -> anyhow::Result<()> {
    let world = World::memory();
    let admin = world.admin().await?;
    let user = world.user("John").await?;

    world.market.moderation.delete_user(&user.id, &admin.id).await?;
    let err = world.market.catalog.get_user(&user.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound { kind: "user", .. }));
    let err = world
        .market
        .moderation
        .delete_user(&user.id, &admin.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound { .. }));
    Ok(())
}

#[tokio::test]
async fn deleting_a_user_takes_their_posts_along() -> anyhow::Result<()> {
    let world = World::memory();
    let admin = world.admin().await?;
    let owner = world.user("Olive").await?;
    let other = world.user("Bo").await?;
    let listed = world.post(&owner, "Lawn Mowing", Category::Gardening).await?;
    let hidden = world.post(&owner, "Window Cleaning", Category::Cleaning).await?;
    let kept = world.post(&other, "Math Tutoring", Category::Tutoring).await?;
    world.market.moderation.delete_post(&hidden.id, &owner.id).await?;

    world.market.moderation.delete_user(&owner.id, &admin.id).await?;

    for post in [&listed, &hidden] {
        let err = world.market.catalog.get_post(&post.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { kind: "post", .. }));
    }
    let everything = world.market.catalog.list_all_posts(&admin.id).await?;
    assert_eq!(everything.len(), 1);
    assert_eq!(everything[0].id, kept.id);
    let listed_now = world.market.catalog.discover_posts(&PostQuery::default()).await?;
    assert!(listed_now.iter().all(|p| p.owner_user_id != owner.id));
    Ok(())
}

#[tokio::test]
async fn update_user_keeps_emails_unique() -> anyhow::Result<()> {
    let world = World::memory();
    let admin = world.admin().await?;
    let ann = world.user("Ann").await?;
    world.user("Bob").await?;

    let err = world
        .market
        .moderation
        .update_user(
            &ann.id,
            &admin.id,
            UserEdit {
                email: Some("BOB@example.com".into()),
                ..UserEdit::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let ann = world
        .market
        .moderation
        .update_user(
            &ann.id,
            &admin.id,
            UserEdit {
                name: Some("Ann Admin".into()),
                role: Some(Role::Admin),
                ..UserEdit::default()
            },
        )
        .await?;
    assert_eq!(ann.name, "Ann Admin");
    assert!(ann.is_admin());
    assert_eq!(ann.email, "ann@example.com");
    Ok(())
}

#[tokio::test]
async fn tool_requests_resolve_once_and_notify() -> anyhow::Result<()> {
    let world = World::memory();
    let admin = world.admin().await?;
    let user = world.user("Tess").await?;

    let err = world
        .market
        .moderation
        .submit_tool_request(
            &user.id,
            NewToolRequest {
                tool_name: " ".into(),
                description: "".into(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let request = world
        .market
        .moderation
        .submit_tool_request(
            &user.id,
            NewToolRequest {
                tool_name: "Pressure washer".into(),
                description: "For driveway jobs".into(),
            },
        )
        .await?;
    assert_eq!(request.status, ToolRequestStatus::Pending);

    let err = world
        .market
        .moderation
        .resolve_tool_request(&request.id, &user.id, true)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)));

    let approved = world
        .market
        .moderation
        .resolve_tool_request(&request.id, &admin.id, true)
        .await?;
    assert_eq!(approved.status, ToolRequestStatus::Approved);

    let err = world
        .market
        .moderation
        .resolve_tool_request(&request.id, &admin.id, false)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let inbox = world.inbox(&user).await?;
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].kind, NotificationKind::ToolRequest);
    assert!(inbox[0].message.contains("approved"));
    Ok(())
}

#[tokio::test]
async fn admin_search_spans_collections() -> anyhow::Result<()> {
    let world = World::memory();
    let admin = world.admin().await?;
    let owner = world.user("Gardener").await?;
    world.post(&owner, "Garden Design", Category::Gardening).await?;
    world.post(&owner, "Plumbing Repair", Category::Repair).await?;
    world
        .market
        .moderation
        .submit_tool_request(
            &owner.id,
            NewToolRequest {
                tool_name: "Garden shredder".into(),
                description: String::new(),
            },
        )
        .await?;

    let found = world.market.moderation.admin_search(&admin.id, "GARDEN").await?;
    assert_eq!(found.users.len(), 1);
    assert_eq!(found.posts.len(), 1);
    assert_eq!(found.tool_requests.len(), 1);
    Ok(())
}

#[tokio::test]
async fn bootstrap_admin_is_idempotent() -> anyhow::Result<()> {
    let world = World::memory();
    let first = world.admin().await?;
    let again = world
        .market
        .moderation
        .bootstrap_admin("someone-else@example.com", "Other")
        .await?;
    assert_eq!(first.id, again.id);
    assert_eq!(world.market.moderation.list_users(&first.id).await?.len(), 1);
    Ok(())
}
