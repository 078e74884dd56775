use chrono::Utc;
use std::io::Write;
use url::Url;

use super::{AppContext, CommandError};
use crate::storage::User;

/// Accept only absolute http(s) URLs as feed sources.
fn validate_feed_url(raw: &str) -> Result<Url, CommandError> {
    let url = Url::parse(raw).map_err(|e| CommandError::InvalidUrl(raw.to_string(), e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(CommandError::InvalidUrl(
            raw.to_string(),
            format!("unsupported scheme '{}' (only http/https allowed)", scheme),
        )),
    }
}

pub(super) async fn add<W: Write>(
    ctx: &AppContext,
    user: &User,
    name: &str,
    url: &str,
    out: &mut W,
) -> Result<(), CommandError> {
    validate_feed_url(url)?;
    let now = Utc::now();

    let feed = ctx.db.create_feed(name, url, user.id, now).await?;
    let follow = ctx.db.create_feed_follow(user.id, feed.id, now).await?;
    tracing::info!(feed_id = feed.id, feed = %feed.name, user = %user.name, "Feed added");

    writeln!(out, "Feed added: {}", feed.name)?;
    writeln!(out, "  id:  {}", feed.id)?;
    writeln!(out, "  url: {}", feed.url)?;
    writeln!(out, "{} now follows {}", follow.user_name, follow.feed_name)?;
    Ok(())
}

pub(super) async fn list<W: Write>(ctx: &AppContext, out: &mut W) -> Result<(), CommandError> {
    for feed in ctx.db.get_feeds_with_owner().await? {
        writeln!(out, "* {} ({}) added by {}", feed.name, feed.url, feed.owner)?;
    }
    Ok(())
}

pub(super) async fn follow<W: Write>(
    ctx: &AppContext,
    user: &User,
    url: &str,
    out: &mut W,
) -> Result<(), CommandError> {
    let feed = ctx
        .db
        .get_feed_by_url(url)
        .await?
        .ok_or_else(|| CommandError::UnknownFeed(url.to_string()))?;
    let follow = ctx.db.create_feed_follow(user.id, feed.id, Utc::now()).await?;

    writeln!(out, "{} now follows {}", follow.user_name, follow.feed_name)?;
    Ok(())
}

pub(super) async fn unfollow<W: Write>(
    ctx: &AppContext,
    user: &User,
    url: &str,
    out: &mut W,
) -> Result<(), CommandError> {
    let feed = ctx
        .db
        .get_feed_by_url(url)
        .await?
        .ok_or_else(|| CommandError::UnknownFeed(url.to_string()))?;
    ctx.db.delete_feed_follow(user.id, feed.id).await?;

    writeln!(out, "{} unfollowed {}", user.name, feed.name)?;
    Ok(())
}

pub(super) async fn following<W: Write>(
    ctx: &AppContext,
    user: &User,
    out: &mut W,
) -> Result<(), CommandError> {
    let follows = ctx.db.get_feed_follows_for_user(user.id).await?;
    if follows.is_empty() {
        writeln!(out, "{} is not following any feeds", user.name)?;
        return Ok(());
    }
    for follow in follows {
        writeln!(out, "* {}", follow.feed_name)?;
    }
    Ok(())
}

pub(super) async fn browse<W: Write>(
    ctx: &AppContext,
    user: &User,
    limit: i64,
    out: &mut W,
) -> Result<(), CommandError> {
    let posts = ctx.db.get_posts_for_user(user.id, limit).await?;
    if posts.is_empty() {
        writeln!(out, "No posts yet. Follow a feed and run `gator agg`.")?;
        return Ok(());
    }

    for post in posts {
        writeln!(out, "{}", post.published_at.format("%a %b %e %Y %H:%M UTC"))?;
        writeln!(out, "--- {} ---", post.title)?;
        if !post.description.is_empty() {
            writeln!(out, "    {}", post.description)?;
        }
        writeln!(out, "Link: {}", post.url)?;
        writeln!(out, "=====================================")?;
    }
    Ok(())
}
