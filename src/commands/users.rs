use chrono::Utc;
use std::io::Write;

use super::{AppContext, CommandError};

pub(super) async fn register<W: Write>(
    ctx: &mut AppContext,
    name: &str,
    out: &mut W,
) -> Result<(), CommandError> {
    let user = ctx.db.create_user(name, Utc::now()).await?;
    ctx.config.set_user(&user.name, &ctx.config_path)?;
    tracing::info!(user_id = user.id, user = %user.name, "User registered");

    writeln!(out, "User created: {}", user.name)?;
    writeln!(out, "  id:      {}", user.id)?;
    writeln!(out, "  created: {}", user.created_at.to_rfc3339())?;
    Ok(())
}

pub(super) async fn login<W: Write>(
    ctx: &mut AppContext,
    name: &str,
    out: &mut W,
) -> Result<(), CommandError> {
    let user = ctx
        .db
        .get_user_by_name(name)
        .await?
        .ok_or_else(|| CommandError::UnknownUser(name.to_string()))?;
    ctx.config.set_user(&user.name, &ctx.config_path)?;

    writeln!(out, "Logged in as {}", user.name)?;
    Ok(())
}

pub(super) async fn list<W: Write>(ctx: &AppContext, out: &mut W) -> Result<(), CommandError> {
    let current = ctx.config.current_user_name.as_deref();
    for user in ctx.db.get_users().await? {
        if Some(user.name.as_str()) == current {
            writeln!(out, "* {} (current)", user.name)?;
        } else {
            writeln!(out, "* {}", user.name)?;
        }
    }
    Ok(())
}

pub(super) async fn reset<W: Write>(ctx: &AppContext, out: &mut W) -> Result<(), CommandError> {
    let deleted = ctx.db.delete_users().await?;
    tracing::info!(deleted, "Database reset");
    writeln!(out, "Database reset: {} user(s) deleted", deleted)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{context, run};
    use super::super::Command;
    use super::*;
    use crate::config::Config;
    use crate::storage::DatabaseError;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_register_sets_current_user_and_saves() {
        let mut ctx = context("register").await;
        let output = run(&mut ctx, Command::Register { name: "kahya".into() })
            .await
            .unwrap();

        assert!(output.starts_with("User created: kahya"));
        assert_eq!(ctx.config.current_user_name.as_deref(), Some("kahya"));
        let saved = Config::load(&ctx.config_path).unwrap();
        assert_eq!(saved.current_user_name.as_deref(), Some("kahya"));
    }

    #[tokio::test]
    async fn test_register_duplicate_is_conflict() {
        let mut ctx = context("register_dup").await;
        run(&mut ctx, Command::Register { name: "kahya".into() })
            .await
            .unwrap();
        let err = run(&mut ctx, Command::Register { name: "kahya".into() })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CommandError::Database(DatabaseError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_login_unknown_user() {
        let mut ctx = context("login_unknown").await;
        let err = run(&mut ctx, Command::Login { name: "nobody".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::UnknownUser(_)));
        assert_eq!(ctx.config.current_user_name, None);
    }

    #[tokio::test]
    async fn test_users_marks_current() {
        let mut ctx = context("users_list").await;
        run(&mut ctx, Command::Register { name: "holgith".into() })
            .await
            .unwrap();
        run(&mut ctx, Command::Register { name: "kahya".into() })
            .await
            .unwrap();
        run(&mut ctx, Command::Login { name: "holgith".into() })
            .await
            .unwrap();

        let output = run(&mut ctx, Command::Users).await.unwrap();
        assert_eq!(output, "* holgith (current)\n* kahya\n");
    }

    #[tokio::test]
    async fn test_reset_removes_users() {
        let mut ctx = context("reset").await;
        run(&mut ctx, Command::Register { name: "kahya".into() })
            .await
            .unwrap();

        let output = run(&mut ctx, Command::Reset).await.unwrap();
        assert_eq!(output, "Database reset: 1 user(s) deleted\n");
        assert!(ctx.db.get_users().await.unwrap().is_empty());
    }
}
