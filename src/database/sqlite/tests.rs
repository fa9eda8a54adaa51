use super::*;
use anyhow::Result;
use std::collections::HashSet;
use tempfile::TempDir;

async fn create_test_database() -> Result<(TempDir, Database)> {
    let temp_dir = TempDir::new()?;
    let database = Database::open(&temp_dir.path().join("nested").join("users.db")).await?;
    Ok((temp_dir, database))
}

#[tokio::test]
async fn integration_schema_migration() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name NOT LIKE '_sqlx_%'",
    )
    .fetch_all(database.pool())
    .await?;

    let actual_tables: HashSet<&str> = tables.iter().map(|t| t.as_str()).collect();
    assert_eq!(actual_tables, HashSet::from(["users"]));

    Ok(())
}

#[tokio::test]
async fn migrations_are_idempotent() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;

    database.run_migrations().await?;
    database.run_migrations().await?;

    Ok(())
}

#[tokio::test]
async fn reopening_keeps_users() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("users.db");

    {
        let database = Database::open(&path).await?;
        database
            .create_user(NewUser {
                first_name: "Grace".to_string(),
                last_name: "Hopper".to_string(),
                email: "grace@example.com".to_string(),
                password_hash: "hash".to_string(),
                is_active: true,
            })
            .await?;
        database.pool().close().await;
    }

    let database = Database::open(&path).await?;
    let user = database.get_user_by_email("grace@example.com").await?;
    assert!(user.is_some());

    Ok(())
}

#[tokio::test]
async fn verify_through_database() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;

    let user = database
        .create_user(NewUser {
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            email: "grace@example.com".to_string(),
            password_hash: "hash".to_string(),
            is_active: true,
        })
        .await?;

    let verified = database
        .mark_user_verified(user.id)
        .await?
        .expect("user should exist");
    assert!(verified.is_verified);

    let fetched = database.get_user(user.id).await?.expect("user should exist");
    assert_eq!(fetched, verified);

    Ok(())
}
