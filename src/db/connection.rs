use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;

pub type DbPool = Pool<Postgres>;

pub async fn init_db(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .max_lifetime(Duration::from_secs(30 * 60))
        .idle_timeout(Duration::from_secs(10 * 60))
        .connect(database_url)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS templates (
            id UUID PRIMARY KEY,
            category VARCHAR(64) NOT NULL,
            text VARCHAR(255) NOT NULL,
            emoji VARCHAR(16),
            usage_count BIGINT NOT NULL DEFAULT 0,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Owned by the membership service; this crate only reads it.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS circle_members (
            circle_id UUID NOT NULL,
            user_id UUID NOT NULL,
            display_name VARCHAR(255) NOT NULL,
            joined_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT CURRENT_TIMESTAMP,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            PRIMARY KEY (circle_id, user_id)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS polls (
            id UUID PRIMARY KEY,
            circle_id UUID NOT NULL,
            creator_id UUID NOT NULL,
            template_id UUID NOT NULL REFERENCES templates(id),
            question_text VARCHAR(255) NOT NULL,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT CURRENT_TIMESTAMP,
            deadline TIMESTAMP WITH TIME ZONE NOT NULL,
            is_anonymous BOOLEAN NOT NULL DEFAULT TRUE,
            manually_closed BOOLEAN NOT NULL DEFAULT FALSE,
            deleted_at TIMESTAMP WITH TIME ZONE
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS poll_candidates (
            id UUID PRIMARY KEY,
            poll_id UUID NOT NULL REFERENCES polls(id) ON DELETE CASCADE,
            member_ref UUID NOT NULL,
            display_name_snapshot VARCHAR(255) NOT NULL,
            order_index INT NOT NULL,
            vote_count BIGINT NOT NULL DEFAULT 0,
            UNIQUE(poll_id, member_ref),
            UNIQUE(poll_id, order_index)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ballots (
            id UUID PRIMARY KEY,
            poll_id UUID NOT NULL REFERENCES polls(id) ON DELETE CASCADE,
            candidate_ref UUID NOT NULL REFERENCES poll_candidates(id) ON DELETE CASCADE,
            voter_commitment_hash CHAR(64) NOT NULL,
            cast_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(poll_id, voter_commitment_hash)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_templates_active_text ON templates(text) WHERE is_active
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_templates_category ON templates(category)
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_polls_circle_id ON polls(circle_id)
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_poll_candidates_poll_id ON poll_candidates(poll_id)
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_ballots_poll_id ON ballots(poll_id)
        "#,
    )
    .execute(&pool)
    .await?;

    Ok(pool)
}

pub async fn get_pool_stats(pool: &DbPool) -> Result<String, sqlx::Error> {
    let size = pool.size() as usize;
    let num_idle = pool.num_idle();
    Ok(format!(
        "Pool stats: size={}, idle={}, available={}",
        size,
        num_idle,
        size - num_idle
    ))
}
