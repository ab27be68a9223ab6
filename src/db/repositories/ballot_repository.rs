use crate::db::connection::DbPool;
use crate::db::models::{Ballot, Candidate};
use crate::db::repositories::get_poll_candidates;
use sqlx::{Error, Postgres};
use uuid::Uuid;

const BALLOT_COLUMNS: &str = "id, poll_id, candidate_ref, voter_commitment_hash, cast_at";

/// The `(poll_id, voter_commitment_hash)` constraint rejects a second ballot
/// even when two requests race past the lookup.
pub async fn insert_ballot(pool: &DbPool, ballot: &Ballot) -> Result<(), Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO ballots (id, poll_id, candidate_ref, voter_commitment_hash, cast_at) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(ballot.id)
    .bind(ballot.poll_id)
    .bind(ballot.candidate_ref)
    .bind(&ballot.voter_commitment_hash)
    .bind(ballot.cast_at)
    .execute(&mut *tx)
    .await?;

    let updated = sqlx::query(
        "UPDATE poll_candidates SET vote_count = vote_count + 1 WHERE id = $1 AND poll_id = $2",
    )
    .bind(ballot.candidate_ref)
    .bind(ballot.poll_id)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        tx.rollback().await?;
        return Err(Error::RowNotFound);
    }

    tx.commit().await?;
    Ok(())
}

pub async fn find_ballot(
    pool: &DbPool,
    poll_id: Uuid,
    commitment: &str,
) -> Result<Option<Ballot>, Error> {
    sqlx::query_as::<_, Ballot>(&format!(
        "SELECT {BALLOT_COLUMNS} FROM ballots WHERE poll_id = $1 AND voter_commitment_hash = $2"
    ))
    .bind(poll_id)
    .bind(commitment)
    .fetch_optional(pool)
    .await
}

pub async fn get_poll_ballots<'e, E>(executor: E, poll_id: Uuid) -> Result<Vec<Ballot>, Error>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, Ballot>(&format!(
        "SELECT {BALLOT_COLUMNS} FROM ballots WHERE poll_id = $1 ORDER BY cast_at, id"
    ))
    .bind(poll_id)
    .fetch_all(executor)
    .await
}

/// Candidates with their cached counts and the ballots, both read from the
/// same repeatable-read snapshot.
pub async fn get_tally_snapshot(
    pool: &DbPool,
    poll_id: Uuid,
) -> Result<(Vec<Candidate>, Vec<Ballot>), Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
        .execute(&mut *tx)
        .await?;

    let candidates = get_poll_candidates(&mut *tx, poll_id).await?;
    let ballots = get_poll_ballots(&mut *tx, poll_id).await?;

    tx.commit().await?;
    Ok((candidates, ballots))
}
