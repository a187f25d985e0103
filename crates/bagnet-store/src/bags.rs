//! Bag and ownership-row repository.
//!
//! A bag row exists iff at least one ownership row references it. The
//! queries here preserve that invariant: bag rows are only deleted once no
//! ownership rows remain, and unpaid ownership rows age out on their own.

use crate::error::Result;
use crate::models::{BagContract, BagSummary, NewBag, UserBag};
use sqlx::postgres::PgPool;

#[derive(Clone)]
pub struct BagsRepo {
    pool: PgPool,
}

impl BagsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a bag row (if new) and its ownership row in one statement.
    /// Re-uploading the same bag for the same user refreshes `updated_at`.
    pub async fn add_bag(&self, bag: &NewBag, user_address: &str) -> Result<()> {
        let query = r#"
            WITH add_bag AS (
                INSERT INTO bags (bag_id, description, bag_size, files_size, created_at)
                VALUES ($1, $2, $3, $4, now())
                ON CONFLICT (bag_id) DO NOTHING
                RETURNING bag_id
            )
            INSERT INTO bag_users (bag_id, user_address, storage_contract, created_at, updated_at)
            VALUES ($1, $5, NULL, now(), now())
            ON CONFLICT (bag_id, user_address) DO UPDATE
                SET updated_at = now();
        "#;
        sqlx::query(query)
            .bind(&bag.bag_id)
            .bind(&bag.description)
            .bind(bag.bag_size)
            .bind(bag.files_size)
            .bind(user_address)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Remove a single ownership row. Returns the number of rows removed;
    /// zero means the caller never owned the bag.
    pub async fn remove_user_relation(
        &self,
        bag_id: &str,
        user_address: &str,
    ) -> Result<u64> {
        let query = r#"
            DELETE FROM bag_users
            WHERE bag_id = $1 AND user_address = $2;
        "#;
        let result = sqlx::query(query)
            .bind(bag_id)
            .bind(user_address)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete every bag row with no remaining ownership rows, returning the
    /// freed bag ids so the caller can reclaim them from the storage daemon.
    pub async fn remove_unused(&self) -> Result<Vec<String>> {
        let query = r#"
            WITH to_remove AS (
                SELECT b.bag_id
                FROM bags b
                    LEFT JOIN bag_users bu ON b.bag_id = bu.bag_id
                WHERE bu.bag_id IS NULL
            ),
            removed AS (
                DELETE FROM bags
                WHERE bag_id IN (SELECT bag_id FROM to_remove)
                RETURNING bag_id
            )
            SELECT bag_id FROM removed;
        "#;
        let removed = sqlx::query_scalar::<_, String>(query)
            .fetch_all(&self.pool)
            .await?;
        Ok(removed)
    }

    /// Delete unpaid ownership rows older than `older_than_secs`, returning
    /// the distinct bag ids they referenced.
    pub async fn remove_unpaid(&self, older_than_secs: i64) -> Result<Vec<String>> {
        let query = r#"
            WITH to_remove AS (
                SELECT bu.bag_id, bu.user_address
                FROM bag_users bu
                WHERE bu.storage_contract IS NULL
                    AND EXTRACT(EPOCH FROM (now() - bu.created_at)) > $1
            ),
            removed AS (
                DELETE FROM bag_users
                WHERE (bag_id, user_address) IN (SELECT bag_id, user_address FROM to_remove)
                RETURNING bag_id
            )
            SELECT DISTINCT bag_id FROM removed;
        "#;
        let removed = sqlx::query_scalar::<_, String>(query)
            .bind(older_than_secs)
            .fetch_all(&self.pool)
            .await?;
        Ok(removed)
    }

    /// Ownership rows the user has not paid for yet.
    pub async fn unpaid_bags(&self, user_address: &str) -> Result<Vec<UserBag>> {
        let query = r#"
            SELECT bag_id, user_address, created_at
            FROM bag_users
            WHERE user_address = $1 AND storage_contract IS NULL;
        "#;
        let bags = sqlx::query_as::<_, UserBag>(query)
            .bind(user_address)
            .fetch_all(&self.pool)
            .await?;
        Ok(bags)
    }

    /// Whether an unpaid ownership row has outlived the given lifetime.
    pub async fn is_bag_expired(
        &self,
        bag_id: &str,
        user_address: &str,
        lifetime_secs: i64,
    ) -> Result<bool> {
        let query = r#"
            SELECT EXISTS (
                SELECT 1
                FROM bag_users
                WHERE bag_id = $1
                    AND user_address = $2
                    AND storage_contract IS NULL
                    AND EXTRACT(EPOCH FROM (now() - created_at)) > $3
            );
        "#;
        let expired = sqlx::query_scalar::<_, bool>(query)
            .bind(bag_id)
            .bind(user_address)
            .bind(lifetime_secs)
            .fetch_one(&self.pool)
            .await?;
        Ok(expired)
    }

    /// Record the funded storage contract on an ownership row. Returns the
    /// number of rows updated; zero means no such ownership row exists.
    pub async fn mark_paid(
        &self,
        bag_id: &str,
        user_address: &str,
        storage_contract: &str,
    ) -> Result<u64> {
        let query = r#"
            UPDATE bag_users
            SET storage_contract = $3,
                updated_at = now()
            WHERE bag_id = $1 AND user_address = $2;
        "#;
        let result = sqlx::query(query)
            .bind(bag_id)
            .bind(user_address)
            .bind(storage_contract)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Short bag descriptions for a set of contracts.
    pub async fn bags_info_short(&self, contracts: &[String]) -> Result<Vec<BagSummary>> {
        let query = r#"
            SELECT bu.storage_contract, b.bag_id, b.description, b.files_size AS size
            FROM bag_users bu
                JOIN bags b ON b.bag_id = bu.bag_id
            WHERE bu.storage_contract = ANY($1);
        "#;
        let summaries = sqlx::query_as::<_, BagSummary>(query)
            .bind(contracts)
            .fetch_all(&self.pool)
            .await?;
        Ok(summaries)
    }

    /// Paid ownership rows awaiting provider collection: contract set, not
    /// yet handed off (`notify_attempts >= 0`) and under the attempt cap.
    pub async fn notify_candidates(
        &self,
        limit: i64,
        max_notify_attempts: i32,
    ) -> Result<Vec<BagContract>> {
        let query = r#"
            SELECT bu.bag_id, bu.storage_contract, b.files_size AS size
            FROM bag_users bu
                JOIN bags b ON b.bag_id = bu.bag_id
            WHERE bu.storage_contract IS NOT NULL
                AND bu.notify_attempts >= 0
                AND bu.notify_attempts < $2
            LIMIT $1;
        "#;
        let candidates = sqlx::query_as::<_, BagContract>(query)
            .bind(limit)
            .bind(max_notify_attempts)
            .fetch_all(&self.pool)
            .await?;
        Ok(candidates)
    }

    /// Charge one collection attempt to each given ownership row.
    pub async fn charge_notify_attempts(&self, rows: &[BagContract]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let bag_ids: Vec<String> = rows.iter().map(|r| r.bag_id.clone()).collect();
        let contracts: Vec<String> =
            rows.iter().map(|r| r.storage_contract.clone()).collect();

        let query = r#"
            UPDATE bag_users
            SET notify_attempts = notify_attempts + 1,
                updated_at = now()
            WHERE (bag_id, storage_contract) IN (
                SELECT * FROM UNNEST($1::text[], $2::text[])
            );
        "#;
        sqlx::query(query)
            .bind(&bag_ids)
            .bind(&contracts)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
