//! Provider-notification queue repository.
//!
//! One row per `(storage_contract, provider_pubkey)` tuple; the primary key
//! plus the `ON CONFLICT DO NOTHING` enqueue are what make admission
//! at-most-once across collector runs and crashes.

use crate::error::Result;
use crate::models::ProviderNotification;
use sqlx::postgres::PgPool;

#[derive(Clone)]
pub struct NotificationsRepo {
    pool: PgPool,
}

impl NotificationsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Enqueue notification rows and, in the same statement, flag the
    /// originating ownership rows as handed off (`notify_attempts = -1`).
    /// Tuples already present are silently skipped.
    pub async fn enqueue(&self, notifications: &[ProviderNotification]) -> Result<()> {
        if notifications.is_empty() {
            return Ok(());
        }
        let bag_ids: Vec<String> =
            notifications.iter().map(|n| n.bag_id.clone()).collect();
        let contracts: Vec<String> = notifications
            .iter()
            .map(|n| n.storage_contract.clone())
            .collect();
        let pubkeys: Vec<String> = notifications
            .iter()
            .map(|n| n.provider_pubkey.clone())
            .collect();
        let sizes: Vec<i64> = notifications.iter().map(|n| n.size).collect();

        let query = r#"
            WITH cte AS (
                SELECT *
                FROM UNNEST($1::text[], $2::text[], $3::text[], $4::bigint[])
                    AS t(bag_id, storage_contract, provider_pubkey, size)
            ), handoff AS (
                UPDATE bag_users
                SET notify_attempts = -1,
                    updated_at = now()
                WHERE (bag_id, storage_contract) IN
                    (SELECT DISTINCT bag_id, storage_contract FROM cte)
            )
            INSERT INTO provider_notifications (bag_id, storage_contract, provider_pubkey, size)
            SELECT bag_id, storage_contract, provider_pubkey, size
            FROM cte
            ON CONFLICT (storage_contract, provider_pubkey) DO NOTHING;
        "#;
        sqlx::query(query)
            .bind(&bag_ids)
            .bind(&contracts)
            .bind(&pubkeys)
            .bind(&sizes)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Rows that still need their first successful probe.
    pub async fn to_notify(
        &self,
        limit: i64,
        max_notify_attempts: i32,
    ) -> Result<Vec<ProviderNotification>> {
        let query = r#"
            SELECT bag_id, storage_contract, provider_pubkey, size, downloaded
            FROM provider_notifications
            WHERE NOT notified AND notify_attempts <= $2
            LIMIT $1;
        "#;
        let rows = sqlx::query_as::<_, ProviderNotification>(query)
            .bind(limit)
            .bind(max_notify_attempts)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Notified rows whose download has not finished, unprobed for at least
    /// five minutes, oldest first so no provider is starved.
    pub async fn in_progress(
        &self,
        limit: i64,
        max_download_checks: i32,
    ) -> Result<Vec<ProviderNotification>> {
        let query = r#"
            SELECT bag_id, storage_contract, provider_pubkey, size, downloaded
            FROM provider_notifications
            WHERE size > downloaded
                AND notified
                AND download_checks <= $2
                AND updated_at < now() - interval '5 minutes'
            ORDER BY updated_at ASC
            LIMIT $1;
        "#;
        let rows = sqlx::query_as::<_, ProviderNotification>(query)
            .bind(limit)
            .bind(max_download_checks)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Mark rows whose probe returned a proof: notified, one more attempt,
    /// fresh `updated_at`.
    pub async fn mark_notified(&self, notifications: &[ProviderNotification]) -> Result<()> {
        if notifications.is_empty() {
            return Ok(());
        }
        let (contracts, pubkeys) = contract_pubkey_arrays(notifications);
        let query = r#"
            UPDATE provider_notifications
            SET notify_attempts = notify_attempts + 1,
                notified = true,
                updated_at = now()
            WHERE (storage_contract, provider_pubkey) IN (
                SELECT * FROM UNNEST($1::text[], $2::text[])
            );
        "#;
        sqlx::query(query)
            .bind(&contracts)
            .bind(&pubkeys)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Charge one failed notification attempt to each row.
    pub async fn charge_notify_attempts(
        &self,
        notifications: &[ProviderNotification],
    ) -> Result<()> {
        if notifications.is_empty() {
            return Ok(());
        }
        let (contracts, pubkeys) = contract_pubkey_arrays(notifications);
        let query = r#"
            UPDATE provider_notifications
            SET notify_attempts = notify_attempts + 1,
                updated_at = now()
            WHERE (storage_contract, provider_pubkey) IN (
                SELECT * FROM UNNEST($1::text[], $2::text[])
            );
        "#;
        sqlx::query(query)
            .bind(&contracts)
            .bind(&pubkeys)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Store the provider-reported byte counts from a progress probe. The
    /// reported value is written verbatim; providers occasionally re-seed
    /// and report less than before.
    pub async fn record_download_checks(
        &self,
        notifications: &[ProviderNotification],
    ) -> Result<()> {
        if notifications.is_empty() {
            return Ok(());
        }
        let (contracts, pubkeys) = contract_pubkey_arrays(notifications);
        let downloaded: Vec<i64> = notifications.iter().map(|n| n.downloaded).collect();
        let query = r#"
            UPDATE provider_notifications n
            SET download_checks = download_checks + 1,
                downloaded = c.downloaded,
                updated_at = now()
            FROM (
                SELECT *
                FROM UNNEST($1::text[], $2::text[], $3::bigint[])
                    AS t(storage_contract, provider_pubkey, downloaded)
            ) c
            WHERE (n.storage_contract, n.provider_pubkey)
                = (c.storage_contract, c.provider_pubkey);
        "#;
        sqlx::query(query)
            .bind(&contracts)
            .bind(&pubkeys)
            .bind(&downloaded)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Charge one failed progress check to each row. `updated_at` is
    /// refreshed so the five-minute probe spacing holds on the failure path
    /// too.
    pub async fn charge_download_checks(
        &self,
        notifications: &[ProviderNotification],
    ) -> Result<()> {
        if notifications.is_empty() {
            return Ok(());
        }
        let (contracts, pubkeys) = contract_pubkey_arrays(notifications);
        let query = r#"
            UPDATE provider_notifications
            SET download_checks = download_checks + 1,
                updated_at = now()
            WHERE (storage_contract, provider_pubkey) IN (
                SELECT * FROM UNNEST($1::text[], $2::text[])
            );
        "#;
        sqlx::query(query)
            .bind(&contracts)
            .bind(&pubkeys)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Reap terminal notification rows past the paid-lifetime grace window.
    ///
    /// A bag qualifies only when every notification row sharing its
    /// `bag_id` is terminal (the `MIN` over the per-row predicate); the
    /// deleted rows are archived into `notifications_history` in the same
    /// statement. Returns the bag ids of the archived rows.
    pub async fn reap_terminal(
        &self,
        limit: i64,
        older_than_secs: i64,
        max_notify_attempts: i32,
        max_download_checks: i32,
    ) -> Result<Vec<String>> {
        let query = r#"
            WITH cte AS (
                SELECT
                    n.provider_pubkey,
                    n.storage_contract,
                    n.bag_id,
                    (
                        (
                            (NOT n.notified AND n.notify_attempts > $1)
                            OR (n.notified AND n.download_checks > $2)
                            OR (n.downloaded >= n.size)
                        )
                        AND EXTRACT(EPOCH FROM (now() - n.updated_at)) > $3
                    ) AS can_delete
                FROM provider_notifications n
            ), del AS (
                SELECT c.provider_pubkey, c.storage_contract
                FROM cte c
                WHERE c.bag_id IN (
                    SELECT bag_id
                    FROM cte
                    GROUP BY bag_id
                    HAVING MIN(can_delete::int) = 1
                )
                LIMIT $4
            ), removed AS (
                DELETE FROM provider_notifications n
                USING del
                WHERE (n.provider_pubkey, n.storage_contract)
                    = (del.provider_pubkey, del.storage_contract)
                RETURNING n.bag_id, n.storage_contract, n.provider_pubkey, n.size,
                    n.notified, n.notify_attempts, n.download_checks, n.downloaded
            )
            INSERT INTO notifications_history
                (bag_id, storage_contract, provider_pubkey, size,
                 notified, notify_attempts, download_checks, downloaded, archived_at)
            SELECT bag_id, storage_contract, provider_pubkey, size,
                notified, notify_attempts, download_checks, downloaded, now()
            FROM removed
            RETURNING bag_id;
        "#;
        let removed = sqlx::query_scalar::<_, String>(query)
            .bind(max_notify_attempts)
            .bind(max_download_checks)
            .bind(older_than_secs)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(removed)
    }

    /// Drop archived rows past the retention horizon. Returns the number of
    /// rows removed.
    pub async fn prune_history(&self, older_than_days: i64) -> Result<u64> {
        let query = r#"
            DELETE FROM notifications_history
            WHERE archived_at < now() - make_interval(days => $1::int);
        "#;
        let result = sqlx::query(query)
            .bind(older_than_days)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn contract_pubkey_arrays(
    notifications: &[ProviderNotification],
) -> (Vec<String>, Vec<String>) {
    let contracts = notifications
        .iter()
        .map(|n| n.storage_contract.clone())
        .collect();
    let pubkeys = notifications
        .iter()
        .map(|n| n.provider_pubkey.clone())
        .collect();
    (contracts, pubkeys)
}
