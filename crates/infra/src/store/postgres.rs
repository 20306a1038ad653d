//! Postgres-backed family + invite store.
//!
//! ## Atomicity
//!
//! Check-then-mutate sequences on a family (add, remove, delete) run in one
//! transaction that first locks the `families` row with `SELECT ... FOR UPDATE`,
//! so concurrent calls on the same family serialize. Invite transitions are
//! single conditional `DELETE ... RETURNING` statements; the first caller gets
//! the row, everyone else gets nothing.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | DomainError |
//! |------------|----------------------|-------------|
//! | Database (unique violation on invites) | `23505` | `InviteAlreadyExists` (in `insert`) |
//! | Database (other) | any | `Internal` |
//! | PoolClosed / RowNotFound / Other | N/A | `Internal` |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use kinship_core::{DomainError, DomainResult, FamilyId, Invite, InviteId, MemberRemoval, UserId};
use kinship_membership::{FamilyStore, InviteStore};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS families (
        id          BIGSERIAL PRIMARY KEY,
        leader_id   BIGINT NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS family_members (
        family_id   BIGINT NOT NULL REFERENCES families(id) ON DELETE CASCADE,
        user_id     BIGINT NOT NULL,
        joined_seq  BIGSERIAL,
        PRIMARY KEY (family_id, user_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS invites (
        id          BIGSERIAL PRIMARY KEY,
        family_id   BIGINT NOT NULL,
        user_id     BIGINT NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
        CONSTRAINT invites_family_user_key UNIQUE (family_id, user_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS invites_user_idx ON invites (user_id)",
];

/// Postgres-backed membership store implementing both store traits.
#[derive(Debug, Clone)]
pub struct PostgresMembershipStore {
    pool: Arc<PgPool>,
}

impl PostgresMembershipStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect and make sure the schema exists.
    pub async fn connect(database_url: &str) -> DomainResult<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("store.connect", e))?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Idempotent schema setup.
    pub async fn migrate(&self) -> DomainResult<()> {
        for statement in SCHEMA.iter().copied() {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("store.migrate", e))?;
        }
        tracing::info!("membership schema ready");
        Ok(())
    }

    async fn begin(&self, op: &'static str) -> DomainResult<Transaction<'_, Postgres>> {
        self.pool.begin().await.map_err(|e| map_sqlx_error(op, e))
    }
}

/// Lock the family row for the rest of the transaction and return its leader.
async fn lock_family(
    tx: &mut Transaction<'_, Postgres>,
    op: &'static str,
    family: FamilyId,
) -> DomainResult<UserId> {
    let row = sqlx::query("SELECT leader_id FROM families WHERE id = $1 FOR UPDATE")
        .bind(family.get())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error(op, e))?
        .ok_or(DomainError::FamilyNotFound(family))?;
    let leader: i64 = row.try_get("leader_id").map_err(|e| map_sqlx_error(op, e))?;
    Ok(UserId::new(leader))
}

async fn commit(tx: Transaction<'_, Postgres>, op: &'static str) -> DomainResult<()> {
    tx.commit().await.map_err(|e| map_sqlx_error(op, e))
}

fn invite_from_row(op: &'static str, row: &sqlx::postgres::PgRow) -> DomainResult<Invite> {
    let get_i64 = |col: &str| row.try_get::<i64, _>(col).map_err(|e| map_sqlx_error(op, e));
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(|e| map_sqlx_error(op, e))?;
    Ok(Invite {
        id: InviteId::new(get_i64("id")?),
        family_id: FamilyId::new(get_i64("family_id")?),
        user_id: UserId::new(get_i64("user_id")?),
        created_at,
    })
}

#[async_trait]
impl FamilyStore for PostgresMembershipStore {
    #[instrument(skip(self), err)]
    async fn create(&self, leader: UserId) -> DomainResult<FamilyId> {
        const OP: &str = "family_store.create";
        let mut tx = self.begin(OP).await?;
        let row = sqlx::query("INSERT INTO families (leader_id) VALUES ($1) RETURNING id")
            .bind(leader.get())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(OP, e))?;
        let id: i64 = row.try_get("id").map_err(|e| map_sqlx_error(OP, e))?;

        sqlx::query("INSERT INTO family_members (family_id, user_id) VALUES ($1, $2)")
            .bind(id)
            .bind(leader.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(OP, e))?;
        commit(tx, OP).await?;
        Ok(FamilyId::new(id))
    }

    #[instrument(skip(self), err)]
    async fn members_of(&self, family: FamilyId) -> DomainResult<Vec<UserId>> {
        const OP: &str = "family_store.members_of";
        let mut tx = self.begin(OP).await?;
        sqlx::query("SELECT 1 FROM families WHERE id = $1")
            .bind(family.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(OP, e))?
            .ok_or(DomainError::FamilyNotFound(family))?;

        let rows = sqlx::query("SELECT user_id FROM family_members WHERE family_id = $1 ORDER BY joined_seq")
            .bind(family.get())
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(OP, e))?;
        commit(tx, OP).await?;

        rows.iter()
            .map(|r| {
                r.try_get::<i64, _>("user_id")
                    .map(UserId::new)
                    .map_err(|e| map_sqlx_error(OP, e))
            })
            .collect()
    }

    #[instrument(skip(self), err)]
    async fn leader_of(&self, family: FamilyId) -> DomainResult<UserId> {
        const OP: &str = "family_store.leader_of";
        let row = sqlx::query("SELECT leader_id FROM families WHERE id = $1")
            .bind(family.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(OP, e))?
            .ok_or(DomainError::FamilyNotFound(family))?;
        let leader: i64 = row.try_get("leader_id").map_err(|e| map_sqlx_error(OP, e))?;
        Ok(UserId::new(leader))
    }

    #[instrument(skip(self), err)]
    async fn is_member(&self, family: FamilyId, user: UserId) -> DomainResult<bool> {
        const OP: &str = "family_store.is_member";
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM family_members WHERE family_id = $1 AND user_id = $2
            ) AS member, EXISTS (SELECT 1 FROM families WHERE id = $1) AS family
            "#,
        )
        .bind(family.get())
        .bind(user.get())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error(OP, e))?;

        let exists: bool = row.try_get("family").map_err(|e| map_sqlx_error(OP, e))?;
        if !exists {
            return Err(DomainError::FamilyNotFound(family));
        }
        row.try_get("member").map_err(|e| map_sqlx_error(OP, e))
    }

    #[instrument(skip(self), err)]
    async fn add_member(&self, family: FamilyId, user: UserId) -> DomainResult<()> {
        const OP: &str = "family_store.add_member";
        let mut tx = self.begin(OP).await?;
        lock_family(&mut tx, OP, family).await?;

        let inserted = sqlx::query(
            "INSERT INTO family_members (family_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(family.get())
        .bind(user.get())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error(OP, e))?
        .rows_affected();
        if inserted == 0 {
            return Err(DomainError::UserAlreadyInFamily {
                family_id: family,
                user_id: user,
            });
        }
        commit(tx, OP).await
    }

    #[instrument(skip(self), err)]
    async fn remove_member(&self, family: FamilyId, user: UserId) -> DomainResult<MemberRemoval> {
        const OP: &str = "family_store.remove_member";
        let mut tx = self.begin(OP).await?;
        let leader = lock_family(&mut tx, OP, family).await?;

        let removed = sqlx::query("DELETE FROM family_members WHERE family_id = $1 AND user_id = $2")
            .bind(family.get())
            .bind(user.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(OP, e))?
            .rows_affected();
        if removed == 0 {
            return Err(DomainError::UserNotInFamily {
                family_id: family,
                user_id: user,
            });
        }

        let successor = sqlx::query(
            "SELECT user_id FROM family_members WHERE family_id = $1 ORDER BY joined_seq LIMIT 1",
        )
        .bind(family.get())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error(OP, e))?;

        let removal = match successor {
            None => {
                sqlx::query("DELETE FROM families WHERE id = $1")
                    .bind(family.get())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error(OP, e))?;
                MemberRemoval::FamilyDeleted
            }
            Some(_) if leader != user => MemberRemoval::Remaining {
                leader_id: leader,
                leader_changed: false,
            },
            Some(row) => {
                let next: i64 = row.try_get("user_id").map_err(|e| map_sqlx_error(OP, e))?;
                sqlx::query("UPDATE families SET leader_id = $2 WHERE id = $1")
                    .bind(family.get())
                    .bind(next)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error(OP, e))?;
                MemberRemoval::Remaining {
                    leader_id: UserId::new(next),
                    leader_changed: true,
                }
            }
        };
        commit(tx, OP).await?;
        Ok(removal)
    }

    #[instrument(skip(self), err)]
    async fn delete(&self, family: FamilyId) -> DomainResult<Vec<UserId>> {
        const OP: &str = "family_store.delete";
        let mut tx = self.begin(OP).await?;
        lock_family(&mut tx, OP, family).await?;

        let rows = sqlx::query("SELECT user_id FROM family_members WHERE family_id = $1 ORDER BY joined_seq")
            .bind(family.get())
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(OP, e))?;
        let members = rows
            .iter()
            .map(|r| {
                r.try_get::<i64, _>("user_id")
                    .map(UserId::new)
                    .map_err(|e| map_sqlx_error(OP, e))
            })
            .collect::<DomainResult<Vec<_>>>()?;

        sqlx::query("DELETE FROM families WHERE id = $1")
            .bind(family.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(OP, e))?;
        commit(tx, OP).await?;
        Ok(members)
    }
}

#[async_trait]
impl InviteStore for PostgresMembershipStore {
    #[instrument(skip(self), err)]
    async fn insert(&self, family: FamilyId, user: UserId) -> DomainResult<InviteId> {
        const OP: &str = "invite_store.insert";
        let mut tx = self.begin(OP).await?;
        // Holding the family row lock orders this against add_member.
        lock_family(&mut tx, OP, family).await?;

        let member = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM family_members WHERE family_id = $1 AND user_id = $2) AS member",
        )
        .bind(family.get())
        .bind(user.get())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error(OP, e))?;
        let member: bool = member.try_get("member").map_err(|e| map_sqlx_error(OP, e))?;
        if member {
            return Err(DomainError::UserAlreadyInFamily {
                family_id: family,
                user_id: user,
            });
        }

        let row = sqlx::query("INSERT INTO invites (family_id, user_id) VALUES ($1, $2) RETURNING id")
            .bind(family.get())
            .bind(user.get())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DomainError::InviteAlreadyExists {
                        family_id: family,
                        user_id: user,
                    }
                } else {
                    map_sqlx_error(OP, e)
                }
            })?;
        let id: i64 = row.try_get("id").map_err(|e| map_sqlx_error(OP, e))?;
        commit(tx, OP).await?;
        Ok(InviteId::new(id))
    }

    #[instrument(skip(self), err)]
    async fn list_for_user(&self, user: UserId) -> DomainResult<Vec<Invite>> {
        const OP: &str = "invite_store.list_for_user";
        let rows = sqlx::query(
            "SELECT id, family_id, user_id, created_at FROM invites WHERE user_id = $1 ORDER BY id",
        )
        .bind(user.get())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error(OP, e))?;
        rows.iter().map(|r| invite_from_row(OP, r)).collect()
    }

    #[instrument(skip(self), err)]
    async fn exists_for(&self, family: FamilyId, user: UserId) -> DomainResult<bool> {
        const OP: &str = "invite_store.exists_for";
        let row = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM invites WHERE family_id = $1 AND user_id = $2) AS pending",
        )
        .bind(family.get())
        .bind(user.get())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error(OP, e))?;
        row.try_get("pending").map_err(|e| map_sqlx_error(OP, e))
    }

    #[instrument(skip(self), err)]
    async fn consume_if_owned(&self, invite: InviteId, user: UserId) -> DomainResult<Invite> {
        const OP: &str = "invite_store.consume_if_owned";
        let row = sqlx::query(
            "DELETE FROM invites WHERE id = $1 AND user_id = $2 RETURNING id, family_id, user_id, created_at",
        )
        .bind(invite.get())
        .bind(user.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error(OP, e))?
        .ok_or(DomainError::InviteNotFound(invite))?;
        invite_from_row(OP, &row)
    }

    #[instrument(skip(self), err)]
    async fn delete_if_owned(&self, invite: InviteId, user: UserId) -> DomainResult<()> {
        const OP: &str = "invite_store.delete_if_owned";
        let deleted = sqlx::query("DELETE FROM invites WHERE id = $1 AND user_id = $2")
            .bind(invite.get())
            .bind(user.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(OP, e))?
            .rows_affected();
        if deleted == 0 {
            return Err(DomainError::InviteNotFound(invite));
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn delete_all_for_user(&self, user: UserId) -> DomainResult<u64> {
        sqlx::query("DELETE FROM invites WHERE user_id = $1")
            .bind(user.get())
            .execute(&*self.pool)
            .await
            .map(|r| r.rows_affected())
            .map_err(|e| map_sqlx_error("invite_store.delete_all_for_user", e))
    }

    #[instrument(skip(self), err)]
    async fn delete_all_for_family(&self, family: FamilyId) -> DomainResult<u64> {
        sqlx::query("DELETE FROM invites WHERE family_id = $1")
            .bind(family.get())
            .execute(&*self.pool)
            .await
            .map(|r| r.rows_affected())
            .map_err(|e| map_sqlx_error("invite_store.delete_all_for_family", e))
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

/// Map SQLx errors to an `Internal` domain error tagged with the operation.
fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> DomainError {
    match err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.into_owned()).unwrap_or_default();
            DomainError::internal(
                operation,
                format!("database error [{code}]: {}", db_err.message()),
            )
        }
        sqlx::Error::PoolClosed => DomainError::internal(operation, "connection pool closed"),
        sqlx::Error::RowNotFound => DomainError::internal(operation, "unexpected row not found"),
        other => DomainError::internal(operation, format!("sqlx error: {other}")),
    }
}
