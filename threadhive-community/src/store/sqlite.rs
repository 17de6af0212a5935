//! SQLite community storage
//!
//! One pool is created at process start and shared by every request. The
//! `(community_id, user_id)` primary key on `community_memberships` is the
//! concurrency guard for joins; guarded writes are single conditional
//! statements inside a transaction.

use super::{CommunityStore, NewIdentity, Removal, RoleAssignment, StoreError, StoreResult};
use crate::types::{
    fold_case, CommunityPatch, CommunitySummary, CreatorSummary, ListQuery, NewCommunity, SortKey,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    QueryBuilder, Row, Sqlite, SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};
use threadhive_core::{Community, EntityId, Identity, Membership, Role};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT,
        bio TEXT,
        avatar_url TEXT,
        created_at TEXT NOT NULL,
        last_login_at TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS communities (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT,
        rules TEXT,
        avatar_url TEXT,
        banner_url TEXT,
        created_by INTEGER NOT NULL REFERENCES users(id),
        created_at TEXT NOT NULL,
        -- Unicode-folded copies for search; SQLite's own folding is ASCII-only
        name_folded TEXT NOT NULL,
        description_folded TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS community_memberships (
        community_id INTEGER NOT NULL REFERENCES communities(id) ON DELETE CASCADE,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        role TEXT NOT NULL CHECK (role IN ('OWNER', 'ADMIN', 'MODERATOR', 'MEMBER', 'GUEST')),
        assigned_by INTEGER REFERENCES users(id),
        joined_at TEXT NOT NULL,
        PRIMARY KEY (community_id, user_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_memberships_user ON community_memberships(user_id)",
    r#"
    CREATE TABLE IF NOT EXISTS posts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        community_id INTEGER NOT NULL REFERENCES communities(id) ON DELETE CASCADE,
        author_id INTEGER REFERENCES users(id),
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_posts_community ON posts(community_id)",
];

/// Per-community aggregates plus creator fields, shared by listing and detail
const STATS_CTE: &str = r#"
    WITH stats AS (
        SELECT c.id, c.name, c.description, c.rules, c.avatar_url, c.banner_url,
               c.created_by, c.created_at, c.name_folded, c.description_folded,
               u.username AS creator_username,
               u.avatar_url AS creator_avatar_url,
               (SELECT COUNT(*) FROM community_memberships m WHERE m.community_id = c.id)
                   AS member_count,
               (SELECT COUNT(*) FROM posts p WHERE p.community_id = c.id) AS post_count
        FROM communities c
        LEFT JOIN users u ON u.id = c.created_by
    )
    SELECT s.*, vm.role AS viewer_role
    FROM stats s
    LEFT JOIN community_memberships vm ON vm.community_id = s.id AND vm.user_id = "#;

const IDENTITY_COLUMNS: &str = "id, username, email, bio, avatar_url, created_at, last_login_at";
const MEMBERSHIP_COLUMNS: &str = "community_id, user_id, role, assigned_by, joined_at";

fn parse_role(table: &str, raw: &str) -> StoreResult<Role> {
    raw.parse().map_err(|_| StoreError::Corrupt {
        table: table.to_string(),
        message: format!("unknown role '{}'", raw),
    })
}

fn identity_from_row(row: &SqliteRow) -> StoreResult<Identity> {
    Ok(Identity {
        id: EntityId::new(row.try_get("id")?),
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        bio: row.try_get("bio")?,
        avatar_url: row.try_get("avatar_url")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        last_login_at: row.try_get("last_login_at")?,
    })
}

fn membership_from_row(row: &SqliteRow) -> StoreResult<Membership> {
    let role: String = row.try_get("role")?;
    Ok(Membership {
        community_id: EntityId::new(row.try_get("community_id")?),
        user_id: EntityId::new(row.try_get("user_id")?),
        role: parse_role("community_memberships", &role)?,
        assigned_by: row.try_get::<Option<i64>, _>("assigned_by")?.map(EntityId::new),
        joined_at: row.try_get("joined_at")?,
    })
}

fn community_from_row(row: &SqliteRow) -> StoreResult<Community> {
    Ok(Community {
        id: EntityId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        rules: row.try_get("rules")?,
        avatar_url: row.try_get("avatar_url")?,
        banner_url: row.try_get("banner_url")?,
        created_by: EntityId::new(row.try_get("created_by")?),
        created_at: row.try_get("created_at")?,
    })
}

fn summary_from_row(row: &SqliteRow) -> StoreResult<CommunitySummary> {
    let community = community_from_row(row)?;

    let creator = row
        .try_get::<Option<String>, _>("creator_username")?
        .map(|username| -> StoreResult<CreatorSummary> {
            Ok(CreatorSummary {
                id: community.created_by,
                username,
                avatar_url: row.try_get("creator_avatar_url")?,
            })
        })
        .transpose()?;

    let viewer_role = row
        .try_get::<Option<String>, _>("viewer_role")?
        .map(|raw| parse_role("community_memberships", &raw))
        .transpose()?;

    Ok(CommunitySummary {
        creator,
        member_count: row.try_get::<i64, _>("member_count")?.max(0) as u64,
        post_count: row.try_get::<i64, _>("post_count")?.max(0) as u64,
        viewer_role,
        community,
    })
}

/// Database-backed community store
#[derive(Debug, Clone)]
pub struct SqliteCommunityStore {
    pool: SqlitePool,
}

impl SqliteCommunityStore {
    /// Connect and create the schema
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        info!("Connecting to database: {}", database_url);

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        // Every connection to `:memory:` is its own database, so keep exactly one alive
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new().connect_with(options).await?
        };

        Self::new(pool).await
    }

    /// Wrap an existing pool and create the schema
    pub async fn new(pool: SqlitePool) -> StoreResult<Self> {
        let store = Self { pool };
        store.create_tables().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn create_tables(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Community tables created successfully");
        Ok(())
    }

    /// Seed an identity (registration is handled elsewhere)
    pub async fn insert_identity(&self, new: NewIdentity) -> StoreResult<Identity> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO users (username, email, bio, avatar_url, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.bio)
        .bind(&new.avatar_url)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Identity {
            id: EntityId::new(result.last_insert_rowid()),
            username: new.username,
            email: new.email,
            bio: new.bio,
            avatar_url: new.avatar_url,
            created_at: now,
            last_login_at: None,
        })
    }

    /// Count a post against a community (posting is handled elsewhere)
    pub async fn record_post(&self, community: EntityId) -> StoreResult<()> {
        sqlx::query("INSERT INTO posts (community_id, created_at) VALUES (?, ?)")
            .bind(community.get())
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CommunityStore for SqliteCommunityStore {
    async fn find_identity(&self, id: EntityId) -> StoreResult<Option<Identity>> {
        // Public profile columns only; the password hash is never selected
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", IDENTITY_COLUMNS))
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(identity_from_row).transpose()
    }

    async fn record_login(&self, id: EntityId, at: DateTime<Utc>) -> StoreResult<Option<Identity>> {
        let row = sqlx::query(&format!(
            "UPDATE users SET last_login_at = ? WHERE id = ? RETURNING {}",
            IDENTITY_COLUMNS
        ))
        .bind(at)
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(identity_from_row).transpose()
    }

    async fn create_community(
        &self,
        new: &NewCommunity,
        creator: EntityId,
    ) -> StoreResult<Community> {
        let now = Utc::now();

        // Community and owner membership commit together or not at all
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO communities
                (name, description, rules, avatar_url, banner_url, created_by, created_at,
                 name_folded, description_folded)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new.name)
        .bind(&new.description)
        .bind(&new.rules)
        .bind(&new.avatar_url)
        .bind(&new.banner_url)
        .bind(creator.get())
        .bind(now)
        .bind(fold_case(&new.name))
        .bind(new.description.as_deref().map(fold_case))
        .execute(&mut *tx)
        .await?;

        let community_id = result.last_insert_rowid();

        sqlx::query(
            r#"
            INSERT INTO community_memberships (community_id, user_id, role, assigned_by, joined_at)
            VALUES (?, ?, 'OWNER', ?, ?)
            "#,
        )
        .bind(community_id)
        .bind(creator.get())
        .bind(creator.get())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!("Created community {} with owner {}", community_id, creator);

        Ok(Community {
            id: EntityId::new(community_id),
            name: new.name.clone(),
            description: new.description.clone(),
            rules: new.rules.clone(),
            avatar_url: new.avatar_url.clone(),
            banner_url: new.banner_url.clone(),
            created_by: creator,
            created_at: now,
        })
    }

    async fn find_community(&self, id: EntityId) -> StoreResult<Option<Community>> {
        let row = sqlx::query("SELECT * FROM communities WHERE id = ?")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(community_from_row).transpose()
    }

    async fn update_community(
        &self,
        id: EntityId,
        patch: &CommunityPatch,
    ) -> StoreResult<Option<Community>> {
        let row = sqlx::query(
            r#"
            UPDATE communities SET
                name = COALESCE(?, name),
                description = COALESCE(?, description),
                rules = COALESCE(?, rules),
                avatar_url = COALESCE(?, avatar_url),
                banner_url = COALESCE(?, banner_url),
                name_folded = COALESCE(?, name_folded),
                description_folded = COALESCE(?, description_folded)
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&patch.name)
        .bind(&patch.description)
        .bind(&patch.rules)
        .bind(&patch.avatar_url)
        .bind(&patch.banner_url)
        .bind(patch.name.as_deref().map(fold_case))
        .bind(patch.description.as_deref().map(fold_case))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(community_from_row).transpose()
    }

    async fn delete_community(&self, id: EntityId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM communities WHERE id = ?")
            .bind(id.get())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_membership(
        &self,
        community: EntityId,
        user: EntityId,
    ) -> StoreResult<Option<Membership>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM community_memberships WHERE community_id = ? AND user_id = ?",
            MEMBERSHIP_COLUMNS
        ))
        .bind(community.get())
        .bind(user.get())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(membership_from_row).transpose()
    }

    async fn insert_membership(
        &self,
        community: EntityId,
        user: EntityId,
        role: Role,
    ) -> StoreResult<Membership> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO community_memberships (community_id, user_id, role, joined_at)
            VALUES (?, ?, ?, ?)
            RETURNING {}
            "#,
            MEMBERSHIP_COLUMNS
        ))
        .bind(community.get())
        .bind(user.get())
        .bind(role.as_str())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        membership_from_row(&row)
    }

    async fn count_owners(&self, community: EntityId) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM community_memberships WHERE community_id = ? AND role = 'OWNER'",
        )
        .bind(community.get())
        .fetch_one(&self.pool)
        .await?;
        Ok(count.max(0) as u64)
    }

    async fn remove_membership(
        &self,
        community: EntityId,
        user: EntityId,
    ) -> StoreResult<Removal> {
        let mut tx = self.pool.begin().await?;

        // Owner count is evaluated by the same statement that deletes
        let result = sqlx::query(
            r#"
            DELETE FROM community_memberships
            WHERE community_id = ? AND user_id = ?
              AND (role <> 'OWNER'
                   OR (SELECT COUNT(*) FROM community_memberships
                       WHERE community_id = ? AND role = 'OWNER') > 1)
            "#,
        )
        .bind(community.get())
        .bind(user.get())
        .bind(community.get())
        .execute(&mut *tx)
        .await?;

        let outcome = if result.rows_affected() > 0 {
            Removal::Removed
        } else {
            let still_there: Option<String> = sqlx::query_scalar(
                "SELECT role FROM community_memberships WHERE community_id = ? AND user_id = ?",
            )
            .bind(community.get())
            .bind(user.get())
            .fetch_optional(&mut *tx)
            .await?;

            match still_there {
                Some(_) => Removal::SoleOwner,
                None => Removal::Missing,
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn assign_role(&self, assignment: &RoleAssignment) -> StoreResult<Option<Membership>> {
        if assignment.touches_owner() {
            return Ok(None);
        }

        // Both guards are evaluated by the statement that writes
        let row = sqlx::query(&format!(
            r#"
            UPDATE community_memberships
            SET role = ?, assigned_by = ?
            WHERE community_id = ? AND user_id = ? AND role = ?
              AND EXISTS (SELECT 1 FROM community_memberships am
                          WHERE am.community_id = ? AND am.user_id = ? AND am.role = ?)
            RETURNING {}
            "#,
            MEMBERSHIP_COLUMNS
        ))
        .bind(assignment.role.as_str())
        .bind(assignment.actor.get())
        .bind(assignment.community.get())
        .bind(assignment.target.get())
        .bind(assignment.expected.as_str())
        .bind(assignment.community.get())
        .bind(assignment.actor.get())
        .bind(assignment.actor_role.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(membership_from_row).transpose()
    }

    async fn list_communities(&self, query: &ListQuery) -> StoreResult<Vec<CommunitySummary>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(STATS_CTE);
        builder.push_bind(query.viewer.map(EntityId::get));
        builder.push(" WHERE 1 = 1");

        // instr has no wildcard syntax, so the needle matches literally
        if let Some(search) = query.search.as_deref() {
            let needle = fold_case(search);
            builder
                .push(" AND (instr(s.name_folded, ")
                .push_bind(needle.clone())
                .push(") > 0 OR instr(s.description_folded, ")
                .push_bind(needle)
                .push(") > 0)");
        }

        if let Some(user) = query.only_member_of {
            builder
                .push(
                    " AND EXISTS (SELECT 1 FROM community_memberships mm \
                     WHERE mm.community_id = s.id AND mm.user_id = ",
                )
                .push_bind(user.get())
                .push(")");
        }

        // Rows strictly after the anchor row in sort order; an unknown anchor matches nothing
        if let Some(cursor) = query.cursor {
            let after_anchor = match query.sort {
                SortKey::Newest => "s.id < a.id",
                SortKey::Members => {
                    "(s.member_count < a.member_count OR (s.member_count = a.member_count AND s.id < a.id))"
                }
                SortKey::Posts => {
                    "(s.post_count < a.post_count OR (s.post_count = a.post_count AND s.id < a.id))"
                }
                SortKey::Name => "(s.name > a.name OR (s.name = a.name AND s.id > a.id))",
            };
            builder
                .push(" AND EXISTS (SELECT 1 FROM stats a WHERE a.id = ")
                .push_bind(cursor.get())
                .push(" AND ")
                .push(after_anchor)
                .push(")");
        }

        builder.push(match query.sort {
            SortKey::Newest => " ORDER BY s.id DESC",
            SortKey::Members => " ORDER BY s.member_count DESC, s.id DESC",
            SortKey::Posts => " ORDER BY s.post_count DESC, s.id DESC",
            SortKey::Name => " ORDER BY s.name ASC, s.id ASC",
        });
        builder.push(" LIMIT ").push_bind(query.fetch as i64);

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(summary_from_row).collect()
    }

    async fn community_detail(
        &self,
        id: EntityId,
        viewer: Option<EntityId>,
    ) -> StoreResult<Option<CommunitySummary>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(STATS_CTE);
        builder.push_bind(viewer.map(EntityId::get));
        builder.push(" WHERE s.id = ").push_bind(id.get());

        let row = builder.build().fetch_optional(&self.pool).await?;
        row.as_ref().map(summary_from_row).transpose()
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
