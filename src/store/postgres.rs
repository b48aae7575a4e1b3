//! PostgreSQL content store.

use super::record::{ContentCounts, ContentFilter, ContentRecord, ContentStatus};
use super::ContentStore;
use crate::schedule::{RunStats, ScheduleDefinition};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, QueryBuilder, Row};
use tracing::debug;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS content_forge_content (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    slug TEXT NOT NULL,
    excerpt TEXT,
    body TEXT NOT NULL,
    headings TEXT[] NOT NULL DEFAULT '{}',
    keywords TEXT[] NOT NULL DEFAULT '{}',
    tone TEXT,
    audience TEXT,
    readability DOUBLE PRECISION NOT NULL,
    seo_score SMALLINT NOT NULL,
    recommendations TEXT[] NOT NULL DEFAULT '{}',
    status TEXT NOT NULL,
    category TEXT,
    schedule_id TEXT,
    request JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    published_at TIMESTAMPTZ
);
CREATE INDEX IF NOT EXISTS content_forge_content_created_idx
    ON content_forge_content (created_at DESC);
CREATE TABLE IF NOT EXISTS content_forge_schedules (
    id TEXT PRIMARY KEY,
    definition JSONB NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
"#;

/// [`ContentStore`] over a `sqlx` Postgres pool. Queries are checked at run
/// time, so building the crate needs no database.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPool::connect(url).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        debug!("content store schema ensured");
        Ok(())
    }
}

fn store_error(what: &str, e: impl std::fmt::Display) -> crate::Error {
    crate::Error::store_with_context(
        format!("failed to read {}: {}", what, e),
        crate::ErrorContext::new().with_source("postgres"),
    )
}

fn record_from_row(row: &PgRow) -> Result<ContentRecord> {
    let status: String = row.try_get("status").map_err(|e| store_error("status", e))?;
    let seo_score: i16 = row.try_get("seo_score").map_err(|e| store_error("seo_score", e))?;
    Ok(ContentRecord {
        id: row.try_get("id").map_err(|e| store_error("id", e))?,
        title: row.try_get("title").map_err(|e| store_error("title", e))?,
        slug: row.try_get("slug").map_err(|e| store_error("slug", e))?,
        excerpt: row.try_get("excerpt").map_err(|e| store_error("excerpt", e))?,
        body: row.try_get("body").map_err(|e| store_error("body", e))?,
        headings: row.try_get("headings").map_err(|e| store_error("headings", e))?,
        keywords: row.try_get("keywords").map_err(|e| store_error("keywords", e))?,
        tone: row.try_get("tone").map_err(|e| store_error("tone", e))?,
        audience: row.try_get("audience").map_err(|e| store_error("audience", e))?,
        readability: row
            .try_get("readability")
            .map_err(|e| store_error("readability", e))?,
        seo_score: seo_score.clamp(0, 100) as u8,
        recommendations: row
            .try_get("recommendations")
            .map_err(|e| store_error("recommendations", e))?,
        status: status.parse::<ContentStatus>()?,
        category: row.try_get("category").map_err(|e| store_error("category", e))?,
        schedule_id: row
            .try_get("schedule_id")
            .map_err(|e| store_error("schedule_id", e))?,
        request: row.try_get("request").map_err(|e| store_error("request", e))?,
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(|e| store_error("created_at", e))?,
        published_at: row
            .try_get::<Option<DateTime<Utc>>, _>("published_at")
            .map_err(|e| store_error("published_at", e))?,
    })
}

#[async_trait]
impl ContentStore for PostgresStore {
    async fn insert_content(&self, record: &ContentRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO content_forge_content \
             (id, title, slug, excerpt, body, headings, keywords, tone, audience, readability, \
              seo_score, recommendations, status, category, schedule_id, request, created_at, \
              published_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
                     $18)",
        )
        .bind(&record.id)
        .bind(&record.title)
        .bind(&record.slug)
        .bind(&record.excerpt)
        .bind(&record.body)
        .bind(&record.headings)
        .bind(&record.keywords)
        .bind(&record.tone)
        .bind(&record.audience)
        .bind(record.readability)
        .bind(i16::from(record.seo_score))
        .bind(&record.recommendations)
        .bind(record.status.as_str())
        .bind(&record.category)
        .bind(&record.schedule_id)
        .bind(&record.request)
        .bind(record.created_at)
        .bind(record.published_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_content(&self, filter: &ContentFilter) -> Result<Vec<ContentRecord>> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT * FROM content_forge_content WHERE TRUE");
        if let Some(status) = filter.status {
            query.push(" AND status = ");
            query.push_bind(status.as_str());
        }
        if let Some(ref schedule_id) = filter.schedule_id {
            query.push(" AND schedule_id = ");
            query.push_bind(schedule_id.clone());
        }
        query.push(" ORDER BY created_at DESC");
        if let Some(limit) = filter.limit {
            query.push(" LIMIT ");
            query.push_bind(limit as i64);
        }

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(record_from_row).collect()
    }

    async fn content_counts(&self) -> Result<ContentCounts> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total, \
             COUNT(*) FILTER (WHERE status = 'draft') AS drafts, \
             COUNT(*) FILTER (WHERE status = 'published') AS published \
             FROM content_forge_content",
        )
        .fetch_one(&self.pool)
        .await?;
        let get = |name: &str| -> Result<u64> {
            let n: i64 = row.try_get(name).map_err(|e| store_error(name, e))?;
            Ok(n.max(0) as u64)
        };
        Ok(ContentCounts {
            total: get("total")?,
            drafts: get("drafts")?,
            published: get("published")?,
        })
    }

    async fn load_schedules(&self) -> Result<Vec<ScheduleDefinition>> {
        let rows = sqlx::query("SELECT definition FROM content_forge_schedules ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                let definition: serde_json::Value = row
                    .try_get("definition")
                    .map_err(|e| store_error("definition", e))?;
                Ok(serde_json::from_value(definition)?)
            })
            .collect()
    }

    async fn upsert_schedule(&self, definition: &ScheduleDefinition) -> Result<()> {
        sqlx::query(
            "INSERT INTO content_forge_schedules (id, definition, updated_at) \
             VALUES ($1, $2, now()) \
             ON CONFLICT (id) DO UPDATE SET definition = EXCLUDED.definition, updated_at = now()",
        )
        .bind(&definition.id)
        .bind(serde_json::to_value(definition)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_schedule_run(&self, schedule_id: &str, stats: &RunStats) -> Result<()> {
        let result = sqlx::query(
            "UPDATE content_forge_schedules \
             SET definition = jsonb_set(definition, '{stats}', $2), updated_at = now() \
             WHERE id = $1",
        )
        .bind(schedule_id)
        .bind(serde_json::to_value(stats)?)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(crate::Error::store_with_context(
                "unknown schedule",
                crate::ErrorContext::new()
                    .with_field_path("schedule_id")
                    .with_details(schedule_id.to_string()),
            ));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
