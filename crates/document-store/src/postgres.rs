use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    ConditionalUpdate, Document, DocumentId, DocumentQuery, NewDocument, Result, StoreError,
    UpdateOutcome, Version, store::DocumentStore,
};

const DOCUMENT_COLUMNS: &str = "collection, id, version, body, created_at, updated_at";

/// PostgreSQL-backed document store implementation.
///
/// Each conditional update runs in its own transaction: the row is locked
/// with `SELECT ... FOR UPDATE`, the conditions are evaluated, and the new
/// body is written with `version = version + 1` before committing.
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Creates a new PostgreSQL document store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("document store migrations applied");
        Ok(())
    }

    fn row_to_document(row: PgRow) -> Result<Document> {
        Ok(Document {
            collection: row.try_get("collection")?,
            id: DocumentId::from_uuid(row.try_get::<Uuid, _>("id")?),
            version: Version::new(row.try_get("version")?),
            body: row.try_get("body")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn get(&self, collection: &str, id: DocumentId) -> Result<Option<Document>> {
        let row = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE collection = $1 AND id = $2"
        ))
        .bind(collection)
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_document).transpose()
    }

    async fn insert(&self, document: NewDocument) -> Result<DocumentId> {
        let id = document.id;
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, version, body, created_at, updated_at)
            VALUES ($1, $2, $3, $4, NOW(), NOW())
            "#,
        )
        .bind(&document.collection)
        .bind(id.as_uuid())
        .bind(Version::first().as_i64())
        .bind(&document.body)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("documents_pkey")
            {
                return StoreError::DuplicateDocument {
                    collection: document.collection.clone(),
                    id,
                };
            }
            StoreError::Database(e)
        })?;

        Ok(id)
    }

    #[tracing::instrument(skip(self, update))]
    async fn atomic_update(
        &self,
        collection: &str,
        id: DocumentId,
        update: ConditionalUpdate,
    ) -> Result<UpdateOutcome> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE"
        ))
        .bind(collection)
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;

        // Dropping the transaction without commit rolls it back and releases the row lock.
        let Some(row) = row else {
            return Ok(UpdateOutcome::NotFound);
        };
        let current = Self::row_to_document(row)?;

        if !update.is_satisfied_by(&current) {
            tracing::debug!(version = %current.version, "conditions not met, row left unchanged");
            metrics::counter!("store_predicate_failures_total", "collection" => collection.to_string())
                .increment(1);
            return Ok(UpdateOutcome::PredicateFailed(current));
        }

        let mut body = current.body;
        update.apply(&mut body)?;

        let row = sqlx::query(&format!(
            r#"
            UPDATE documents
            SET body = $3, version = version + 1, updated_at = NOW()
            WHERE collection = $1 AND id = $2
            RETURNING {DOCUMENT_COLUMNS}
            "#
        ))
        .bind(collection)
        .bind(id.as_uuid())
        .bind(&body)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(UpdateOutcome::Applied(Self::row_to_document(row)?))
    }

    async fn delete(&self, collection: &str, id: DocumentId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn take(&self, collection: &str, id: DocumentId) -> Result<Option<Document>> {
        let row = sqlx::query(&format!(
            "DELETE FROM documents WHERE collection = $1 AND id = $2 RETURNING {DOCUMENT_COLUMNS}"
        ))
        .bind(collection)
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_document).transpose()
    }

    async fn find(&self, query: DocumentQuery) -> Result<Vec<Document>> {
        let mut sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE collection = $1 AND body @> $2 ORDER BY created_at ASC, id ASC"
        );
        if query.limit.is_some() {
            sql.push_str(" LIMIT $3");
        }

        let mut sqlx_query = sqlx::query(&sql)
            .bind(&query.collection)
            .bind(query.filter_object());
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_document).collect()
    }
}
