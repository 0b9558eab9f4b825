use async_trait::async_trait;
use sqlx::migrate::Migrator;
use sqlx::{PgPool, Postgres, QueryBuilder};

use shopkeep_application::AuditSink;
use shopkeep_core::{AppError, AppResult};
use shopkeep_domain::AuditRow;


static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const AUDIT_ROW_COLUMNS: usize = 10;
const MAX_BIND_PARAMETERS: usize = 65_535;
const MAX_ROWS_PER_STATEMENT: usize = MAX_BIND_PARAMETERS / AUDIT_ROW_COLUMNS;
const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Applies the audit storage migrations.
pub async fn run_migrations(pool: &PgPool) -> AppResult<()> {
    MIGRATOR
        .run(pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run audit migrations: {error}")))
}

/// PostgreSQL-backed bulk audit sink.
#[derive(Clone)]
pub struct PostgresAuditSink {
    pool: PgPool,
}

impl PostgresAuditSink {
    /// Creates a sink with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PostgresAuditSink {
    async fn write(&self, collection: &str, rows: &[AuditRow]) -> AppResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        validate_collection_name(collection)?;

        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Unavailable(format!(
                "failed to start audit transaction for '{collection}': {error}"
            ))
        })?;

        for chunk in rows.chunks(MAX_ROWS_PER_STATEMENT) {
            let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
                "INSERT INTO {collection} (id, user_id, action, table_name, record_id, \
                 old_data, new_data, ip_address, user_agent, created_at) "
            ));
            builder.push_values(chunk, |mut values, row| {
                values
                    .push_bind(row.id)
                    .push_bind(row.user_id.clone())
                    .push_bind(row.action.clone())
                    .push_bind(row.table_name.clone())
                    .push_bind(row.record_id.clone())
                    .push_bind(row.old_data.clone())
                    .push_bind(row.new_data.clone())
                    .push_bind(row.ip_address.clone())
                    .push_bind(row.user_agent.clone())
                    .push_bind(row.created_at);
            });
            builder.push(" ON CONFLICT (id) DO NOTHING");

            builder
                .build()
                .execute(&mut *transaction)
                .await
                .map_err(|error| {
                    AppError::Internal(format!(
                        "failed to insert {} audit rows into '{collection}': {error}",
                        chunk.len()
                    ))
                })?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to commit audit rows into '{collection}': {error}"
            ))
        })?;

        Ok(())
    }
}

/// Accepts only plain, unquoted SQL identifiers.
fn validate_collection_name(collection: &str) -> AppResult<()> {
    let mut characters = collection.chars();
    let starts_well = characters
        .next()
        .is_some_and(|first| first.is_ascii_lowercase() || first == '_');
    let rest_is_plain = characters.all(|character| {
        character.is_ascii_lowercase() || character.is_ascii_digit() || character == '_'
    });

    if !starts_well || !rest_is_plain || collection.len() > MAX_IDENTIFIER_LENGTH {
        return Err(AppError::Validation(format!(
            "audit collection '{collection}' is not a valid table name"
        )));
    }

    Ok(())
}
