use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::files::models::{File, NewFile};
use crate::shared::constants::OWNER_FOLDER_PATH_COLUMN;
use crate::shared::validation::{column_name, owner_table_name};

/// Persistence of file rows and the owner-record lookups the files feature needs
#[async_trait]
pub trait FileRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<File>>;

    async fn insert(&self, new_file: &NewFile) -> Result<File>;

    /// Persist every mutable column of `file`
    async fn update(&self, file: &File) -> Result<File>;

    async fn delete(&self, id: Uuid) -> Result<()>;

    /// Rows without an object key whose URL still points at local files
    async fn list_unmigrated(&self) -> Result<Vec<File>>;

    /// Bulk-rewrite URL and privacy of every other row sharing `key`
    async fn update_shared_references(
        &self,
        key: &str,
        exclude_id: Uuid,
        file_url: &str,
        is_private: bool,
    ) -> Result<u64>;

    /// Number of rows other than `exclude_id` pointing at `key`
    async fn count_other_references(&self, key: &str, exclude_id: Uuid) -> Result<i64>;

    /// `s3_folder_path` of the owning record; errors when the column or table is missing
    async fn owner_folder_path(&self, owner_type: &str, owner_id: &str) -> Result<Option<String>>;

    /// Set `field` on the owning record to `new_url`, only where it still holds `old_url`
    async fn repoint_owner_field(
        &self,
        owner_type: &str,
        owner_id: &str,
        field: &str,
        old_url: &str,
        new_url: &str,
    ) -> Result<u64>;
}

pub struct PgFileRepository {
    pool: PgPool,
}

impl PgFileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn owner_table(owner_type: &str) -> Result<String> {
    owner_table_name(owner_type)
        .ok_or_else(|| AppError::Validation(format!("Invalid owner type '{}'", owner_type)))
}

#[async_trait]
impl FileRepository for PgFileRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<File>> {
        let file = sqlx::query_as::<_, File>("SELECT * FROM files WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(file)
    }

    async fn insert(&self, new_file: &NewFile) -> Result<File> {
        let file = sqlx::query_as::<_, File>(
            r#"
            INSERT INTO files (file_name, file_url, file_size, is_private, content_hash,
                               s3_file_key, owner_type, owner_id, owner_field)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(&new_file.file_name)
        .bind(&new_file.file_url)
        .bind(new_file.file_size)
        .bind(new_file.is_private)
        .bind(&new_file.content_hash)
        .bind(&new_file.s3_file_key)
        .bind(&new_file.owner_type)
        .bind(&new_file.owner_id)
        .bind(&new_file.owner_field)
        .fetch_one(&self.pool)
        .await?;

        Ok(file)
    }

    async fn update(&self, file: &File) -> Result<File> {
        let updated = sqlx::query_as::<_, File>(
            r#"
            UPDATE files
            SET file_name = $2, file_url = $3, file_size = $4, is_private = $5,
                content_hash = $6, s3_file_key = $7, owner_type = $8, owner_id = $9,
                owner_field = $10, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(file.id)
        .bind(&file.file_name)
        .bind(&file.file_url)
        .bind(file.file_size)
        .bind(file.is_private)
        .bind(&file.content_hash)
        .bind(&file.s3_file_key)
        .bind(&file.owner_type)
        .bind(&file.owner_id)
        .bind(&file.owner_field)
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or_else(|| AppError::NotFound(format!("File {} not found", file.id)))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn list_unmigrated(&self) -> Result<Vec<File>> {
        let files = sqlx::query_as::<_, File>(
            r#"
            SELECT * FROM files
            WHERE s3_file_key IS NULL
              AND is_folder = FALSE
              AND file_url LIKE '%/files/%'
            ORDER BY updated_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(files)
    }

    async fn update_shared_references(
        &self,
        key: &str,
        exclude_id: Uuid,
        file_url: &str,
        is_private: bool,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE files
            SET file_url = $1, is_private = $2, updated_at = NOW()
            WHERE s3_file_key = $3 AND id <> $4
            "#,
        )
        .bind(file_url)
        .bind(is_private)
        .bind(key)
        .bind(exclude_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn count_other_references(&self, key: &str, exclude_id: Uuid) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM files WHERE s3_file_key = $1 AND id <> $2",
        )
        .bind(key)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn owner_folder_path(&self, owner_type: &str, owner_id: &str) -> Result<Option<String>> {
        let table = owner_table(owner_type)?;
        let sql = format!(
            r#"SELECT "{}" FROM "{}" WHERE id::text = $1"#,
            OWNER_FOLDER_PATH_COLUMN, table
        );

        let path = sqlx::query_scalar::<_, Option<String>>(&sql)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(path.flatten())
    }

    async fn repoint_owner_field(
        &self,
        owner_type: &str,
        owner_id: &str,
        field: &str,
        old_url: &str,
        new_url: &str,
    ) -> Result<u64> {
        let table = owner_table(owner_type)?;
        let column = column_name(field)
            .ok_or_else(|| AppError::Validation(format!("Invalid owner field '{}'", field)))?;
        let sql = format!(
            r#"UPDATE "{table}" SET "{column}" = $1 WHERE id::text = $2 AND "{column}" = $3"#
        );

        let result = sqlx::query(&sql)
            .bind(new_url)
            .bind(owner_id)
            .bind(old_url)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
