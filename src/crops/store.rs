//! Crop aggregate persistence
//!
//! The append path is the one piece of this server with a real contract:
//! a read-modify-write of the per-category URL list that must not lose
//! updates under concurrent requests, and must not create two rows for one
//! taxonomy tuple when two first-time appends race.
//!
//! Both hazards are closed the same way: the taxonomy tuple carries a UNIQUE
//! constraint, and every append runs in a transaction whose *first* statement
//! is an `INSERT ... ON CONFLICT DO NOTHING` of the empty default row. The
//! insert takes SQLite's write lock up front, so concurrent appenders for any
//! tuple serialize, and the losing first-time inserter simply finds the row
//! already there.

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::Result;

use super::types::{AggregateView, CategoryUrls, CropCategory, TaxonomyKey};

/// Repository for crop aggregate rows
pub struct CropRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CropRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Append `url` under `category` for the given taxonomy tuple, creating
    /// the aggregate row on first use.
    ///
    /// The category map is treated as an immutable value: read, rebuilt with
    /// the URL appended, and written back whole. On any failure the
    /// transaction rolls back; the already-uploaded storage object is left
    /// in place (accepted orphan, see DESIGN.md).
    pub async fn append_crop_url(
        &self,
        key: TaxonomyKey,
        category: CropCategory,
        url: &str,
    ) -> Result<AggregateView> {
        let now = Utc::now().to_rfc3339();
        let empty = serde_json::to_string(&CategoryUrls::default())?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO crop_aggregates
                (id, class_id, subject_id, course_id, module_id, image_urls, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(class_id, subject_id, course_id, module_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(key.class_id)
        .bind(key.subject_id)
        .bind(key.course_id)
        .bind(key.module_id)
        .bind(&empty)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        let (raw, created_at): (String, String) = sqlx::query_as(
            r#"
            SELECT image_urls, created_at
            FROM crop_aggregates
            WHERE class_id = ? AND subject_id = ? AND course_id = ? AND module_id = ?
            "#,
        )
        .bind(key.class_id)
        .bind(key.subject_id)
        .bind(key.course_id)
        .bind(key.module_id)
        .fetch_one(&mut *tx)
        .await?;

        let mut image_urls: CategoryUrls = serde_json::from_str(&raw)?;
        image_urls.push(category, url.to_string());

        sqlx::query(
            r#"
            UPDATE crop_aggregates
            SET image_urls = ?, updated_at = ?
            WHERE class_id = ? AND subject_id = ? AND course_id = ? AND module_id = ?
            "#,
        )
        .bind(serde_json::to_string(&image_urls)?)
        .bind(&now)
        .bind(key.class_id)
        .bind(key.subject_id)
        .bind(key.course_id)
        .bind(key.module_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let total_images = image_urls.total();
        Ok(AggregateView {
            image_urls,
            created_at: Some(created_at),
            updated_at: Some(now),
            total_images,
        })
    }

    /// Full aggregate for a taxonomy tuple.
    ///
    /// A never-seen tuple yields the four-category empty default, never an
    /// error.
    pub async fn get_aggregate(&self, key: TaxonomyKey) -> Result<AggregateView> {
        let row: Option<(String, String, String)> = sqlx::query_as(
            r#"
            SELECT image_urls, created_at, updated_at
            FROM crop_aggregates
            WHERE class_id = ? AND subject_id = ? AND course_id = ? AND module_id = ?
            "#,
        )
        .bind(key.class_id)
        .bind(key.subject_id)
        .bind(key.course_id)
        .bind(key.module_id)
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some((raw, created_at, updated_at)) => {
                let image_urls: CategoryUrls = serde_json::from_str(&raw)?;
                let total_images = image_urls.total();
                Ok(AggregateView {
                    image_urls,
                    created_at: Some(created_at),
                    updated_at: Some(updated_at),
                    total_images,
                })
            }
            None => Ok(AggregateView::empty()),
        }
    }

    /// URLs for one category of a taxonomy tuple
    pub async fn get_category(
        &self,
        key: TaxonomyKey,
        category: CropCategory,
    ) -> Result<Vec<String>> {
        let aggregate = self.get_aggregate(key).await?;
        Ok(aggregate.image_urls.get(category).to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn test_pool() -> (SqlitePool, tempfile::NamedTempFile) {
        let file = tempfile::NamedTempFile::new().expect("temp db file");
        let url = format!("sqlite:{}", file.path().display());
        let pool = db::create_pool(&url).await.expect("create pool");
        (pool, file)
    }

    fn tuple(n: i64) -> TaxonomyKey {
        TaxonomyKey {
            class_id: n,
            subject_id: n + 1,
            course_id: n + 2,
            module_id: n + 3,
        }
    }

    async fn row_count(pool: &SqlitePool, key: TaxonomyKey) -> i64 {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM crop_aggregates \
             WHERE class_id = ? AND subject_id = ? AND course_id = ? AND module_id = ?",
        )
        .bind(key.class_id)
        .bind(key.subject_id)
        .bind(key.course_id)
        .bind(key.module_id)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn appends_preserve_call_order() {
        let (pool, _file) = test_pool().await;
        let repo = CropRepository::new(&pool);
        let key = tuple(1);

        for i in 0..3 {
            repo.append_crop_url(key, CropCategory::Tables, &format!("url-{}", i))
                .await
                .unwrap();
        }
        repo.append_crop_url(key, CropCategory::Equations, "eq-0")
            .await
            .unwrap();

        let urls = repo.get_category(key, CropCategory::Tables).await.unwrap();
        assert_eq!(urls, ["url-0", "url-1", "url-2"]);

        let aggregate = repo.get_aggregate(key).await.unwrap();
        assert_eq!(aggregate.total_images, 4);
        assert_eq!(aggregate.image_urls.get(CropCategory::Equations).to_vec(), ["eq-0"]);
        assert!(aggregate.created_at.is_some());
        assert!(aggregate.updated_at.is_some());
    }

    #[tokio::test]
    async fn unseen_tuple_returns_empty_default() {
        let (pool, _file) = test_pool().await;
        let repo = CropRepository::new(&pool);

        let aggregate = repo.get_aggregate(tuple(100)).await.unwrap();
        assert_eq!(aggregate.total_images, 0);
        assert_eq!(aggregate.image_urls, CategoryUrls::default());
        assert!(aggregate.created_at.is_none());

        for category in CropCategory::ALL {
            let urls = repo.get_category(tuple(100), category).await.unwrap();
            assert!(urls.is_empty());
        }
    }

    #[tokio::test]
    async fn append_does_not_touch_other_tuples() {
        let (pool, _file) = test_pool().await;
        let repo = CropRepository::new(&pool);

        repo.append_crop_url(tuple(1), CropCategory::Diagrams, "d-1")
            .await
            .unwrap();

        let other = repo.get_aggregate(tuple(2)).await.unwrap();
        assert_eq!(other.total_images, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_to_existing_row_lose_nothing() {
        let (pool, _file) = test_pool().await;
        let key = tuple(10);

        // Seed the row so every task hits the update path.
        CropRepository::new(&pool)
            .append_crop_url(key, CropCategory::Tables, "seed")
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                CropRepository::new(&pool)
                    .append_crop_url(key, CropCategory::Tables, &format!("c-{}", i))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let urls = CropRepository::new(&pool)
            .get_category(key, CropCategory::Tables)
            .await
            .unwrap();
        assert_eq!(urls.len(), 9);
        for i in 0..8 {
            assert!(urls.contains(&format!("c-{}", i)));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_time_appends_create_exactly_one_row() {
        let (pool, _file) = test_pool().await;
        let key = tuple(50);

        let mut handles = Vec::new();
        for i in 0..8 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                CropRepository::new(&pool)
                    .append_crop_url(key, CropCategory::Others, &format!("first-{}", i))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(row_count(&pool, key).await, 1);

        let aggregate = CropRepository::new(&pool).get_aggregate(key).await.unwrap();
        assert_eq!(aggregate.total_images, 8);
    }
}
