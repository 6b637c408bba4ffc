use sqlx::{PgPool, Postgres, QueryBuilder};
use time::Date;
use uuid::Uuid;

use crate::tasks::dto::TaskPatch;
use crate::tasks::query::TaskQuerySpec;
use crate::tasks::repo_types::{TaskRecord, TaskStatus};

const TASK_SELECT: &str = "\
SELECT t.id, t.title, t.description, t.deadline, t.status, t.created_at, \
       t.assigned_to, au.name AS assignee_name, au.email AS assignee_email, \
       t.created_by, cu.name AS creator_name \
FROM tasks t \
JOIN users au ON au.id = t.assigned_to \
JOIN users cu ON cu.id = t.created_by";

impl TaskRecord {
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<TaskRecord>, sqlx::Error> {
        sqlx::query_as::<_, TaskRecord>(&format!("{TASK_SELECT} WHERE t.id = $1"))
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// Render a normalized query spec. All caller-supplied values are bound;
    /// the sort column comes from the allow-list, never from the request.
    pub async fn list(db: &PgPool, spec: &TaskQuerySpec) -> Result<Vec<TaskRecord>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(TASK_SELECT);
        qb.push(" WHERE TRUE");

        if let Some(assigned_to) = spec.assigned_to {
            qb.push(" AND t.assigned_to = ").push_bind(assigned_to);
        }
        if let Some(search) = &spec.search {
            let pattern = format!("%{}%", escape_like(search));
            qb.push(" AND (t.title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR t.description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(status) = spec.status {
            qb.push(" AND t.status = ").push_bind(status);
        }

        qb.push(" ORDER BY t.")
            .push(spec.sort.column())
            .push(if spec.descending { " DESC" } else { " ASC" });

        qb.build_query_as::<TaskRecord>().fetch_all(db).await
    }

    pub async fn create(
        db: &PgPool,
        title: &str,
        description: &str,
        deadline: Date,
        status: TaskStatus,
        assigned_to: Uuid,
        created_by: Uuid,
    ) -> Result<Uuid, sqlx::Error> {
        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO tasks (title, description, deadline, status, assigned_to, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(title)
        .bind(description)
        .bind(deadline)
        .bind(status)
        .bind(assigned_to)
        .bind(created_by)
        .fetch_one(db)
        .await?;
        Ok(id)
    }

    /// Partial update: absent fields keep their stored value. `created_by`
    /// and `created_at` are not reachable from this statement.
    pub async fn update(db: &PgPool, id: Uuid, patch: &TaskPatch) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                deadline = COALESCE($4, deadline),
                status = COALESCE($5, status),
                assigned_to = COALESCE($6, assigned_to)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(patch.title.as_deref())
        .bind(patch.description.as_deref())
        .bind(patch.deadline)
        .bind(patch.status)
        .bind(patch.assigned_to)
        .execute(db)
        .await?;
        Ok(result.rows_affected())
    }

    /// Deletion is permanent; there is no soft-delete.
    pub async fn delete(db: &PgPool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Escape LIKE metacharacters so search text matches literally.
fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_like_neutralizes_wildcards() {
        assert_eq!(escape_like("50%_done"), "50\\%\\_done");
        assert_eq!(escape_like(r"a\b"), r"a\\b");
        assert_eq!(escape_like("plain"), "plain");
    }
}
