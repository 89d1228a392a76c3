use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m002_goal_progress_unique_month"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.get_connection().execute_unprepared(UP_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP INDEX IF EXISTS idx_goal_progress_goal_month;")
            .await?;
        Ok(())
    }
}

// Keep only the newest row per (goal_id, month) before enforcing uniqueness.
const UP_SQL: &str = r#"
DELETE FROM goal_progress
WHERE id NOT IN (
    SELECT id FROM (
        SELECT id, ROW_NUMBER() OVER (
            PARTITION BY goal_id, month ORDER BY created_at DESC
        ) AS rn
        FROM goal_progress
    )
    WHERE rn = 1
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_goal_progress_goal_month ON goal_progress(goal_id, month);
"#;
