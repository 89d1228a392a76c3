use std::collections::BTreeSet;

use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, QueryFilter, QueryOrder,
};
use vexec_common::tasks::truncate_title;
use vexec_common::types::{NewTask, Task, TaskPriority, TaskStatus, UpdateTaskRequest};

use crate::entities::task::{self, Column, Entity};
use crate::store::{parse_enum, Store};

/// Filters for [`Store::list_tasks`]; `company_id` is mandatory.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub company_id: String,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assigned_to_id: Option<String>,
}

fn to_task(m: task::Model) -> Result<Task> {
    Ok(Task {
        status: parse_enum("status", &m.status)?,
        priority: parse_enum("priority", &m.priority)?,
        effort: parse_enum("effort", &m.effort)?,
        id: m.id,
        company_id: m.company_id,
        analysis_id: m.analysis_id,
        title: m.title,
        description: m.description,
        due_date: m.due_date.map(|d| d.with_timezone(&Utc)),
        assigned_to_id: m.assigned_to_id,
        completion_note: m.completion_note,
        completed_at: m.completed_at.map(|d| d.with_timezone(&Utc)),
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    })
}

fn blank_to_none(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}

impl Store {
    async fn insert_task(&self, new: &NewTask) -> Result<Task> {
        let now = Utc::now().fixed_offset();
        let (title, _) = truncate_title(&new.title);
        let am = task::ActiveModel {
            id: Set(vexec_common::id::next_id()),
            company_id: Set(new.company_id.clone()),
            analysis_id: Set(new.analysis_id.clone()),
            title: Set(title),
            description: Set(new.description.clone()),
            status: Set(TaskStatus::Todo.as_str().to_owned()),
            priority: Set(new.priority.as_str().to_owned()),
            effort: Set(new.effort.as_str().to_owned()),
            due_date: Set(new.due_date.map(|d| d.fixed_offset())),
            assigned_to_id: Set(new.assigned_to_id.clone()),
            completion_note: Set(None),
            completed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let m = am.insert(self.db()).await?;
        to_task(m)
    }

    /// Creates a TODO task. Fails with `StorageError::NotFound` when the
    /// company does not exist or when the assignee or analysis is not part
    /// of that company.
    pub async fn create_task(&self, new: &NewTask) -> Result<Task> {
        self.ensure_company(&new.company_id).await?;
        if let Some(member_id) = &new.assigned_to_id {
            self.ensure_team_member(&new.company_id, member_id).await?;
        }
        if let Some(analysis_id) = &new.analysis_id {
            self.ensure_analysis(&new.company_id, analysis_id).await?;
        }
        self.insert_task(new).await
    }

    /// Bulk variant of [`Store::create_task`], used for analysis-derived
    /// tasks. Inserts are not wrapped in a transaction.
    pub async fn insert_tasks(&self, tasks: &[NewTask]) -> Result<Vec<Task>> {
        let companies: BTreeSet<&str> = tasks.iter().map(|t| t.company_id.as_str()).collect();
        for company_id in companies {
            self.ensure_company(company_id).await?;
        }

        let mut created = Vec::with_capacity(tasks.len());
        for new in tasks {
            created.push(self.insert_task(new).await?);
        }
        Ok(created)
    }

    pub async fn get_task(&self, id: &str) -> Result<Option<Task>> {
        let m = Entity::find_by_id(id).one(self.db()).await?;
        m.map(to_task).transpose()
    }

    /// Newest first.
    pub async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let mut q = Entity::find().filter(Column::CompanyId.eq(filter.company_id.as_str()));
        if let Some(status) = filter.status {
            q = q.filter(Column::Status.eq(status.as_str()));
        }
        if let Some(priority) = filter.priority {
            q = q.filter(Column::Priority.eq(priority.as_str()));
        }
        if let Some(assignee) = &filter.assigned_to_id {
            q = q.filter(Column::AssignedToId.eq(assignee.as_str()));
        }
        let rows = q
            .order_by(Column::CreatedAt, Order::Desc)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_task).collect()
    }

    pub async fn list_tasks_for_analysis(&self, analysis_id: &str) -> Result<Vec<Task>> {
        let rows = Entity::find()
            .filter(Column::AnalysisId.eq(analysis_id))
            .order_by(Column::CreatedAt, Order::Asc)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_task).collect()
    }

    /// Applies a partial update. Moving into DONE stamps `completed_at`;
    /// moving out of DONE clears it. An empty `assignedToId` unassigns; any
    /// other value must be a team member of the task's company.
    pub async fn update_task(
        &self,
        id: &str,
        patch: &UpdateTaskRequest,
        now: DateTime<Utc>,
    ) -> Result<Option<Task>> {
        let Some(m) = Entity::find_by_id(id).one(self.db()).await? else {
            return Ok(None);
        };
        let assignee = patch.assigned_to_id.as_deref().map(blank_to_none);
        if let Some(Some(member_id)) = &assignee {
            self.ensure_team_member(&m.company_id, member_id).await?;
        }
        let was_done = m.status == TaskStatus::Done.as_str();
        let mut am: task::ActiveModel = m.into();

        if let Some(title) = &patch.title {
            am.title = Set(truncate_title(title).0);
        }
        if let Some(description) = &patch.description {
            am.description = Set(blank_to_none(description));
        }
        if let Some(status) = patch.status {
            am.status = Set(status.as_str().to_owned());
            if status == TaskStatus::Done {
                if !was_done {
                    am.completed_at = Set(Some(now.fixed_offset()));
                }
            } else {
                am.completed_at = Set(None);
            }
        }
        if let Some(priority) = patch.priority {
            am.priority = Set(priority.as_str().to_owned());
        }
        if let Some(effort) = patch.effort {
            am.effort = Set(effort.as_str().to_owned());
        }
        if let Some(due) = patch.due_date {
            am.due_date = Set(Some(due.fixed_offset()));
        }
        if let Some(assignee) = assignee {
            am.assigned_to_id = Set(assignee);
        }
        if let Some(note) = &patch.completion_note {
            am.completion_note = Set(blank_to_none(note));
        }
        am.updated_at = Set(now.fixed_offset());

        let updated = am.update(self.db()).await?;
        to_task(updated).map(Some)
    }
}
