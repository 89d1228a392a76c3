use std::collections::HashMap;

use anyhow::Result;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, QueryFilter, QueryOrder,
};
use serde_json::Value;
use vexec_common::types::{
    CreateGoalRequest, Goal, GoalProgress, GoalStatus, GoalWithProgress, UpdateGoalRequest,
};

use crate::entities::goal::{self, Column as GoalCol, Entity as GoalEntity};
use crate::entities::goal_progress::{self, Column as ProgCol, Entity as ProgEntity};
use crate::error::StorageError;
use crate::store::{parse_enum, parse_json, to_json_text, Store};

fn to_goal(m: goal::Model) -> Result<Goal> {
    let breakdown = match m.breakdown.as_deref() {
        Some(raw) => Some(parse_json("breakdown", raw)?),
        None => None,
    };
    Ok(Goal {
        status: parse_enum("status", &m.status)?,
        breakdown,
        id: m.id,
        company_id: m.company_id,
        title: m.title,
        target: m.target,
        deadline: m.deadline,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    })
}

fn to_progress(m: goal_progress::Model) -> Result<GoalProgress> {
    Ok(GoalProgress {
        actual_data: parse_json("actual_data", &m.actual_data)?,
        id: m.id,
        goal_id: m.goal_id,
        month: m.month,
        jim_feedback: m.jim_feedback,
        on_track: m.on_track,
        created_at: m.created_at.with_timezone(&Utc),
    })
}

/// Progress entry to store for a goal's month.
#[derive(Debug, Clone)]
pub struct ProgressEntry {
    pub month: String,
    pub actual_data: Value,
    pub feedback: Option<String>,
    pub on_track: Option<bool>,
}

impl Store {
    pub async fn create_goal(
        &self,
        req: &CreateGoalRequest,
        breakdown: Option<&Value>,
    ) -> Result<Goal> {
        self.ensure_company(&req.company_id).await?;

        let now = Utc::now().fixed_offset();
        let am = goal::ActiveModel {
            id: Set(vexec_common::id::next_id()),
            company_id: Set(req.company_id.clone()),
            title: Set(req.title.trim().to_owned()),
            target: Set(req.target.trim().to_owned()),
            deadline: Set(req.deadline),
            breakdown: Set(breakdown.map(|b| to_json_text("breakdown", b)).transpose()?),
            status: Set(GoalStatus::Active.as_str().to_owned()),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let m = am.insert(self.db()).await?;
        to_goal(m)
    }

    pub async fn get_goal(&self, id: &str) -> Result<Option<Goal>> {
        let m = GoalEntity::find_by_id(id).one(self.db()).await?;
        m.map(to_goal).transpose()
    }

    /// Goals of a company, newest first, each with its progress ordered by
    /// month.
    pub async fn list_goals(&self, company_id: &str) -> Result<Vec<GoalWithProgress>> {
        let goals = GoalEntity::find()
            .filter(GoalCol::CompanyId.eq(company_id))
            .order_by(GoalCol::CreatedAt, Order::Desc)
            .all(self.db())
            .await?;
        if goals.is_empty() {
            return Ok(Vec::new());
        }

        let goal_ids: Vec<String> = goals.iter().map(|g| g.id.clone()).collect();
        let progress_rows = ProgEntity::find()
            .filter(ProgCol::GoalId.is_in(goal_ids))
            .order_by(ProgCol::Month, Order::Asc)
            .all(self.db())
            .await?;

        let mut by_goal: HashMap<String, Vec<GoalProgress>> = HashMap::new();
        for row in progress_rows {
            let progress = to_progress(row)?;
            by_goal
                .entry(progress.goal_id.clone())
                .or_default()
                .push(progress);
        }

        goals
            .into_iter()
            .map(|m| {
                let progress = by_goal.remove(&m.id).unwrap_or_default();
                Ok(GoalWithProgress {
                    goal: to_goal(m)?,
                    progress,
                })
            })
            .collect()
    }

    pub async fn update_goal(&self, id: &str, patch: &UpdateGoalRequest) -> Result<Option<Goal>> {
        let Some(m) = GoalEntity::find_by_id(id).one(self.db()).await? else {
            return Ok(None);
        };
        let mut am: goal::ActiveModel = m.into();

        if let Some(title) = &patch.title {
            am.title = Set(title.trim().to_owned());
        }
        if let Some(target) = &patch.target {
            am.target = Set(target.trim().to_owned());
        }
        if let Some(deadline) = patch.deadline {
            am.deadline = Set(Some(deadline));
        }
        if let Some(status) = patch.status {
            am.status = Set(status.as_str().to_owned());
        }
        if let Some(breakdown) = &patch.breakdown {
            am.breakdown = Set(Some(to_json_text("breakdown", breakdown)?));
        }
        am.updated_at = Set(Utc::now().fixed_offset());

        let updated = am.update(self.db()).await?;
        to_goal(updated).map(Some)
    }

    pub async fn list_goal_progress(&self, goal_id: &str) -> Result<Vec<GoalProgress>> {
        let rows = ProgEntity::find()
            .filter(ProgCol::GoalId.eq(goal_id))
            .order_by(ProgCol::Month, Order::Asc)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_progress).collect()
    }

    /// Stores progress for one month of a goal, replacing any earlier entry
    /// for the same month.
    pub async fn record_goal_progress(
        &self,
        goal_id: &str,
        entry: &ProgressEntry,
    ) -> Result<GoalProgress> {
        let exists = GoalEntity::find_by_id(goal_id).one(self.db()).await?;
        if exists.is_none() {
            return Err(StorageError::NotFound {
                entity: "goal",
                id: goal_id.to_owned(),
            }
            .into());
        }

        ProgEntity::delete_many()
            .filter(ProgCol::GoalId.eq(goal_id))
            .filter(ProgCol::Month.eq(entry.month.as_str()))
            .exec(self.db())
            .await?;

        let am = goal_progress::ActiveModel {
            id: Set(vexec_common::id::next_id()),
            goal_id: Set(goal_id.to_owned()),
            month: Set(entry.month.clone()),
            actual_data: Set(to_json_text("actual_data", &entry.actual_data)?),
            jim_feedback: Set(entry.feedback.clone()),
            on_track: Set(entry.on_track),
            created_at: Set(Utc::now().fixed_offset()),
        };
        let m = am.insert(self.db()).await?;
        to_progress(m)
    }
}
