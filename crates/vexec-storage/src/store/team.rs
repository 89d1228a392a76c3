use anyhow::Result;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder,
};
use vexec_common::types::{CreateTeamMemberRequest, TeamMember};

use crate::entities::task::{Column as TaskCol, Entity as TaskEntity};
use crate::entities::team_member::{self, Column, Entity};
use crate::error::StorageError;
use crate::store::Store;

pub const DEFAULT_MEMBER_ROLE: &str = "member";

fn to_member(m: team_member::Model) -> TeamMember {
    TeamMember {
        id: m.id,
        company_id: m.company_id,
        name: m.name,
        email: m.email,
        role: m.role,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

impl Store {
    /// Fails with [`StorageError::NotFound`] unless the member exists and
    /// belongs to `company_id`.
    pub async fn ensure_team_member(&self, company_id: &str, id: &str) -> Result<()> {
        let found = Entity::find_by_id(id)
            .filter(Column::CompanyId.eq(company_id))
            .count(self.db())
            .await?;
        if found == 0 {
            return Err(StorageError::NotFound {
                entity: "team member",
                id: id.to_owned(),
            }
            .into());
        }
        Ok(())
    }

    pub async fn list_team_members(&self, company_id: &str) -> Result<Vec<TeamMember>> {
        let rows = Entity::find()
            .filter(Column::CompanyId.eq(company_id))
            .order_by(Column::Name, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_member).collect())
    }

    pub async fn create_team_member(&self, req: &CreateTeamMemberRequest) -> Result<TeamMember> {
        self.ensure_company(&req.company_id).await?;

        let role = req
            .role
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_MEMBER_ROLE);
        let now = Utc::now().fixed_offset();
        let am = team_member::ActiveModel {
            id: Set(vexec_common::id::next_id()),
            company_id: Set(req.company_id.clone()),
            name: Set(req.name.trim().to_owned()),
            email: Set(req.email.trim().to_owned()),
            role: Set(role.to_owned()),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let m = am.insert(self.db()).await?;
        Ok(to_member(m))
    }

    /// Removes the member and clears their task assignments. Returns false
    /// when no such member exists.
    pub async fn delete_team_member(&self, id: &str) -> Result<bool> {
        let res = Entity::delete_by_id(id).exec(self.db()).await?;
        if res.rows_affected == 0 {
            return Ok(false);
        }

        let unassigned = TaskEntity::update_many()
            .col_expr(TaskCol::AssignedToId, Expr::value(Option::<String>::None))
            .col_expr(TaskCol::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
            .filter(TaskCol::AssignedToId.eq(id))
            .exec(self.db())
            .await?;
        tracing::debug!(
            member_id = %id,
            tasks = unassigned.rows_affected,
            "Unassigned tasks of deleted member"
        );
        Ok(true)
    }
}
