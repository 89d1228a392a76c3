use anyhow::Result;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, EntityTrait, Order, PaginatorTrait, QueryOrder,
    QuerySelect,
};
use vexec_common::types::{Company, CreateCompanyRequest};

use crate::entities::company::{self, Column, Entity};
use crate::error::StorageError;
use crate::store::Store;

fn to_company(m: company::Model) -> Company {
    Company {
        id: m.id,
        name: m.name,
        industry: m.industry,
        website: m.website,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

impl Store {
    pub async fn create_company(&self, req: &CreateCompanyRequest) -> Result<Company> {
        let now = Utc::now().fixed_offset();
        let am = company::ActiveModel {
            id: Set(vexec_common::id::next_id()),
            name: Set(req.name.trim().to_owned()),
            industry: Set(non_blank(&req.industry)),
            website: Set(non_blank(&req.website)),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let m = am.insert(self.db()).await?;
        Ok(to_company(m))
    }

    pub async fn get_company(&self, id: &str) -> Result<Option<Company>> {
        let m = Entity::find_by_id(id).one(self.db()).await?;
        Ok(m.map(to_company))
    }

    /// Fails with [`StorageError::NotFound`] when the company does not exist.
    pub async fn ensure_company(&self, id: &str) -> Result<()> {
        let found = Entity::find_by_id(id).count(self.db()).await?;
        if found == 0 {
            return Err(StorageError::company_not_found(id).into());
        }
        Ok(())
    }

    pub async fn list_companies(&self, limit: usize, offset: usize) -> Result<Vec<Company>> {
        let rows = Entity::find()
            .order_by(Column::Name, Order::Asc)
            .limit(limit as u64)
            .offset(offset as u64)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_company).collect())
    }

    pub async fn count_companies(&self) -> Result<u64> {
        Ok(Entity::find().count(self.db()).await?)
    }
}
