use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use vexec_common::types::{Analysis, CreateAnalysisRequest};

use crate::entities::analysis::{self, Column, Entity};
use crate::error::StorageError;
use crate::store::{parse_json, to_json_text, Store};

fn to_analysis(m: analysis::Model) -> Result<Analysis> {
    Ok(Analysis {
        input_data: parse_json("input_data", &m.input_data)?,
        output_data: parse_json("output_data", &m.output_data)?,
        id: m.id,
        company_id: m.company_id,
        module: m.module,
        function_name: m.function_name,
        title: m.title,
        health_score: m.health_score,
        score: m.score,
        processing_time_ms: m.processing_time_ms,
        created_at: m.created_at.with_timezone(&Utc),
    })
}

fn filtered(company_id: &str, module: Option<&str>) -> sea_orm::Select<Entity> {
    let mut q = Entity::find().filter(Column::CompanyId.eq(company_id));
    if let Some(module) = module {
        q = q.filter(Column::Module.eq(module));
    }
    q
}

impl Store {
    /// Fails with [`StorageError::NotFound`] unless the analysis exists and
    /// belongs to `company_id`.
    pub async fn ensure_analysis(&self, company_id: &str, id: &str) -> Result<()> {
        let found = Entity::find_by_id(id)
            .filter(Column::CompanyId.eq(company_id))
            .count(self.db())
            .await?;
        if found == 0 {
            return Err(StorageError::NotFound {
                entity: "analysis",
                id: id.to_owned(),
            }
            .into());
        }
        Ok(())
    }

    pub async fn create_analysis(&self, req: &CreateAnalysisRequest) -> Result<Analysis> {
        self.ensure_company(&req.company_id).await?;

        let am = analysis::ActiveModel {
            id: Set(vexec_common::id::next_id()),
            company_id: Set(req.company_id.clone()),
            module: Set(req.module.trim().to_owned()),
            function_name: Set(req.function_name.trim().to_owned()),
            title: Set(req.title.trim().to_owned()),
            input_data: Set(to_json_text("input_data", &req.input_data)?),
            output_data: Set(to_json_text("output_data", &req.output_data)?),
            health_score: Set(req.health_score),
            score: Set(req.score),
            processing_time_ms: Set(req.processing_time_ms),
            created_at: Set(Utc::now().fixed_offset()),
        };
        let m = am.insert(self.db()).await?;
        to_analysis(m)
    }

    pub async fn get_analysis(&self, id: &str) -> Result<Option<Analysis>> {
        let m = Entity::find_by_id(id).one(self.db()).await?;
        m.map(to_analysis).transpose()
    }

    /// Newest first.
    pub async fn list_analyses(
        &self,
        company_id: &str,
        module: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Analysis>> {
        let rows = filtered(company_id, module)
            .order_by(Column::CreatedAt, Order::Desc)
            .limit(limit as u64)
            .offset(offset as u64)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_analysis).collect()
    }

    pub async fn count_analyses(&self, company_id: &str, module: Option<&str>) -> Result<u64> {
        Ok(filtered(company_id, module).count(self.db()).await?)
    }

    /// All analyses created at or after `since`, oldest first.
    pub async fn list_analyses_since(
        &self,
        company_id: &str,
        module: Option<&str>,
        since: DateTime<Utc>,
    ) -> Result<Vec<Analysis>> {
        let rows = filtered(company_id, module)
            .filter(Column::CreatedAt.gte(since.fixed_offset()))
            .order_by(Column::CreatedAt, Order::Asc)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_analysis).collect()
    }
}
