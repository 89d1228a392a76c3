use anyhow::Result;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, QueryFilter, QueryOrder,
    QuerySelect,
};
use vexec_common::types::{CreateKpiRequest, KpiEntry};

use crate::entities::kpi_entry::{self, Column, Entity};
use crate::store::Store;

fn to_entry(m: kpi_entry::Model) -> KpiEntry {
    KpiEntry {
        id: m.id,
        company_id: m.company_id,
        metric: m.metric,
        value: m.value,
        period: m.period,
        note: m.note,
        recorded_at: m.recorded_at.with_timezone(&Utc),
        created_at: m.created_at.with_timezone(&Utc),
    }
}

impl Store {
    pub async fn create_kpi_entry(&self, req: &CreateKpiRequest) -> Result<KpiEntry> {
        self.ensure_company(&req.company_id).await?;

        let now = Utc::now();
        let am = kpi_entry::ActiveModel {
            id: Set(vexec_common::id::next_id()),
            company_id: Set(req.company_id.clone()),
            metric: Set(req.metric.trim().to_owned()),
            value: Set(req.value),
            period: Set(req.period.clone()),
            note: Set(req.note.clone()),
            recorded_at: Set(req.recorded_at.unwrap_or(now).fixed_offset()),
            created_at: Set(now.fixed_offset()),
        };
        let m = am.insert(self.db()).await?;
        Ok(to_entry(m))
    }

    /// Newest first by `recorded_at`.
    pub async fn list_kpi_entries(
        &self,
        company_id: &str,
        metric: Option<&str>,
        limit: usize,
    ) -> Result<Vec<KpiEntry>> {
        let mut q = Entity::find().filter(Column::CompanyId.eq(company_id));
        if let Some(metric) = metric {
            q = q.filter(Column::Metric.eq(metric));
        }
        let rows = q
            .order_by(Column::RecordedAt, Order::Desc)
            .order_by(Column::CreatedAt, Order::Desc)
            .limit(limit as u64)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_entry).collect())
    }
}
