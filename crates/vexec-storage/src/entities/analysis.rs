use sea_orm::entity::prelude::*;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "analyses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub company_id: String,
    pub module: String,
    pub function_name: String,
    pub title: String,
    /// JSON text
    pub input_data: String,
    /// JSON text
    pub output_data: String,
    pub health_score: Option<i32>,
    pub score: Option<f64>,
    pub processing_time_ms: Option<i64>,
    pub created_at: DateTimeWithTimeZone,
}

impl ActiveModelBehavior for ActiveModel {}
