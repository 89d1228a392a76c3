use anyhow::Result;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter};
use vexec_common::types::User;

use crate::entities::user::{self, Column, Entity};
use crate::store::Store;

fn to_user(m: user::Model) -> User {
    User {
        id: m.id,
        email: m.email,
        name: m.name,
        role: m.role,
        company_id: m.company_id,
        password_hash: m.password_hash,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

/// Login account as declared in the server configuration.
#[derive(Debug, Clone)]
pub struct UserSeed {
    pub email: String,
    pub name: String,
    pub role: String,
    pub company_id: Option<String>,
    pub password_hash: String,
}

impl Store {
    /// Emails are compared case-insensitively; they are stored lowercased.
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let model = Entity::find()
            .filter(Column::Email.eq(email.trim().to_lowercase()))
            .one(self.db())
            .await?;
        Ok(model.map(to_user))
    }

    pub async fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        Ok(model.map(to_user))
    }

    /// Inserts the user, or refreshes name, role, company and password hash
    /// when the email already exists.
    pub async fn upsert_user(&self, seed: &UserSeed) -> Result<User> {
        let now = Utc::now().fixed_offset();
        let email = seed.email.trim().to_lowercase();

        let existing = Entity::find()
            .filter(Column::Email.eq(email.as_str()))
            .one(self.db())
            .await?;

        let m = match existing {
            Some(m) => {
                let mut am: user::ActiveModel = m.into();
                am.name = Set(seed.name.clone());
                am.role = Set(seed.role.clone());
                am.company_id = Set(seed.company_id.clone());
                am.password_hash = Set(seed.password_hash.clone());
                am.updated_at = Set(now);
                am.update(self.db()).await?
            }
            None => {
                let am = user::ActiveModel {
                    id: Set(vexec_common::id::next_id()),
                    email: Set(email),
                    name: Set(seed.name.clone()),
                    role: Set(seed.role.clone()),
                    company_id: Set(seed.company_id.clone()),
                    password_hash: Set(seed.password_hash.clone()),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                am.insert(self.db()).await?
            }
        };
        Ok(to_user(m))
    }
}
