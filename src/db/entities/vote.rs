use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A ballot. `(phone_number, category)` is unique, see `db::schema`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "votes")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub influenceur_id: i32,
    pub category: String,
    pub phone_number: String,
    #[serde(skip_serializing)]
    pub otp: Option<String>,
    #[serde(skip_serializing)]
    pub otp_expires_at: Option<ChronoDateTimeUtc>,
    #[serde(skip_serializing)]
    pub otp_attempts: i32,
    pub is_validated: bool,
    pub timestamp: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::influenceur::Entity",
        from = "Column::InfluenceurId",
        to = "super::influenceur::Column::Id",
        on_delete = "Cascade",
        on_update = "Cascade"
    )]
    Influenceur,
}

impl Related<super::influenceur::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Influenceur.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
