use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbConn, DbErr, EntityTrait, ModelTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait, sea_query::Expr,
};
use serde::{Deserialize, Serialize};

use crate::db::entities::influenceur::{self, DEFAULT_CATEGORY};
use crate::db::entities::prelude::{Influenceur, Vote};
use crate::db::entities::vote;

const MAX_NAME_LEN: usize = 100;
const MAX_CATEGORY_LEN: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum InfluenceurError {
    #[error("Database error: {0}")]
    DbErr(#[from] DbErr),
    #[error("Influenceur not found: {0}")]
    NotFound(i32),
    #[error("{0}")]
    InvalidInput(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInfluenceur {
    pub name: String,
    pub image_url: String,
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfluenceurWithVotes {
    #[serde(flatten)]
    pub influenceur: influenceur::Model,
    pub vote_count: i64,
}

pub struct InfluenceurService;

impl InfluenceurService {
    pub async fn create(
        db: &DbConn,
        new: NewInfluenceur,
        now: DateTime<Utc>,
    ) -> Result<influenceur::Model, InfluenceurError> {
        let name = new.name.trim().to_string();
        if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
            return Err(InfluenceurError::InvalidInput(format!(
                "name must be between 1 and {MAX_NAME_LEN} characters"
            )));
        }

        let image_url = new.image_url.trim().to_string();
        if !(image_url.starts_with("http://")
            || image_url.starts_with("https://")
            || image_url.starts_with('/'))
        {
            return Err(InfluenceurError::InvalidInput(
                "imageUrl must be an http(s) URL or an absolute path".to_string(),
            ));
        }

        let category = match new.category.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_CATEGORY.to_string(),
            Some(c) if c.chars().count() > MAX_CATEGORY_LEN => {
                return Err(InfluenceurError::InvalidInput(format!(
                    "category must be at most {MAX_CATEGORY_LEN} characters"
                )));
            }
            Some(c) => c.to_string(),
        };

        let new_influenceur = influenceur::ActiveModel {
            name: Set(name),
            image_url: Set(image_url),
            category: Set(category),
            created_at: Set(now),
            ..Default::default()
        };

        Ok(new_influenceur.insert(db).await?)
    }

    pub async fn get(db: &DbConn, id: i32) -> Result<influenceur::Model, InfluenceurError> {
        Influenceur::find_by_id(id)
            .one(db)
            .await?
            .ok_or(InfluenceurError::NotFound(id))
    }

    /// Lists influenceurs with their vote totals, ordered by category then name.
    pub async fn list_with_counts(
        db: &DbConn,
        category: Option<&str>,
        only_validated: bool,
    ) -> Result<Vec<InfluenceurWithVotes>, InfluenceurError> {
        let mut query = Influenceur::find();
        if let Some(category) = category {
            query = query.filter(influenceur::Column::Category.eq(category));
        }
        let influenceurs = query
            .order_by_asc(influenceur::Column::Category)
            .order_by_asc(influenceur::Column::Name)
            .order_by_asc(influenceur::Column::Id)
            .all(db)
            .await?;

        let counts = count_votes_by_influenceur(db, only_validated).await?;

        Ok(influenceurs
            .into_iter()
            .map(|influenceur| {
                let vote_count = counts.get(&influenceur.id).copied().unwrap_or(0);
                InfluenceurWithVotes {
                    influenceur,
                    vote_count,
                }
            })
            .collect())
    }

    /// Deletes an influenceur and its votes. Returns the number of votes removed.
    pub async fn delete(db: &DbConn, id: i32) -> Result<u64, InfluenceurError> {
        let txn = db.begin().await?;

        let influenceur = Influenceur::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or(InfluenceurError::NotFound(id))?;

        let removed_votes = Vote::delete_many()
            .filter(vote::Column::InfluenceurId.eq(id))
            .exec(&txn)
            .await?
            .rows_affected;
        influenceur.delete(&txn).await?;

        txn.commit().await?;
        Ok(removed_votes)
    }
}

/// Vote totals keyed by influenceur id. Influenceurs without votes are absent.
pub async fn count_votes_by_influenceur(
    db: &DbConn,
    only_validated: bool,
) -> Result<HashMap<i32, i64>, DbErr> {
    let mut query = Vote::find()
        .select_only()
        .column(vote::Column::InfluenceurId)
        .column_as(Expr::col(vote::Column::Id).count(), "vote_count")
        .group_by(vote::Column::InfluenceurId);
    if only_validated {
        query = query.filter(vote::Column::IsValidated.eq(true));
    }

    let rows: Vec<(i32, i64)> = query.into_tuple().all(db).await?;
    Ok(rows.into_iter().collect())
}
