//! Creates the voting tables on start-up.
//!
//! Every statement is `IF NOT EXISTS`, so running this against an existing
//! database is a no-op.

use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Schema,
    sea_query::Index,
};
use tracing::info;

use crate::db::entities::{influenceur, vote};

pub const BALLOT_UNIQUE_INDEX: &str = "idx_votes_phone_number_category";

pub async fn create_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut influenceurs = schema.create_table_from_entity(influenceur::Entity);
    influenceurs.if_not_exists();
    db.execute(backend.build(&influenceurs)).await?;

    let mut votes = schema.create_table_from_entity(vote::Entity);
    votes.if_not_exists();
    db.execute(backend.build(&votes)).await?;

    for mut index in schema.create_index_from_entity(influenceur::Entity) {
        index.if_not_exists();
        db.execute(backend.build(&index)).await?;
    }

    let ballot_index = Index::create()
        .name(BALLOT_UNIQUE_INDEX)
        .table(vote::Entity)
        .col(vote::Column::PhoneNumber)
        .col(vote::Column::Category)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&ballot_index)).await?;

    let influenceur_index = Index::create()
        .name("idx_votes_influenceur_id")
        .table(vote::Entity)
        .col(vote::Column::InfluenceurId)
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&influenceur_index)).await?;

    info!("Database schema is up to date.");
    Ok(())
}

/// Opens a connection pool and makes sure the schema exists.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(database_url.to_owned());
    opt.max_connections(max_connections)
        .sqlx_logging(false);

    let db = Database::connect(opt).await?;
    create_schema(&db).await?;
    Ok(db)
}


#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ActiveModelTrait, Set};

    #[tokio::test]
    async fn create_schema_is_idempotent() {
        let db = test_support::memory_db().await;
        create_schema(&db).await.unwrap();
    }

    #[tokio::test]
    async fn ballot_index_rejects_duplicate_phone_in_category() {
        let db = test_support::memory_db().await;
        let now = chrono::Utc::now();
        let inf = influenceur::ActiveModel {
            name: Set("Alice".into()),
            image_url: Set("https://img/alice.png".into()),
            category: Set("music".into()),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();

        let ballot = || vote::ActiveModel {
            influenceur_id: Set(inf.id),
            category: Set("music".into()),
            phone_number: Set("+33612345678".into()),
            otp: Set(None),
            otp_expires_at: Set(None),
            otp_attempts: Set(0),
            is_validated: Set(true),
            timestamp: Set(now),
            ..Default::default()
        };

        ballot().insert(&db).await.unwrap();
        let err = ballot().insert(&db).await.unwrap_err();
        assert!(matches!(
            err.sql_err(),
            Some(sea_orm::SqlErr::UniqueConstraintViolation(_))
        ));
    }
}
