use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbConn, DbErr, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set, sea_query::Expr,
};
use serde::Serialize;

use super::influenceur_service::count_votes_by_influenceur;
use super::is_unique_violation;
use crate::db::entities::prelude::{Influenceur, Vote};
use crate::db::entities::{influenceur, vote};
use crate::services::otp_service::{self, OtpCheck, OtpPolicy};

#[derive(Debug, thiserror::Error)]
pub enum VoteError {
    #[error("Database error: {0}")]
    DbErr(#[from] DbErr),
    #[error("Influenceur not found: {0}")]
    InfluenceurNotFound(i32),
    #[error("This phone number has already voted in category '{category}'")]
    AlreadyVoted { category: String },
    #[error("No pending vote for this phone number")]
    NoPendingVote,
    #[error("Invalid OTP")]
    InvalidOtp { remaining_attempts: i32 },
    #[error("OTP expired")]
    OtpExpired,
    #[error("Too many invalid OTP attempts, request a new code")]
    TooManyAttempts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteCount {
    pub influenceur_id: i32,
    pub count: i64,
}

/// A pending vote together with the plain code that was generated for it.
#[derive(Debug, Clone)]
pub struct IssuedBallot {
    pub vote: vote::Model,
    pub otp: String,
}

impl IssuedBallot {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.vote.otp_expires_at
    }
}

pub struct VoteService;

impl VoteService {
    /// Totals for every influenceur, including those with no votes yet.
    pub async fn vote_counts(db: &DbConn, only_validated: bool) -> Result<Vec<VoteCount>, VoteError> {
        let ids: Vec<i32> = Influenceur::find()
            .order_by_asc(influenceur::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(|i| i.id)
            .collect();
        let counts = count_votes_by_influenceur(db, only_validated).await?;

        Ok(ids
            .into_iter()
            .map(|influenceur_id| VoteCount {
                influenceur_id,
                count: counts.get(&influenceur_id).copied().unwrap_or(0),
            })
            .collect())
    }

    pub async fn list_votes(
        db: &DbConn,
        influenceur_id: Option<i32>,
    ) -> Result<Vec<vote::Model>, VoteError> {
        let mut query = Vote::find();
        if let Some(id) = influenceur_id {
            query = query.filter(vote::Column::InfluenceurId.eq(id));
        }
        Ok(query
            .order_by_desc(vote::Column::Timestamp)
            .order_by_desc(vote::Column::Id)
            .all(db)
            .await?)
    }

    /// Opens (or refreshes) the pending ballot of `phone_number` in the
    /// influenceur's category and attaches a fresh code to it.
    ///
    /// `phone_number` must already be normalised.
    pub async fn cast_vote(
        db: &DbConn,
        influenceur_id: i32,
        phone_number: &str,
        policy: &OtpPolicy,
        now: DateTime<Utc>,
    ) -> Result<IssuedBallot, VoteError> {
        let influenceur = find_influenceur(db, influenceur_id).await?;
        let existing = find_ballot(db, phone_number, &influenceur.category).await?;

        let otp = otp_service::generate_otp();
        let expires_at = policy.expires_at(now);

        let vote = match existing {
            Some(ballot) if ballot.is_validated => {
                return Err(VoteError::AlreadyVoted {
                    category: influenceur.category,
                });
            }
            Some(ballot) => {
                let mut active = ballot.into_active_model();
                active.influenceur_id = Set(influenceur.id);
                active.otp = Set(Some(otp.clone()));
                active.otp_expires_at = Set(Some(expires_at));
                active.otp_attempts = Set(0);
                active.timestamp = Set(now);
                active.update(db).await?
            }
            None => {
                let new_ballot = vote::ActiveModel {
                    influenceur_id: Set(influenceur.id),
                    category: Set(influenceur.category.clone()),
                    phone_number: Set(phone_number.to_string()),
                    otp: Set(Some(otp.clone())),
                    otp_expires_at: Set(Some(expires_at)),
                    otp_attempts: Set(0),
                    is_validated: Set(false),
                    timestamp: Set(now),
                    ..Default::default()
                };
                new_ballot
                    .insert(db)
                    .await
                    .map_err(|e| conflict_or_db(e, &influenceur.category))?
            }
        };

        Ok(IssuedBallot { vote, otp })
    }

    /// The "send me a code" step. Same semantics as [`VoteService::cast_vote`].
    pub async fn issue_otp(
        db: &DbConn,
        influenceur_id: i32,
        phone_number: &str,
        policy: &OtpPolicy,
        now: DateTime<Utc>,
    ) -> Result<IssuedBallot, VoteError> {
        Self::cast_vote(db, influenceur_id, phone_number, policy, now).await
    }

    /// Checks `otp` against the pending ballot and finalises it.
    ///
    /// With `influenceur_id` the ballot is looked up in that influenceur's
    /// category and re-pointed at it; without, the most recent pending ballot
    /// of the phone number is used.
    pub async fn validate(
        db: &DbConn,
        phone_number: &str,
        otp: &str,
        influenceur_id: Option<i32>,
        policy: &OtpPolicy,
        now: DateTime<Utc>,
    ) -> Result<vote::Model, VoteError> {
        let (ballot, target) = match influenceur_id {
            Some(id) => {
                let influenceur = find_influenceur(db, id).await?;
                let ballot = find_ballot(db, phone_number, &influenceur.category)
                    .await?
                    .ok_or(VoteError::NoPendingVote)?;
                (ballot, influenceur.id)
            }
            None => {
                let pending = Vote::find()
                    .filter(vote::Column::PhoneNumber.eq(phone_number))
                    .filter(vote::Column::IsValidated.eq(false))
                    .order_by_desc(vote::Column::Timestamp)
                    .order_by_desc(vote::Column::Id)
                    .one(db)
                    .await?;
                match pending {
                    Some(ballot) => {
                        let target = ballot.influenceur_id;
                        (ballot, target)
                    }
                    None => return Err(Self::no_pending_reason(db, phone_number).await?),
                }
            }
        };

        if ballot.is_validated {
            return Err(VoteError::AlreadyVoted {
                category: ballot.category,
            });
        }

        let check = otp_service::verify(
            ballot.otp.as_deref(),
            ballot.otp_expires_at,
            ballot.otp_attempts,
            otp,
            policy,
            now,
        );

        match check {
            OtpCheck::Expired => return Err(VoteError::OtpExpired),
            OtpCheck::TooManyAttempts => return Err(burn_code(db, ballot).await?),
            OtpCheck::Valid | OtpCheck::Mismatch => {}
        }

        // Every comparison consumes an attempt, reserved atomically before
        // the outcome is acted on.
        let reserved = Vote::update_many()
            .col_expr(
                vote::Column::OtpAttempts,
                Expr::col(vote::Column::OtpAttempts).add(1),
            )
            .filter(vote::Column::Id.eq(ballot.id))
            .filter(vote::Column::IsValidated.eq(false))
            .filter(vote::Column::OtpAttempts.lt(policy.max_attempts))
            .exec(db)
            .await?
            .rows_affected;

        if reserved == 0 {
            return match Vote::find_by_id(ballot.id).one(db).await? {
                Some(current) if current.is_validated => Err(VoteError::AlreadyVoted {
                    category: current.category,
                }),
                Some(current) => Err(burn_code(db, current).await?),
                None => Err(VoteError::NoPendingVote),
            };
        }

        if check == OtpCheck::Mismatch {
            let attempts = Vote::find_by_id(ballot.id)
                .one(db)
                .await?
                .map(|v| v.otp_attempts)
                .unwrap_or(policy.max_attempts);
            return Err(VoteError::InvalidOtp {
                remaining_attempts: (policy.max_attempts - attempts).max(0),
            });
        }

        let mut active = ballot.into_active_model();
        active.influenceur_id = Set(target);
        active.is_validated = Set(true);
        active.otp = Set(None);
        active.otp_expires_at = Set(None);
        active.timestamp = Set(now);
        Ok(active.update(db).await?)
    }

    /// Records a vote without a code. Used when validation is switched off.
    pub async fn record_unverified_vote(
        db: &DbConn,
        influenceur_id: i32,
        phone_number: &str,
        now: DateTime<Utc>,
    ) -> Result<vote::Model, VoteError> {
        let influenceur = find_influenceur(db, influenceur_id).await?;
        if find_ballot(db, phone_number, &influenceur.category)
            .await?
            .is_some()
        {
            return Err(VoteError::AlreadyVoted {
                category: influenceur.category,
            });
        }

        let new_vote = vote::ActiveModel {
            influenceur_id: Set(influenceur.id),
            category: Set(influenceur.category.clone()),
            phone_number: Set(phone_number.to_string()),
            otp: Set(None),
            otp_expires_at: Set(None),
            otp_attempts: Set(0),
            is_validated: Set(false),
            timestamp: Set(now),
            ..Default::default()
        };
        new_vote
            .insert(db)
            .await
            .map_err(|e| conflict_or_db(e, &influenceur.category))
    }

    async fn no_pending_reason(db: &DbConn, phone_number: &str) -> Result<VoteError, DbErr> {
        let validated = Vote::find()
            .filter(vote::Column::PhoneNumber.eq(phone_number))
            .filter(vote::Column::IsValidated.eq(true))
            .order_by_desc(vote::Column::Timestamp)
            .one(db)
            .await?;
        Ok(match validated {
            Some(v) => VoteError::AlreadyVoted { category: v.category },
            None => VoteError::NoPendingVote,
        })
    }
}

/// Clears an exhausted code; only a fresh issue resets the counter.
async fn burn_code(db: &DbConn, ballot: vote::Model) -> Result<VoteError, DbErr> {
    let mut active = ballot.into_active_model();
    active.otp = Set(None);
    active.otp_expires_at = Set(None);
    active.update(db).await?;
    Ok(VoteError::TooManyAttempts)
}

async fn find_influenceur(db: &DbConn, id: i32) -> Result<influenceur::Model, VoteError> {
    Influenceur::find_by_id(id)
        .one(db)
        .await?
        .ok_or(VoteError::InfluenceurNotFound(id))
}

async fn find_ballot(
    db: &DbConn,
    phone_number: &str,
    category: &str,
) -> Result<Option<vote::Model>, DbErr> {
    Vote::find()
        .filter(vote::Column::PhoneNumber.eq(phone_number))
        .filter(vote::Column::Category.eq(category))
        .one(db)
        .await
}

fn conflict_or_db(err: DbErr, category: &str) -> VoteError {
    if is_unique_violation(&err) {
        VoteError::AlreadyVoted {
            category: category.to_string(),
        }
    } else {
        VoteError::DbErr(err)
    }
}
