use sea_orm::DatabaseConnection;
use tokio::sync::broadcast;
use tracing::{debug, error};

use crate::db::services::{InfluenceurService, VoteService};
use crate::web::models::websocket_models::LiveEvent;

/// Fan-out of live events to every connected WebSocket client.
///
/// Publishing never fails the caller: a vote is recorded whether or not
/// anybody is listening.
#[derive(Debug, Clone)]
pub struct LiveUpdates {
    tx: broadcast::Sender<LiveEvent>,
}

impl LiveUpdates {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn publish(&self, event: LiveEvent) {
        let name = event.name();
        if self.tx.receiver_count() == 0 {
            debug!(event = name, "No web clients listening, skipping broadcast.");
            return;
        }
        match self.tx.send(event) {
            Ok(clients) => debug!(event = name, clients, "Broadcasted live event."),
            // All subscribers disconnected between the check and the send.
            Err(_) => debug!(event = name, "Broadcast failed: no clients were listening."),
        }
    }

    /// Recomputes the vote totals and pushes a `voteUpdate`.
    pub async fn publish_vote_counts(&self, db: &DatabaseConnection, only_validated: bool) {
        if self.receiver_count() == 0 {
            return;
        }
        match VoteService::vote_counts(db, only_validated).await {
            Ok(counts) => self.publish(LiveEvent::VoteUpdate(counts)),
            Err(e) => error!(error = %e, "Failed to load vote counts for broadcast."),
        }
    }

    /// Recomputes the influenceur list and pushes an `influenceursUpdate`.
    pub async fn publish_influenceurs(&self, db: &DatabaseConnection, only_validated: bool) {
        if self.receiver_count() == 0 {
            return;
        }
        match InfluenceurService::list_with_counts(db, None, only_validated).await {
            Ok(list) => self.publish(LiveEvent::InfluenceursUpdate(list)),
            Err(e) => error!(error = %e, "Failed to load influenceurs for broadcast."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::test_support::memory_db;
    use crate::db::services::NewInfluenceur;

    #[tokio::test]
    async fn test_publish_without_listeners_is_a_no_op() {
        let live = LiveUpdates::new(4);
        live.publish(LiveEvent::VoteUpdate(Vec::new()));
        assert_eq!(live.receiver_count(), 0);
    }

    #[tokio::test]
    async fn test_subscribers_receive_recomputed_state() {
        let db = memory_db().await;
        let created = InfluenceurService::create(
            &db,
            NewInfluenceur {
                name: "Maya".to_string(),
                image_url: "https://cdn.example/maya.png".to_string(),
                category: None,
            },
            chrono::Utc::now(),
        )
        .await
        .unwrap();

        let live = LiveUpdates::new(4);
        let mut rx = live.subscribe();

        live.publish_influenceurs(&db, true).await;
        live.publish_vote_counts(&db, true).await;

        match rx.recv().await.unwrap() {
            LiveEvent::InfluenceursUpdate(list) => {
                assert_eq!(list.len(), 1);
                assert_eq!(list[0].influenceur.id, created.id);
            }
            other => panic!("unexpected event {other:?}"),
        }
        match rx.recv().await.unwrap() {
            LiveEvent::VoteUpdate(counts) => {
                assert_eq!(counts.len(), 1);
                assert_eq!(counts[0].count, 0);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
