use serde::Serialize;

use crate::db::services::{InfluenceurWithVotes, VoteCount};

/// Envelope pushed to every `/ws` client: `{"event": "voteUpdate", "data": [...]}`.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum LiveEvent {
    VoteUpdate(Vec<VoteCount>),
    InfluenceursUpdate(Vec<InfluenceurWithVotes>),
}

impl LiveEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LiveEvent::VoteUpdate(_) => "voteUpdate",
            LiveEvent::InfluenceursUpdate(_) => "influenceursUpdate",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_envelope_shape() {
        let event = LiveEvent::VoteUpdate(vec![VoteCount {
            influenceur_id: 4,
            count: 12,
        }]);
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::json!({"event": "voteUpdate", "data": [{"influenceurId": 4, "count": 12}]})
        );

        let empty = LiveEvent::InfluenceursUpdate(Vec::new());
        assert_eq!(
            serde_json::to_value(&empty).unwrap()["event"],
            empty.name()
        );
    }
}
