use std::sync::Arc;

use arc_common::{RelayRequest, RelayResponse, Review, ScoreInput};
use async_trait::async_trait;

use crate::error::TransportError;
use crate::transport::RelayChannel;

/// Produces one trust score per input, in input order.
#[async_trait]
pub trait Scorer: Send + Sync {
    async fn score(&self, inputs: &[ScoreInput]) -> Result<Vec<u8>, TransportError>;
}

/// Scores through the relay's `get_scores` message.
pub struct RelayScorer {
    channel: Arc<dyn RelayChannel>,
}

impl RelayScorer {
    pub fn new(channel: Arc<dyn RelayChannel>) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl Scorer for RelayScorer {
    async fn score(&self, inputs: &[ScoreInput]) -> Result<Vec<u8>, TransportError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let request = RelayRequest::GetScores {
            payload: inputs.to_vec(),
        };
        match self.channel.request(request).await? {
            RelayResponse::Scores { ok: true, scores } if scores.len() == inputs.len() => Ok(scores),
            RelayResponse::Failed { error } => Err(TransportError::Relay(error)),
            other => Err(TransportError::Unexpected {
                request: "get_scores",
                reply: format!("{other:?}"),
            }),
        }
    }
}

/// Attach scores to `reviews` in place.
pub async fn enrich(scorer: &dyn Scorer, reviews: &mut [Review]) -> Result<(), TransportError> {
    let inputs: Vec<ScoreInput> = reviews.iter().map(Review::score_input).collect();
    let scores = scorer.score(&inputs).await?;
    for (review, score) in reviews.iter_mut().zip(scores) {
        review.score = Some(score);
    }
    Ok(())
}
