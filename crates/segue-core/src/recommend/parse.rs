use thiserror::Error;

use crate::model::RecommendationCandidate;
use crate::recommend::ERROR_MARKER;

/// The backend declined the request with one of its `ERROR:` sentinels.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("recommendation rejected: {message}")]
pub struct Rejection {
    /// The backend's reply, trimmed.
    pub message: String,
}

/// Turns raw model text into ordered recommendation candidates.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseParser;

impl ResponseParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a reply of the form `Title-Artist, Title-Artist, ...`.
    ///
    /// Any reply containing `ERROR:` is a rejection. Pieces are split on
    /// the last `-` so titles like "Über-Ich" survive. Pieces without a
    /// separator are dropped with a warning. Order and duplicates are kept
    /// as the model returned them.
    pub fn parse(&self, raw: &str) -> Result<Vec<RecommendationCandidate>, Rejection> {
        if raw.contains(ERROR_MARKER) {
            return Err(Rejection {
                message: raw.trim().to_string(),
            });
        }

        let candidates = raw
            .split(',')
            .map(clean_piece)
            .filter(|piece| !piece.is_empty())
            .filter_map(|piece| {
                let candidate = split_piece(&piece);
                if candidate.is_none() {
                    log::warn!("Dropping malformed recommendation: {:?}", piece);
                }
                candidate
            })
            .collect();

        Ok(candidates)
    }

    /// Compare the candidate count with the requested limit.
    ///
    /// A mismatch is logged and reported but never treated as an error.
    pub fn check_count(&self, candidates: &[RecommendationCandidate], limit: usize) -> bool {
        if candidates.len() == limit {
            true
        } else {
            log::warn!(
                "Got {} recommendations instead of the requested {}",
                candidates.len(),
                limit
            );
            false
        }
    }
}

fn clean_piece(piece: &str) -> String {
    piece
        .replace(['\n', '\r'], "")
        .trim()
        .trim_matches('"')
        .trim()
        .to_string()
}

fn split_piece(piece: &str) -> Option<RecommendationCandidate> {
    let (title, artist) = piece.rsplit_once('-')?;
    let (title, artist) = (title.trim(), artist.trim());
    if title.is_empty() || artist.is_empty() {
        return None;
    }
    Some(RecommendationCandidate::new(title, artist))
}
