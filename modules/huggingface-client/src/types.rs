use serde::{Deserialize, Serialize};

/// Body for a text-classification request.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifyRequest<'a> {
    pub inputs: &'a [String],
    pub parameters: ClassifyParameters,
    pub options: ClassifyOptions,
}

/// Pipeline arguments. Long posts are cut to the model's window instead of
/// failing the whole batch.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifyParameters {
    pub truncation: bool,
    pub max_length: u32,
}

impl Default for ClassifyParameters {
    fn default() -> Self {
        Self {
            truncation: true,
            max_length: 512,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifyOptions {
    /// Block until a cold model is loaded instead of returning 503.
    pub wait_for_model: bool,
}

/// One entry of a model's label distribution.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

impl LabelScore {
    /// Highest-scoring label. The API usually sorts descending, but don't rely on it.
    pub fn top(distribution: &[LabelScore]) -> Option<&LabelScore> {
        distribution
            .iter()
            .max_by(|a, b| a.score.total_cmp(&b.score))
    }
}

/// The inference API returns `[[..], [..]]` for list inputs and sometimes a flat
/// `[..]` for a single input.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ClassifyResponse {
    Batch(Vec<Vec<LabelScore>>),
    Single(Vec<LabelScore>),
}

impl ClassifyResponse {
    pub(crate) fn into_batch(self) -> Vec<Vec<LabelScore>> {
        match self {
            ClassifyResponse::Batch(batch) => batch,
            ClassifyResponse::Single(single) => vec![single],
        }
    }
}
