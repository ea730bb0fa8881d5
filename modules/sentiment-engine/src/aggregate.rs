//! Reduce scored posts to per-class percentages and an average polarity.

use sentiment_common::{ScoredItem, SentimentLabel, SentimentResult};

/// Aggregate `scored` posts out of `total_fetched`.
///
/// Percentages are over the *scored* posts and rounded to two decimals.
/// Average polarity is the mean of each post's signed confidence
/// (`+c` positive, `-c` negative, `0` neutral), rounded to four decimals.
/// With nothing scored every figure is zero.
pub fn aggregate(total_fetched: usize, scored: &[ScoredItem]) -> SentimentResult {
    let analyzed = scored.len();
    let total_tweets = total_fetched.max(analyzed) as u32;

    if analyzed == 0 {
        return SentimentResult {
            total_tweets,
            ..SentimentResult::default()
        };
    }

    let (mut positive, mut negative, mut neutral) = (0usize, 0usize, 0usize);
    let mut polarity_sum = 0.0;
    for s in scored {
        match s.sentiment.label {
            SentimentLabel::Positive => positive += 1,
            SentimentLabel::Negative => negative += 1,
            SentimentLabel::Neutral => neutral += 1,
        }
        polarity_sum += s.sentiment.polarity();
    }

    SentimentResult {
        positive_percentage: percentage(positive, analyzed),
        negative_percentage: percentage(negative, analyzed),
        neutral_percentage: percentage(neutral, analyzed),
        average_polarity: round_to(polarity_sum / analyzed as f64, 4),
        total_tweets,
        analyzed_tweets: analyzed as u32,
    }
}

fn percentage(count: usize, of: usize) -> f64 {
    round_to(count as f64 * 100.0 / of as f64, 2)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentiment_common::{Sentiment, SourceItem};

    fn scored(label: SentimentLabel, confidence: f64) -> ScoredItem {
        ScoredItem {
            item: SourceItem {
                id: "id".into(),
                text: "some post text".into(),
                author: None,
                created_at: None,
            },
            sentiment: Sentiment::new(label, confidence),
        }
    }

    fn mix(pos: usize, neg: usize, neu: usize) -> Vec<ScoredItem> {
        let mut out = Vec::new();
        out.extend((0..pos).map(|_| scored(SentimentLabel::Positive, 0.9)));
        out.extend((0..neg).map(|_| scored(SentimentLabel::Negative, 0.8)));
        out.extend((0..neu).map(|_| scored(SentimentLabel::Neutral, 0.7)));
        out
    }

    #[test]
    fn six_two_two_split() {
        let r = aggregate(10, &mix(6, 2, 2));
        assert_eq!(r.positive_percentage, 60.0);
        assert_eq!(r.negative_percentage, 20.0);
        assert_eq!(r.neutral_percentage, 20.0);
        assert_eq!(r.total_tweets, 10);
        assert_eq!(r.analyzed_tweets, 10);
        // (6 * 0.9 - 2 * 0.8) / 10
        assert!((r.average_polarity - 0.38).abs() < 1e-9);
    }

    #[test]
    fn percentages_sum_to_about_100() {
        for pos in 0..8 {
            for neg in 0..8 {
                for neu in 0..8 {
                    let n = pos + neg + neu;
                    if n == 0 {
                        continue;
                    }
                    let r = aggregate(n, &mix(pos, neg, neu));
                    let sum = r.positive_percentage + r.negative_percentage + r.neutral_percentage;
                    assert!((sum - 100.0).abs() <= 0.02, "{pos}/{neg}/{neu} summed to {sum}");
                    assert!((-1.0..=1.0).contains(&r.average_polarity));
                }
            }
        }
    }

    #[test]
    fn nothing_scored_is_all_zero() {
        let r = aggregate(5, &[]);
        assert_eq!(r.positive_percentage, 0.0);
        assert_eq!(r.negative_percentage, 0.0);
        assert_eq!(r.neutral_percentage, 0.0);
        assert_eq!(r.average_polarity, 0.0);
        assert_eq!(r.total_tweets, 5);
        assert_eq!(r.analyzed_tweets, 0);
        assert!(!r.average_polarity.is_nan());
    }

    #[test]
    fn percentages_are_over_analyzed_not_fetched() {
        let r = aggregate(10, &mix(4, 4, 0));
        assert_eq!(r.positive_percentage, 50.0);
        assert_eq!(r.total_tweets, 10);
        assert_eq!(r.analyzed_tweets, 8);
    }

    #[test]
    fn thirds_round_to_two_decimals() {
        let r = aggregate(3, &mix(1, 1, 1));
        assert_eq!(r.positive_percentage, 33.33);
        assert_eq!(r.negative_percentage, 33.33);
        assert_eq!(r.neutral_percentage, 33.33);
    }
}
