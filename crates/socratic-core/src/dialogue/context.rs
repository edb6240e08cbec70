//! Bounded-context history: the slice of the transcript each responder sees.

use std::sync::Arc;

use socratic_config::SizeEstimate;
use tracing::{debug, warn};

use crate::transcript::Message;

/// Pure `content -> size` function used to measure messages against a budget.
pub trait SizeEstimator: Send + Sync {
    fn estimate(&self, content: &str) -> u64;
}

/// Fast token proxy: one unit per four characters, never less than one.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharEstimator;

impl SizeEstimator for CharEstimator {
    fn estimate(&self, content: &str) -> u64 {
        (content.chars().count() as u64 / 4).max(1)
    }
}

/// Exact token count under the `cl100k_base` encoding.
#[derive(Clone)]
pub struct TokenizerEstimator {
    bpe: Arc<tiktoken_rs::CoreBPE>,
}

impl TokenizerEstimator {
    pub fn cl100k() -> anyhow::Result<Self> {
        let bpe = tiktoken_rs::cl100k_base()?;
        Ok(Self { bpe: Arc::new(bpe) })
    }
}

impl SizeEstimator for TokenizerEstimator {
    fn estimate(&self, content: &str) -> u64 {
        self.bpe.encode_with_special_tokens(content).len() as u64
    }
}

impl<F> SizeEstimator for F
where
    F: Fn(&str) -> u64 + Send + Sync,
{
    fn estimate(&self, content: &str) -> u64 {
        self(content)
    }
}

/// Summary of one bounding pass, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedView {
    pub kept: usize,
    pub dropped: usize,
    pub size: u64,
}

/// Trims a transcript to a size budget while always keeping the newest message.
#[derive(Clone)]
pub struct ContextBounder {
    estimator: Arc<dyn SizeEstimator>,
}

impl Default for ContextBounder {
    fn default() -> Self {
        Self::new(CharEstimator)
    }
}

impl ContextBounder {
    pub fn new(estimator: impl SizeEstimator + 'static) -> Self {
        Self {
            estimator: Arc::new(estimator),
        }
    }

    /// Bounder for a configured estimate. A tokenizer that fails to load
    /// falls back to the character estimate.
    pub fn for_estimate(estimate: SizeEstimate) -> Self {
        match estimate {
            SizeEstimate::Chars => Self::new(CharEstimator),
            SizeEstimate::Tokenizer => match TokenizerEstimator::cl100k() {
                Ok(tokenizer) => Self::new(tokenizer),
                Err(e) => {
                    warn!("Tokenizer unavailable, using character estimate: {e}");
                    Self::new(CharEstimator)
                }
            },
        }
    }

    pub fn size_of(&self, message: &Message) -> u64 {
        self.estimator.estimate(&message.content)
    }

    /// Longest suffix of `messages` whose total size fits in `budget`.
    ///
    /// The walk starts at the newest message and it is always kept: when it
    /// alone exceeds the budget (or `budget <= 0`) the result is exactly that
    /// message. Empty input gives an empty result.
    pub fn bound<'a>(&self, messages: &'a [Message], budget: i64) -> &'a [Message] {
        self.bound_with_summary(messages, budget).0
    }

    pub fn bound_with_summary<'a>(
        &self,
        messages: &'a [Message],
        budget: i64,
    ) -> (&'a [Message], BoundedView) {
        let Some(newest) = messages.len().checked_sub(1) else {
            return (
                messages,
                BoundedView {
                    kept: 0,
                    dropped: 0,
                    size: 0,
                },
            );
        };

        let mut start = newest;
        let mut total = self.size_of(&messages[newest]);

        if budget > 0 {
            let budget = budget as u64;
            // Stop at the first older message that would overflow; the result
            // must stay contiguous.
            for i in (0..newest).rev() {
                let next = total.saturating_add(self.size_of(&messages[i]));
                if next > budget {
                    break;
                }
                total = next;
                start = i;
            }
        }

        let kept = &messages[start..];
        let view = BoundedView {
            kept: kept.len(),
            dropped: start,
            size: total,
        };
        debug!(
            "Context bound: kept={} dropped={} size={} budget={budget}",
            view.kept, view.dropped, view.size
        );
        (kept, view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(len: usize) -> Message {
        Message::user("x".repeat(len))
    }

    /// Sizes equal to content length, to make budgets easy to reason about.
    fn exact() -> ContextBounder {
        ContextBounder::new(|content: &str| content.len() as u64)
    }

    fn is_suffix(result: &[Message], input: &[Message]) -> bool {
        input.ends_with(result)
    }

    #[test]
    fn test_char_estimator_has_floor_of_one() {
        assert_eq!(CharEstimator.estimate(""), 1);
        assert_eq!(CharEstimator.estimate("abc"), 1);
        assert_eq!(CharEstimator.estimate("abcdefgh"), 2);
        assert_eq!(CharEstimator.estimate(&"a".repeat(4096)), 1024);
    }

    #[test]
    fn test_tokenizer_estimator_counts_tokens() {
        let tokenizer = TokenizerEstimator::cl100k().unwrap();
        assert_eq!(tokenizer.estimate("hello world"), 2);
        assert_eq!(tokenizer.estimate(""), 0);
        // Repetitive text packs several characters per token.
        let long = "the cat sat on the mat. ".repeat(100);
        assert!(tokenizer.estimate(&long) < CharEstimator.estimate(&long) * 2);
    }

    #[test]
    fn test_configured_estimate_selects_estimator() {
        let message = Message::user("hello world, how are you today?");
        let chars = ContextBounder::for_estimate(SizeEstimate::Chars);
        assert_eq!(chars.size_of(&message), 7);

        let tokens = ContextBounder::for_estimate(SizeEstimate::Tokenizer);
        let expected = TokenizerEstimator::cl100k().unwrap().estimate(&message.content);
        assert_eq!(tokens.size_of(&message), expected);
    }

    #[test]
    fn test_empty_input_stays_empty() {
        let bounder = ContextBounder::default();
        assert!(bounder.bound(&[], 100).is_empty());
        assert!(bounder.bound(&[], 0).is_empty());
        assert!(bounder.bound(&[], -5).is_empty());
    }

    #[test]
    fn test_everything_fits() {
        let input = vec![msg(10), msg(10), msg(10)];
        let result = exact().bound(&input, 30);
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_keeps_most_recent_suffix_within_budget() {
        let input = vec![msg(10), msg(20), msg(5), msg(7)];
        let result = exact().bound(&input, 15);
        assert_eq!(result, &input[2..]);
        assert!(result.iter().map(|m| m.content.len()).sum::<usize>() <= 15);
    }

    #[test]
    fn test_stops_at_first_overflow_without_skipping() {
        // The oldest message would fit on its own, but the one before the
        // newest does not, so the suffix ends there.
        let input = vec![msg(1), msg(50), msg(5)];
        let result = exact().bound(&input, 10);
        assert_eq!(result, &input[2..]);
    }

    #[test]
    fn test_oversized_newest_message_is_kept_alone() {
        let input = vec![msg(2), msg(3), msg(100)];
        let result = exact().bound(&input, 10);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0], input[2]);
    }

    #[test]
    fn test_non_positive_budget_keeps_only_newest() {
        let input = vec![msg(1), msg(1), msg(1)];
        for budget in [0, -1, i64::MIN] {
            let result = exact().bound(&input, budget);
            assert_eq!(result, &input[2..]);
        }
    }

    #[test]
    fn test_zero_sized_messages_do_not_break_the_newest_guarantee() {
        let bounder = ContextBounder::new(|_: &str| 0u64);
        let input = vec![msg(1), msg(2), msg(3)];
        assert_eq!(bounder.bound(&input, 0), &input[2..]);
        assert_eq!(bounder.bound(&input, 1).len(), 3);
    }

    #[test]
    fn test_suffix_and_budget_hold_across_budgets() {
        let input: Vec<Message> = [7, 3, 12, 1, 9, 4, 4, 20, 2]
            .into_iter()
            .map(msg)
            .collect();
        let newest = input.last().unwrap();
        for budget in 1..60 {
            let result = exact().bound(&input, budget);
            assert!(is_suffix(result, &input));
            assert_eq!(result.last(), Some(newest));
            let total: u64 = result.iter().map(|m| m.content.len() as u64).sum();
            assert!(total <= budget as u64 || result.len() == 1);

            // Maximal: one more message would not fit.
            if result.len() < input.len() {
                let next = &input[input.len() - result.len() - 1];
                assert!(total + next.content.len() as u64 > budget as u64);
            }
        }
    }

    #[test]
    fn test_summary_reports_counts() {
        let input = vec![msg(8), msg(8), msg(8)];
        let (kept, view) = exact().bound_with_summary(&input, 17);
        assert_eq!(kept.len(), 2);
        assert_eq!(
            view,
            BoundedView {
                kept: 2,
                dropped: 1,
                size: 16
            }
        );
    }

    #[test]
    fn test_default_estimator_budget_in_tokens() {
        // 400 chars ~ 100 tokens each.
        let input = vec![msg(400), msg(400), msg(400)];
        let result = ContextBounder::default().bound(&input, 250);
        assert_eq!(result.len(), 2);
    }
}
