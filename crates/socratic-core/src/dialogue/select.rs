//! Mapping the arbiter's free-text answer to a content role.

use crate::agent::role::{ContentRole, Role};

/// How a selection was resolved, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    /// The whole normalized output is a candidate token.
    Exact,
    /// One line of the output is a candidate token.
    Line,
    /// A candidate token appears somewhere in the output.
    Substring,
    /// Nothing matched; the configured default was used.
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub role: ContentRole,
    pub tier: MatchTier,
}

/// Candidate table plus default for parsing selector output. Never fails.
#[derive(Debug, Clone)]
pub struct RoleSelector {
    candidates: Vec<(String, ContentRole)>,
    default: ContentRole,
}

impl RoleSelector {
    /// Candidates are the domain and canonical names of every content role.
    pub fn new(default: ContentRole) -> Self {
        let candidates = ContentRole::ALL
            .into_iter()
            .flat_map(|role| {
                let r = Role::from(role);
                [
                    (r.domain_name().to_string(), role),
                    (r.canonical_name().to_string(), role),
                ]
            })
            .collect();
        Self {
            candidates,
            default,
        }
    }

    pub fn with_candidates(
        candidates: impl IntoIterator<Item = (String, ContentRole)>,
        default: ContentRole,
    ) -> Self {
        Self {
            candidates: candidates
                .into_iter()
                .map(|(token, role)| (token.to_lowercase(), role))
                .filter(|(token, _)| !token.is_empty())
                .collect(),
            default,
        }
    }

    pub fn default_role(&self) -> ContentRole {
        self.default
    }

    pub fn select(&self, output: &str) -> Selection {
        let normalized = output.to_lowercase();

        if let Some(role) = self.exact(strip_punctuation(&normalized)) {
            return Selection {
                role,
                tier: MatchTier::Exact,
            };
        }

        if let Some(role) = normalized
            .lines()
            .find_map(|line| self.exact(strip_punctuation(line)))
        {
            return Selection {
                role,
                tier: MatchTier::Line,
            };
        }

        if let Some(role) = self.first_occurrence(&normalized) {
            return Selection {
                role,
                tier: MatchTier::Substring,
            };
        }

        Selection {
            role: self.default,
            tier: MatchTier::Fallback,
        }
    }

    fn exact(&self, token: &str) -> Option<ContentRole> {
        self.candidates
            .iter()
            .find(|(candidate, _)| candidate == token)
            .map(|(_, role)| *role)
    }

    /// Earliest candidate in the text; the longer token wins a tie.
    fn first_occurrence(&self, text: &str) -> Option<ContentRole> {
        self.candidates
            .iter()
            .filter_map(|(candidate, role)| {
                text.find(candidate.as_str())
                    .map(|pos| (pos, candidate.len(), *role))
            })
            .min_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)))
            .map(|(_, _, role)| role)
    }
}

/// Trim whitespace, quotes, markdown emphasis and other punctuation around a token.
fn strip_punctuation(text: &str) -> &str {
    text.trim_matches(|c: char| !c.is_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector() -> RoleSelector {
        RoleSelector::new(ContentRole::Guide)
    }

    #[test]
    fn test_exact_domain_name() {
        let s = selector().select("elenchus");
        assert_eq!(s.role, ContentRole::Challenger);
        assert_eq!(s.tier, MatchTier::Exact);
    }

    #[test]
    fn test_exact_ignores_case_and_punctuation() {
        let s = selector().select("  **Aporia.**\n");
        assert_eq!(s.role, ContentRole::Provocateur);
        assert_eq!(s.tier, MatchTier::Exact);

        let s = selector().select("'guide'");
        assert_eq!(s.role, ContentRole::Guide);
        assert_eq!(s.tier, MatchTier::Exact);
    }

    #[test]
    fn test_line_match() {
        let s = selector().select("The user seems unsure.\n- maieutics -\nThat's my pick.");
        assert_eq!(s.role, ContentRole::Guide);
        assert_eq!(s.tier, MatchTier::Line);
    }

    #[test]
    fn test_line_match_beats_earlier_substring() {
        let s = selector().select("Not elenchus this time, I think.\naporia");
        assert_eq!(s.role, ContentRole::Provocateur);
        assert_eq!(s.tier, MatchTier::Line);
    }

    #[test]
    fn test_substring_fallback_is_case_insensitive() {
        let s = selector().select("I think ELENCHUS is right");
        assert_eq!(s.role, ContentRole::Challenger);
        assert_eq!(s.tier, MatchTier::Substring);
    }

    #[test]
    fn test_substring_takes_earliest_candidate() {
        let s = selector().select("Either aporia or elenchus would do");
        assert_eq!(s.role, ContentRole::Provocateur);
    }

    #[test]
    fn test_unknown_output_falls_back_to_default() {
        let s = selector().select("banana");
        assert_eq!(s.role, ContentRole::Guide);
        assert_eq!(s.tier, MatchTier::Fallback);

        let s = RoleSelector::new(ContentRole::Challenger).select("");
        assert_eq!(s.role, ContentRole::Challenger);
        assert_eq!(s.tier, MatchTier::Fallback);
    }

    #[test]
    fn test_custom_candidates_replace_builtin_names() {
        let s = RoleSelector::with_candidates(
            [("Socratic".to_string(), ContentRole::Challenger)],
            ContentRole::Guide,
        );
        assert_eq!(s.select("socratic").role, ContentRole::Challenger);
        assert_eq!(s.select("elenchus").tier, MatchTier::Fallback);
    }
}
