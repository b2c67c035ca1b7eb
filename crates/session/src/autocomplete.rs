//! Autocomplete
//!
//! Contains:
//! - Proposal / ProposalProvider (external sources of suggestions)
//! - Fuzzy matching used to narrow proposals to what was typed
//! - The builder that picks the first provider with something to offer
//! - FunctionProposals, backed by the function registry

use std::rc::Rc;

use composer_engine::formula::{EnrichedToken, FunctionRegistry, TokenType};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalKind {
    Function,
    Name,
    Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Proposal {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Key used for fuzzy matching instead of `text`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fuzzy_key: Option<String>,
    pub kind: ProposalKind,
}

impl Proposal {
    pub fn new(text: impl Into<String>, kind: ProposalKind) -> Self {
        Self { text: text.into(), description: None, fuzzy_key: None, kind }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

pub trait ProposalProvider {
    fn name(&self) -> &str;

    /// Lower runs first.
    fn priority(&self) -> u32;

    fn max_proposals(&self) -> usize {
        10
    }

    /// Whether this provider still answers where a range is expected.
    fn handles_range_positions(&self) -> bool {
        false
    }

    fn proposals(&self, token: &EnrichedToken, content: &str) -> Vec<Proposal>;
}

// ============================================================================
// Fuzzy matching
// ============================================================================

/// Rank of `candidate` for `query` (lower is better), `None` if the query
/// letters do not appear in order. Prefix matches beat substrings, which beat
/// scattered matches.
pub fn fuzzy_score(query: &str, candidate: &str) -> Option<u32> {
    let query = query.to_uppercase();
    let candidate = candidate.to_uppercase();
    if query.is_empty() {
        return Some(0);
    }
    if candidate.starts_with(&query) {
        return Some(0);
    }
    if let Some(pos) = candidate.find(&query) {
        return Some(1000 + pos as u32);
    }

    let mut chars = candidate.char_indices();
    let mut first = None;
    let mut last = 0;
    for q in query.chars() {
        let (idx, _) = chars.by_ref().find(|(_, c)| *c == q)?;
        first.get_or_insert(idx);
        last = idx;
    }
    let span = last - first.unwrap_or(0);
    Some(2000 + span as u32)
}

fn narrow(proposals: Vec<Proposal>, query: &str) -> Vec<Proposal> {
    let mut scored: Vec<(u32, Proposal)> = proposals
        .into_iter()
        .filter_map(|p| {
            let key = p.fuzzy_key.as_deref().unwrap_or(&p.text);
            fuzzy_score(query, key).map(|score| (score, p))
        })
        .collect();
    scored.sort_by_key(|(score, _)| *score);
    scored.into_iter().map(|(_, p)| p).collect()
}

// ============================================================================
// Builder
// ============================================================================

pub struct AutocompleteContext<'a> {
    pub token: &'a EnrichedToken,
    pub content: &'a str,
    pub initial_content: &'a str,
    /// The session is waiting for a range.
    pub selecting: bool,
}

/// Ask providers in priority order and return the first non-empty answer,
/// narrowed to the token at cursor and truncated to the provider's maximum.
pub fn build_proposals(providers: &[Box<dyn ProposalProvider>], ctx: &AutocompleteContext<'_>) -> Vec<Proposal> {
    let mut ordered: Vec<&dyn ProposalProvider> = providers
        .iter()
        .map(|p| p.as_ref())
        .filter(|p| !ctx.selecting || p.handles_range_positions())
        .collect();
    ordered.sort_by_key(|p| p.priority());

    let query: String = ctx
        .token
        .value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '(' && *c != ')')
        .collect();
    let narrows = !matches!(
        ctx.token.token_type,
        TokenType::ArgSeparator | TokenType::LeftParen | TokenType::Operator
    );

    for provider in ordered {
        let raw = provider.proposals(ctx.token, ctx.content);
        if raw.is_empty() {
            continue;
        }

        let exact = raw.iter().any(|p| p.text == ctx.token.value.trim());
        if exact && ctx.content != ctx.initial_content {
            log::trace!("proposal '{}' already picked, suppressing", ctx.token.value);
            return Vec::new();
        }

        let mut proposals = if narrows { narrow(raw, &query) } else { raw };
        if proposals.is_empty() {
            continue;
        }
        proposals.truncate(provider.max_proposals());
        return proposals;
    }

    Vec::new()
}

// ============================================================================
// Function names
// ============================================================================

/// Function names while a name is being typed in a formula.
pub struct FunctionProposals {
    registry: Rc<dyn FunctionRegistry>,
    max: usize,
}

impl FunctionProposals {
    pub fn new(registry: Rc<dyn FunctionRegistry>, max: usize) -> Self {
        Self { registry, max }
    }
}

impl ProposalProvider for FunctionProposals {
    fn name(&self) -> &str {
        "functions"
    }

    fn priority(&self) -> u32 {
        10
    }

    fn max_proposals(&self) -> usize {
        self.max
    }

    fn proposals(&self, token: &EnrichedToken, content: &str) -> Vec<Proposal> {
        if !content.starts_with('=') || !matches!(token.token_type, TokenType::Symbol | TokenType::Function) {
            return Vec::new();
        }
        self.registry
            .all()
            .into_iter()
            .map(|info| Proposal::new(info.name, ProposalKind::Function).with_description(info.signature))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use composer_engine::formula::BuiltinFunctions;

    fn token(token_type: TokenType, value: &str) -> EnrichedToken {
        EnrichedToken {
            token_type,
            value: value.to_string(),
            start: 1,
            end: 1 + value.len(),
            length: value.len(),
            paren_index: None,
            function_context: None,
        }
    }

    struct Fixed {
        priority: u32,
        ranges: bool,
        texts: Vec<&'static str>,
    }

    impl ProposalProvider for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }
        fn priority(&self) -> u32 {
            self.priority
        }
        fn max_proposals(&self) -> usize {
            2
        }
        fn handles_range_positions(&self) -> bool {
            self.ranges
        }
        fn proposals(&self, _token: &EnrichedToken, _content: &str) -> Vec<Proposal> {
            self.texts.iter().map(|t| Proposal::new(*t, ProposalKind::Value)).collect()
        }
    }

    fn functions() -> Vec<Box<dyn ProposalProvider>> {
        vec![Box::new(FunctionProposals::new(Rc::new(BuiltinFunctions), 5))]
    }

    #[test]
    fn fuzzy_ranking() {
        assert_eq!(fuzzy_score("su", "SUM"), Some(0));
        assert_eq!(fuzzy_score("UM", "SUM"), Some(1001));
        assert!(fuzzy_score("sm", "SUM").unwrap() >= 2000);
        assert_eq!(fuzzy_score("xq", "SUM"), None);
        assert_eq!(fuzzy_score("", "SUM"), Some(0));
    }

    #[test]
    fn prefix_matches_come_first() {
        let tok = token(TokenType::Symbol, "su");
        let ctx = AutocompleteContext { token: &tok, content: "=su", initial_content: "", selecting: false };
        let proposals = build_proposals(&functions(), &ctx);
        assert_eq!(proposals.len(), 5);
        assert_eq!(proposals[0].text, "SUM");
        assert!(proposals.iter().take(3).all(|p| p.text.starts_with("SU")));
    }

    #[test]
    fn exact_match_after_typing_suppresses_everything() {
        let tok = token(TokenType::Function, "SUM");
        let ctx = AutocompleteContext { token: &tok, content: "=SUM", initial_content: "", selecting: false };
        assert!(build_proposals(&functions(), &ctx).is_empty());

        // Same token in an untouched formula still gets proposals
        let ctx = AutocompleteContext { token: &tok, content: "=SUM", initial_content: "=SUM", selecting: false };
        assert!(!build_proposals(&functions(), &ctx).is_empty());
    }

    #[test]
    fn no_narrowing_after_separators() {
        let providers: Vec<Box<dyn ProposalProvider>> =
            vec![Box::new(Fixed { priority: 1, ranges: false, texts: vec!["alpha", "beta", "gamma"] })];
        let tok = token(TokenType::LeftParen, "(");
        let ctx = AutocompleteContext { token: &tok, content: "=F(", initial_content: "", selecting: false };
        let proposals = build_proposals(&providers, &ctx);
        assert_eq!(proposals.iter().map(|p| p.text.as_str()).collect::<Vec<_>>(), vec!["alpha", "beta"]);
    }

    #[test]
    fn first_provider_with_results_wins() {
        let providers: Vec<Box<dyn ProposalProvider>> = vec![
            Box::new(Fixed { priority: 5, ranges: false, texts: vec!["late"] }),
            Box::new(Fixed { priority: 1, ranges: false, texts: vec!["zzz"] }),
        ];
        let tok = token(TokenType::Symbol, "la");
        let ctx = AutocompleteContext { token: &tok, content: "=la", initial_content: "", selecting: false };
        // Priority 1 yields nothing after narrowing, so priority 5 answers
        let proposals = build_proposals(&providers, &ctx);
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].text, "late");
    }

    #[test]
    fn selecting_only_consults_range_providers() {
        let providers: Vec<Box<dyn ProposalProvider>> = vec![
            Box::new(Fixed { priority: 1, ranges: false, texts: vec!["plain"] }),
            Box::new(Fixed { priority: 2, ranges: true, texts: vec!["named_range"] }),
        ];
        let tok = token(TokenType::ArgSeparator, ",");
        let ctx = AutocompleteContext { token: &tok, content: "=F(A1,", initial_content: "", selecting: true };
        let proposals = build_proposals(&providers, &ctx);
        assert_eq!(proposals[0].text, "named_range");
    }

    #[test]
    fn function_proposals_need_a_formula_and_a_name() {
        let provider = FunctionProposals::new(Rc::new(BuiltinFunctions), 5);
        assert!(provider.proposals(&token(TokenType::Symbol, "su"), "su").is_empty());
        assert!(provider.proposals(&token(TokenType::Number, "1"), "=1").is_empty());
        assert!(!provider.proposals(&token(TokenType::Symbol, "su"), "=su").is_empty());
    }
}
