// Property-based tests for the edit session.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use std::rc::Rc;

use composer_core::text::utf16_len;
use composer_core::{CellPosition, Selection};
use composer_session::{Capabilities, ComposerSession, MemoryWorkbook, OwnerId, SessionOptions};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

fn editing(content: &str) -> ComposerSession {
    let book = Rc::new(MemoryWorkbook::new());
    let mut s = ComposerSession::new(OwnerId(1), book.collaborators(10), Capabilities::cell_editor(), SessionOptions::default());
    s.start(CellPosition::new(book.first_sheet(), 0, 0), None, None);
    s.set_content(content, None);
    s
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// A single reference with arbitrary `$` markers, cell or range.
fn arb_reference() -> impl Strategy<Value = String> {
    let endpoint = (r"\$?", "[A-Z]{1,2}", r"\$?", 1u32..999).prop_map(|(c, l, r, n)| format!("{c}{l}{r}{n}"));
    prop_oneof![
        endpoint.clone(),
        (endpoint.clone(), endpoint).prop_map(|(a, b)| format!("{a}:{b}")),
        (r"\$?[A-Z]", r"\$?[A-Z]").prop_map(|(a, b)| format!("{a}:{b}")),
    ]
}

#[derive(Debug, Clone)]
enum Op {
    Type(String),
    Select(usize, usize),
    Cycle,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => r"[A-C1-3=+,:() $%]{1,3}".prop_map(Op::Type),
        2 => (0usize..20, 0usize..20).prop_map(|(a, b)| Op::Select(a, b)),
        1 => Just(Op::Cycle),
    ]
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn four_cycles_restore_the_reference(reference in arb_reference()) {
        let content = format!("=SUM({reference})+1");
        let mut s = editing(&content);
        s.change_selection(5, 5 + reference.len());

        for _ in 0..4 {
            s.cycle_references();
        }
        prop_assert_eq!(s.current_content(), content.as_str());
    }

    #[test]
    fn derived_state_follows_the_content(ops in prop::collection::vec(arb_op(), 1..20)) {
        let mut s = editing("=");
        for op in ops {
            match op {
                Op::Type(text) => s.replace_selection(&text),
                Op::Select(a, b) => s.change_selection(a, b),
                Op::Cycle => s.cycle_references(),
            }

            let len = utf16_len(s.current_content());
            prop_assert!(s.selection().max() <= len);
            if s.last_lex_error().is_none() && s.current_content().starts_with('=') {
                let joined: String = s.current_tokens().iter().map(|t| t.value.as_str()).collect();
                prop_assert_eq!(joined.as_str(), s.current_content());
            }
        }
    }

    #[test]
    fn same_selection_twice_is_idempotent(a in 0usize..12, b in 0usize..12) {
        let mut s = editing("=SUM(A1, B2:C3)");
        s.change_selection(a, b);
        let first = (s.selection(), s.edition_mode(), s.current_content().to_string());
        s.change_selection(a, b);
        let second = (s.selection(), s.edition_mode(), s.current_content().to_string());
        prop_assert_eq!(first, second);
        prop_assert_eq!(s.selection(), Selection::new(a, b));
    }
}
