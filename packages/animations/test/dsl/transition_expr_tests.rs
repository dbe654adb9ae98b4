//! Transition Expression Tests

use angular_animations::dsl::transition_expr::{parse_transition_expr, TransitionMatcher};
use angular_animations::{AnimationParams, TransitionExpr};
use std::rc::Rc;

fn parse(expr: &str) -> (Vec<TransitionMatcher>, Vec<String>) {
    let mut errors = Vec::new();
    let matchers = parse_transition_expr(&expr.into(), &mut errors);
    (matchers, errors)
}

fn matches(matchers: &[TransitionMatcher], from: &str, to: &str) -> bool {
    matchers
        .iter()
        .any(|m| m.matches(from, to, None, &AnimationParams::new()))
}

#[test]
fn should_combine_clauses_and_aliases() {
    let (matchers, errors) = parse("a => b, :leave");
    assert!(errors.is_empty());
    assert!(matches(&matchers, "a", "b"));
    assert!(!matches(&matchers, "b", "a"));
    assert!(matches(&matchers, "x", "void"));
}

#[test]
fn should_expand_the_enter_alias() {
    let (matchers, _) = parse(":enter");
    assert!(matches(&matchers, "void", "open"));
    assert!(!matches(&matchers, "open", "void"));
}

#[test]
fn should_match_both_directions_for_bidirectional_clauses() {
    let (matchers, _) = parse("open <=> closed");
    assert_eq!(matchers.len(), 2);
    assert!(matches(&matchers, "open", "closed"));
    assert!(matches(&matchers, "closed", "open"));
    assert!(!matches(&matchers, "open", "open"));
}

#[test]
fn should_not_duplicate_the_full_wildcard() {
    let (matchers, _) = parse("* <=> *");
    assert_eq!(matchers.len(), 1);
}

#[test]
fn should_report_unsupported_clauses() {
    let (matchers, errors) = parse("a = b");
    assert!(matchers.is_empty());
    assert_eq!(
        errors,
        vec!["The provided transition expression \"a = b\" is not supported".to_string()]
    );
}

#[test]
fn should_fall_back_to_wildcard_for_unknown_aliases() {
    let (matchers, errors) = parse(":sideways");
    assert_eq!(errors.len(), 1);
    assert!(matches(&matchers, "anything", "else"));
}

#[test]
fn should_pass_custom_matchers_through() {
    let expr = TransitionExpr::Matcher(Rc::new(|from, to, _, _| from.len() < to.len()));
    let mut errors = Vec::new();
    let matchers = parse_transition_expr(&expr, &mut errors);
    assert!(matches(&matchers, "a", "bb"));
    assert!(!matches(&matchers, "bb", "a"));
}
