//! Transition Expressions
//!
//! Compiles `"a => b"`, `"a <=> b"`, `":enter"` and friends into state
//! predicates.

use std::fmt;
use std::rc::Rc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::driver::ElementId;
use crate::metadata::{AnimationParams, TransitionExpr, TransitionMatcherFn};

pub const ANY_STATE: &str = "*";

static CLAUSE_SEPARATOR_REGEXP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*,\s*").unwrap());
static TRANSITION_CLAUSE_REGEXP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\*|[-\w]+)\s*(<?[=-]>)\s*(\*|[-\w]+)$").unwrap());

/// One compiled `(from, to)` predicate. `source` names the clause it came
/// from so two matchers built from the same text compare equal.
#[derive(Clone)]
pub struct TransitionMatcher {
    pub source: String,
    predicate: TransitionMatcherFn,
}

impl TransitionMatcher {
    pub fn new(source: impl Into<String>, predicate: TransitionMatcherFn) -> Self {
        TransitionMatcher {
            source: source.into(),
            predicate,
        }
    }

    /// Matches every state pair.
    pub fn always() -> Self {
        TransitionMatcher::new("* => *", Rc::new(|_, _, _, _| true))
    }

    pub fn matches(
        &self,
        from_state: &str,
        to_state: &str,
        element: Option<ElementId>,
        params: &AnimationParams,
    ) -> bool {
        (self.predicate)(from_state, to_state, element, params)
    }
}

impl PartialEq for TransitionMatcher {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl fmt::Debug for TransitionMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionMatcher")
            .field("source", &self.source)
            .finish()
    }
}

/// Parses a transition expression into its matchers, pushing an error per
/// unsupported clause.
pub fn parse_transition_expr(expr: &TransitionExpr, errors: &mut Vec<String>) -> Vec<TransitionMatcher> {
    let mut expressions = Vec::new();
    match expr {
        TransitionExpr::Matcher(predicate) => {
            expressions.push(TransitionMatcher::new("<custom>", predicate.clone()));
        }
        TransitionExpr::Str(text) => {
            for clause in CLAUSE_SEPARATOR_REGEXP.split(text.trim()) {
                parse_inner_transition_str(clause, &mut expressions, errors);
            }
        }
    }
    expressions
}

fn parse_inner_transition_str(
    event_str: &str,
    expressions: &mut Vec<TransitionMatcher>,
    errors: &mut Vec<String>,
) {
    if let Some(alias) = event_str.strip_prefix(':') {
        match parse_animation_alias(alias, errors) {
            AliasResult::Expression(expr) => return parse_inner_transition_str(expr, expressions, errors),
            AliasResult::Matcher(matcher) => {
                expressions.push(matcher);
                return;
            }
        }
    }

    let Some(caps) = TRANSITION_CLAUSE_REGEXP.captures(event_str) else {
        errors.push(format!(
            "The provided transition expression \"{}\" is not supported",
            event_str
        ));
        return;
    };

    let from_state = caps[1].to_string();
    let separator = caps[2].to_string();
    let to_state = caps[3].to_string();
    expressions.push(make_lambda_from_states(&from_state, &to_state));

    let is_full_any_state_expr = from_state == ANY_STATE && to_state == ANY_STATE;
    if separator.starts_with('<') && !is_full_any_state_expr {
        expressions.push(make_lambda_from_states(&to_state, &from_state));
    }
}

enum AliasResult {
    Expression(&'static str),
    Matcher(TransitionMatcher),
}

fn parse_animation_alias(alias: &str, errors: &mut Vec<String>) -> AliasResult {
    match alias {
        "enter" => AliasResult::Expression("void => *"),
        "leave" => AliasResult::Expression("* => void"),
        "increment" => AliasResult::Matcher(TransitionMatcher::new(
            ":increment",
            Rc::new(|from, to, _, _| numeric_transition(from, to, |a, b| b > a)),
        )),
        "decrement" => AliasResult::Matcher(TransitionMatcher::new(
            ":decrement",
            Rc::new(|from, to, _, _| numeric_transition(from, to, |a, b| b < a)),
        )),
        _ => {
            errors.push(format!(
                "The transition alias value \"{}\" is not supported",
                alias
            ));
            AliasResult::Expression("* => *")
        }
    }
}

fn numeric_transition(from: &str, to: &str, cmp: fn(f64, f64) -> bool) -> bool {
    match (from.parse::<f64>(), to.parse::<f64>()) {
        (Ok(a), Ok(b)) => cmp(a, b),
        _ => false,
    }
}

fn boolean_alias(state: &str) -> Option<&'static str> {
    match state {
        "true" | "1" => Some("true"),
        "false" | "0" => Some("false"),
        _ => None,
    }
}

/// `lhs == rhs`, where `true`/`1` and `false`/`0` are interchangeable
/// whenever the declared side is a boolean alias.
fn state_matches(declared: &str, actual: &str) -> bool {
    if declared == actual {
        return true;
    }
    match boolean_alias(declared) {
        Some(alias) => boolean_alias(actual) == Some(alias),
        None => false,
    }
}

pub fn make_lambda_from_states(lhs: &str, rhs: &str) -> TransitionMatcher {
    let lhs_owned = lhs.to_string();
    let rhs_owned = rhs.to_string();
    TransitionMatcher::new(
        format!("{} => {}", lhs, rhs),
        Rc::new(move |from_state, to_state, _, _| {
            let lhs_match = lhs_owned == ANY_STATE || state_matches(&lhs_owned, from_state);
            let rhs_match = rhs_owned == ANY_STATE || state_matches(&rhs_owned, to_state);
            lhs_match && rhs_match
        }),
    )
}
