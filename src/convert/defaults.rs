//! DEFAULT expression normalization (C3, second half).
//!
//! Regex-driven and order-sensitive — spec.md §9 calls this brittle but
//! load-bearing. Each of the five steps below runs in the order given;
//! reordering them changes observed defaults.

use once_cell::sync::Lazy;
use regex::Regex;

static NATIONAL_LITERAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)^N'(.*)'$").unwrap());
static PAREN_NATIONAL_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\(N'(.*)'\)$").unwrap());

/// Steps 1-4 of spec.md §4.2, in order. Idempotent: `normalize(&normalize(t,
/// x))` == `normalize(t, x)`.
pub fn normalize(source_type: &str, raw_default: &str) -> String {
    let mut expr = raw_default.to_string();

    // Step 1: bool-literal rewrite, bit/int columns only.
    if source_type == "bit" || source_type == "int" || source_type == "integer" {
        expr = expr.replace("('False')", "(0)").replace("('True')", "(1)");
    }

    // Step 2: surrounding-parenthesis strip.
    expr = strip_surrounding_parens(&expr);

    // Step 3: national-literal strip, N'...' -> '...'.
    if let Some(caps) = NATIONAL_LITERAL.captures(&expr) {
        expr = format!("'{}'", &caps[1]);
    }

    // Step 4: adjust pass, (N'...') -> '...'.
    if let Some(caps) = PAREN_NATIONAL_LITERAL.captures(&expr) {
        expr = format!("'{}'", &caps[1]);
    }

    expr
}

fn strip_surrounding_parens(expr: &str) -> String {
    if let (Some(first_quote), Some(last_quote)) = (expr.find('\''), expr.rfind('\'')) {
        if first_quote != last_quote {
            return expr[first_quote..=last_quote].to_string();
        }
    }

    let dropped: String = expr.chars().filter(|&c| c != '(' && c != ')').collect();
    if dropped.len() == expr.len() {
        dropped
    } else {
        format!("({dropped})")
    }
}

/// Step 5 + emission rule: given the steps1-4 normalized expression,
/// decides whether a DEFAULT clause should be emitted, and if so, what
/// text follows `DEFAULT `.
pub fn default_clause(normalized: &str) -> Option<String> {
    if normalized.is_empty() {
        return None;
    }

    if normalized.to_uppercase().contains("GETDATE") {
        return Some("(CURRENT_TIMESTAMP)".to_string());
    }

    let core = strip_one_paren_layer(normalized).trim().to_string();

    if is_single_quoted(&core) {
        return Some(core);
    }

    if core.parse::<f64>().is_ok() {
        return Some(core);
    }

    None
}

fn strip_one_paren_layer(expr: &str) -> &str {
    let trimmed = expr.trim();
    if trimmed.starts_with('(') && trimmed.ends_with(')') && trimmed.len() >= 2 {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    }
}

fn is_single_quoted(s: &str) -> bool {
    s.len() >= 2 && s.starts_with('\'') && s.ends_with('\'')
}
