//! Claim extraction from free-form text.
//!
//! Three independent passes, results merged:
//! 1. balanced `{...}` blocks that parse to objects with tool or
//!    execution-id fields,
//! 2. inline `execution_id: <token>` mentions,
//! 3. parenthetical `(execution <token>)` references.
//!
//! Malformed blocks are skipped. Extraction never fails; the worst case is
//! an empty [`Extraction`].

use crate::claim::{Claim, Extraction};
use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::trace;

/// Deepest nesting level at which a block is parsed on its own.
///
/// Blocks nested inside a block that parsed are reached through the parsed
/// value instead, so this only bounds retries inside malformed blocks.
const MAX_RETRY_DEPTH: usize = 8;

static INLINE_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\bexec(?:ution)?[ _-]?id\b[*"'`]*\s*[:=]\s*[*"'`]*([A-Za-z0-9][A-Za-z0-9_.\-]*)"#)
        .expect("valid regex")
});

static PAREN_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\(\s*exec(?:ution)?(?:[ _-]?id)?\b\s*[:=#]?\s*[*"'`]*([A-Za-z0-9][A-Za-z0-9_.\-]*)[*"'`]*\s*\)"#)
        .expect("valid regex")
});

/// Finds tool-result claims in text
pub trait ClaimExtractor: Send + Sync {
    /// Extract every claim and bare execution-ID reference
    fn extract(&self, text: &str) -> Extraction;
}

/// Pattern-based extractor for unconstrained model output
#[derive(Debug, Clone)]
pub struct PatternExtractor {
    /// Reparse single-quoted dict literals as JSON
    lenient: bool,
}

impl PatternExtractor {
    /// Create an extractor that also accepts dict-literal blocks
    #[must_use]
    pub fn new() -> Self {
        Self { lenient: true }
    }

    /// Toggle dict-literal parsing
    #[must_use]
    pub fn with_lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }

    /// Claims from balanced brace blocks
    fn structured_claims(&self, text: &str) -> Vec<Claim> {
        let mut claims = Vec::new();
        let mut cursor = 0;
        for span in brace_spans(text.as_bytes()) {
            if span.start < cursor || span.depth > MAX_RETRY_DEPTH {
                continue;
            }
            match self.parse_block(&text[span.start..=span.end]) {
                Some(value) => {
                    collect_claims(&value, &mut claims);
                    cursor = span.end + 1;
                }
                None => trace!(offset = span.start, "skipping unparseable block"),
            }
        }
        claims
    }

    fn parse_block(&self, block: &str) -> Option<Value> {
        let strict = serde_json::from_str::<Value>(block).ok();
        let value = match strict {
            Some(value) => value,
            None if self.lenient => serde_json::from_str(&dict_literal_to_json(block)).ok()?,
            None => return None,
        };
        value.is_object().then_some(value)
    }
}

impl Default for PatternExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaimExtractor for PatternExtractor {
    fn extract(&self, text: &str) -> Extraction {
        let claims = self.structured_claims(text);
        let claimed: IndexSet<&str> = claims
            .iter()
            .filter_map(|c| c.execution_id.as_deref())
            .collect();

        let inline = INLINE_ID
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim_end_matches(['.', '-']));
        // Parenthetical tokens must look like an ID; `id:` forms are inline hits too.
        let parenthetical = PAREN_ID
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim_end_matches(['.', '-']))
            .filter(|token| looks_like_execution_id(token));

        let referenced_ids = inline
            .chain(parenthetical)
            .filter(|id| !id.is_empty() && !claimed.contains(id))
            .map(str::to_string)
            .collect();

        Extraction {
            claims,
            referenced_ids,
        }
    }
}

/// `<tool>_<stamp>_<suffix>`: an underscore and at least one digit
fn looks_like_execution_id(token: &str) -> bool {
    token.contains('_') && token.bytes().any(|b| b.is_ascii_digit())
}

/// A balanced `{...}` span
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BraceSpan {
    start: usize,
    end: usize,
    /// Number of enclosing open braces
    depth: usize,
}

/// Every balanced brace span, ordered by start, in one pass.
///
/// Double-quoted strings are honoured only inside a block. A raw newline
/// inside a string cannot occur in a valid block, so it abandons every
/// block still open.
fn brace_spans(bytes: &[u8]) -> Vec<BraceSpan> {
    let mut spans = Vec::new();
    let mut open: Vec<usize> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            match b {
                b'\n' => {
                    in_string = false;
                    escaped = false;
                    open.clear();
                }
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' if !open.is_empty() => in_string = true,
            b'{' => open.push(i),
            b'}' => {
                if let Some(start) = open.pop() {
                    spans.push(BraceSpan {
                        start,
                        end: i,
                        depth: open.len(),
                    });
                }
            }
            _ => {}
        }
    }
    spans.sort_unstable_by_key(|span| span.start);
    spans
}

/// Walk a parsed block, turning the outermost qualifying objects into claims
fn collect_claims(value: &Value, claims: &mut Vec<Claim>) {
    match value {
        Value::Object(map) => match Claim::from_fields(map) {
            // Everything below a claim is that claim's payload.
            Some(claim) => claims.push(claim),
            None => {
                for nested in map.values() {
                    collect_claims(nested, claims);
                }
            }
        },
        Value::Array(items) => {
            for item in items {
                collect_claims(item, claims);
            }
        }
        _ => {}
    }
}

/// Rewrite a dict literal (`{'a': True, 'b': None}`) as JSON text
fn dict_literal_to_json(block: &str) -> String {
    let mut out = String::with_capacity(block.len());
    let mut chars = block.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                out.push('"');
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => match chars.next() {
                            Some('\'') => out.push('\''),
                            Some(other) => {
                                out.push('\\');
                                out.push(other);
                            }
                            None => {}
                        },
                        '"' => out.push_str("\\\""),
                        '\'' => break,
                        other => out.push(other),
                    }
                }
                out.push('"');
            }
            '"' => {
                out.push('"');
                while let Some(c) = chars.next() {
                    out.push(c);
                    match c {
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                out.push(escaped);
                            }
                        }
                        '"' => break,
                        _ => {}
                    }
                }
            }
            c if c.is_ascii_alphabetic() => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if !next.is_ascii_alphanumeric() && next != '_' {
                        break;
                    }
                    word.push(next);
                    chars.next();
                }
                out.push_str(match word.as_str() {
                    "True" => "true",
                    "False" => "false",
                    "None" => "null",
                    _ => &word,
                });
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn extract(text: &str) -> Extraction {
        PatternExtractor::new().extract(text)
    }

    #[test]
    fn test_plain_text_has_no_claims() {
        let e = extract("Your network looks healthy. Latency is typically low at this hour.");
        assert!(e.is_empty());
    }

    #[test]
    fn test_json_block_claim() {
        let e = extract(r#"Result: {"tool_name": "ping", "execution_id": "ping_1_ab", "latency": 12} done"#);
        assert_eq!(e.claims.len(), 1);
        assert_eq!(e.claims[0].tool_name.as_deref(), Some("ping"));
        assert_eq!(e.claims[0].execution_id.as_deref(), Some("ping_1_ab"));
        assert!(e.referenced_ids.is_empty());
    }

    #[test]
    fn test_nested_braces_matched() {
        let text = r#"{"tool_name": "dns_lookup", "result": {"records": {"a": ["93.184.216.34"]}}, "execution_id": "dns_lookup_2_cd"}"#;
        let e = extract(text);
        assert_eq!(e.claims.len(), 1);
        assert_eq!(e.claims[0].execution_id.as_deref(), Some("dns_lookup_2_cd"));
        assert_eq!(e.claims[0].fields["result"]["records"]["a"][0], json!("93.184.216.34"));
    }

    #[test]
    fn test_braces_inside_strings() {
        let e = extract(r#"{"tool_name": "web_request", "body": "}{ not a brace", "execution_id": "w_1"}"#);
        assert_eq!(e.claims.len(), 1);
        assert_eq!(e.claims[0].execution_id.as_deref(), Some("w_1"));
    }

    #[test]
    fn test_malformed_block_skipped_but_inner_block_found() {
        let e = extract(r#"{ broken: [ {"tool_name": "ping", "execution_id": "p_1"} ,, }"#);
        assert_eq!(e.claims.len(), 1);
        assert_eq!(e.claims[0].tool_name.as_deref(), Some("ping"));
    }

    #[test]
    fn test_unbalanced_block_ignored() {
        let e = extract(r#"{"tool_name": "ping", "latency": 12"#);
        assert!(e.claims.is_empty());
    }

    #[test]
    fn test_blocks_without_claim_fields_ignored() {
        let e = extract(r#"Config example: {"retries": 3, "verbose": true}"#);
        assert!(e.is_empty());
    }

    #[test]
    fn test_array_of_results() {
        let e = extract(
            r#"{"results": [{"tool": "ping", "execution_id": "a_1"}, {"tool": "traceroute", "execution_id": "b_2"}]}"#,
        );
        let ids: Vec<_> = e.claims.iter().filter_map(|c| c.execution_id.as_deref()).collect();
        assert_eq!(ids, vec!["a_1", "b_2"]);
    }

    #[test]
    fn test_dict_literal_block() {
        let e = extract(r#"{'tool_name': 'ping', 'execution_id': 'ping_3_ef', 'reachable': True, 'loss': None}"#);
        assert_eq!(e.claims.len(), 1);
        assert_eq!(e.claims[0].execution_id.as_deref(), Some("ping_3_ef"));
        assert_eq!(e.claims[0].fields["reachable"], json!(true));
        assert_eq!(e.claims[0].fields["loss"], json!(null));
    }

    #[test]
    fn test_dict_literal_rejected_when_strict() {
        let extractor = PatternExtractor::new().with_lenient(false);
        let e = extractor.extract(r#"{'tool_name': 'ping', 'latency': 3}"#);
        assert!(e.claims.is_empty());
    }

    #[test]
    fn test_dict_literal_to_json() {
        assert_eq!(
            dict_literal_to_json(r#"{'a': 'it\'s "x"', 'b': False, "c": "None"}"#),
            r#"{"a": "it's \"x\"", "b": false, "c": "None"}"#
        );
    }

    #[test]
    fn test_inline_id_mentions() {
        let e = extract("Ping succeeded (12 ms), execution_id: ping_9_aa11. Also execution ID = dns_lookup_4_bb22.");
        let ids: Vec<_> = e.referenced_ids.iter().map(String::as_str).collect();
        assert_eq!(ids, vec!["ping_9_aa11", "dns_lookup_4_bb22"]);
        assert!(e.claims.is_empty());
    }

    #[test]
    fn test_inline_markdown_mention() {
        let e = extract("**Execution ID**: `traceroute_5_cc33`");
        assert!(e.referenced_ids.contains("traceroute_5_cc33"));
    }

    #[test]
    fn test_parenthetical_reference() {
        let e = extract("The host resolved to 93.184.216.34 (execution dns_lookup_7_dd44).");
        assert_eq!(e.referenced_ids.len(), 1);
        assert!(e.referenced_ids.contains("dns_lookup_7_dd44"));

        let e = extract("Port 443 is open (exec id: port_scan_8_ee55)");
        assert!(e.referenced_ids.contains("port_scan_8_ee55"));
    }

    #[test]
    fn test_structured_ids_not_duplicated_as_bare() {
        let e = extract(r#"{"tool_name": "ping", "execution_id": "ping_1_ab"} (execution_id: ping_1_ab)"#);
        assert_eq!(e.claims.len(), 1);
        assert!(e.referenced_ids.is_empty());
    }

    #[test]
    fn test_id_in_malformed_block_still_referenced() {
        let e = extract(r#"{"tool_name": "ping", "execution_id": "ping_6_ff", latency: 3}"#);
        assert!(e.claims.is_empty());
        assert!(e.referenced_ids.contains("ping_6_ff"));
    }

    #[test]
    fn test_mention_without_value_ignored() {
        let e = extract("No execution id was produced because the tool was never run.");
        assert!(e.is_empty());
    }

    #[test]
    fn test_duplicate_claims_kept() {
        let block = r#"{"tool_name": "ping", "execution_id": "ping_1_ab"}"#;
        let e = extract(&format!("{block} and again {block}"));
        assert_eq!(e.claims.len(), 2);
    }

    #[test]
    fn test_parenthetical_prose_is_not_a_reference() {
        for text in [
            "The scan did not finish (execution failed).",
            "Nothing came back (execution timeout)",
            "All steps ran (executed)",
            "See the log (execution)",
            "Retried once (execution 2)",
        ] {
            assert!(extract(text).is_empty(), "{text}");
        }
    }

    #[test]
    fn test_nested_objects_inside_claim_are_payload() {
        let e = extract(
            r#"{"tools": [{"tool": "ping", "description": "ICMP echo"}], "execution_id": "mcp_list_1_ab"}"#,
        );
        assert_eq!(e.claims.len(), 1);
        assert_eq!(e.claims[0].execution_id.as_deref(), Some("mcp_list_1_ab"));
        assert!(e.claims[0].tool_name.is_none());
    }

    #[test]
    fn test_brace_spans_single_pass() {
        let spans = brace_spans(br#"a {"x": "}", "y": {}} } {"#);
        assert_eq!(
            spans,
            vec![
                BraceSpan { start: 2, end: 20, depth: 0 },
                BraceSpan { start: 18, end: 19, depth: 1 },
            ]
        );
    }

    #[test]
    fn test_unterminated_string_does_not_swallow_later_blocks() {
        let e = extract("{\"tool_name\": \"ping\nlater {\"tool_name\": \"ping\", \"execution_id\": \"ping_1_ab\"}");
        assert_eq!(e.claims.len(), 1);
        assert_eq!(e.claims[0].execution_id.as_deref(), Some("ping_1_ab"));
    }

    #[test]
    fn test_brace_soup_scales_linearly() {
        let inputs = [
            "{".repeat(200_000),
            "{x".repeat(100_000) + &"}".repeat(100_000),
            "{\"a\": ".repeat(50_000),
        ];
        let started = std::time::Instant::now();
        for text in &inputs {
            assert!(extract(text).claims.is_empty());
        }
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    proptest::proptest! {
        #[test]
        fn prop_extract_never_panics(text in "\\PC*") {
            let _ = extract(&text);
        }

        #[test]
        fn prop_extract_never_panics_on_brace_soup(text in "[{}\"'\\\\a-z:, ]{0,200}") {
            let _ = extract(&text);
        }
    }
}
