//! Coercion of JavaScript object literals into strict JSON.
//!
//! The payload is nearly JSON. Two things differ: strings may be
//! single-quoted, and objects or arrays may end with a trailing comma.
//! Both are rewritten here without touching string contents.

/// Rewrite a JavaScript object literal so that a JSON parser accepts it.
pub fn repair_object_literal(literal: &str) -> String {
    let chars: Vec<char> = literal.chars().collect();
    let mut out = String::with_capacity(literal.len());
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '"' => i = copy_double_quoted(&chars, i, &mut out),
            '\'' => i = convert_single_quoted(&chars, i, &mut out),
            ',' if closes_next(&chars, i + 1) => i += 1,
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

/// Copies a `"..."` string verbatim; returns the index after its closing quote.
fn copy_double_quoted(chars: &[char], start: usize, out: &mut String) -> usize {
    out.push('"');
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        out.push(c);
        match c {
            '\\' => {
                if let Some(&next) = chars.get(i + 1) {
                    out.push(next);
                }
                i += 2;
            }
            '"' => return i + 1,
            _ => i += 1,
        }
    }
    i
}

/// Re-quotes a `'...'` string with double quotes.
fn convert_single_quoted(chars: &[char], start: usize, out: &mut String) -> usize {
    out.push('"');
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => match chars.get(i + 1) {
                Some('\'') => {
                    out.push('\'');
                    i += 2;
                }
                Some(&next) => {
                    out.push('\\');
                    out.push(next);
                    i += 2;
                }
                None => i += 1,
            },
            '"' => {
                out.push_str("\\\"");
                i += 1;
            }
            '\'' => {
                out.push('"');
                return i + 1;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    out.push('"');
    i
}

/// True if the next non-whitespace character closes an object or array.
fn closes_next(chars: &[char], from: usize) -> bool {
    chars[from..]
        .iter()
        .find(|c| !c.is_whitespace())
        .is_some_and(|c| *c == '}' || *c == ']')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_quotes_become_double() {
        assert_eq!(
            repair_object_literal("{'name': 'Main', 'enabled': false}"),
            r#"{"name": "Main", "enabled": false}"#
        );
    }

    #[test]
    fn test_embedded_quotes_are_escaped() {
        assert_eq!(
            repair_object_literal(r#"{'label': 'say "hi"', 'x': 'it\'s'}"#),
            r#"{"label": "say \"hi\"", "x": "it's"}"#
        );
    }

    #[test]
    fn test_apostrophe_inside_double_quotes_survives() {
        assert_eq!(repair_object_literal(r#"{"a": "it's"}"#), r#"{"a": "it's"}"#);
    }

    #[test]
    fn test_trailing_commas_removed() {
        let input = "{\n    'marker': {\n        'enabled': false,\n    },\n    'data': [1, 2,],\n}";
        let repaired = repair_object_literal(input);
        let value: serde_json::Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(value["marker"]["enabled"], serde_json::json!(false));
        assert_eq!(value["data"], serde_json::json!([1, 2]));
    }

    #[test]
    fn test_commas_inside_strings_untouched() {
        assert_eq!(repair_object_literal("['a,]', 'b']"), r#"["a,]", "b"]"#);
    }
}
