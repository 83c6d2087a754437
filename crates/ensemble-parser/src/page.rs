//! Locating the data payload inside the page markup.

use ensemble_common::{EnsembleError, EnsembleResult};

/// Declaration that introduces the ensemble chart data.
pub const DATA_VARIABLE: &str = "var hcensemblelong_data = ";

const SCRIPT_OPEN: &str = "<script";
const SCRIPT_CLOSE: &str = "</script>";

/// Body of the first `<script type="text/javascript">` block.
pub fn extract_script(html: &str) -> EnsembleResult<&str> {
    // ASCII lowercasing keeps byte offsets aligned with `html`.
    let lower = html.to_ascii_lowercase();
    let mut cursor = 0;

    while let Some(found) = lower[cursor..].find(SCRIPT_OPEN) {
        let tag_start = cursor + found;
        let tag_end = match lower[tag_start..].find('>') {
            Some(pos) => tag_start + pos,
            None => break,
        };
        let body_start = tag_end + 1;
        let body_end = lower[body_start..]
            .find(SCRIPT_CLOSE)
            .map(|pos| body_start + pos)
            .unwrap_or(html.len());

        if is_javascript_tag(&lower[tag_start..tag_end]) {
            return Ok(&html[body_start..body_end]);
        }
        cursor = body_end;
    }

    Err(EnsembleError::ScriptNotFound)
}

fn is_javascript_tag(tag: &str) -> bool {
    tag.contains("type=\"text/javascript\"") || tag.contains("type='text/javascript'")
        || tag.contains("type=text/javascript")
}

/// The object literal assigned by `declaration`, without the declaration
/// itself and without the terminating `;` or anything that follows it.
pub fn extract_data_literal<'a>(script: &'a str, declaration: &str) -> EnsembleResult<&'a str> {
    let var_name = declaration
        .trim()
        .trim_end_matches('=')
        .trim()
        .trim_start_matches("var ")
        .to_string();

    let start = script
        .find(declaration)
        .ok_or(EnsembleError::VariableNotFound(var_name))?
        + declaration.len();
    let rest = &script[start..];

    let open = rest
        .find(|c: char| !c.is_whitespace())
        .ok_or_else(|| EnsembleError::ParseError("empty assignment".to_string()))?;
    let end = matching_close(rest, open)?;
    Ok(&rest[open..=end])
}

/// Byte index of the bracket closing the one at `open`, skipping strings.
fn matching_close(text: &str, open: usize) -> EnsembleResult<usize> {
    let bytes = text.as_bytes();
    match bytes[open] {
        b'[' | b'{' => {}
        other => {
            return Err(EnsembleError::ParseError(format!(
                "expected '[' or '{{' at start of payload, found '{}'",
                other as char
            )))
        }
    }

    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == q {
                quote = None;
            }
            continue;
        }
        match b {
            b'"' | b'\'' => quote = Some(b),
            b'[' | b'{' => depth += 1,
            b']' | b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
    }

    Err(EnsembleError::ParseError("unterminated payload".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_script_skips_other_types() {
        let html = r#"<div><script type="application/ld+json">{"a":1}</script>
<SCRIPT TYPE="text/javascript">var x = 1;</SCRIPT></div>"#;
        assert_eq!(extract_script(html).unwrap(), "var x = 1;");
    }

    #[test]
    fn test_extract_script_missing() {
        let err = extract_script("<html><body>nothing</body></html>").unwrap_err();
        assert!(matches!(err, EnsembleError::ScriptNotFound));
    }

    #[test]
    fn test_extract_literal_drops_trailing_statements() {
        let script = "var a = 1;\nvar hcensemblelong_data = [{'name': 'Main'}];\nrender();";
        let literal = extract_data_literal(script, DATA_VARIABLE).unwrap();
        assert_eq!(literal, "[{'name': 'Main'}]");
    }

    #[test]
    fn test_extract_literal_ignores_brackets_in_strings() {
        let script = "var hcensemblelong_data = [{'name': 'a]b', \"t\": \"[\"}];";
        let literal = extract_data_literal(script, DATA_VARIABLE).unwrap();
        assert_eq!(literal, "[{'name': 'a]b', \"t\": \"[\"}]");
    }

    #[test]
    fn test_extract_literal_missing_variable() {
        let err = extract_data_literal("var other = [];", DATA_VARIABLE).unwrap_err();
        match err {
            EnsembleError::VariableNotFound(name) => assert_eq!(name, "hcensemblelong_data"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_extract_literal_unterminated() {
        let err = extract_data_literal("var hcensemblelong_data = [[1, 2]", DATA_VARIABLE).unwrap_err();
        assert!(matches!(err, EnsembleError::ParseError(_)));
    }
}
