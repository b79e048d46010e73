//! Decoding of `streamGenerateContent` response bodies.
//!
//! The API returns one of three shapes depending on how the endpoint was
//! called: a single JSON document, a JSON array of chunk objects, or a
//! line-oriented stream where each line is a chunk (with or without an SSE
//! `data: ` prefix). Extraction is the same everywhere: every non-empty
//! `candidates[0].content.parts[*].text`, in order.

use serde::Deserialize;

#[derive(Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

/// Decode a fragment of a line-oriented stream.
///
/// `buffer` is the undecoded carry-over from the previous call and
/// `incoming` the newly received text. Returns the extracted deltas plus
/// the new carry-over: everything after the last newline. A logical line
/// split across network reads stays in the remainder until its terminating
/// newline arrives. Complete lines that still fail to parse are skipped,
/// never fatal.
///
/// Pure function of its two inputs; no hidden state.
pub fn decode_fragment(buffer: &str, incoming: &str) -> (Vec<String>, String) {
    let mut text = String::with_capacity(buffer.len() + incoming.len());
    text.push_str(buffer);
    text.push_str(incoming);

    let remainder_start = match text.rfind('\n') {
        Some(pos) => pos + 1,
        None => return (Vec::new(), text),
    };

    let mut deltas = Vec::new();
    for line in text[..remainder_start].lines() {
        extract_line(line, &mut deltas);
    }

    (deltas, text[remainder_start..].to_string())
}

/// Decode a complete JSON response body in a single pass.
///
/// A top-level array is walked element by element; anything else is
/// treated as one chunk. Malformed elements contribute nothing.
pub fn decode_document(body: &str) -> Vec<String> {
    let mut deltas = Vec::new();
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Array(items)) => {
            for item in items {
                if let Ok(chunk) = serde_json::from_value::<GenerateChunk>(item) {
                    push_parts(chunk, &mut deltas);
                }
            }
        }
        Ok(value) => {
            if let Ok(chunk) = serde_json::from_value::<GenerateChunk>(value) {
                push_parts(chunk, &mut deltas);
            }
        }
        Err(_) => {}
    }
    deltas
}

fn extract_line(line: &str, deltas: &mut Vec<String>) {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return;
    }

    let payload = trimmed.strip_prefix("data: ").unwrap_or(trimmed);

    if let Ok(chunk) = serde_json::from_str::<GenerateChunk>(payload) {
        push_parts(chunk, deltas);
    }
}

fn push_parts(chunk: GenerateChunk, deltas: &mut Vec<String>) {
    // The service returns a single candidate per chunk; only index 0 matters.
    let Some(candidate) = chunk.candidates.into_iter().next() else {
        return;
    };
    let Some(content) = candidate.content else {
        return;
    };
    for part in content.parts {
        if let Some(text) = part.text {
            if !text.is_empty() {
                deltas.push(text);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_line(text: &str) -> String {
        format!(
            r#"{{"candidates":[{{"content":{{"parts":[{{"text":"{text}"}}]}}}}]}}"#
        )
    }

    #[test]
    fn decodes_data_prefixed_lines() {
        let body = format!("data: {}\n\ndata: {}\n", chunk_line("Hello"), chunk_line(" world"));
        let (deltas, remainder) = decode_fragment("", &body);
        assert_eq!(deltas, vec!["Hello", " world"]);
        assert_eq!(remainder, "");
    }

    #[test]
    fn decodes_bare_json_lines() {
        let body = format!("{}\n{}\n", chunk_line("a"), chunk_line("b"));
        let (deltas, _) = decode_fragment("", &body);
        assert_eq!(deltas, vec!["a", "b"]);
    }

    #[test]
    fn keeps_partial_line_in_remainder() {
        let (deltas, remainder) = decode_fragment("", "data: {\"candi");
        assert!(deltas.is_empty());
        assert_eq!(remainder, "data: {\"candi");

        let rest = "dates\":[{\"content\":{\"parts\":[{\"text\":\"joined\"}]}}]}\n";
        let (deltas, remainder) = decode_fragment(&remainder, rest);
        assert_eq!(deltas, vec!["joined"]);
        assert_eq!(remainder, "");
    }

    #[test]
    fn fragmentation_does_not_change_output() {
        let body = format!(
            "data: {}\ndata: {}\ndata: {}\n",
            chunk_line("one"),
            chunk_line("two"),
            chunk_line("three")
        );

        let (whole, _) = decode_fragment("", &body);
        let expected: String = whole.concat();
        assert_eq!(expected, "onetwothree");

        // Split the body at every byte boundary and decode in two calls.
        for split in 0..=body.len() {
            let (first, second) = body.split_at(split);
            let (mut deltas, remainder) = decode_fragment("", first);
            let (more, remainder) = decode_fragment(&remainder, second);
            deltas.extend(more);
            assert_eq!(deltas.concat(), expected, "split at byte {split}");
            assert_eq!(remainder, "");
        }
    }

    #[test]
    fn skips_malformed_complete_lines() {
        let body = format!("not json at all\n{}\n", chunk_line("ok"));
        let (deltas, _) = decode_fragment("", &body);
        assert_eq!(deltas, vec!["ok"]);
    }

    #[test]
    fn skips_blank_lines_and_empty_text() {
        let body = format!(
            "\n   \ndata: {}\n{{\"candidates\":[{{\"content\":{{\"parts\":[{{\"text\":\"\"}}]}}}}]}}\n",
            chunk_line("x")
        );
        let (deltas, _) = decode_fragment("", &body);
        assert_eq!(deltas, vec!["x"]);
    }

    #[test]
    fn emits_multiple_parts_in_order() {
        let body = concat!(
            "{\"candidates\":[{\"content\":{\"parts\":",
            "[{\"text\":\"first\"},{\"text\":\"second\"}]}}]}\n"
        );
        let (deltas, _) = decode_fragment("", body);
        assert_eq!(deltas, vec!["first", "second"]);
    }

    #[test]
    fn document_array_is_walked_in_order() {
        let body = format!("[{},{}]", chunk_line("a"), chunk_line("b"));
        assert_eq!(decode_document(&body), vec!["a", "b"]);
    }

    #[test]
    fn document_single_object() {
        assert_eq!(decode_document(&chunk_line("only")), vec!["only"]);
    }

    #[test]
    fn document_without_candidates_yields_nothing() {
        assert!(decode_document("{}").is_empty());
        assert!(decode_document("{\"candidates\":[]}").is_empty());
        assert!(decode_document("not json").is_empty());
    }

    #[test]
    fn parts_without_text_are_ignored() {
        let body = "{\"candidates\":[{\"content\":{\"parts\":[{\"functionCall\":{}},{\"text\":\"t\"}]}}]}";
        assert_eq!(decode_document(body), vec!["t"]);
    }
}
