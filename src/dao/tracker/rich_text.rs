//! Conversion between plain paragraphs and the tracker's structured
//! rich-document format. The service never interprets the format beyond
//! round-tripping plain text: one paragraph per non-blank line.

use serde_json::{Value, json};

/// Build a structured document from plain text, one paragraph per non-blank
/// line. Empty input yields a single empty paragraph, which the tracker
/// accepts as "no description".
pub fn to_document(text: &str) -> Value {
    let paragraphs: Vec<Value> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            json!({
                "type": "paragraph",
                "content": [{ "type": "text", "text": line }],
            })
        })
        .collect();

    let content = if paragraphs.is_empty() {
        vec![json!({ "type": "paragraph", "content": [] })]
    } else {
        paragraphs
    };

    json!({
        "type": "doc",
        "version": 1,
        "content": content,
    })
}

/// Flatten a structured document back to plain text, joining paragraphs with
/// newlines. Nodes the format grew since this was written are skipped rather
/// than rejected.
pub fn to_plain_text(document: &Value) -> String {
    let Some(blocks) = document.get("content").and_then(Value::as_array) else {
        return String::new();
    };

    let paragraphs: Vec<String> = blocks
        .iter()
        .filter_map(|block| {
            let inline = block.get("content")?.as_array()?;
            let text: String = inline
                .iter()
                .filter_map(|node| node.get("text").and_then(Value::as_str))
                .collect();
            (!text.is_empty()).then_some(text)
        })
        .collect();

    paragraphs.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_paragraphs_round_trip() {
        let text = "first paragraph\nsecond paragraph";
        assert_eq!(to_plain_text(&to_document(text)), text);
    }

    #[test]
    fn blank_lines_are_dropped() {
        let doc = to_document("alpha\n\n   \nbeta");
        assert_eq!(to_plain_text(&doc), "alpha\nbeta");
    }

    #[test]
    fn empty_text_becomes_an_empty_paragraph() {
        let doc = to_document("");
        let content = doc["content"].as_array().unwrap();
        assert_eq!(content.len(), 1);
        assert_eq!(content[0]["content"].as_array().unwrap().len(), 0);
        assert_eq!(to_plain_text(&doc), "");
    }

    #[test]
    fn unknown_nodes_are_skipped() {
        let doc = serde_json::json!({
            "type": "doc",
            "version": 1,
            "content": [
                { "type": "mediaSingle" },
                { "type": "paragraph", "content": [{ "type": "text", "text": "kept" }] },
            ],
        });
        assert_eq!(to_plain_text(&doc), "kept");
    }
}
