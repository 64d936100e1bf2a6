//! Server-rendered HTML view of the chain.

use std::fmt::Write;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::block::Block;

const STYLE: &str = "body { font-family: sans-serif; background: #f8f9fa; padding: 20px; }\n\
.block { background: #fff; border: 1px solid #ddd; padding: 15px; margin: 10px 0; \
border-radius: 6px; box-shadow: 0 2px 5px rgba(0,0,0,0.05); }\n\
code { word-break: break-all; }";

/// Escape text for use in element content and quoted attributes.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn format_timestamp(seconds: f64) -> String {
    let micros = (seconds * 1_000_000.0).round() as i64;
    match DateTime::<Utc>::from_timestamp_micros(micros) {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => seconds.to_string(),
    }
}

fn evidence(link: &str) -> String {
    if link.starts_with("http://") || link.starts_with("https://") {
        format!(
            "<a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">View</a>",
            escape(link)
        )
    } else {
        escape(link)
    }
}

/// Render the whole chain, genesis first.
pub fn render_chain(chain: &[Block]) -> String {
    let mut html = String::with_capacity(1024 + chain.len() * 800);
    html.push_str("<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>ProofSync Explorer</title><style>");
    html.push_str(STYLE);
    html.push_str("</style></head><body>\n<h1>ProofSync Blockchain</h1>\n");
    let _ = writeln!(html, "<p>{} block(s)</p>", chain.len());

    for block in chain {
        // Writing into a String cannot fail.
        let _ = write!(
            html,
            "<div class=\"block\" id=\"block-{index}\">\n\
             <h3>Block #{index} - {task}</h3>\n\
             <p><b>User:</b> {user}</p>\n\
             <p><b>Description:</b> {description}</p>\n\
             <p><b>Evidence:</b> {evidence}</p>\n\
             <p><b>Note:</b> {note}</p>\n\
             <p><b>Score:</b> {score}</p>\n\
             <p><b>Sealed:</b> {sealed}</p>\n\
             <p><b>Nonce:</b> {nonce}</p>\n\
             <p><b>Hash:</b> <code>{hash}</code></p>\n\
             <p><b>Previous:</b> <code>{previous}</code></p>\n\
             </div>\n",
            index = block.index,
            task = escape(&block.task_type),
            user = escape(&block.user_id),
            description = escape(&block.description),
            evidence = evidence(&block.evidence_link),
            note = escape(&block.validator_note),
            score = block.score,
            sealed = format_timestamp(block.timestamp),
            nonce = block.nonce,
            hash = escape(&block.hash),
            previous = escape(&block.previous_hash),
        );
    }

    html.push_str("</body></html>\n");
    html
}
