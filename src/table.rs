//! HTML properties table for the feature info panel

use crate::config::{Config, TableStyle};
use crate::geojson::Properties;
use serde_json::Value;

/// Renders properties with the default hidden keys and styling
pub fn render_properties_table(properties: &Properties) -> String {
    render_properties_table_with(properties, &Config::default())
}

/// Renders a two-column `<table>` of every visible property.
///
/// Rows alternate background by the key's position among all properties,
/// hidden ones included; even positions are shaded. Keys and values are
/// HTML-escaped.
pub fn render_properties_table_with(properties: &Properties, config: &Config) -> String {
    let TableStyle {
        class,
        shaded_background,
        plain_background,
    } = &config.table;

    let mut out = String::with_capacity(64 + properties.len() * 96);
    out.push_str("<table class=\"");
    push_escaped_attr(&mut out, class);
    out.push_str("\">");

    let visible = properties
        .iter()
        .enumerate()
        .filter(|(_, (key, _))| !config.is_hidden(key));
    for (position, (key, value)) in visible {
        let background = if position % 2 == 0 {
            shaded_background
        } else {
            plain_background
        };
        out.push_str("<tr style=\"background-color:");
        push_escaped_attr(&mut out, background);
        out.push_str("\"><th>");
        push_escaped_text(&mut out, key);
        out.push_str("</th><td>");
        push_value(&mut out, value);
        out.push_str("</td></tr>");
    }

    out.push_str("</table>");
    out
}

fn push_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => {}
        Value::String(s) => push_escaped_text(out, s),
        other => push_escaped_text(out, &other.to_string()),
    }
}

fn push_escaped_attr(out: &mut String, input: &str) {
    push_escaped(out, input, true);
}

fn push_escaped_text(out: &mut String, input: &str) {
    push_escaped(out, input, false);
}

fn push_escaped(out: &mut String, input: &str, quotes: bool) {
    let mut last = 0;
    for (idx, ch) in input.char_indices() {
        let entity = match ch {
            '&' => "&amp;",
            '<' => "&lt;",
            '>' => "&gt;",
            '"' if quotes => "&quot;",
            '\'' if quotes => "&#39;",
            _ => continue,
        };
        out.push_str(&input[last..idx]);
        out.push_str(entity);
        last = idx + ch.len_utf8();
    }
    out.push_str(&input[last..]);
}
