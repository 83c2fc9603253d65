//! Terminal rendering of content payloads.

use chrono::{Datelike, NaiveDate};
use colored::*;
use serde_json::Value;

use fogwalker_core::{
    ColliderData, ContentVariant, ItemId, LabellessContent, SedimentItem, WormholeContent,
};

/// Relative label for a `YYYY-MM-DD` date as seen on `today`.
///
/// Unparseable input is returned unchanged.
pub fn relative_date(date: &str, today: NaiveDate) -> String {
    let Ok(parsed) = NaiveDate::parse_from_str(date, "%Y-%m-%d") else {
        return date.to_string();
    };

    let days = (today - parsed).num_days();
    match days {
        0 => "today".to_string(),
        1 => "yesterday".to_string(),
        2..=7 => format!("{days} days ago"),
        8..=13 => "1 week ago".to_string(),
        14..=30 => format!("{} weeks ago", days / 7),
        _ if parsed.year() == today.year() => format!("{}/{}", parsed.month(), parsed.day()),
        _ => format!("{:02}/{}/{}", parsed.year() % 100, parsed.month(), parsed.day()),
    }
}

/// Renders a complete payload. Falls back to pretty JSON when the payload
/// does not have the variant's shape.
pub fn render(variant: ContentVariant, value: &Value, today: NaiveDate) -> String {
    let typed = match variant {
        ContentVariant::Sediment => serde_json::from_value::<Vec<SedimentItem>>(value.clone())
            .ok()
            .map(|items| render_sediment(&items, today)),
        ContentVariant::Wormhole => serde_json::from_value::<WormholeContent>(value.clone())
            .ok()
            .map(|article| render_wormhole(&article)),
        ContentVariant::Labelless => serde_json::from_value::<LabellessContent>(value.clone())
            .ok()
            .map(|prose| render_labelless(&prose)),
        ContentVariant::Collider => serde_json::from_value::<ColliderData>(value.clone())
            .ok()
            .map(|data| render_collider(&data)),
    };

    typed.unwrap_or_else(|| serde_json::to_string_pretty(value).unwrap_or_default())
}

/// One-line summary of a streaming preview.
pub fn preview_line(value: &Value) -> String {
    let text = value
        .get("title")
        .or_else(|| value.pointer("/left/title"))
        .or_else(|| value.get("content"))
        .and_then(Value::as_str)
        .unwrap_or("");
    let first = text.lines().next().unwrap_or("");
    let clipped: String = first.chars().take(60).collect();
    if clipped.len() < first.len() {
        format!("{clipped}…")
    } else {
        clipped
    }
}

fn render_sediment(items: &[SedimentItem], today: NaiveDate) -> String {
    let mut out = String::new();
    for item in items {
        let id = match &item.id {
            ItemId::Number(n) => n.to_string(),
            ItemId::Text(s) => s.clone(),
        };
        out.push_str(&format!(
            "{} {} {}\n   {}\n",
            format!("#{id}").dimmed(),
            item.title.bold(),
            format!("[{} · {}]", item.category, relative_date(&item.date, today)).cyan(),
            item.summary
        ));
    }
    out
}

fn render_wormhole(article: &WormholeContent) -> String {
    let mut out = format!("{}\n", article.title.bold());
    if !article.author.is_empty() {
        out.push_str(&format!("{}\n", format!("by {}", article.author).dimmed()));
    }
    out.push_str(&format!("\n{}\n", article.content));
    if !article.tag.is_empty() {
        out.push_str(&format!("\n{}\n", format!("#{}", article.tag).cyan()));
    }
    out
}

fn render_labelless(prose: &LabellessContent) -> String {
    format!(
        "{}\n\n{}\n",
        prose.content,
        format!(
            "by {}, {} · {} likes",
            prose.meta.author, prose.meta.source, prose.meta.likes
        )
        .dimmed()
    )
}

fn render_collider(data: &ColliderData) -> String {
    format!(
        "{}\n{}\n\n{}\n\n{}\n{}\n",
        data.left.title.green().bold(),
        data.left.content,
        "vs.".dimmed(),
        data.right.title.red().bold(),
        data.right.content
    )
}
