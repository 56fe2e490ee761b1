//! One-line previews for collapsed cells and CLI output

use crate::param::SweepParam;
use crate::value::Value;

/// Values shown before a preview is cut short
pub const PREVIEW_LIMIT: usize = 5;

/// Axis names, or `None` when nothing is selected
#[must_use]
pub fn preview_params(params: &[SweepParam]) -> String {
    if params.is_empty() {
        return "None".to_string();
    }
    params
        .iter()
        .map(SweepParam::name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// The first [`PREVIEW_LIMIT`] values and a count of the rest
#[must_use]
pub fn preview_values(values: &[Value]) -> String {
    if values.is_empty() {
        return "(empty)".to_string();
    }
    let shown: Vec<String> = values.iter().take(PREVIEW_LIMIT).map(ToString::to_string).collect();
    let mut text = shown.join(", ");
    if values.len() > PREVIEW_LIMIT {
        text.push_str(&format!(", ... ({} more)", values.len() - PREVIEW_LIMIT));
    }
    text
}

/// `axis: values` per line, disabled points marked with `!`
#[must_use]
pub fn preview_series(params: &[SweepParam]) -> String {
    params
        .iter()
        .map(|param| {
            let marked: Vec<Value> = param
                .values()
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    if param.is_enabled(i) {
                        v.clone()
                    } else {
                        Value::Text(format!("!{v}"))
                    }
                })
                .collect();
            format!("{}: {}", param.name(), preview_values(&marked))
        })
        .collect::<Vec<_>>()
        .join("\n")
}
