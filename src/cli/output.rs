use serde_json::Value;

use terminal_size::{terminal_size, Width};

use crate::identity::UserProfile;

// Columns shown for resource lists, in order; anything else is left out of the table.
const PREFERRED_COLUMNS: &[&str] = &["id", "title", "category", "price", "progress", "courseId", "published", "rating"];

/// Print a list of JSON objects as an ASCII table.
/// Returns false (and prints nothing) when the value is not a non-empty array of objects.
pub fn print_list(val: &Value) -> bool {
    let Some(arr) = list_items(val) else { return false };
    if arr.is_empty() { return false; }
    let cols = select_columns(arr);
    if cols.is_empty() { return false; }
    let rows: Vec<Vec<String>> = arr
        .iter()
        .map(|el| cols.iter().map(|c| el.get(c.as_str()).map(to_cell_string).unwrap_or_default()).collect())
        .collect();
    for line in render_table(&cols, &rows, terminal_width()) {
        println!("{}", line);
    }
    println!("rows: {}", rows.len());
    true
}

/// Print a value: a table for lists, pretty JSON otherwise.
pub fn print_value(val: &Value) {
    if !print_list(val) {
        println!("{}", serde_json::to_string_pretty(val).unwrap_or_else(|_| val.to_string()));
    }
}

pub fn print_profile(p: &UserProfile) {
    println!("{} <{}>  role={}  id={}", p.display_name(), p.email, p.role, p.id);
    if let Some(bio) = &p.bio { println!("  {}", bio); }
}

fn list_items(val: &Value) -> Option<&Vec<Value>> {
    match val {
        Value::Array(arr) => Some(arr),
        Value::Object(map) => ["items", "data", "courses", "enrollments", "wishlist"].iter().find_map(|k| map.get(*k)?.as_array()),
        _ => None,
    }
}

fn select_columns(arr: &[Value]) -> Vec<String> {
    let mut present: Vec<String> = Vec::new();
    for el in arr {
        let Value::Object(map) = el else { return Vec::new() };
        for k in map.keys() {
            if !present.contains(k) { present.push(k.clone()); }
        }
    }
    let preferred: Vec<String> = PREFERRED_COLUMNS.iter().filter(|c| present.iter().any(|p| p == *c)).map(|c| c.to_string()).collect();
    if preferred.is_empty() {
        present.sort();
        present
    } else {
        preferred
    }
}

fn to_cell_string(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn render_table(cols: &[String], rows: &[Vec<String>], termw: usize) -> Vec<String> {
    let n = cols.len().max(1);
    // cap each column so the whole row fits, keeping at least a few chars per column
    let cap = (termw.saturating_sub(3 * n + 1) / n).max(4);
    let mut widths: Vec<usize> = cols.iter().map(|c| c.chars().count().min(cap)).collect();
    for r in rows {
        for (i, cell) in r.iter().enumerate().take(cols.len()) {
            widths[i] = widths[i].max(cell.chars().count().min(cap));
        }
    }
    let sep = build_separator(&widths);
    let mut out = vec![sep.clone(), build_row(cols, &widths), sep.clone()];
    out.extend(rows.iter().map(|r| build_row(r, &widths)));
    out.push(sep);
    out
}

fn terminal_width() -> usize {
    match terminal_size() {
        Some((Width(w), _)) if w > 20 => (w - 4) as usize,
        _ => 100,
    }
}

fn build_separator(widths: &[usize]) -> String {
    let mut s = String::from("+");
    for w in widths {
        s.push_str(&"-".repeat(*w + 2));
        s.push('+');
    }
    s
}

fn build_row(cells: &[String], widths: &[usize]) -> String {
    let mut s = String::from("|");
    for (i, w) in widths.iter().enumerate() {
        let cell = cells.get(i).map(String::as_str).unwrap_or("");
        let text = truncate(cell, *w);
        let pad = w.saturating_sub(text.chars().count());
        s.push(' ');
        if is_numeric_like(cell) {
            s.push_str(&" ".repeat(pad));
            s.push_str(&text);
        } else {
            s.push_str(&text);
            s.push_str(&" ".repeat(pad));
        }
        s.push_str(" |");
    }
    s
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max { return s.to_string(); }
    if max <= 1 { return "…".to_string(); }
    s.chars().take(max - 1).collect::<String>() + "…"
}

fn is_numeric_like(s: &str) -> bool {
    let st = s.trim();
    !st.is_empty() && st.chars().any(|c| c.is_ascii_digit()) && st.chars().all(|c| c.is_ascii_digit() || ".-+eE".contains(c))
}
