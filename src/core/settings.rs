//! Client-sent settings, parsed tolerantly -- an absent or wrong-typed key
//! just keeps its default rather than failing the whole parse. A flat set
//! of small structs updated field-by-field from a `serde_json::Value`.

use crate::error::DYNERR;

#[derive(Clone, Copy, Debug)]
pub struct Columns {
    pub begin: i64,
    pub end: i64,
    pub continue_col: i64,
}

#[derive(Clone, Copy, Debug)]
pub struct Diagnostics {
    pub live: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct Macros {
    pub max_nesting: i64,
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub columns: Columns,
    pub diagnostics: Diagnostics,
    pub macros: Macros,
}

impl Settings {
    pub fn new() -> Self {
        Self {
            columns: Columns { begin: 1, end: 72, continue_col: 16 },
            diagnostics: Diagnostics { live: true },
            macros: Macros { max_nesting: 255 },
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

fn update_json_i64(val: &serde_json::Value, key: &str, curr: &mut i64) {
    if let Some(v) = val.get(key).and_then(|v| v.as_i64()) {
        *curr = v;
    }
}
fn update_json_bool(val: &serde_json::Value, key: &str, curr: &mut bool) {
    if let Some(v) = val.get(key).and_then(|v| v.as_bool()) {
        *curr = v;
    }
}

pub fn parse(json: &str) -> Result<Settings, DYNERR> {
    let mut ans = Settings::new();
    if let Ok(root) = serde_json::from_str::<serde_json::Value>(json) {
        if let Some(obj) = root.as_object() {
            for (key, val) in obj {
                match key.as_str() {
                    "columns" => {
                        update_json_i64(val, "begin", &mut ans.columns.begin);
                        update_json_i64(val, "end", &mut ans.columns.end);
                        update_json_i64(val, "continue", &mut ans.columns.continue_col);
                    }
                    "diagnostics" => {
                        update_json_bool(val, "live", &mut ans.diagnostics.live);
                    }
                    "macros" => {
                        update_json_i64(val, "maxNesting", &mut ans.macros.max_nesting);
                    }
                    _ => {}
                }
            }
        }
    }
    Ok(ans)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_standard_column_layout() {
        let s = Settings::new();
        assert_eq!((s.columns.begin, s.columns.end, s.columns.continue_col), (1, 72, 16));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let s = parse(r#"{"bogus": 1, "columns": {"begin": 2}}"#).unwrap();
        assert_eq!(s.columns.begin, 2);
        assert_eq!(s.columns.end, 72);
    }

    #[test]
    fn malformed_json_falls_back_to_defaults() {
        let s = parse("not json").unwrap();
        assert_eq!(s.columns.begin, 1);
    }

    #[test]
    fn wrong_typed_value_is_ignored() {
        let s = parse(r#"{"diagnostics": {"live": "yes"}}"#).unwrap();
        assert!(s.diagnostics.live);
    }
}
