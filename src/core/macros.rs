//! The macro/`COPY`/`AREAD` engine.
//!
//! A macro definition is captured verbatim between `MACRO` and `MEND` --
//! the body is never evaluated at definition time, only cached as text
//! keyed by the defining statement's processing form, the way the
//! pipeline caches a model statement for later re-parse once substitution
//! has happened. A call site binds its arguments (positional first, then
//! keyword) and the pipeline re-lexes/re-parses each substituted body
//! line as an "unlimited length" logical line (`core::lexer`'s
//! `unlimited` mode), since substitution can push text well past column
//! 72.

use std::collections::HashMap;

use regex::Regex;
use std::sync::OnceLock;

use super::parser::MacroArg;
use super::{Id, Range};

#[derive(Clone, Debug)]
pub struct MacroDef {
    pub name: Id,
    pub positional_params: Vec<Id>,
    pub keyword_params: Vec<(Id, String)>,
    pub body: Vec<String>,
    pub defined_at: Range,
}

#[derive(Default)]
pub struct MacroTable {
    macros: HashMap<Id, MacroDef>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn define(&mut self, def: MacroDef) {
        self.macros.insert(def.name, def);
    }
    pub fn lookup(&self, name: Id) -> Option<&MacroDef> {
        self.macros.get(&name)
    }
    pub fn is_defined(&self, name: Id) -> bool {
        self.macros.contains_key(&name)
    }
}

/// Parses the `MACRO` prototype statement (`&LABEL OP &P1,&P2,&KW=def`)
/// into positional and keyword parameter lists. The prototype's own
/// label, if present, is the macro's "name parameter" slot and is not
/// itself a positional parameter.
pub fn parse_prototype(name: Id, operand_text: &str, body: Vec<String>, defined_at: Range) -> MacroDef {
    let mut positional = Vec::new();
    let mut keyword = Vec::new();
    for part in operand_text.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some(eq) = part.find('=') {
            let (k, v) = part.split_at(eq);
            keyword.push((Id::intern(k.trim()), v[1..].to_string()));
        } else {
            positional.push(Id::intern(part));
        }
    }
    MacroDef { name, positional_params: positional, keyword_params: keyword, body, defined_at }
}

/// Binds a call site's arguments against a macro's prototype: positional
/// arguments fill positional parameters in order, keyword arguments
/// override by name (including overriding a positional slot written as
/// `name=value`), unfilled keyword parameters keep their prototype
/// default.
pub fn bind_arguments(def: &MacroDef, args: &[MacroArg]) -> HashMap<Id, String> {
    let mut bindings: HashMap<Id, String> = def.keyword_params.iter().map(|(k, v)| (*k, v.clone())).collect();
    let mut positional_idx = 0;
    for arg in args {
        match &arg.keyword {
            Some(kw) => {
                bindings.insert(Id::intern(kw), arg.value.clone());
            }
            None => {
                if let Some(param) = def.positional_params.get(positional_idx) {
                    bindings.insert(*param, arg.value.clone());
                }
                positional_idx += 1;
            }
        }
    }
    bindings
}

/// `&SYSLIST(n)` is synthesized from the call's positional arguments,
/// 1-indexed, independent of how they map to named parameters.
pub fn syslist(args: &[MacroArg]) -> Vec<String> {
    args.iter().filter(|a| a.keyword.is_none()).map(|a| a.value.clone()).collect()
}

fn var_ref_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"&SYSLIST\((\d+)\)|&([A-Za-z$@#][A-Za-z0-9$@#_]*)").unwrap())
}

/// Substitutes every `&name` (and `&SYSLIST(n)`) reference in `line`
/// against `bindings`/`syslist`. Unbound references are left untouched so
/// the surrounding ordinary-symbol pass can report them as undefined.
pub fn substitute_line(line: &str, bindings: &HashMap<Id, String>, syslist: &[String]) -> String {
    var_ref_pattern()
        .replace_all(line, |caps: &regex::Captures| {
            if let Some(n) = caps.get(1) {
                let idx: usize = n.as_str().parse().unwrap_or(0);
                syslist.get(idx.wrapping_sub(1)).cloned().unwrap_or_else(|| caps[0].to_string())
            } else if let Some(name) = caps.get(2) {
                let id = Id::intern(&format!("&{}", name.as_str()));
                bindings.get(&id).cloned().unwrap_or_else(|| caps[0].to_string())
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// `COPY member` just hands back the library text split into lines for
/// the pipeline to push as a `ProcessingKind::CopyDef` frame; there is no
/// substitution step, unlike a macro call.
pub fn expand_copy_member(text: &str) -> Vec<String> {
    text.lines().map(String::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prototype() -> MacroDef {
        parse_prototype(Id::intern("MYMAC"), "&A,&B,&C=DEFAULT", vec!["         MVC   &A,&B".to_string()], Range::default())
    }

    #[test]
    fn positional_arguments_bind_in_order() {
        let def = prototype();
        let args = vec![
            MacroArg { keyword: None, value: "X".into(), range: Range::default() },
            MacroArg { keyword: None, value: "Y".into(), range: Range::default() },
        ];
        let bindings = bind_arguments(&def, &args);
        assert_eq!(bindings.get(&Id::intern("&A")), Some(&"X".to_string()));
        assert_eq!(bindings.get(&Id::intern("&B")), Some(&"Y".to_string()));
        assert_eq!(bindings.get(&Id::intern("&C")), Some(&"DEFAULT".to_string()));
    }

    #[test]
    fn keyword_argument_overrides_default() {
        let def = prototype();
        let args = vec![MacroArg { keyword: Some("&C".into()), value: "OVERRIDE".into(), range: Range::default() }];
        let bindings = bind_arguments(&def, &args);
        assert_eq!(bindings.get(&Id::intern("&C")), Some(&"OVERRIDE".to_string()));
    }

    #[test]
    fn substitute_line_replaces_bound_names() {
        let def = prototype();
        let args = vec![
            MacroArg { keyword: None, value: "FLD1".into(), range: Range::default() },
            MacroArg { keyword: None, value: "FLD2".into(), range: Range::default() },
        ];
        let bindings = bind_arguments(&def, &args);
        let out = substitute_line(&def.body[0], &bindings, &syslist(&args));
        assert_eq!(out, "         MVC   FLD1,FLD2");
    }

    #[test]
    fn syslist_is_positional_only() {
        let args = vec![
            MacroArg { keyword: None, value: "P1".into(), range: Range::default() },
            MacroArg { keyword: Some("&K".into()), value: "KV".into(), range: Range::default() },
            MacroArg { keyword: None, value: "P2".into(), range: Range::default() },
        ];
        assert_eq!(syslist(&args), vec!["P1".to_string(), "P2".to_string()]);
    }

    #[test]
    fn unbound_reference_is_left_untouched() {
        let bindings = HashMap::new();
        let out = substitute_line("&UNKNOWN", &bindings, &[]);
        assert_eq!(out, "&UNKNOWN");
    }
}
