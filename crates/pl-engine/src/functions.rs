use std::collections::{BTreeMap, BTreeSet};

use pl_core::PromptValue;

type BuiltinFn = fn(&[PromptValue]) -> PromptValue;

/// The fixed builtin registry. Every function is total: a type mismatch or
/// missing argument yields null (or the identity the function documents),
/// never an error, so templates keep working against incomplete data.
pub struct FunctionRegistry {
    entries: BTreeMap<&'static str, BuiltinFn>,
}

impl FunctionRegistry {
    pub fn builtin() -> Self {
        let mut entries: BTreeMap<&'static str, BuiltinFn> = BTreeMap::new();
        entries.insert("length", builtin_length);
        entries.insert("upper", builtin_upper);
        entries.insert("lower", builtin_lower);
        entries.insert("trim", builtin_trim);
        entries.insert("capitalize", builtin_capitalize);
        entries.insert("join", builtin_join);
        entries.insert("contains", builtin_contains);
        entries.insert("default", builtin_default);
        entries.insert("replace", builtin_replace);
        entries.insert("round", builtin_round);
        entries.insert("min", builtin_min);
        entries.insert("max", builtin_max);
        entries.insert("number", builtin_number);
        entries.insert("string", builtin_string);
        Self { entries }
    }

    pub fn names(&self) -> BTreeSet<String> {
        self.entries.keys().map(|name| name.to_string()).collect()
    }

    pub fn call(&self, name: &str, args: &[PromptValue]) -> PromptValue {
        match self.entries.get(name) {
            Some(handler) => handler(args),
            None => PromptValue::Null,
        }
    }
}

fn arg(args: &[PromptValue], index: usize) -> PromptValue {
    args.get(index).cloned().unwrap_or(PromptValue::Null)
}

fn builtin_length(args: &[PromptValue]) -> PromptValue {
    match arg(args, 0) {
        PromptValue::String(value) => PromptValue::Number(value.chars().count() as f64),
        PromptValue::List(values) => PromptValue::Number(values.len() as f64),
        PromptValue::Map(entries) => PromptValue::Number(entries.len() as f64),
        _ => PromptValue::Null,
    }
}

fn builtin_upper(args: &[PromptValue]) -> PromptValue {
    PromptValue::String(arg(args, 0).to_display().to_uppercase())
}

fn builtin_lower(args: &[PromptValue]) -> PromptValue {
    PromptValue::String(arg(args, 0).to_display().to_lowercase())
}

fn builtin_trim(args: &[PromptValue]) -> PromptValue {
    PromptValue::String(arg(args, 0).to_display().trim().to_string())
}

fn builtin_capitalize(args: &[PromptValue]) -> PromptValue {
    let text = arg(args, 0).to_display();
    let mut chars = text.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    };
    PromptValue::String(capitalized)
}

fn builtin_join(args: &[PromptValue]) -> PromptValue {
    let separator = match args.get(1) {
        Some(value) => value.to_display(),
        None => String::new(),
    };
    match arg(args, 0) {
        PromptValue::List(values) => PromptValue::String(
            values
                .iter()
                .map(PromptValue::to_display)
                .collect::<Vec<_>>()
                .join(&separator),
        ),
        other => PromptValue::String(other.to_display()),
    }
}

fn builtin_contains(args: &[PromptValue]) -> PromptValue {
    let needle = arg(args, 1);
    let found = match arg(args, 0) {
        PromptValue::String(value) => value.contains(&needle.to_display()),
        PromptValue::List(values) => values.iter().any(|entry| entry.loose_eq(&needle)),
        PromptValue::Map(entries) => entries.contains_key(&needle.to_display()),
        _ => false,
    };
    PromptValue::Bool(found)
}

fn builtin_default(args: &[PromptValue]) -> PromptValue {
    let value = arg(args, 0);
    if value.is_truthy() {
        value
    } else {
        arg(args, 1)
    }
}

fn builtin_replace(args: &[PromptValue]) -> PromptValue {
    let text = arg(args, 0).to_display();
    let from = arg(args, 1).to_display();
    let to = arg(args, 2).to_display();
    if from.is_empty() {
        return PromptValue::String(text);
    }
    PromptValue::String(text.replace(&from, &to))
}

fn builtin_round(args: &[PromptValue]) -> PromptValue {
    match arg(args, 0).coerce_number() {
        Some(value) => PromptValue::Number(value.round()),
        None => PromptValue::Null,
    }
}

fn builtin_min(args: &[PromptValue]) -> PromptValue {
    match (arg(args, 0).coerce_number(), arg(args, 1).coerce_number()) {
        (Some(left), Some(right)) => PromptValue::Number(left.min(right)),
        _ => PromptValue::Null,
    }
}

fn builtin_max(args: &[PromptValue]) -> PromptValue {
    match (arg(args, 0).coerce_number(), arg(args, 1).coerce_number()) {
        (Some(left), Some(right)) => PromptValue::Number(left.max(right)),
        _ => PromptValue::Null,
    }
}

fn builtin_number(args: &[PromptValue]) -> PromptValue {
    match arg(args, 0).coerce_number() {
        Some(value) => PromptValue::Number(value),
        None => PromptValue::Null,
    }
}

fn builtin_string(args: &[PromptValue]) -> PromptValue {
    PromptValue::String(arg(args, 0).to_display())
}

#[cfg(test)]
mod functions_tests {
    use super::*;

    fn call(name: &str, args: &[PromptValue]) -> PromptValue {
        FunctionRegistry::builtin().call(name, args)
    }

    #[test]
    fn names_cover_the_documented_set() {
        let names = FunctionRegistry::builtin().names();
        for expected in [
            "length", "upper", "lower", "trim", "capitalize", "join", "contains", "default",
            "replace", "round", "min", "max", "number", "string",
        ] {
            assert!(names.contains(expected), "missing {}", expected);
        }
    }

    #[test]
    fn string_helpers_render_through_display_rules() {
        assert_eq!(
            call("upper", &[PromptValue::String("lydia".to_string())]),
            PromptValue::String("LYDIA".to_string())
        );
        assert_eq!(
            call("capitalize", &[PromptValue::String("whiterun guard".to_string())]),
            PromptValue::String("Whiterun guard".to_string())
        );
        assert_eq!(
            call("trim", &[PromptValue::String("  x  ".to_string())]),
            PromptValue::String("x".to_string())
        );
        assert_eq!(
            call("upper", &[PromptValue::Null]),
            PromptValue::String(String::new())
        );
    }

    #[test]
    fn length_counts_strings_lists_and_maps() {
        assert_eq!(
            call("length", &[PromptValue::String("abc".to_string())]),
            PromptValue::Number(3.0)
        );
        assert_eq!(
            call("length", &[PromptValue::List(vec![PromptValue::Null; 4])]),
            PromptValue::Number(4.0)
        );
        assert_eq!(call("length", &[PromptValue::Number(5.0)]), PromptValue::Null);
    }

    #[test]
    fn join_and_contains_cover_containers() {
        let list = PromptValue::List(vec![
            PromptValue::String("sword".to_string()),
            PromptValue::Number(2.0),
        ]);
        assert_eq!(
            call("join", &[list.clone(), PromptValue::String(", ".to_string())]),
            PromptValue::String("sword, 2".to_string())
        );
        assert_eq!(
            call("contains", &[list, PromptValue::String("sword".to_string())]),
            PromptValue::Bool(true)
        );
        assert_eq!(
            call(
                "contains",
                &[
                    PromptValue::String("Dragonsreach".to_string()),
                    PromptValue::String("Dragon".to_string()),
                ]
            ),
            PromptValue::Bool(true)
        );
        assert_eq!(
            call("contains", &[PromptValue::Null, PromptValue::Null]),
            PromptValue::Bool(false)
        );
    }

    #[test]
    fn default_falls_back_on_falsy_values() {
        let fallback = PromptValue::String("stranger".to_string());
        assert_eq!(
            call("default", &[PromptValue::Null, fallback.clone()]),
            fallback
        );
        assert_eq!(
            call("default", &[PromptValue::String(String::new()), fallback.clone()]),
            fallback
        );
        assert_eq!(
            call(
                "default",
                &[PromptValue::String("Lydia".to_string()), fallback]
            ),
            PromptValue::String("Lydia".to_string())
        );
    }

    #[test]
    fn numeric_helpers_coerce_and_stay_total() {
        assert_eq!(
            call("round", &[PromptValue::String("2.6".to_string())]),
            PromptValue::Number(3.0)
        );
        assert_eq!(call("round", &[PromptValue::Bool(true)]), PromptValue::Null);
        assert_eq!(
            call("min", &[PromptValue::Number(2.0), PromptValue::Number(5.0)]),
            PromptValue::Number(2.0)
        );
        assert_eq!(
            call("max", &[PromptValue::Number(2.0), PromptValue::String("5".to_string())]),
            PromptValue::Number(5.0)
        );
        assert_eq!(call("number", &[PromptValue::String("x".to_string())]), PromptValue::Null);
        assert_eq!(
            call("string", &[PromptValue::Number(4.0)]),
            PromptValue::String("4".to_string())
        );
    }

    #[test]
    fn unknown_name_yields_null() {
        assert_eq!(call("shout", &[]), PromptValue::Null);
    }
}
