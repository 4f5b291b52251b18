//! Layered flag model for claude passthrough flags.
//!
//! Flags exist at three levels with ascending precedence:
//! project config defaults < session frontmatter < CLI arguments.
//! A `false` value is a meaningful override (it suppresses a flag that a
//! lower layer turned on) and is distinct from the key being absent.
//!
//! All transforms here are pure; no I/O.

/// Frontmatter keys that hold session identity, never passed to claude.
/// With the split metadata store these only appear in legacy session files.
pub const RESERVED_KEYS: [&str; 3] = ["id", "created", "updated"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagValue {
    Str(String),
    Bool(bool),
    List(Vec<String>),
}

/// Ordered flag map. Insertion order is observable (it determines the
/// argument order handed to claude), and re-inserting an existing key
/// replaces the value in place without moving the key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flags(Vec<(String, FlagValue)>);

impl Flags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&FlagValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: FlagValue) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FlagValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, FlagValue)> for Flags {
    fn from_iter<T: IntoIterator<Item = (String, FlagValue)>>(iter: T) -> Self {
        let mut flags = Flags::new();
        for (k, v) in iter {
            flags.insert(k, v);
        }
        flags
    }
}

/// Shallow merge with overrides winning, including explicit `false` and
/// empty-list values. Keys already in `base` keep their position.
pub fn merge_flags(base: &Flags, overrides: &Flags) -> Flags {
    let mut merged = base.clone();
    for (key, value) in overrides.iter() {
        merged.insert(key, value.clone());
    }
    merged
}

/// Project the open frontmatter map down to claude flags, dropping the
/// reserved identity keys.
pub fn extract_flags(frontmatter: &Flags) -> Flags {
    frontmatter
        .iter()
        .filter(|(key, _)| !RESERVED_KEYS.contains(key))
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Flatten flags into a claude argument vector, in insertion order.
///
/// ```text
/// model: haiku                      => --model haiku
/// dangerously-skip-permissions: true  => --dangerously-skip-permissions
/// dangerously-skip-permissions: false => (nothing)
/// allowedTools: [Bash, Read]        => --allowedTools Bash Read
/// allowedTools: []                  => (nothing)
/// ```
pub fn flags_to_args(flags: &Flags) -> Vec<String> {
    let mut args = Vec::new();

    for (key, value) in flags.iter() {
        match value {
            FlagValue::Bool(false) => {}
            FlagValue::Bool(true) => args.push(format!("--{key}")),
            FlagValue::List(items) => {
                if !items.is_empty() {
                    args.push(format!("--{key}"));
                    args.extend(items.iter().cloned());
                }
            }
            FlagValue::Str(s) => {
                args.push(format!("--{key}"));
                args.push(s.clone());
            }
        }
    }

    args
}

fn coerce(raw: &str) -> FlagValue {
    match raw {
        "true" => FlagValue::Bool(true),
        "false" => FlagValue::Bool(false),
        _ => FlagValue::Str(raw.to_string()),
    }
}

/// Parse a raw passthrough argument vector into flags.
///
/// Handles `--key value`, `--key=value`, and bare `--key` (boolean true).
/// A standalone `--` is skipped, tokens that are not consumed as values are
/// ignored (the session name positional is removed by the caller), and the
/// last occurrence of a key wins. Array-valued flags cannot be expressed on
/// the command line; they only arrive via frontmatter or config.
pub fn parse_cli_args(args: &[String]) -> Flags {
    let mut flags = Flags::new();
    let mut i = 0;

    while i < args.len() {
        let arg = &args[i];
        i += 1;

        if arg == "--" || !arg.starts_with("--") {
            continue;
        }

        let raw_key = &arg[2..];
        if raw_key.is_empty() {
            continue;
        }

        if let Some((key, raw_value)) = raw_key.split_once('=') {
            if key.is_empty() {
                continue;
            }
            flags.insert(key, coerce(raw_value));
            continue;
        }

        match args.get(i) {
            Some(next) if !next.starts_with("--") => {
                flags.insert(raw_key, coerce(next));
                i += 1;
            }
            _ => flags.insert(raw_key, FlagValue::Bool(true)),
        }
    }

    flags
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> FlagValue {
        FlagValue::Str(v.to_string())
    }

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|a| a.to_string()).collect()
    }

    // =========================================================================
    // merge_flags
    // =========================================================================

    #[test]
    fn merge_is_right_biased() {
        let mut base = Flags::new();
        base.insert("model", s("haiku"));
        base.insert("verbose", FlagValue::Bool(true));

        let mut overrides = Flags::new();
        overrides.insert("model", s("opus"));

        let merged = merge_flags(&base, &overrides);
        assert_eq!(merged.get("model"), Some(&s("opus")));
        assert_eq!(merged.get("verbose"), Some(&FlagValue::Bool(true)));
    }

    #[test]
    fn merge_preserves_false_and_empty_list_overrides() {
        let mut base = Flags::new();
        base.insert("verbose", FlagValue::Bool(true));
        base.insert("allowedTools", FlagValue::List(vec!["Read".into()]));

        let mut overrides = Flags::new();
        overrides.insert("verbose", FlagValue::Bool(false));
        overrides.insert("allowedTools", FlagValue::List(vec![]));

        let merged = merge_flags(&base, &overrides);
        assert_eq!(merged.get("verbose"), Some(&FlagValue::Bool(false)));
        assert_eq!(merged.get("allowedTools"), Some(&FlagValue::List(vec![])));
    }

    #[test]
    fn merge_keeps_base_key_positions() {
        let mut base = Flags::new();
        base.insert("a", s("1"));
        base.insert("b", s("2"));

        let mut overrides = Flags::new();
        overrides.insert("a", s("9"));
        overrides.insert("c", s("3"));

        let merged = merge_flags(&base, &overrides);
        let keys: Vec<&str> = merged.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["a", "b", "c"]);
    }

    // =========================================================================
    // extract_flags
    // =========================================================================

    #[test]
    fn extract_drops_reserved_keys() {
        let mut frontmatter = Flags::new();
        frontmatter.insert("id", s("some-uuid"));
        frontmatter.insert("created", s("2024-01-01"));
        frontmatter.insert("updated", s("2024-01-02"));
        frontmatter.insert("model", s("haiku"));

        let flags = extract_flags(&frontmatter);
        assert_eq!(flags.len(), 1);
        assert_eq!(flags.get("model"), Some(&s("haiku")));
    }

    // =========================================================================
    // flags_to_args
    // =========================================================================

    #[test]
    fn args_string_and_bool() {
        let mut flags = Flags::new();
        flags.insert("model", s("haiku"));
        flags.insert("dangerously-skip-permissions", FlagValue::Bool(true));
        flags.insert("verbose", FlagValue::Bool(false));

        assert_eq!(
            flags_to_args(&flags),
            ["--model", "haiku", "--dangerously-skip-permissions"]
        );
    }

    #[test]
    fn args_list_expands_elements() {
        let mut flags = Flags::new();
        flags.insert(
            "allowedTools",
            FlagValue::List(vec!["Bash(git *)".into(), "Read".into()]),
        );
        assert_eq!(
            flags_to_args(&flags),
            ["--allowedTools", "Bash(git *)", "Read"]
        );
    }

    #[test]
    fn args_empty_list_emits_nothing() {
        let mut flags = Flags::new();
        flags.insert("allowedTools", FlagValue::List(vec![]));
        assert!(flags_to_args(&flags).is_empty());
    }

    #[test]
    fn args_follow_insertion_order() {
        let mut flags = Flags::new();
        flags.insert("b", s("2"));
        flags.insert("a", s("1"));
        assert_eq!(flags_to_args(&flags), ["--b", "2", "--a", "1"]);
    }

    // =========================================================================
    // parse_cli_args
    // =========================================================================

    #[test]
    fn parse_key_value_pairs() {
        let flags = parse_cli_args(&args(&["--model", "haiku"]));
        assert_eq!(flags.get("model"), Some(&s("haiku")));
    }

    #[test]
    fn parse_bare_flag_is_boolean_true() {
        let flags = parse_cli_args(&args(&["--dangerously-skip-permissions"]));
        assert_eq!(
            flags.get("dangerously-skip-permissions"),
            Some(&FlagValue::Bool(true))
        );
    }

    #[test]
    fn parse_equals_form() {
        let flags = parse_cli_args(&args(&["--model=opus", "--verbose=false"]));
        assert_eq!(flags.get("model"), Some(&s("opus")));
        assert_eq!(flags.get("verbose"), Some(&FlagValue::Bool(false)));
    }

    #[test]
    fn parse_coerces_literal_booleans() {
        let flags = parse_cli_args(&args(&["--verbose", "true", "--quiet", "false"]));
        assert_eq!(flags.get("verbose"), Some(&FlagValue::Bool(true)));
        assert_eq!(flags.get("quiet"), Some(&FlagValue::Bool(false)));
    }

    #[test]
    fn parse_ignores_separator_and_positionals() {
        let flags = parse_cli_args(&args(&["--", "stray", "--model", "haiku", "extra"]));
        assert_eq!(flags.len(), 1);
        assert_eq!(flags.get("model"), Some(&s("haiku")));
    }

    #[test]
    fn parse_ignores_empty_keys() {
        let flags = parse_cli_args(&args(&["--=value", "--"]));
        assert!(flags.is_empty());
    }

    #[test]
    fn parse_last_occurrence_wins_across_forms() {
        let flags = parse_cli_args(&args(&["--model", "haiku", "--model=opus"]));
        assert_eq!(flags.get("model"), Some(&s("opus")));

        let flags = parse_cli_args(&args(&["--model=opus", "--model", "haiku"]));
        assert_eq!(flags.get("model"), Some(&s("haiku")));
    }

    #[test]
    fn parse_value_starting_with_double_dash_is_not_consumed() {
        let flags = parse_cli_args(&args(&["--first", "--second", "value"]));
        assert_eq!(flags.get("first"), Some(&FlagValue::Bool(true)));
        assert_eq!(flags.get("second"), Some(&s("value")));
    }

    // =========================================================================
    // Round-trip law (strings and booleans only)
    // =========================================================================

    #[test]
    fn round_trip_string_and_bool_flags() {
        let mut flags = Flags::new();
        flags.insert("model", s("haiku"));
        flags.insert("dangerously-skip-permissions", FlagValue::Bool(true));
        flags.insert("append-system-prompt", s("be terse"));

        let parsed = parse_cli_args(&flags_to_args(&flags));
        assert_eq!(parsed, flags);
    }

    #[test]
    fn round_trip_drops_false_flags() {
        // false emits nothing, so it cannot survive a round trip.
        let mut flags = Flags::new();
        flags.insert("verbose", FlagValue::Bool(false));
        let parsed = parse_cli_args(&flags_to_args(&flags));
        assert!(parsed.is_empty());
    }
}
