//! Shared utilities.
//!
//! Value coercions shared by the handlers, plus test helpers.

use std::path::PathBuf;

use serde_json::Value;

#[cfg(test)]
pub mod testutil;

/// Interpret a metadata value as a boolean.
///
/// `true`, the number `1` and the strings `true`, `yes` and `1` (any case,
/// surrounding whitespace ignored) are true. Everything else is false.
pub fn to_boolean(value: &Value) -> bool {
  match value {
    Value::Bool(b) => *b,
    Value::Number(n) => n.as_i64() == Some(1) || n.as_f64() == Some(1.0),
    Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "1"),
    _ => false,
  }
}

/// Render a scalar metadata value as a command argument.
///
/// Strings are used verbatim and numbers in their JSON form; other values
/// yield `None`.
pub fn scalar_to_string(value: &Value) -> Option<String> {
  match value {
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    _ => None,
  }
}

/// Whether a value counts as present in the metadata: not null and not an
/// empty string, array or object.
pub fn is_truthy(value: &Value) -> bool {
  match value {
    Value::Null => false,
    Value::Bool(b) => *b,
    Value::Number(n) => n.as_f64() != Some(0.0),
    Value::String(s) => !s.is_empty(),
    Value::Array(a) => !a.is_empty(),
    Value::Object(o) => !o.is_empty(),
  }
}

/// Expand a leading `~` or `~user` in a path.
pub fn expand_user(path: &str) -> PathBuf {
  let Some(rest) = path.strip_prefix('~') else {
    return PathBuf::from(path);
  };

  let (name, tail) = match rest.find('/') {
    Some(i) => (&rest[..i], &rest[i + 1..]),
    None => (rest, ""),
  };

  let home = if name.is_empty() {
    std::env::var("HOME").ok().map(PathBuf::from)
  } else {
    nix::unistd::User::from_name(name).ok().flatten().map(|u| u.dir)
  };

  match home {
    Some(home) if tail.is_empty() => home,
    Some(home) => home.join(tail),
    None => PathBuf::from(path),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use serial_test::serial;

  #[test]
  fn to_boolean_accepts_bool_like_values() {
    for truthy in [json!(true), json!(1), json!("true"), json!(" Yes "), json!("1"), json!("TRUE")] {
      assert!(to_boolean(&truthy), "{truthy} should be true");
    }
    for falsy in [json!(false), json!(0), json!(2), json!("no"), json!(""), json!(null), json!([true])] {
      assert!(!to_boolean(&falsy), "{falsy} should be false");
    }
  }

  #[test]
  fn scalar_to_string_renders_numbers() {
    assert_eq!(scalar_to_string(&json!(501)), Some("501".to_string()));
    assert_eq!(scalar_to_string(&json!("501")), Some("501".to_string()));
    assert_eq!(scalar_to_string(&json!({"a": 1})), None);
  }

  #[test]
  fn is_truthy_treats_empty_containers_as_absent() {
    assert!(!is_truthy(&json!({})));
    assert!(!is_truthy(&json!([])));
    assert!(!is_truthy(&json!(null)));
    assert!(is_truthy(&json!({"config": {}})));
  }

  #[test]
  #[serial]
  fn expand_user_uses_home() {
    temp_env::with_var("HOME", Some("/home/tester"), || {
      assert_eq!(expand_user("~"), PathBuf::from("/home/tester"));
      assert_eq!(expand_user("~/work"), PathBuf::from("/home/tester/work"));
      assert_eq!(expand_user("/abs/path"), PathBuf::from("/abs/path"));
    });
  }

  #[test]
  fn expand_user_resolves_named_users() {
    assert_eq!(expand_user("~root/x"), PathBuf::from("/root/x"));
    assert_eq!(
      expand_user("~no-such-user-cfnboot/x"),
      PathBuf::from("~no-such-user-cfnboot/x")
    );
  }
}
