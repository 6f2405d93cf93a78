//! RPM version comparison.
//!
//! Versions are compared the way `rpmvercmp` does: both strings are split into
//! alternating runs of digits and letters, separators are skipped, numeric
//! runs compare by value and alphabetic runs lexically. `~` sorts before
//! anything (pre-releases) and `^` after the base version (snapshots).

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Requested version(s) of a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VersionSpec {
  Single(String),
  Candidates(Vec<String>),
}

impl Default for VersionSpec {
  fn default() -> Self {
    VersionSpec::Candidates(Vec::new())
  }
}

impl VersionSpec {
  /// First listed version, used by installers without version ordering.
  pub fn first(&self) -> Option<&str> {
    match self {
      VersionSpec::Single(v) if !v.is_empty() => Some(v),
      VersionSpec::Single(_) => None,
      VersionSpec::Candidates(vs) => vs.first().map(String::as_str),
    }
  }
}

/// Compare two version strings with RPM semantics.
pub fn rpmvercmp(a: &str, b: &str) -> Ordering {
  if a == b {
    return Ordering::Equal;
  }

  let one = a.as_bytes();
  let two = b.as_bytes();
  let (mut i, mut j) = (0, 0);

  let separator = |c: u8| !c.is_ascii_alphanumeric() && c != b'~' && c != b'^';

  while i < one.len() || j < two.len() {
    while i < one.len() && separator(one[i]) {
      i += 1;
    }
    while j < two.len() && separator(two[j]) {
      j += 1;
    }

    let c1 = one.get(i).copied();
    let c2 = two.get(j).copied();

    if c1 == Some(b'~') || c2 == Some(b'~') {
      if c1 != Some(b'~') {
        return Ordering::Greater;
      }
      if c2 != Some(b'~') {
        return Ordering::Less;
      }
      i += 1;
      j += 1;
      continue;
    }

    if c1 == Some(b'^') || c2 == Some(b'^') {
      if c1.is_none() {
        return Ordering::Less;
      }
      if c2.is_none() {
        return Ordering::Greater;
      }
      if c1 != Some(b'^') {
        return Ordering::Greater;
      }
      if c2 != Some(b'^') {
        return Ordering::Less;
      }
      i += 1;
      j += 1;
      continue;
    }

    if c1.is_none() || c2.is_none() {
      break;
    }

    let numeric = one[i].is_ascii_digit();
    let run = |s: &[u8], start: usize| {
      let mut end = start;
      while end < s.len() && (if numeric { s[end].is_ascii_digit() } else { s[end].is_ascii_alphabetic() }) {
        end += 1;
      }
      end
    };
    let end1 = run(one, i);
    let end2 = run(two, j);

    // Segments of different types: numbers are newer than letters.
    if end2 == j {
      return if numeric { Ordering::Greater } else { Ordering::Less };
    }

    let mut seg1 = &one[i..end1];
    let mut seg2 = &two[j..end2];

    if numeric {
      while seg1.first() == Some(&b'0') {
        seg1 = &seg1[1..];
      }
      while seg2.first() == Some(&b'0') {
        seg2 = &seg2[1..];
      }
      match seg1.len().cmp(&seg2.len()) {
        Ordering::Equal => {}
        other => return other,
      }
    }

    match seg1.cmp(seg2) {
      Ordering::Equal => {}
      other => return other,
    }

    i = end1;
    j = end2;
  }

  match (i >= one.len(), j >= two.len()) {
    (true, true) => Ordering::Equal,
    (true, false) => Ordering::Less,
    _ => Ordering::Greater,
  }
}

/// Compare two optional versions. A present version is newer than a missing
/// one; two missing versions are equal.
pub fn compare_versions(v1: Option<&str>, v2: Option<&str>) -> Ordering {
  match (v1, v2) {
    (Some(a), Some(b)) => rpmvercmp(a, b),
    (Some(_), None) => Ordering::Greater,
    (None, Some(_)) => Ordering::Less,
    (None, None) => Ordering::Equal,
  }
}

/// The newest version of a request.
///
/// A single version is returned unchanged, a list yields its maximum and an
/// empty request yields `None`. Empty strings in a list are ignored.
pub fn newest_version(spec: &VersionSpec) -> Option<String> {
  match spec {
    VersionSpec::Single(v) if v.is_empty() => None,
    VersionSpec::Single(v) => Some(v.clone()),
    VersionSpec::Candidates(versions) => versions
      .iter()
      .filter(|v| !v.is_empty())
      .max_by(|a, b| rpmvercmp(a, b))
      .cloned(),
  }
}
