//! Language preference handling.
//!
//! Only the primary language subtag matters for override keys, so a tag like
//! `ru_RU` or `pt-BR` is reduced to `ru` / `pt`.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid language tag '{0}'")]
pub struct InvalidLanguageTag(pub String);

/// A parsed language tag, reduced to what the resolver needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LanguageTag {
  base: String,
}

impl LanguageTag {
  /// Parse a BCP 47 style tag. Both `-` and `_` are accepted as subtag separators.
  pub fn parse(tag: &str) -> Result<Self, InvalidLanguageTag> {
    let mut subtags = tag.split(['-', '_']);
    let primary = subtags.next().unwrap_or_default();

    let valid_len = matches!(primary.len(), 2..=3 | 5..=8);
    if !valid_len || !primary.chars().all(|c| c.is_ascii_alphabetic()) {
      return Err(InvalidLanguageTag(tag.to_string()));
    }

    for subtag in subtags {
      if subtag.is_empty() || subtag.len() > 8 || !subtag.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(InvalidLanguageTag(tag.to_string()));
      }
    }

    Ok(Self {
      base: primary.to_ascii_lowercase(),
    })
  }

  /// The primary language subtag, lowercased.
  pub fn base(&self) -> &str {
    &self.base
  }
}

impl fmt::Display for LanguageTag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.base)
  }
}

/// Language of the running system, from `LANG` with the encoding stripped.
///
/// `C`, `POSIX` and an unset `LANG` all mean English.
pub fn system_language() -> String {
  let lang = std::env::var("LANG").unwrap_or_default();
  let lang = lang.split('.').next().unwrap_or_default();
  match lang {
    "" | "C" | "POSIX" => "en".to_string(),
    other => other.to_string(),
  }
}

/// Normalize languages to their base subtags, sorted and deduplicated.
///
/// Pre-parsed tags and raw strings are merged; any unparsable string fails the whole call.
pub fn base_languages(langs: &[String], tags: &[LanguageTag]) -> Result<Vec<String>, InvalidLanguageTag> {
  let mut out: Vec<String> = tags.iter().map(|t| t.base().to_string()).collect();
  for lang in langs {
    out.push(LanguageTag::parse(lang)?.base().to_string());
  }
  out.sort();
  out.dedup();
  Ok(out)
}
