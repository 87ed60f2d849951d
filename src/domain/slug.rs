//! URL path derivation for published content.
//!
//! Titles go through `pinyin` before `slug`, so “基线对齐” becomes
//! `ji-xian-dui-qi`. Explicit paths keep their `/`-separated segments and each
//! segment is slugified on its own.

use pinyin::ToPinyin;
use slug::slugify;
use thiserror::Error;

/// Suffixes tried after the bare path (`-2` up to `-33`).
pub const MAX_SUFFIX_ATTEMPTS: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("path source text is empty")]
    EmptyInput,
    #[error("`{input}` does not produce a usable path segment")]
    Unrepresentable { input: String },
    #[error("no free path left for `{base}`")]
    Exhausted { base: String },
}

pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let segment = slugify(transliterate(input));
    if segment.is_empty() {
        Err(SlugError::Unrepresentable {
            input: input.to_string(),
        })
    } else {
        Ok(segment)
    }
}

/// Normalize a caller-supplied URL path (`/News/Hello World/` → `news/hello-world`).
pub fn prepare_url_path(path: &str) -> Result<String, SlugError> {
    let segments = path
        .split('/')
        .filter(|segment| !segment.trim().is_empty())
        .map(derive_slug)
        .collect::<Result<Vec<_>, _>>()?;

    if segments.is_empty() {
        return Err(SlugError::EmptyInput);
    }
    Ok(segments.join("/"))
}

/// The bare path followed by its numbered variants, in probing order.
pub fn path_candidates(base: &str) -> impl Iterator<Item = String> + '_ {
    std::iter::once(base.to_string())
        .chain((2..=MAX_SUFFIX_ATTEMPTS + 1).map(move |n| format!("{base}-{n}")))
}

fn transliterate(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    for ch in input.chars() {
        if ch.is_ascii() {
            output.push(ch);
            continue;
        }
        match ch.to_pinyin() {
            Some(syllable) => {
                if !output.is_empty() && !output.ends_with(' ') {
                    output.push(' ');
                }
                output.push_str(syllable.plain());
            }
            None if ch.is_whitespace() => output.push(' '),
            None => output.push(ch),
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chinese_titles_are_transliterated() {
        assert_eq!(derive_slug("Rust 基础教程").unwrap(), "rust-ji-chu-jiao-cheng");
    }

    #[test]
    fn punctuation_only_title_is_unrepresentable() {
        assert!(matches!(
            derive_slug("!!!"),
            Err(SlugError::Unrepresentable { .. })
        ));
    }

    #[test]
    fn explicit_paths_keep_segments() {
        assert_eq!(
            prepare_url_path("/News/Hello World/").unwrap(),
            "news/hello-world"
        );
        assert_eq!(prepare_url_path(" / "), Err(SlugError::EmptyInput));
    }

    #[test]
    fn candidates_start_bare_then_count_from_two() {
        let candidates: Vec<_> = path_candidates("about").collect();
        assert_eq!(candidates.len(), MAX_SUFFIX_ATTEMPTS + 1);
        assert_eq!(candidates[0], "about");
        assert_eq!(candidates[1], "about-2");
        assert_eq!(candidates.last().map(String::as_str), Some("about-33"));
    }
}
