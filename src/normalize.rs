//! Reference normalization for verse locators.
//!
//! Two transforms, applied roman-first by [`normalize_reference`]:
//!
//! - [`convert_roman_prefix`]: `IIIJohn4:5` -> `3 John4:5`
//! - [`add_space_after_book`]: `3 John4:5` -> `3 John 4:5`
//!
//! The roman prefix is read as a count of `I` characters, so `IV` is not a
//! numeral here.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex_lite::Regex;

/// A run of `I` followed by a capitalized word.
static ROMAN_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(I+)([A-Z][a-z]+.*)").unwrap());

/// Book abbreviation (optionally numbered) glued to a `chapter:verse`
/// locator with an optional `b` continuation.
static BOOK_LOCATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^((?:[1-3] ?)?[A-Za-z]+)(\d+:\d+b?)$").unwrap());

/// Replace a leading run of `I`s before a capitalized word with its count
/// and a space.
///
/// ```
/// use rubrica::normalize::convert_roman_prefix;
///
/// assert_eq!(convert_roman_prefix("IIIJohn4:5"), "3 John4:5");
/// assert_eq!(convert_roman_prefix("Isaiah1:1"), "Isaiah1:1");
/// ```
pub fn convert_roman_prefix(s: &str) -> Cow<'_, str> {
    match ROMAN_PREFIX_RE.captures(s) {
        Some(caps) => Cow::Owned(format!("{} {}", caps[1].len(), &caps[2])),
        None => Cow::Borrowed(s),
    }
}

/// Insert a space between a book abbreviation and its numeric locator.
///
/// ```
/// use rubrica::normalize::add_space_after_book;
///
/// assert_eq!(add_space_after_book("Matt5:1b"), "Matt 5:1b");
/// assert_eq!(add_space_after_book("Matt 5:1"), "Matt 5:1");
/// ```
pub fn add_space_after_book(s: &str) -> Cow<'_, str> {
    BOOK_LOCATOR_RE.replace(s, "${1} ${2}")
}

/// Roman-prefix conversion followed by book spacing.
pub fn normalize_reference(s: &str) -> String {
    add_space_after_book(&convert_roman_prefix(s)).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_roman_prefix_counts_runs() {
        assert_eq!(convert_roman_prefix("IJohn1:1"), "1 John1:1");
        assert_eq!(convert_roman_prefix("IIKings2:11"), "2 Kings2:11");
        assert_eq!(convert_roman_prefix("IIIJohn4:5"), "3 John4:5");
    }

    #[test]
    fn test_roman_prefix_requires_capitalized_word() {
        assert_eq!(convert_roman_prefix("Isaiah6:3"), "Isaiah6:3");
        assert_eq!(convert_roman_prefix("Iijohn"), "Iijohn");
        // the run backtracks so that `Ijohn` is the capitalized word
        assert_eq!(convert_roman_prefix("IIjohn"), "1 Ijohn");
        assert_eq!(convert_roman_prefix("II"), "II");
        assert_eq!(convert_roman_prefix(""), "");
    }

    #[test]
    fn test_roman_prefix_is_not_numeral_parsing() {
        // "IV" is not a pure run of I, so it passes through.
        assert_eq!(convert_roman_prefix("IVEsdras1:1"), "IVEsdras1:1");
    }

    #[test]
    fn test_book_spacing() {
        assert_eq!(add_space_after_book("Matt1:1"), "Matt 1:1");
        assert_eq!(add_space_after_book("1Cor13:4"), "1Cor 13:4");
        assert_eq!(add_space_after_book("Luke24:13b"), "Luke 24:13b");
        assert_eq!(add_space_after_book("3 John4:5"), "3 John 4:5");
    }

    #[test]
    fn test_book_spacing_leaves_other_strings() {
        assert_eq!(add_space_after_book("Matt1"), "Matt1");
        assert_eq!(add_space_after_book("Matt1:1c"), "Matt1:1c");
        assert_eq!(add_space_after_book("1:1"), "1:1");
        assert_eq!(add_space_after_book("Easter"), "Easter");
    }

    #[test]
    fn test_normalize_reference_literal() {
        assert_eq!(
            add_space_after_book(&convert_roman_prefix("IIIJohn4:5")),
            "3 John 4:5"
        );
        assert_eq!(normalize_reference("IIIJohn4:5"), "3 John 4:5");
        assert_eq!(normalize_reference("Mark16:15"), "Mark 16:15");
    }

    proptest! {
        #[test]
        fn prop_spacing_idempotent(s in "[1-3]?[A-Za-z]{1,6}[0-9]{1,3}:[0-9]{1,3}b?") {
            let once = add_space_after_book(&s).into_owned();
            let twice = add_space_after_book(&once).into_owned();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_normalize_idempotent(s in "I{0,3}[A-Z][a-z]{1,5}[0-9]{1,2}:[0-9]{1,2}b?") {
            let once = normalize_reference(&s);
            prop_assert_eq!(normalize_reference(&once), once.clone());
        }

        #[test]
        fn prop_unmatched_strings_pass_through(s in "[a-z ]{0,12}") {
            prop_assert_eq!(convert_roman_prefix(&s), s.as_str());
            prop_assert_eq!(add_space_after_book(&s), s.as_str());
        }
    }
}
