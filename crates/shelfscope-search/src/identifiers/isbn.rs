use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};

/// A validated ISBN with both normalized forms (when an ISBN-10 exists).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Isbn {
    pub raw: String,
    pub isbn13: String,
    pub isbn10: Option<String>,
}

fn strip_isbn(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_uppercase()
}

fn check_isbn10(digits: &[u32]) -> bool {
    // digits[9] may be 10 (X)
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, &d)| (10 - i as u32) * d)
        .sum();
    sum % 11 == 0
}

fn isbn13_check_digit(first12: &[u32]) -> u32 {
    let sum: u32 = first12
        .iter()
        .enumerate()
        .map(|(i, &d)| if i % 2 == 0 { d } else { d * 3 })
        .sum();
    (10 - (sum % 10)) % 10
}

fn isbn10_check_char(first9: &[u32]) -> char {
    let sum: u32 = first9
        .iter()
        .enumerate()
        .map(|(i, &d)| (i as u32 + 1) * d)
        .sum();
    match sum % 11 {
        10 => 'X',
        n => char::from_digit(n, 10).unwrap_or('0'),
    }
}

fn digits_to_string(digits: &[u32]) -> String {
    digits
        .iter()
        .filter_map(|&d| char::from_digit(d, 10))
        .collect()
}

impl Isbn {
    pub fn parse(input: &str) -> Result<Self> {
        let stripped = strip_isbn(input);
        let invalid = || SearchError::InvalidIsbn(input.to_string());

        if stripped.len() == 13 {
            let digits = stripped
                .chars()
                .map(|c| c.to_digit(10))
                .collect::<Option<Vec<u32>>>()
                .ok_or_else(invalid)?;
            if isbn13_check_digit(&digits[..12]) != digits[12] {
                return Err(invalid());
            }
            // Only the 978 prefix has an ISBN-10 equivalent.
            let isbn10 = stripped.starts_with("978").then(|| {
                let mut s = digits_to_string(&digits[3..12]);
                s.push(isbn10_check_char(&digits[3..12]));
                s
            });
            return Ok(Self {
                raw: input.to_string(),
                isbn13: stripped,
                isbn10,
            });
        }

        if stripped.len() == 10 {
            let mut digits = Vec::with_capacity(10);
            for (i, c) in stripped.chars().enumerate() {
                match c.to_digit(10) {
                    Some(d) => digits.push(d),
                    None if i == 9 && c == 'X' => digits.push(10),
                    None => return Err(invalid()),
                }
            }
            if !check_isbn10(&digits) {
                return Err(invalid());
            }
            let mut d13 = vec![9, 7, 8];
            d13.extend_from_slice(&digits[..9]);
            d13.push(isbn13_check_digit(&d13));
            return Ok(Self {
                raw: input.to_string(),
                isbn13: digits_to_string(&d13),
                isbn10: Some(stripped),
            });
        }

        Err(invalid())
    }

    /// True when the whole query is an ISBN (hyphens/spaces allowed).
    pub fn looks_like(query: &str) -> bool {
        let trimmed = query.trim();
        let trimmed = trimmed
            .strip_prefix("isbn:")
            .or_else(|| trimmed.strip_prefix("ISBN:"))
            .unwrap_or(trimmed);
        trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || c == '-' || c == ' ' || c == 'X' || c == 'x')
            && Self::parse(trimmed).is_ok()
    }
}

/// Pick the first valid ISBN-13 and ISBN-10 out of a mixed identifier list.
///
/// An ISBN-10 is only derived from an ISBN-13 when the list carries no
/// ISBN-10 of its own.
pub fn pick_isbns<'a, I>(values: I) -> (Option<String>, Option<String>)
where
    I: IntoIterator<Item = &'a str>,
{
    let mut isbn13 = None;
    let mut isbn10 = None;
    let mut derived10 = None;

    for value in values {
        let stripped = strip_isbn(value);
        let Ok(parsed) = Isbn::parse(value) else {
            continue;
        };
        if stripped.len() == 10 {
            isbn10.get_or_insert(stripped);
            isbn13.get_or_insert(parsed.isbn13);
        } else {
            isbn13.get_or_insert(parsed.isbn13);
            if derived10.is_none() {
                derived10 = parsed.isbn10;
            }
        }
    }

    (isbn13, isbn10.or(derived10))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_isbn13() {
        let isbn = Isbn::parse("9780306406157").unwrap();
        assert_eq!(isbn.isbn13, "9780306406157");
        assert_eq!(isbn.isbn10.as_deref(), Some("0306406152"));
    }

    #[test]
    fn isbn13_with_hyphens() {
        let isbn = Isbn::parse("978-0-306-40615-7").unwrap();
        assert_eq!(isbn.isbn13, "9780306406157");
    }

    #[test]
    fn valid_isbn10() {
        let isbn = Isbn::parse("0306406152").unwrap();
        assert_eq!(isbn.isbn10, Some("0306406152".to_string()));
        assert_eq!(isbn.isbn13, "9780306406157");
    }

    #[test]
    fn isbn10_with_x_check() {
        let isbn = Isbn::parse("007462542X").unwrap();
        assert_eq!(isbn.isbn10, Some("007462542X".to_string()));
    }

    #[test]
    fn invalid_check_digit() {
        assert!(Isbn::parse("9780306406158").is_err());
        assert!(Isbn::parse("not an isbn").is_err());
    }

    #[test]
    fn isbn13_979_has_no_isbn10() {
        let isbn = Isbn::parse("9791032305690").unwrap();
        assert_eq!(isbn.isbn10, None);
    }

    #[test]
    fn looks_like_detects_bare_isbn_queries() {
        assert!(Isbn::looks_like("978-0-306-40615-7"));
        assert!(Isbn::looks_like("ISBN:0306406152"));
        assert!(!Isbn::looks_like("project hail mary"));
        assert!(!Isbn::looks_like("1984"));
    }

    #[test]
    fn pick_isbns_from_mixed_list() {
        let (isbn13, isbn10) = pick_isbns(["OCLC123", "0306406152", "9780593135204"]);
        assert_eq!(isbn13.as_deref(), Some("9780306406157"));
        assert_eq!(isbn10.as_deref(), Some("0306406152"));

        let (isbn13, isbn10) = pick_isbns(["9780306406157"]);
        assert_eq!(isbn13.as_deref(), Some("9780306406157"));
        assert_eq!(isbn10.as_deref(), Some("0306406152"));
    }
}
