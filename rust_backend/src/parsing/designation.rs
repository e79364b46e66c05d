//! Minor-planet designation decoding.
//!
//! Candidate tables and orbit catalogues write designations in several
//! layouts. All of them decode into a [`Designation`]:
//!
//! | Input          | Layout                           | Decoded       |
//! |----------------|----------------------------------|---------------|
//! | `15760`        | permanent number                 | `15760`       |
//! | `15760 Albion` | number followed by a name        | `15760`       |
//! | `2003 UZ413`   | unpacked provisional             | `2003 UZ413`  |
//! | `03UZ413`      | two-digit year provisional       | `2003 UZ413`  |
//! | `A0345`        | MPC packed number                | `100345`      |
//! | `K03U41Z`      | MPC packed provisional           | `2003 UZ41`   |

use thiserror::Error;

use crate::models::Designation;

/// Two-digit years below this value belong to the 2000s.
pub const CENTURY_PIVOT: u32 = 19;

/// Base-62 digits used by the MPC packed formats.
const PACKED_DIGITS: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DesignationError {
    #[error("empty designation")]
    Empty,
    #[error("designation number out of range: {0}")]
    NumberOutOfRange(String),
    #[error("unrecognised designation: {0}")]
    Unrecognised(String),
}

/// Decode `text` in any of the supported layouts.
pub fn parse_designation(text: &str) -> Result<Designation, DesignationError> {
    let text = text.trim();
    let first = text.split_whitespace().next().ok_or(DesignationError::Empty)?;

    // A four-digit year followed by letters is provisional, not a number.
    if let Some(designation) = unpacked_provisional(text) {
        return Ok(designation);
    }

    if is_digits(first) {
        return first
            .parse::<u32>()
            .map(Designation::Numbered)
            .map_err(|_| DesignationError::NumberOutOfRange(first.to_string()));
    }

    short_provisional(text)
        .or_else(|| packed_number(text))
        .or_else(|| packed_provisional(text))
        .ok_or_else(|| DesignationError::Unrecognised(text.to_string()))
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Half-month letter, order letter and an optional cycle count: `UZ413`.
fn is_provisional_body(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 2
        && bytes[0].is_ascii_uppercase()
        && bytes[1].is_ascii_uppercase()
        && bytes[2..].iter().all(u8::is_ascii_digit)
}

fn provisional(year: u32, body: &str) -> Designation {
    Designation::Provisional(format!("{} {}", year, body))
}

/// `2003 UZ413`
fn unpacked_provisional(text: &str) -> Option<Designation> {
    let (year, body) = text.split_once(' ')?;
    let body = body.trim();
    if year.len() != 4 || !is_digits(year) || !is_provisional_body(body) {
        return None;
    }
    Some(provisional(year.parse().ok()?, body))
}

/// `03UZ413`
fn short_provisional(text: &str) -> Option<Designation> {
    if text.len() < 4 || !text.is_ascii() {
        return None;
    }
    let (yy, body) = text.split_at(2);
    if !is_digits(yy) || !is_provisional_body(body) {
        return None;
    }
    let yy: u32 = yy.parse().ok()?;
    let century = if yy < CENTURY_PIVOT { 2000 } else { 1900 };
    Some(provisional(century + yy, body))
}

/// `A0345` (numbers from 100000 upward)
fn packed_number(text: &str) -> Option<Designation> {
    if text.len() != 5 || !text.is_ascii() {
        return None;
    }
    let (lead, digits) = text.split_at(1);
    let lead = lead.chars().next()?;
    if !lead.is_ascii_alphabetic() || !is_digits(digits) {
        return None;
    }
    let block = PACKED_DIGITS.find(lead)? as u32;
    let number = block * 10_000 + digits.parse::<u32>().ok()?;
    Some(Designation::Numbered(number))
}

/// `K03U41Z`
fn packed_provisional(text: &str) -> Option<Designation> {
    let bytes = text.as_bytes();
    if bytes.len() != 7 || !text.is_ascii() {
        return None;
    }
    let century = match bytes[0] {
        b'I' => 1800,
        b'J' => 1900,
        b'K' => 2000,
        _ => return None,
    };
    let yy = &text[1..3];
    if !is_digits(yy) {
        return None;
    }
    let (half_month, order) = (bytes[3], bytes[6]);
    if !half_month.is_ascii_uppercase() || !order.is_ascii_uppercase() {
        return None;
    }
    let tens = PACKED_DIGITS.find(bytes[4] as char)? as u32;
    if !bytes[5].is_ascii_digit() {
        return None;
    }
    let cycle = tens * 10 + u32::from(bytes[5] - b'0');

    let mut body = format!("{}{}", half_month as char, order as char);
    if cycle > 0 {
        body.push_str(&cycle.to_string());
    }
    Some(provisional(century + yy.parse::<u32>().ok()?, &body))
}
