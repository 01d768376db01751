//! Shared lexical helpers for the deterministic classifier and extractor.

use rust_decimal::Decimal;

pub(crate) fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Splits a message into tokens that keep numbers, currency marks and decimal
/// points intact. A comma between two digits is kept as a group separator.
/// Trailing sentence punctuation is dropped.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    let normalized: Vec<char> = normalize_text(text).chars().collect();
    let mut sanitized = String::with_capacity(normalized.len());
    for (position, &character) in normalized.iter().enumerate() {
        let grouping_comma = character == ','
            && position > 0
            && normalized[position - 1].is_ascii_digit()
            && normalized.get(position + 1).is_some_and(char::is_ascii_digit);
        if character.is_alphanumeric()
            || grouping_comma
            || matches!(character, '$' | '€' | '£' | '.' | '\'')
        {
            sanitized.push(character);
        } else {
            sanitized.push(' ');
        }
    }
    sanitized
        .split_whitespace()
        .map(|token| token.trim_matches(|c| c == '.' || c == '\'').to_string())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Alphabetic words only, apostrophes folded away (`that's` becomes `thats`).
pub(crate) fn words(text: &str) -> Vec<String> {
    let mut sanitized = String::with_capacity(text.len());
    for character in normalize_text(text).chars() {
        if character.is_alphanumeric() {
            sanitized.push(character);
        } else if character != '\'' {
            sanitized.push(' ');
        }
    }
    sanitized.split_whitespace().map(str::to_string).collect()
}

/// Digits with optional decimal point or group separators, parseable or not.
pub(crate) fn is_numeric_literal(token: &str) -> bool {
    token.starts_with(|c: char| c.is_ascii_digit())
        && token.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',')
}

/// Parses `5`, `2.5` or `1,000` into a non-negative decimal.
pub(crate) fn parse_number(token: &str) -> Option<Decimal> {
    let cleaned = token.replace(',', "");
    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    if !cleaned.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return None;
    }
    cleaned.parse::<Decimal>().ok().map(|value| value.normalize())
}

pub(crate) fn is_currency_symbol(character: char) -> bool {
    matches!(character, '$' | '€' | '£')
}

pub(crate) fn is_currency_word(token: &str) -> bool {
    matches!(
        token,
        "dollar" | "dollars" | "usd" | "euro" | "euros" | "eur" | "buck" | "bucks" | "gbp"
    )
}

/// Cuts `text` to at most `limit` characters on a char boundary.
pub(crate) fn truncate_chars(text: &mut String, limit: usize) {
    if let Some((byte_index, _)) = text.char_indices().nth(limit) {
        text.truncate(byte_index);
    }
}

/// Maps a unit-of-measure token to its canonical spelling.
pub(crate) fn canonical_unit(token: &str) -> Option<&'static str> {
    let unit = match token {
        "kg" | "kgs" | "kilo" | "kilos" | "kilogram" | "kilograms" => "kg",
        "g" | "gr" | "gram" | "grams" => "g",
        "lb" | "lbs" | "pound" | "pounds" => "lb",
        "oz" | "ounce" | "ounces" => "oz",
        "l" | "liter" | "liters" | "litre" | "litres" => "l",
        "piece" | "pieces" | "pc" | "pcs" => "piece",
        "dozen" | "dozens" => "dozen",
        "box" | "boxes" => "box",
        "bag" | "bags" => "bag",
        "bunch" | "bunches" => "bunch",
        "crate" | "crates" => "crate",
        "basket" | "baskets" => "basket",
        _ => return None,
    };
    Some(unit)
}
