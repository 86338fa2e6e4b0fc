//! Phone normalization to E.164.
//!
//! Bare 10/11-digit numbers are assumed domestic and get the country code;
//! anything already carrying it (or an explicit `+`) keeps its digits.

const COUNTRY_CODE: &str = "55";
const MIN_DIGITS: usize = 10;

/// Normalize user input to E.164. Returns `None` for inputs too short to be
/// a phone number.
pub fn normalize_phone_to_e164(input: &str) -> Option<String> {
    let trimmed = input.trim();

    if let Some(rest) = trimmed.strip_prefix('+') {
        let digits: String = rest.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.len() >= MIN_DIGITS {
            return Some(format!("+{}", digits));
        }
        return None;
    }

    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.len() {
        // Local number: area code + 8 or 9 digits.
        10 | 11 => Some(format!("+{}{}", COUNTRY_CODE, digits)),
        n if n >= 12 && digits.starts_with(COUNTRY_CODE) => Some(format!("+{}", digits)),
        n if n >= MIN_DIGITS => Some(digits),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domestic_numbers_get_country_code() {
        assert_eq!(
            normalize_phone_to_e164("11987654321").as_deref(),
            Some("+5511987654321")
        );
        assert_eq!(
            normalize_phone_to_e164("1138765432").as_deref(),
            Some("+551138765432")
        );
        assert_eq!(
            normalize_phone_to_e164("(11) 98765-4321").as_deref(),
            Some("+5511987654321")
        );
    }

    #[test]
    fn plus_prefixed_numbers_keep_their_digits() {
        assert_eq!(
            normalize_phone_to_e164("+5511987654321").as_deref(),
            Some("+5511987654321")
        );
        assert_eq!(
            normalize_phone_to_e164("+1 (415) 555-0123").as_deref(),
            Some("+14155550123")
        );
        assert_eq!(normalize_phone_to_e164("+123"), None);
    }

    #[test]
    fn bare_numbers_with_country_code_gain_plus() {
        assert_eq!(
            normalize_phone_to_e164("5511987654321").as_deref(),
            Some("+5511987654321")
        );
    }

    #[test]
    fn short_or_garbage_input_is_rejected() {
        assert_eq!(normalize_phone_to_e164("abc"), None);
        assert_eq!(normalize_phone_to_e164(""), None);
        assert_eq!(normalize_phone_to_e164("987654321"), None);
    }
}
