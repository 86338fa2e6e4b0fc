//! Brazilian registry document validation (CPF / CNPJ).
//!
//! Check digits follow the official weighted-sum scheme: remainder of the
//! sum mod 11 below 2 maps to digit 0, otherwise 11 minus the remainder.
//! All-repeated-digit sequences are rejected up front; several of them pass
//! the arithmetic but are placeholder values, not issued documents.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Cpf,
    Cnpj,
}

/// Strip everything but digits ("529.982.247-25" -> "52998224725").
pub fn normalize_document(input: &str) -> String {
    input.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Validate a document number of the given type. Expects raw user input;
/// normalization happens here.
pub fn validate_document(document_type: DocumentType, input: &str) -> bool {
    let digits = normalize_document(input);
    match document_type {
        DocumentType::Cpf => validate_cpf(&digits),
        DocumentType::Cnpj => validate_cnpj(&digits),
    }
}

/// Validate an 11-digit CPF (digits only).
pub fn validate_cpf(digits: &str) -> bool {
    let d = match as_digit_vec(digits, 11) {
        Some(d) => d,
        None => return false,
    };

    let first = check_digit(d[..9].iter().zip((2..=10).rev()));
    if d[9] != first {
        return false;
    }
    let second = check_digit(d[..10].iter().zip((2..=11).rev()));
    d[10] == second
}

/// Validate a 14-digit CNPJ (digits only).
pub fn validate_cnpj(digits: &str) -> bool {
    const WEIGHTS_FIRST: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
    const WEIGHTS_SECOND: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

    let d = match as_digit_vec(digits, 14) {
        Some(d) => d,
        None => return false,
    };

    let first = check_digit(d[..12].iter().zip(WEIGHTS_FIRST.into_iter()));
    if d[12] != first {
        return false;
    }
    let second = check_digit(d[..13].iter().zip(WEIGHTS_SECOND.into_iter()));
    d[13] == second
}

/// Parse into digits, enforcing length and rejecting repeated sequences.
fn as_digit_vec(digits: &str, expected_len: usize) -> Option<Vec<u32>> {
    if digits.len() != expected_len || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let first = digits.chars().next()?;
    if digits.chars().all(|c| c == first) {
        return None;
    }
    Some(digits.chars().filter_map(|c| c.to_digit(10)).collect())
}

fn check_digit<'a, I: Iterator<Item = (&'a u32, u32)>>(pairs: I) -> u32 {
    let sum: u32 = pairs.map(|(digit, weight)| digit * weight).sum();
    let remainder = sum % 11;
    if remainder < 2 {
        0
    } else {
        11 - remainder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_valid_cpfs() {
        assert!(validate_cpf("11144477735"));
        assert!(validate_cpf("52998224725"));
        assert!(validate_document(DocumentType::Cpf, "529.982.247-25"));
    }

    #[test]
    fn rejects_single_digit_mutations_of_valid_cpf() {
        let valid = "52998224725";
        for pos in 0..valid.len() {
            let mut mutated: Vec<char> = valid.chars().collect();
            let original = mutated[pos].to_digit(10).unwrap();
            mutated[pos] = char::from_digit((original + 1) % 10, 10).unwrap();
            let candidate: String = mutated.into_iter().collect();
            assert!(
                !validate_cpf(&candidate),
                "mutation at {} should invalidate: {}",
                pos,
                candidate
            );
        }
    }

    #[test]
    fn rejects_repeated_digit_cpfs() {
        for digit in 0..=9 {
            let repeated = digit.to_string().repeat(11);
            assert!(!validate_cpf(&repeated), "{} must be rejected", repeated);
        }
    }

    #[test]
    fn rejects_wrong_length_and_non_digits() {
        assert!(!validate_cpf("5299822472"));
        assert!(!validate_cpf("529982247250"));
        assert!(!validate_cpf("5299822472a"));
        assert!(!validate_cpf(""));
    }

    #[test]
    fn accepts_known_valid_cnpj() {
        assert!(validate_cnpj("11222333000181"));
        assert!(validate_document(DocumentType::Cnpj, "11.222.333/0001-81"));
    }

    #[test]
    fn rejects_invalid_cnpj() {
        assert!(!validate_cnpj("11222333000182"));
        assert!(!validate_cnpj("11111111111111"));
        assert!(!validate_cnpj("1122233300018"));
    }

    #[test]
    fn normalization_strips_punctuation() {
        assert_eq!(normalize_document("11.222.333/0001-81"), "11222333000181");
        assert_eq!(normalize_document("529.982.247-25"), "52998224725");
        assert_eq!(normalize_document("abc"), "");
    }
}
