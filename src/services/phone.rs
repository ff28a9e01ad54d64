use thiserror::Error;

const MIN_DIGITS: usize = 8;
const MAX_DIGITS: usize = 15;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PhoneError {
    #[error("Phone number is required")]
    Empty,
    #[error("Invalid phone number: {0}")]
    Invalid(String),
}

/// Normalises a user-typed phone number to E.164 (`+` followed by digits).
///
/// `default_country_code` is applied to national numbers, i.e. anything that
/// does not start with `+` or `00`. A single national trunk `0` is dropped
/// first, so `06 12 34 56 78` with country code `33` becomes `+33612345678`.
pub fn normalize_phone_number(
    raw: &str,
    default_country_code: Option<&str>,
) -> Result<String, PhoneError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PhoneError::Empty);
    }

    let compact: String = trimmed
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();

    let digits = if let Some(rest) = compact.strip_prefix('+') {
        rest.to_string()
    } else if let Some(rest) = compact.strip_prefix("00") {
        rest.to_string()
    } else {
        match default_country_code {
            Some(cc) => {
                let national = compact.strip_prefix('0').unwrap_or(&compact);
                format!("{}{}", cc.trim_start_matches('+'), national)
            }
            None => compact.clone(),
        }
    };

    if !digits.chars().all(|c| c.is_ascii_digit())
        || !(MIN_DIGITS..=MAX_DIGITS).contains(&digits.len())
    {
        return Err(PhoneError::Invalid(trimmed.to_string()));
    }

    Ok(format!("+{digits}"))
}

/// Hides the middle of a phone number for log output: `+33*******78`.
pub fn mask_phone_number(phone: &str) -> String {
    let chars: Vec<char> = phone.chars().collect();
    if chars.len() <= 5 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{head}{}{tail}", "*".repeat(chars.len() - 5))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_international_formats() {
        assert_eq!(
            normalize_phone_number("+33 6 12 34 56 78", None).unwrap(),
            "+33612345678"
        );
        assert_eq!(
            normalize_phone_number("0033-6-12-34-56-78", None).unwrap(),
            "+33612345678"
        );
        assert_eq!(
            normalize_phone_number("+1 (415) 555.0100", None).unwrap(),
            "+14155550100"
        );
    }

    #[test]
    fn test_national_number_uses_default_country_code() {
        assert_eq!(
            normalize_phone_number("06 12 34 56 78", Some("33")).unwrap(),
            "+33612345678"
        );
        assert_eq!(
            normalize_phone_number("0612345678", Some("+33")).unwrap(),
            "+33612345678"
        );
        assert_eq!(
            normalize_phone_number("612345678", None).unwrap(),
            "+612345678"
        );
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(normalize_phone_number("   ", None), Err(PhoneError::Empty));
        assert!(matches!(
            normalize_phone_number("+33abc", None),
            Err(PhoneError::Invalid(_))
        ));
        assert!(matches!(
            normalize_phone_number("+1234", None),
            Err(PhoneError::Invalid(_))
        ));
        assert!(matches!(
            normalize_phone_number("+1234567890123456", None),
            Err(PhoneError::Invalid(_))
        ));
    }

    #[test]
    fn test_mask_phone_number() {
        assert_eq!(mask_phone_number("+33612345678"), "+33*******78");
        assert_eq!(mask_phone_number("1234"), "****");
    }
}
