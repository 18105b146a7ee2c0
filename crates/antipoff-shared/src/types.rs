use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::{CADASTRAL_MAX_LEN, CADASTRAL_MIN_LEN, MAX_FIELD_LEN};
use crate::error::ValidationError;

// Cadastral number = 13 or 14 ASCII digits, nothing else
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct CadastralNumber(String);

impl CadastralNumber {
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let len_ok = (CADASTRAL_MIN_LEN..=CADASTRAL_MAX_LEN).contains(&value.len());
        if !len_ok || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::CadastralNumber);
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for CadastralNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CadastralNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for CadastralNumber {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for CadastralNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// A syntactically valid email address.
///
/// The domain is lowercased on parse; the local part is kept as typed since
/// some mail hosts treat it case-sensitively.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let err = |reason: &str| ValidationError::Email(reason.to_string());

        let value = value.trim();
        if value.is_empty() {
            return Err(err("empty"));
        }
        if value.len() > MAX_FIELD_LEN {
            return Err(err("too long"));
        }
        if value.chars().any(char::is_whitespace) {
            return Err(err("contains whitespace"));
        }

        let (local, domain) = value.split_once('@').ok_or_else(|| err("missing @"))?;
        if domain.contains('@') {
            return Err(err("more than one @"));
        }
        if local.is_empty() {
            return Err(err("empty local part"));
        }
        if domain.is_empty() {
            return Err(err("empty domain"));
        }
        if !domain.contains('.') {
            return Err(err("domain must contain a dot"));
        }
        if domain.split('.').any(str::is_empty) {
            return Err(err("empty domain label"));
        }

        Ok(Self(format!("{local}@{}", domain.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Email {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cadastral_number_lengths() {
        assert!(CadastralNumber::parse("1234567890123").is_ok());
        assert!(CadastralNumber::parse("12345678901234").is_ok());
        assert!(CadastralNumber::parse("123456789012").is_err());
        assert!(CadastralNumber::parse("123456789012345").is_err());
        assert!(CadastralNumber::parse("").is_err());
    }

    #[test]
    fn test_cadastral_number_rejects_non_digits() {
        assert!(CadastralNumber::parse("12345678901a3").is_err());
        assert!(CadastralNumber::parse(" 1234567890123").is_err());
        assert!(CadastralNumber::parse("12:34:5678901").is_err());
        // Non-ASCII digits are not accepted either
        assert!(CadastralNumber::parse("١٢٣٤٥٦٧٨٩٠١٢٣").is_err());
    }

    #[test]
    fn test_cadastral_number_deserialize_validates() {
        let ok: CadastralNumber = serde_json::from_str("\"9876543210123\"").unwrap();
        assert_eq!(ok.as_str(), "9876543210123");
        assert!(serde_json::from_str::<CadastralNumber>("\"42\"").is_err());
    }

    #[test]
    fn test_email_normalizes_domain() {
        let email = Email::parse("  John.Doe@Example.COM ").unwrap();
        assert_eq!(email.as_str(), "John.Doe@example.com");
    }

    #[test]
    fn test_email_rejects_malformed() {
        for bad in [
            "",
            "plainaddress",
            "@example.com",
            "user@",
            "user@localhost",
            "user@@example.com",
            "user@exa mple.com",
            "user@example..com",
        ] {
            assert!(Email::parse(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_email_too_long() {
        let long = format!("{}@example.com", "a".repeat(50));
        assert!(Email::parse(&long).is_err());
    }
}
