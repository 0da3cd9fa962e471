//! Password strength policy.
//!
//! The score counts satisfied checks; a password is accepted at score 5 or 6.
//! The per-check breakdown is meant for the caller's UX and must never be logged.

use serde::Serialize;

const MIN_LENGTH: usize = 8;

// Compared case-insensitively against the whole password.
const COMMON_PASSWORDS: &[&str] = &[
    "password",
    "password1",
    "password123",
    "123456",
    "12345678",
    "123456789",
    "qwerty",
    "qwerty123",
    "abc123",
    "111111",
    "letmein",
    "welcome",
    "welcome1",
    "admin",
    "admin123",
    "iloveyou",
    "monkey",
    "dragon",
    "sunshine",
    "football",
    "p@ssw0rd",
    "p@ssword1",
];

/// Per-rule outcome of a strength check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrengthChecks {
    pub length: bool,
    pub uppercase: bool,
    pub lowercase: bool,
    pub number: bool,
    pub special: bool,
    pub not_common: bool,
}

impl StrengthChecks {
    pub fn score(&self) -> u8 {
        [
            self.length,
            self.uppercase,
            self.lowercase,
            self.number,
            self.special,
            self.not_common,
        ]
        .into_iter()
        .filter(|passed| *passed)
        .count() as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strength {
    Weak,
    Medium,
    Strong,
    VeryStrong,
}

impl Strength {
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=2 => Strength::Weak,
            3..=4 => Strength::Medium,
            5 => Strength::Strong,
            _ => Strength::VeryStrong,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrengthReport {
    pub score: u8,
    pub strength: Strength,
    pub checks: StrengthChecks,
    pub is_valid: bool,
}

pub fn check_strength(password: &str) -> StrengthReport {
    let lowered = password.to_lowercase();
    let checks = StrengthChecks {
        length: password.chars().count() >= MIN_LENGTH,
        uppercase: password.chars().any(char::is_uppercase),
        lowercase: password.chars().any(char::is_lowercase),
        number: password.chars().any(|c| c.is_ascii_digit()),
        special: password
            .chars()
            .any(|c| !c.is_alphanumeric() && !c.is_whitespace()),
        not_common: !COMMON_PASSWORDS.contains(&lowered.as_str()),
    };

    let score = checks.score();
    StrengthReport {
        score,
        strength: Strength::from_score(score),
        checks,
        is_valid: score >= 5,
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn mixed_password_is_very_strong() {
        let report = check_strength("Passw0rd!");
        assert_eq!(report.score, 6);
        assert_eq!(report.strength, Strength::VeryStrong);
        assert!(report.is_valid);
    }

    #[test]
    fn common_password_loses_a_point() {
        let report = check_strength("P@ssw0rd");
        assert!(!report.checks.not_common);
        assert_eq!(report.score, 5);
        assert_eq!(report.strength, Strength::Strong);
        assert!(report.is_valid);
    }

    #[test]
    fn short_lowercase_is_weak_and_invalid() {
        let report = check_strength("abc");
        assert_eq!(report.score, 2); // lowercase + not common
        assert_eq!(report.strength, Strength::Weak);
        assert!(!report.is_valid);
    }

    #[test]
    fn four_checks_is_medium_and_rejected() {
        let report = check_strength("password99");
        assert!(report.checks.length && report.checks.lowercase && report.checks.number);
        assert_eq!(report.score, 4);
        assert_eq!(report.strength, Strength::Medium);
        assert!(!report.is_valid);
    }

    #[test]
    fn report_serializes_with_camel_case_keys() {
        let json = serde_json::to_value(check_strength("Passw0rd!")).unwrap();
        assert_eq!(json["strength"], "very-strong");
        assert_eq!(json["isValid"], true);
        assert_eq!(json["checks"]["notCommon"], true);
    }

    proptest! {
        #[test]
        fn score_bounds_and_validity_are_consistent(password in "\\PC{0,40}") {
            let report = check_strength(&password);
            prop_assert!(report.score <= 6);
            prop_assert_eq!(report.is_valid, report.score >= 5);
            prop_assert_eq!(report.strength, Strength::from_score(report.score));
        }
    }
}
