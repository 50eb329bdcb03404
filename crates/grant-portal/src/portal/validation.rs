use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::domain::GrantType;

/// Validation errors raised while checking submitted application fields.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("field `{0}` must be a valid email address")]
    InvalidEmail(&'static str),
    #[error("field `{0}` must be a non-negative amount")]
    InvalidAmount(&'static str),
    #[error("attestation `{0}` must be accepted")]
    AttestationRequired(&'static str),
    #[error("`continuationYears` is required when requesting a continuation")]
    MissingContinuationYears,
}

const INVESTIGATOR_FIELDS: &[&str] = &[
    "title",
    "principalInvestigator",
    "institution",
    "department",
    "departmentHead",
    "institutionAddress",
    "institutionCityStateZip",
    "institutionPhoneNumber",
    "typesOfCancerAddressed",
    "adminOfficialName",
    "adminOfficialAddress",
    "adminOfficialCityStateZip",
    "adminPhoneNumber",
];

const INVESTIGATOR_EMAILS: &[&str] = &["institutionEmail", "adminEmail"];

const PROPOSAL_FIELDS: &[&str] = &["dates", "einNumber", "signaturePI", "signatureDeptHead"];

const RESEARCH_ONLY_FIELDS: &[&str] = &[
    "includedPublishedPaper",
    "creditAgreement",
    "patentApplied",
    "includedFundingInfo",
    "continuation",
];

const ATTESTATIONS: &[&str] = &["attestationHumanSubjects", "attestationCertification"];

const NON_RESEARCH_FIELDS: &[&str] = &[
    "title",
    "requestor",
    "institution",
    "institutionPhoneNumber",
    "timeframe",
];

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid regex pattern for email")
});

static ACCOUNT_EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[^\s@]+@[^\s@]+\.(com|edu|org)$")
        .expect("Invalid regex pattern for account email")
});

pub fn is_valid_email(candidate: &str) -> bool {
    EMAIL_REGEX.is_match(candidate)
}

/// Account creation only admits `.com`, `.edu`, and `.org` addresses.
pub fn account_email_allowed(candidate: &str) -> bool {
    ACCOUNT_EMAIL_REGEX.is_match(candidate)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordRequirements {
    pub special_char: bool,
    pub capital_letter: bool,
    pub number: bool,
}

impl PasswordRequirements {
    pub fn check(password: &str) -> Self {
        Self {
            special_char: password.chars().any(|c| !c.is_alphanumeric()),
            capital_letter: password.chars().any(|c| c.is_ascii_uppercase()),
            number: password.chars().any(|c| c.is_ascii_digit()),
        }
    }

    pub fn satisfied(&self) -> bool {
        self.special_char && self.capital_letter && self.number
    }
}

/// Runs the rule set for `grant_type`, stopping at the first failing field.
pub fn validate_application(
    grant_type: GrantType,
    fields: &Map<String, Value>,
) -> Result<(), ValidationError> {
    match grant_type {
        GrantType::Research => validate_research(fields),
        GrantType::NextGen => validate_next_gen(fields),
        GrantType::NonResearch => validate_non_research(fields),
    }
}

fn validate_research(fields: &Map<String, Value>) -> Result<(), ValidationError> {
    validate_investigator_block(fields)?;
    require_amount(fields, "amountRequested")?;
    require_all_text(fields, PROPOSAL_FIELDS)?;
    require_all_text(fields, RESEARCH_ONLY_FIELDS)?;

    let continuation = fields.get("continuation").is_some_and(is_affirmative);
    if continuation && text(fields, "continuationYears").is_none() {
        return Err(ValidationError::MissingContinuationYears);
    }

    require_attestations(fields)
}

fn validate_next_gen(fields: &Map<String, Value>) -> Result<(), ValidationError> {
    validate_investigator_block(fields)?;
    require_amount(fields, "amountRequested")?;
    require_all_text(fields, PROPOSAL_FIELDS)?;
    require_attestations(fields)
}

fn validate_non_research(fields: &Map<String, Value>) -> Result<(), ValidationError> {
    require_all_text(fields, NON_RESEARCH_FIELDS)?;
    require_email(fields, "institutionEmail")?;
    require_amount(fields, "amountRequested")
}

fn validate_investigator_block(fields: &Map<String, Value>) -> Result<(), ValidationError> {
    require_all_text(fields, INVESTIGATOR_FIELDS)?;
    for field in INVESTIGATOR_EMAILS {
        require_email(fields, *field)?;
    }
    Ok(())
}

fn text<'a>(fields: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    match fields.get(field) {
        Some(Value::String(raw)) if !raw.trim().is_empty() => Some(raw.trim()),
        _ => None,
    }
}

/// Booleans count as answered for yes/no questions.
fn is_present(value: &Value) -> bool {
    match value {
        Value::String(raw) => !raw.trim().is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
        _ => false,
    }
}

fn require_all_text(
    fields: &Map<String, Value>,
    required: &[&'static str],
) -> Result<(), ValidationError> {
    match required
        .iter()
        .find(|field| !fields.get(**field).is_some_and(is_present))
    {
        Some(missing) => Err(ValidationError::MissingField(*missing)),
        None => Ok(()),
    }
}

fn require_email(fields: &Map<String, Value>, field: &'static str) -> Result<(), ValidationError> {
    let value = text(fields, field).ok_or(ValidationError::MissingField(field))?;
    if is_valid_email(value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail(field))
    }
}

fn require_amount(fields: &Map<String, Value>, field: &'static str) -> Result<(), ValidationError> {
    let amount = match fields.get(field) {
        None | Some(Value::Null) => return Err(ValidationError::MissingField(field)),
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(raw)) if raw.trim().is_empty() => {
            return Err(ValidationError::MissingField(field))
        }
        Some(Value::String(raw)) => raw
            .trim()
            .trim_start_matches('$')
            .replace(',', "")
            .parse::<f64>()
            .ok(),
        Some(_) => None,
    };

    match amount {
        Some(value) if value.is_finite() && value >= 0.0 => Ok(()),
        _ => Err(ValidationError::InvalidAmount(field)),
    }
}

fn require_attestations(fields: &Map<String, Value>) -> Result<(), ValidationError> {
    match ATTESTATIONS
        .iter()
        .find(|field| !fields.get(**field).is_some_and(|value| value == &Value::Bool(true)))
    {
        Some(field) => Err(ValidationError::AttestationRequired(*field)),
        None => Ok(()),
    }
}

fn is_affirmative(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::String(raw) => matches!(
            raw.trim().to_ascii_lowercase().as_str(),
            "yes" | "y" | "true"
        ),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn non_research() -> Map<String, Value> {
        object(json!({
            "title": "Family lodging fund",
            "requestor": "Dana Reyes",
            "institution": "Children's National",
            "institutionPhoneNumber": "2025550100",
            "institutionEmail": "grants@childrensnational.org",
            "amountRequested": "$12,500",
            "timeframe": "12 months",
        }))
    }

    fn next_gen() -> Map<String, Value> {
        object(json!({
            "title": "Single-cell atlas of relapse",
            "principalInvestigator": "Dr. Okafor",
            "institution": "Lakeside University",
            "department": "Pediatrics",
            "departmentHead": "Dr. Haas",
            "institutionAddress": "10 Main St",
            "institutionCityStateZip": "Madison, WI 53703",
            "institutionPhoneNumber": "608-555-0140",
            "institutionEmail": "grants@lakeside.edu",
            "typesOfCancerAddressed": "Leukemia",
            "adminOfficialName": "Sam Ortiz",
            "adminOfficialAddress": "12 Main St",
            "adminOfficialCityStateZip": "Madison, WI 53703",
            "adminPhoneNumber": "608-555-0141",
            "adminEmail": "sponsored@lakeside.edu",
            "amountRequested": 40000,
            "dates": "2025-09-01 to 2026-08-31",
            "einNumber": "98-7654321",
            "signaturePI": "Dr. Okafor",
            "signatureDeptHead": "Dr. Haas",
            "attestationHumanSubjects": true,
            "attestationCertification": true,
        }))
    }

    fn research() -> Map<String, Value> {
        let mut fields = next_gen();
        for (field, answer) in [
            ("includedPublishedPaper", "yes"),
            ("creditAgreement", "yes"),
            ("patentApplied", "no"),
            ("includedFundingInfo", "yes"),
            ("continuation", "no"),
        ] {
            fields.insert(field.to_string(), json!(answer));
        }
        fields
    }

    #[test]
    fn next_gen_needs_no_research_only_questions() {
        assert_eq!(
            validate_application(GrantType::NextGen, &next_gen()),
            Ok(())
        );
        assert_eq!(
            validate_application(GrantType::Research, &next_gen()),
            Err(ValidationError::MissingField("includedPublishedPaper"))
        );
    }

    #[test]
    fn next_gen_still_requires_proposal_details() {
        for field in ["dates", "einNumber", "signaturePI", "signatureDeptHead"] {
            let mut fields = next_gen();
            fields.remove(field);
            assert_eq!(
                validate_application(GrantType::NextGen, &fields),
                Err(ValidationError::MissingField(field))
            );
        }
    }

    #[test]
    fn research_accepts_a_complete_form() {
        assert_eq!(
            validate_application(GrantType::Research, &research()),
            Ok(())
        );
    }

    #[test]
    fn continuation_requires_years() {
        let mut fields = research();
        fields.insert("continuation".to_string(), json!("Yes"));
        assert_eq!(
            validate_application(GrantType::Research, &fields),
            Err(ValidationError::MissingContinuationYears)
        );

        fields.insert("continuationYears".to_string(), json!("2"));
        assert_eq!(validate_application(GrantType::Research, &fields), Ok(()));
    }

    #[test]
    fn attestations_must_be_literal_true() {
        for grant_type in [GrantType::Research, GrantType::NextGen] {
            let mut fields = research();
            fields.insert("attestationCertification".to_string(), json!("true"));
            assert_eq!(
                validate_application(grant_type, &fields),
                Err(ValidationError::AttestationRequired("attestationCertification"))
            );

            fields.insert("attestationCertification".to_string(), json!(true));
            fields.insert("attestationHumanSubjects".to_string(), json!(false));
            assert_eq!(
                validate_application(grant_type, &fields),
                Err(ValidationError::AttestationRequired("attestationHumanSubjects"))
            );
        }
    }

    #[test]
    fn admin_email_is_checked_for_investigator_grants() {
        for grant_type in [GrantType::Research, GrantType::NextGen] {
            let mut fields = research();
            fields.insert("adminEmail".to_string(), json!("sponsored office"));
            assert_eq!(
                validate_application(grant_type, &fields),
                Err(ValidationError::InvalidEmail("adminEmail"))
            );
        }
    }

    #[test]
    fn investigator_amount_must_parse() {
        let mut fields = next_gen();
        fields.insert("amountRequested".to_string(), json!("forty thousand"));
        assert_eq!(
            validate_application(GrantType::NextGen, &fields),
            Err(ValidationError::InvalidAmount("amountRequested"))
        );
    }

    #[test]
    fn non_research_institution_email_is_checked() {
        let mut fields = non_research();
        fields.insert("institutionEmail".to_string(), json!("giving@"));
        assert_eq!(
            validate_application(GrantType::NonResearch, &fields),
            Err(ValidationError::InvalidEmail("institutionEmail"))
        );
    }

    #[test]
    fn email_pattern_matches_simple_addresses() {
        assert!(is_valid_email("pi@jhmi.edu"));
        assert!(!is_valid_email("pi@jhmi"));
        assert!(!is_valid_email("pi smith@jhmi.edu"));
        assert!(!is_valid_email("@jhmi.edu"));
    }

    #[test]
    fn account_emails_are_restricted_to_known_domains() {
        assert!(account_email_allowed("reviewer@test.com"));
        assert!(account_email_allowed("Reviewer@Hospital.ORG"));
        assert!(!account_email_allowed("reviewer@test.io"));
    }

    #[test]
    fn password_requirements_report_each_rule() {
        let weak = PasswordRequirements::check("password");
        assert!(!weak.special_char && !weak.capital_letter && !weak.number);
        assert!(PasswordRequirements::check("P@ssword123").satisfied());
    }

    #[test]
    fn non_research_accepts_formatted_amounts() {
        assert_eq!(
            validate_application(GrantType::NonResearch, &non_research()),
            Ok(())
        );
    }

    #[test]
    fn non_research_rejects_negative_amounts() {
        let mut fields = non_research();
        fields.insert("amountRequested".to_string(), json!(-5));
        assert_eq!(
            validate_application(GrantType::NonResearch, &fields),
            Err(ValidationError::InvalidAmount("amountRequested"))
        );
    }

    #[test]
    fn blank_strings_count_as_missing() {
        let mut fields = non_research();
        fields.insert("timeframe".to_string(), json!("   "));
        assert_eq!(
            validate_application(GrantType::NonResearch, &fields),
            Err(ValidationError::MissingField("timeframe"))
        );
    }

    #[test]
    fn research_rules_do_not_apply_to_non_research() {
        assert_eq!(
            validate_application(GrantType::Research, &non_research()),
            Err(ValidationError::MissingField("principalInvestigator"))
        );
    }
}
