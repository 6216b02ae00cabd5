//! Field predicates for submitted identity details.
//!
//! These mirror the institution's format rules: roll numbers shaped
//! like `21CS001`, branches from a fixed list, course codes like
//! `CS101`. Each predicate is a pure pass/fail check; the validator
//! maps the first failure to an `InvalidFields` rejection.

use rollcall_protocol::SubmissionDetails;

/// Branches submissions may declare.
pub const BRANCHES: &[&str] = &["CSE", "ECE", "MECH", "CIVIL", "EEE", "IT", "CHEM"];

/// Longest accepted display name, after trimming.
const NAME_MAX_LEN: usize = 50;

/// Name must be non-empty after trimming and of sane length.
pub fn validate_name(name: &str) -> bool {
    let trimmed = name.trim();
    !trimmed.is_empty() && trimmed.chars().count() <= NAME_MAX_LEN
}

/// Roll number format: 2 digits, 2–4 uppercase letters, 3 digits.
/// Example: `21CS001`.
pub fn validate_roll_no(roll_no: &str) -> bool {
    let chars: Vec<char> = roll_no.chars().collect();
    if !(7..=9).contains(&chars.len()) {
        return false;
    }
    let (year, rest) = chars.split_at(2);
    let (letters, digits) = rest.split_at(rest.len() - 3);
    year.iter().all(|c| c.is_ascii_digit())
        && (2..=4).contains(&letters.len())
        && letters.iter().all(|c| c.is_ascii_uppercase())
        && digits.iter().all(|c| c.is_ascii_digit())
}

/// Branch must come from the fixed list.
pub fn validate_branch(branch: &str) -> bool {
    BRANCHES.contains(&branch)
}

/// Course code format: 2–4 uppercase letters followed by 3 digits.
/// Examples: `CS101`, `MATH201`.
pub fn validate_course_code(course_code: &str) -> bool {
    let chars: Vec<char> = course_code.chars().collect();
    if !(5..=7).contains(&chars.len()) {
        return false;
    }
    let (letters, digits) = chars.split_at(chars.len() - 3);
    (2..=4).contains(&letters.len())
        && letters.iter().all(|c| c.is_ascii_uppercase())
        && digits.iter().all(|c| c.is_ascii_digit())
}

/// Runs every predicate over the submitted details, reporting the first
/// failure.
pub fn validate_details(details: &SubmissionDetails) -> Result<(), String> {
    if !validate_name(&details.name) {
        return Err("name must be non-empty and at most 50 characters".into());
    }
    if !validate_roll_no(&details.external_id) {
        return Err(format!(
            "roll number {:?} does not match the expected format (e.g. 21CS001)",
            details.external_id
        ));
    }
    if !validate_branch(&details.group) {
        return Err(format!("unknown branch {:?}", details.group));
    }
    Ok(())
}
