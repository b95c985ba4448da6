//! Canonicalizes raw owner fields into comparable form.
//!
//! Every rule here is lossy on purpose: the normalized values exist only for
//! the duration of one run and are never shown back to callers.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::error::ResolveError;
use crate::model::{BirthDate, BusinessType, NormalizedAddress, NormalizedName, NormalizedRecord, OwnerRecord};

/// Name tokens split out from the core name, with their canonical form.
const NAME_SUFFIXES: &[(&str, &str)] = &[
    ("jr", "jr"),
    ("sr", "sr"),
    ("ii", "ii"),
    ("iii", "iii"),
    ("iv", "iv"),
    ("llc", "llc"),
    ("pllc", "pllc"),
    ("inc", "inc"),
    ("incorporated", "inc"),
    ("corp", "corp"),
    ("corporation", "corp"),
    ("co", "co"),
    ("company", "co"),
    ("ltd", "ltd"),
    ("limited", "ltd"),
    ("lp", "lp"),
    ("llp", "llp"),
    ("pc", "pc"),
    ("trust", "trust"),
];

const STREET_TYPES: &[(&str, &str)] = &[
    ("street", "st"),
    ("avenue", "ave"),
    ("av", "ave"),
    ("road", "rd"),
    ("boulevard", "blvd"),
    ("drive", "dr"),
    ("lane", "ln"),
    ("court", "ct"),
    ("place", "pl"),
    ("terrace", "ter"),
    ("parkway", "pkwy"),
    ("highway", "hwy"),
    ("circle", "cir"),
    ("square", "sq"),
    ("trail", "trl"),
    ("north", "n"),
    ("south", "s"),
    ("east", "e"),
    ("west", "w"),
    ("northeast", "ne"),
    ("northwest", "nw"),
    ("southeast", "se"),
    ("southwest", "sw"),
];

/// Unit designators; the designator and the token after it are dropped.
const UNIT_DESIGNATORS: &[&str] = &[
    "apt", "apartment", "suite", "ste", "unit", "fl", "floor", "rm", "room", "bldg",
];

const STATES: &[(&str, &str)] = &[
    ("alabama", "al"),
    ("alaska", "ak"),
    ("arizona", "az"),
    ("arkansas", "ar"),
    ("california", "ca"),
    ("colorado", "co"),
    ("connecticut", "ct"),
    ("delaware", "de"),
    ("district of columbia", "dc"),
    ("florida", "fl"),
    ("georgia", "ga"),
    ("hawaii", "hi"),
    ("idaho", "id"),
    ("illinois", "il"),
    ("indiana", "in"),
    ("iowa", "ia"),
    ("kansas", "ks"),
    ("kentucky", "ky"),
    ("louisiana", "la"),
    ("maine", "me"),
    ("maryland", "md"),
    ("massachusetts", "ma"),
    ("michigan", "mi"),
    ("minnesota", "mn"),
    ("mississippi", "ms"),
    ("missouri", "mo"),
    ("montana", "mt"),
    ("nebraska", "ne"),
    ("nevada", "nv"),
    ("new hampshire", "nh"),
    ("new jersey", "nj"),
    ("new mexico", "nm"),
    ("new york", "ny"),
    ("north carolina", "nc"),
    ("north dakota", "nd"),
    ("ohio", "oh"),
    ("oklahoma", "ok"),
    ("oregon", "or"),
    ("pennsylvania", "pa"),
    ("puerto rico", "pr"),
    ("rhode island", "ri"),
    ("south carolina", "sc"),
    ("south dakota", "sd"),
    ("tennessee", "tn"),
    ("texas", "tx"),
    ("utah", "ut"),
    ("vermont", "vt"),
    ("virginia", "va"),
    ("washington", "wa"),
    ("west virginia", "wv"),
    ("wisconsin", "wi"),
    ("wyoming", "wy"),
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%Y/%m/%d",
    "%Y%m%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
];

/// Normalize one record. Fails only when the record has no usable name at all.
pub fn normalize_record(record: &OwnerRecord, index: usize) -> Result<NormalizedRecord, ResolveError> {
    let id = record_id(record, index);

    let name = record.name.as_deref().and_then(normalize_name);
    let business_name = record.business_name.as_deref().and_then(normalize_name);
    if name.is_none() && business_name.is_none() {
        return Err(ResolveError::MalformedRecord {
            index,
            record_id: id,
            field: "name".into(),
            reason: "neither name nor businessName is present".into(),
        });
    }

    let (business_type, business_type_explicit) = match &record.business_type {
        Some(t) => (t.clone(), true),
        None => (infer_business_type(name.as_ref(), business_name.as_ref()), false),
    };

    Ok(NormalizedRecord {
        index,
        id,
        data_source: non_empty(record.data_source.as_deref()).map(str::to_string),
        name,
        business_name,
        address: normalize_address(
            record.address.as_deref(),
            record.city.as_deref(),
            record.state.as_deref(),
            record.zip_code.as_deref(),
        ),
        phone: record.phone.as_deref().and_then(normalize_phone),
        email: record.email.as_deref().and_then(normalize_email),
        ssn: record.ssn.as_deref().and_then(digits_only),
        ein: record.ein.as_deref().and_then(digits_only),
        date_of_birth: record.date_of_birth.as_deref().and_then(normalize_birth_date),
        business_type,
        business_type_explicit,
    })
}

/// Supplied id, or a positional one (`rec-0001` for the first record).
pub fn record_id(record: &OwnerRecord, index: usize) -> String {
    match non_empty(record.id.as_deref()) {
        Some(id) => id.to_string(),
        None => format!("rec-{:04}", index + 1),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Lowercase, drop `.` and apostrophes, turn other punctuation into spaces.
fn clean_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '.' | '\'' | '\u{2019}' => {}
            '&' => out.push_str(" and "),
            c if c.is_alphanumeric() => out.extend(c.to_lowercase()),
            _ => out.push(' '),
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn normalize_name(raw: &str) -> Option<NormalizedName> {
    let cleaned = clean_text(raw);
    if cleaned.is_empty() {
        return None;
    }

    let mut core = Vec::new();
    let mut suffixes = Vec::new();
    for token in cleaned.split(' ') {
        match NAME_SUFFIXES.iter().find(|(from, _)| *from == token) {
            // A lone suffix-looking token ("Co") is still the name.
            Some((_, canonical)) if !core.is_empty() => suffixes.push(canonical.to_string()),
            _ => core.push(token.to_string()),
        }
    }

    let tokens: BTreeSet<String> = core.iter().cloned().collect();
    let full = core
        .iter()
        .chain(suffixes.iter())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ");

    Some(NormalizedName {
        full,
        tokens,
        suffixes,
    })
}

pub fn normalize_street(raw: &str) -> Option<String> {
    let cleaned = clean_text(&raw.replace('#', " unit "));
    let mut out: Vec<&str> = Vec::new();
    let mut tokens = cleaned.split(' ');
    while let Some(token) = tokens.next() {
        if UNIT_DESIGNATORS.contains(&token) {
            tokens.next();
            continue;
        }
        let mapped = STREET_TYPES
            .iter()
            .find(|(from, _)| *from == token)
            .map(|(_, to)| *to)
            .unwrap_or(token);
        if !mapped.is_empty() {
            out.push(mapped);
        }
    }
    if out.is_empty() {
        None
    } else {
        Some(out.join(" "))
    }
}

/// Two-letter lowercase code when the state is recognized, cleaned text otherwise.
pub fn normalize_state(raw: &str) -> Option<String> {
    let cleaned = clean_text(raw);
    if cleaned.is_empty() {
        return None;
    }
    if let Some((_, code)) = STATES.iter().find(|(name, _)| *name == cleaned) {
        return Some(code.to_string());
    }
    Some(cleaned)
}

pub fn normalize_zip(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 5 {
        None
    } else {
        Some(digits[..5].to_string())
    }
}

pub fn normalize_address(
    street: Option<&str>,
    city: Option<&str>,
    state: Option<&str>,
    zip: Option<&str>,
) -> Option<NormalizedAddress> {
    let street = street.and_then(normalize_street);
    let city = city.map(clean_text).filter(|c| !c.is_empty());
    let state = state.and_then(normalize_state);
    let zip = zip.and_then(normalize_zip);

    let parts: Vec<&str> = [&street, &city, &state, &zip]
        .iter()
        .filter_map(|p| p.as_deref())
        .collect();
    if parts.is_empty() {
        return None;
    }
    let full = parts.join(" ");
    let tokens = full.split(' ').map(str::to_string).collect();

    Some(NormalizedAddress {
        street,
        city,
        state,
        zip,
        full,
        tokens,
    })
}

/// Digits only, country code dropped. Fewer than 7 digits is not a phone.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let national = if digits.len() == 11 && digits.starts_with('1') {
        &digits[1..]
    } else if digits.len() > 10 {
        &digits[digits.len() - 10..]
    } else {
        &digits[..]
    };
    if national.len() < 7 {
        None
    } else {
        Some(national.to_string())
    }
}

pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    match email.find('@') {
        Some(at) if at > 0 && at + 1 < email.len() => Some(email),
        _ => None,
    }
}

/// Formatting stripped, digits kept as supplied. Partial values stay partial.
pub fn digits_only(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}

/// Free-text dates that match no accepted format are kept, case-folded and
/// whitespace-collapsed, so the same text from two sources still compares equal.
pub fn normalize_birth_date(raw: &str) -> Option<BirthDate> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    let parsed = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok());
    Some(match parsed {
        Some(date) => BirthDate::Parsed(date),
        None => {
            let folded = value.split_whitespace().collect::<Vec<_>>().join(" ");
            BirthDate::Unparsed(folded.to_lowercase())
        }
    })
}

fn infer_business_type(name: Option<&NormalizedName>, business_name: Option<&NormalizedName>) -> BusinessType {
    let Some(business) = business_name else {
        return if name.is_some() {
            BusinessType::Individual
        } else {
            BusinessType::Other("unknown".into())
        };
    };
    for suffix in business.suffixes.iter().rev() {
        match suffix.as_str() {
            "llc" | "pllc" => return BusinessType::Llc,
            "inc" | "corp" | "co" | "ltd" | "pc" => return BusinessType::Corporation,
            "trust" => return BusinessType::Trust,
            "lp" | "llp" => return BusinessType::Partnership,
            _ => {}
        }
    }
    BusinessType::Other("unknown".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_strips_punctuation_and_splits_suffix() {
        let n = normalize_name("John A. Smith, Jr.").unwrap();
        assert_eq!(n.full, "john a smith jr");
        assert_eq!(n.suffixes, vec!["jr"]);
        assert!(n.tokens.contains("smith"));
        assert!(!n.tokens.contains("jr"));
    }

    #[test]
    fn business_suffix_long_forms_collapse() {
        let a = normalize_name("Smith Holdings, L.L.C.").unwrap();
        let b = normalize_name("SMITH HOLDINGS LLC").unwrap();
        assert_eq!(a, b);
        let c = normalize_name("Acme Corporation").unwrap();
        assert_eq!(c.full, "acme corp");
        let d = normalize_name("Acme Incorporated").unwrap();
        assert_eq!(d.suffixes, vec!["inc"]);
    }

    #[test]
    fn lone_suffix_token_stays_in_core() {
        let n = normalize_name("Co").unwrap();
        assert_eq!(n.full, "co");
        assert!(n.suffixes.is_empty());
    }

    #[test]
    fn punctuation_only_name_is_absent() {
        assert!(normalize_name(" .. ").is_none());
    }

    #[test]
    fn street_types_and_units() {
        assert_eq!(normalize_street("123 Main Street").as_deref(), Some("123 main st"));
        assert_eq!(normalize_street("123 Main St.").as_deref(), Some("123 main st"));
        assert_eq!(normalize_street("45 North Oak Avenue, Apt 4B").as_deref(), Some("45 n oak ave"));
        assert_eq!(normalize_street("45 N Oak Ave #12").as_deref(), Some("45 n oak ave"));
        assert_eq!(normalize_street("9 Elm Dr Suite 200").as_deref(), Some("9 elm dr"));
    }

    #[test]
    fn state_names_map_to_codes() {
        assert_eq!(normalize_state("California").as_deref(), Some("ca"));
        assert_eq!(normalize_state("CA").as_deref(), Some("ca"));
        assert_eq!(normalize_state("new york").as_deref(), Some("ny"));
        assert_eq!(normalize_state("District of Columbia").as_deref(), Some("dc"));
    }

    #[test]
    fn zip_trimmed_to_five() {
        assert_eq!(normalize_zip("90210-1234").as_deref(), Some("90210"));
        assert_eq!(normalize_zip("902").as_deref(), None);
    }

    #[test]
    fn address_parts_join_into_comparison_string() {
        let a = normalize_address(Some("123 Main Street"), Some("Los Angeles"), Some("CA"), Some("90210")).unwrap();
        let b = normalize_address(Some("123 Main St"), Some("Los Angeles"), Some("California"), Some("90210-0001"))
            .unwrap();
        assert_eq!(a.full, "123 main st los angeles ca 90210");
        assert_eq!(a.full, b.full);
        assert!(a.is_comparable());

        let zip_only = normalize_address(None, None, None, Some("90210")).unwrap();
        assert!(!zip_only.is_comparable());
        assert!(normalize_address(None, None, None, None).is_none());
    }

    #[test]
    fn phone_digits_and_country_code() {
        assert_eq!(normalize_phone("+1 (310) 555-0199").as_deref(), Some("3105550199"));
        assert_eq!(normalize_phone("310.555.0199").as_deref(), Some("3105550199"));
        assert_eq!(normalize_phone("+44 20 7946 0958").as_deref(), Some("2079460958"));
        assert_eq!(normalize_phone("555").as_deref(), None);
    }

    #[test]
    fn email_lowercased_and_validated() {
        assert_eq!(normalize_email("  John.Smith@Example.COM ").as_deref(), Some("john.smith@example.com"));
        assert_eq!(normalize_email("not-an-email"), None);
        assert_eq!(normalize_email("@example.com"), None);
    }

    #[test]
    fn ids_keep_partial_values() {
        assert_eq!(digits_only("12-3456789").as_deref(), Some("123456789"));
        assert_eq!(digits_only("***-**-1234").as_deref(), Some("1234"));
        assert_eq!(digits_only("N/A"), None);
    }

    #[test]
    fn birth_dates_in_several_formats() {
        let iso = normalize_birth_date("1970-03-15").unwrap();
        let us = normalize_birth_date("03/15/1970").unwrap();
        assert_eq!(iso, us);
        assert_eq!(
            normalize_birth_date("sometime in spring").unwrap(),
            BirthDate::Unparsed("sometime in spring".into())
        );
        assert!(normalize_birth_date("  ").is_none());
    }

    #[test]
    fn written_out_dates_parse() {
        let iso = normalize_birth_date("1970-03-15").unwrap();
        assert_eq!(normalize_birth_date("March 15, 1970").unwrap(), iso);
        assert_eq!(normalize_birth_date("Mar 15, 1970").unwrap(), iso);
        assert_eq!(normalize_birth_date("15 March 1970").unwrap(), iso);
    }

    #[test]
    fn free_text_dates_are_case_folded() {
        assert_eq!(
            normalize_birth_date("  Spring   1970 ").unwrap(),
            normalize_birth_date("spring 1970").unwrap()
        );
    }

    #[test]
    fn missing_both_names_is_malformed() {
        let record = OwnerRecord {
            id: Some("r-9".into()),
            address: Some("1 Main St".into()),
            ..OwnerRecord::default()
        };
        match normalize_record(&record, 8) {
            Err(ResolveError::MalformedRecord { index, record_id, field, .. }) => {
                assert_eq!(index, 8);
                assert_eq!(record_id, "r-9");
                assert_eq!(field, "name");
            }
            other => panic!("expected malformed record, got {other:?}"),
        }
    }

    #[test]
    fn positional_id_when_missing() {
        let n = normalize_record(&OwnerRecord::named("Jane Doe"), 0).unwrap();
        assert_eq!(n.id, "rec-0001");
        assert_eq!(n.business_type, BusinessType::Individual);
        assert!(!n.business_type_explicit);
    }

    #[test]
    fn business_type_inferred_from_suffix() {
        let llc = normalize_record(&OwnerRecord::business("Smith Holdings LLC"), 0).unwrap();
        assert_eq!(llc.business_type, BusinessType::Llc);
        let trust = normalize_record(&OwnerRecord::business("Smith Family Trust"), 1).unwrap();
        assert_eq!(trust.business_type, BusinessType::Trust);
        let explicit = OwnerRecord {
            business_type: Some(BusinessType::Partnership),
            ..OwnerRecord::business("Smith Holdings LLC")
        };
        let n = normalize_record(&explicit, 2).unwrap();
        assert_eq!(n.business_type, BusinessType::Partnership);
        assert!(n.business_type_explicit);
    }
}
