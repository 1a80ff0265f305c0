//! Built-in mask templates
//!
//! Templates use the custom pattern language: `0` digit, `A` letter,
//! `*` alphanumeric, anything else literal.

pub const PHONE: &str = "(000) 000-0000";
pub const PHONE_INTERNATIONAL: &str = "+00 000 000 0000";
pub const SSN: &str = "000-00-0000";
pub const CREDIT_CARD: &str = "0000 0000 0000 0000";
pub const ZIP: &str = "00000";
pub const ZIP_PLUS4: &str = "00000-0000";
pub const DATE: &str = "00/00/0000";
pub const TIME: &str = "00:00";

/// Preset name → template
pub const PRESETS: &[(&str, &str)] = &[
    ("phone", PHONE),
    ("phoneInternational", PHONE_INTERNATIONAL),
    ("ssn", SSN),
    ("creditCard", CREDIT_CARD),
    ("zip", ZIP),
    ("zipPlus4", ZIP_PLUS4),
    ("date", DATE),
    ("time", TIME),
];

pub fn template(name: &str) -> Option<&'static str> {
    PRESETS
        .iter()
        .find(|(preset, _)| *preset == name)
        .map(|(_, template)| *template)
}
