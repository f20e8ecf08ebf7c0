use std::fmt;

use serde::{Deserialize, Serialize};

/// User-facing text for address lookup outcomes.
///
/// Injected into the lookup so hosts can localize results without the
/// geocoder reaching for a global resource table.
pub trait Messages: Send + Sync + fmt::Debug {
    /// Text returned when the geocoder fails with an I/O error.
    fn io_error(&self) -> String;

    /// Text returned when the coordinates were rejected.
    fn invalid_coordinates(&self, latitude: f64, longitude: f64) -> String;

    /// Text returned when the lookup found nothing.
    fn no_address_found(&self) -> String;

    /// Formats a resolved address.
    fn format_address(&self, street: &str, locality: &str, country: &str) -> String {
        format!("{street}, {locality}, {country}")
    }
}

/// Built-in English messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnglishMessages;

impl Messages for EnglishMessages {
    fn io_error(&self) -> String {
        "IO Exception trying to get address".to_owned()
    }

    fn invalid_coordinates(&self, latitude: f64, longitude: f64) -> String {
        format!("Invalid latitude or longitude in {latitude:.8}, {longitude:.8}")
    }

    fn no_address_found(&self) -> String {
        "No address found".to_owned()
    }
}

/// Messages built from string templates, typically loaded from a JSON catalog.
///
/// Placeholders: `{latitude}` and `{longitude}` in `invalid_coordinates`;
/// `{street}`, `{locality}` and `{country}` in `address`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateMessages {
    /// I/O failure text.
    pub io_error: String,
    /// Invalid coordinates template.
    pub invalid_coordinates: String,
    /// Empty result text.
    pub no_address_found: String,
    /// Address template.
    pub address: String,
}

impl Default for TemplateMessages {
    fn default() -> Self {
        Self {
            io_error: EnglishMessages.io_error(),
            invalid_coordinates: "Invalid latitude or longitude in {latitude}, {longitude}"
                .to_owned(),
            no_address_found: EnglishMessages.no_address_found(),
            address: "{street}, {locality}, {country}".to_owned(),
        }
    }
}

impl TemplateMessages {
    /// Parses a catalog from JSON. Missing keys fall back to English.
    ///
    /// # Errors
    ///
    /// Returns the parse error if `json` is not a valid catalog.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Messages for TemplateMessages {
    fn io_error(&self) -> String {
        self.io_error.clone()
    }

    fn invalid_coordinates(&self, latitude: f64, longitude: f64) -> String {
        render(&self.invalid_coordinates, |name| match name {
            "latitude" => Some(format!("{latitude:.8}")),
            "longitude" => Some(format!("{longitude:.8}")),
            _ => None,
        })
    }

    fn no_address_found(&self) -> String {
        self.no_address_found.clone()
    }

    fn format_address(&self, street: &str, locality: &str, country: &str) -> String {
        render(&self.address, |name| {
            let value = match name {
                "street" => street,
                "locality" => locality,
                "country" => country,
                _ => return None,
            };
            Some(value.to_owned())
        })
    }
}

/// Expands `{name}` placeholders in a single pass over `template`.
///
/// Substituted values are never rescanned. Unknown or unterminated
/// placeholders are copied through unchanged.
fn render(template: &str, mut lookup: impl FnMut(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}').map(|close| open + close) else {
            break;
        };
        out.push_str(&rest[..open]);
        if let Some(value) = lookup(&rest[open + 1..close]) {
            out.push_str(&value);
            rest = &rest[close + 1..];
        } else {
            out.push('{');
            rest = &rest[open + 1..];
        }
    }
    out.push_str(rest);
    out
}
