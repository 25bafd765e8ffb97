//! Branding settings
//!
//! A single JSON document stored in `app_settings` under [`BRANDING_KEY`].

use serde::{Deserialize, Serialize};

pub const BRANDING_KEY: &str = "branding";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BrandingSettings {
    pub company_name: String,
    pub tagline: String,
    pub primary_color: String,
    pub secondary_color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub hours: String,
    pub about_text: String,
}

impl Default for BrandingSettings {
    fn default() -> Self {
        Self {
            company_name: "Serenity Touch".to_string(),
            tagline: "Professional Massage Therapy".to_string(),
            primary_color: "#059669".to_string(),
            secondary_color: "#0d9488".to_string(),
            logo: None,
            phone: "(555) 123-4567".to_string(),
            email: "info@serenitytouch.com".to_string(),
            address: "123 Wellness Ave, Spa City, SC 12345".to_string(),
            hours: "Mon-Fri: 9AM-7PM, Sat: 9AM-5PM, Sun: Closed".to_string(),
            about_text: "Experience the healing power of professional massage therapy in our tranquil spa environment.".to_string(),
        }
    }
}

/// Partial update; absent fields keep their current value
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BrandingUpdate {
    pub company_name: Option<String>,
    pub tagline: Option<String>,
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    pub logo: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub hours: Option<String>,
    pub about_text: Option<String>,
}

impl BrandingSettings {
    pub fn merge(mut self, update: BrandingUpdate) -> Result<Self, String> {
        for color in [&update.primary_color, &update.secondary_color]
            .into_iter()
            .flatten()
        {
            if !is_hex_color(color) {
                return Err(format!("Invalid color '{}', expected #rrggbb", color));
            }
        }
        if let Some(name) = &update.company_name {
            if name.trim().is_empty() {
                return Err("companyName cannot be empty".to_string());
            }
        }

        macro_rules! apply {
            ($($field:ident),*) => {
                $(if let Some(v) = update.$field { self.$field = v; })*
            };
        }
        apply!(company_name, tagline, primary_color, secondary_color, phone, email, address, hours, about_text);
        if let Some(logo) = update.logo {
            self.logo = Some(logo).filter(|l| !l.is_empty());
        }
        Ok(self)
    }
}

fn is_hex_color(s: &str) -> bool {
    s.len() == 7
        && s.starts_with('#')
        && s[1..].bytes().all(|b| b.is_ascii_hexdigit())
}
