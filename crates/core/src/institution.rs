//! Structured institution metadata rendered into the system prompt.
//!
//! Field names and enum values accept both the English spellings and the
//! Romanian keys stored by the admin layer (`primarie`, `simplu`, ...).

use serde::{Deserialize, Deserializer, Serialize};

/// Everything the admin layer knows about a tenant's institution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstitutionProfile {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default, rename = "type", alias = "kind")]
    pub kind: InstitutionKind,

    #[serde(flatten)]
    pub contact: ContactInfo,

    #[serde(default)]
    pub working_hours: Option<WorkingHours>,

    #[serde(default)]
    pub services: Vec<String>,

    #[serde(default)]
    pub fees: Vec<Fee>,

    #[serde(default)]
    pub responsibilities: Vec<String>,

    #[serde(default)]
    pub policies: Option<ResponsePolicies>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstitutionKind {
    #[serde(alias = "primarie")]
    CityHall,
    #[serde(alias = "scoala")]
    School,
    #[serde(alias = "ong")]
    Ngo,
    #[serde(alias = "companie")]
    Company,
    #[serde(alias = "dsp")]
    PublicHealth,
    #[default]
    #[serde(other)]
    Other,
}

impl InstitutionKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::CityHall => "City Hall",
            Self::School => "School",
            Self::Ngo => "NGO",
            Self::Company => "Company",
            Self::PublicHealth => "Public Health Directorate",
            Self::Other => "Institution",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

impl ContactInfo {
    /// Non-empty contact lines as `(label, value)`, in display order.
    pub fn lines(&self) -> Vec<(&'static str, &str)> {
        [
            ("Address", &self.address),
            ("Phone", &self.phone),
            ("Email", &self.email),
            ("Website", &self.website),
        ]
        .into_iter()
        .filter_map(|(label, value)| {
            value
                .as_deref()
                .filter(|v| !v.trim().is_empty())
                .map(|v| (label, v))
        })
        .collect()
    }
}

/// Opening hours per weekday, free-form (e.g. `"08:00-16:00"`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingHours {
    #[serde(default)]
    pub monday: Option<String>,
    #[serde(default)]
    pub tuesday: Option<String>,
    #[serde(default)]
    pub wednesday: Option<String>,
    #[serde(default)]
    pub thursday: Option<String>,
    #[serde(default)]
    pub friday: Option<String>,
    #[serde(default)]
    pub saturday: Option<String>,
    #[serde(default)]
    pub sunday: Option<String>,
}

impl WorkingHours {
    /// Days with hours set, Monday first.
    pub fn days(&self) -> Vec<(&'static str, &str)> {
        [
            ("Monday", &self.monday),
            ("Tuesday", &self.tuesday),
            ("Wednesday", &self.wednesday),
            ("Thursday", &self.thursday),
            ("Friday", &self.friday),
            ("Saturday", &self.saturday),
            ("Sunday", &self.sunday),
        ]
        .into_iter()
        .filter_map(|(day, hours)| {
            hours
                .as_deref()
                .filter(|h| !h.trim().is_empty())
                .map(|h| (day, h))
        })
        .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    #[serde(default)]
    pub service: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub amount: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Amounts arrive as `"50 lei"` or as a bare number.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsePolicies {
    #[serde(default)]
    pub tone: Option<Tone>,
    #[serde(default)]
    pub detail_level: Option<DetailLevel>,
    /// ISO 639-1 code such as `"ro"`; unknown codes are rendered verbatim.
    #[serde(default)]
    pub language: Option<String>,
}

impl ResponsePolicies {
    pub fn is_empty(&self) -> bool {
        self.tone.is_none()
            && self.detail_level.is_none()
            && self.language.as_deref().is_none_or(|l| l.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Tone {
    Formal,
    Simple,
    Friendly,
    Professional,
    Other(String),
}

impl From<String> for Tone {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "formal" => Self::Formal,
            "simple" | "simplu" => Self::Simple,
            "friendly" | "prietenos" => Self::Friendly,
            "professional" | "profesionist" => Self::Professional,
            _ => Self::Other(s),
        }
    }
}

impl From<Tone> for String {
    fn from(tone: Tone) -> Self {
        match tone {
            Tone::Formal => "formal".into(),
            Tone::Simple => "simple".into(),
            Tone::Friendly => "friendly".into(),
            Tone::Professional => "professional".into(),
            Tone::Other(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DetailLevel {
    Short,
    Medium,
    Detailed,
    Other(String),
}

impl From<String> for DetailLevel {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "short" | "scurt" => Self::Short,
            "medium" | "mediu" => Self::Medium,
            "detailed" | "detaliat" => Self::Detailed,
            _ => Self::Other(s),
        }
    }
}

impl From<DetailLevel> for String {
    fn from(level: DetailLevel) -> Self {
        match level {
            DetailLevel::Short => "short".into(),
            DetailLevel::Medium => "medium".into(),
            DetailLevel::Detailed => "detailed".into(),
            DetailLevel::Other(s) => s,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_admin_layer_json() {
        let json = serde_json::json!({
            "name": "Cluj-Napoca",
            "type": "primarie",
            "address": "Str. Moților 3",
            "phone": "0264 596 030",
            "working_hours": {"monday": "08:00-16:00", "friday": "08:00-13:00"},
            "services": ["Urbanism", "Stare civilă"],
            "fees": [{"service": "Certificat", "amount": 50}],
            "policies": {"tone": "prietenos", "detail_level": "scurt", "language": "ro"}
        });
        let profile: InstitutionProfile = serde_json::from_value(json).unwrap();
        assert_eq!(profile.kind, InstitutionKind::CityHall);
        assert_eq!(profile.contact.lines().len(), 2);
        assert_eq!(profile.fees[0].amount, "50");
        let policies = profile.policies.unwrap();
        assert_eq!(policies.tone, Some(Tone::Friendly));
        assert_eq!(policies.detail_level, Some(DetailLevel::Short));
    }

    #[test]
    fn unknown_kind_and_tone_are_tolerated() {
        let json = serde_json::json!({"type": "spital", "policies": {"tone": "poetic"}});
        let profile: InstitutionProfile = serde_json::from_value(json).unwrap();
        assert_eq!(profile.kind, InstitutionKind::Other);
        assert_eq!(
            profile.policies.unwrap().tone,
            Some(Tone::Other("poetic".into()))
        );
    }

    #[test]
    fn working_hours_are_listed_monday_first() {
        let hours = WorkingHours {
            sunday: Some("closed".into()),
            monday: Some("9-17".into()),
            wednesday: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(hours.days(), vec![("Monday", "9-17"), ("Sunday", "closed")]);
    }

    #[test]
    fn empty_policies() {
        assert!(ResponsePolicies::default().is_empty());
        let policies = ResponsePolicies {
            language: Some("en".into()),
            ..Default::default()
        };
        assert!(!policies.is_empty());
    }
}
