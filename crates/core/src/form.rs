//! Form-field descriptors sent by the page the user is chatting from.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub required: bool,
}

/// An active form on the user's page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormContext {
    /// Full descriptors with options and required markers.
    Detailed(Vec<FormField>),
    /// Only field names are known.
    Names(Vec<String>),
}

/// Page context as posted by the web client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageContext {
    #[serde(default)]
    pub has_form: bool,
    #[serde(default)]
    pub fields_detailed: Vec<FormField>,
    #[serde(default)]
    pub form_fields: Vec<String>,
}

impl PageContext {
    /// `None` unless the page signals an active form. Detailed descriptors
    /// win over bare names when both are present.
    pub fn form_context(self) -> Option<FormContext> {
        if !self.has_form {
            return None;
        }
        if self.fields_detailed.is_empty() {
            Some(FormContext::Names(self.form_fields))
        } else {
            Some(FormContext::Detailed(self.fields_detailed))
        }
    }
}
