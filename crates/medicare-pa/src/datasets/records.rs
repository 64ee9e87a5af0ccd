use serde::{Deserialize, Serialize};

/// One row of a CMS prior-authorization-required list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaRequiredEntry {
    pub hcpcs: String,
    pub list: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_date: Option<String>,
    /// Absent means the list applies nationally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub states: Option<Vec<String>>,
}

impl PaRequiredEntry {
    pub fn is_national(&self) -> bool {
        self.states.is_none()
    }

    pub fn applies_in(&self, state: &str) -> bool {
        match &self.states {
            None => true,
            Some(states) => states.iter().any(|s| s.eq_ignore_ascii_case(state)),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaRequiredDataset {
    pub codes: Vec<PaRequiredEntry>,
}

/// NCCI procedure-to-procedure edit pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PtpEdit {
    pub col1: String,
    pub col2: String,
    #[serde(default)]
    pub col1_desc: Option<String>,
    #[serde(default)]
    pub col2_desc: Option<String>,
    /// 1 when a modifier (e.g. -59) may unbundle the pair.
    pub modifier: u8,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub effective_date: Option<String>,
}

impl PtpEdit {
    pub fn pairs(&self, a: &str, b: &str) -> bool {
        (self.col1 == a && self.col2 == b) || (self.col1 == b && self.col2 == a)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PtpDataset {
    pub edits: Vec<PtpEdit>,
}

/// Medically unlikely edit: maximum units per beneficiary per day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MueEdit {
    pub cpt: String,
    pub mue_value: u32,
    #[serde(default)]
    pub adjudication_type: Option<String>,
    #[serde(default)]
    pub rationale: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MueDataset {
    pub edits: Vec<MueEdit>,
}

/// Entry on the self-administered drug exclusion list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SadListEntry {
    pub hcpcs: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contractor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SadListDataset {
    pub drugs: Vec<SadListEntry>,
}
