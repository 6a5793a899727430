use crate::error::Result;
use crate::parser::Cell;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct SubstringRule {
    #[schemars(description = "Fragment looked up case-insensitively anywhere in the label.")]
    #[serde(rename = "match")]
    pub pattern: String,

    #[schemars(description = "Canonical project name returned when the fragment is found.")]
    pub canonical: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct PrefixRule {
    #[schemars(description = "Literal, case-sensitive prefix of the label.")]
    pub prefix: String,

    pub canonical: String,
}

/// Ordered rule set mapping raw timesheet labels to canonical project names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct NormalizationRules {
    #[serde(default)]
    #[schemars(description = "Checked in order; the first matching fragment wins.")]
    pub substring_rules: Vec<SubstringRule>,

    #[serde(default)]
    #[schemars(
        description = "Position of the hyphen that ends a numeric project-code prefix (e.g. '000001-'). The prefix is stripped when the label is longer than the code. Null disables stripping."
    )]
    pub code_prefix_hyphen_index: Option<usize>,

    #[serde(default)]
    #[schemars(description = "Applied after prefix stripping to repair known export artifacts.")]
    pub prefix_rules: Vec<PrefixRule>,
}

impl Default for NormalizationRules {
    fn default() -> Self {
        let substring = |pattern: &str, canonical: &str| SubstringRule {
            pattern: pattern.to_string(),
            canonical: canonical.to_string(),
        };

        Self {
            substring_rules: vec![
                substring("doms and pos ingesting services", "Astron DOMS & POS Ingesting"),
                substring("glencore mobile tracking", "Mobile Warehouse Operations"),
                substring("psb to psd migration", "PSB to PSD Migration"),
                substring(
                    "stcms01-(tcms)transportation contract management system project",
                    "Sasol Contract Management System",
                ),
                substring(
                    "btt weighbridge",
                    "Mobile Arivals (Weighbridge Change request)",
                ),
            ],
            code_prefix_hyphen_index: Some(6),
            prefix_rules: vec![PrefixRule {
                prefix: "ges/No_image.jpg00000001-BD- ".to_string(),
                canonical: "BD- Project Stronghold".to_string(),
            }],
        }
    }
}

impl NormalizationRules {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone)]
pub struct NameNormalizer {
    rules: NormalizationRules,
    lowered_patterns: Vec<String>,
}

impl NameNormalizer {
    pub fn new(rules: NormalizationRules) -> Self {
        let lowered_patterns = rules
            .substring_rules
            .iter()
            .map(|r| r.pattern.to_lowercase())
            .collect();
        Self {
            rules,
            lowered_patterns,
        }
    }

    pub fn default_rules() -> Self {
        Self::new(NormalizationRules::default())
    }

    pub fn rules(&self) -> &NormalizationRules {
        &self.rules
    }

    /// Maps a raw label to its canonical project name. Never fails; labels no
    /// rule knows about only lose their numeric code prefix, if any.
    pub fn normalize(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return String::new();
        }

        let lowered = trimmed.to_lowercase();
        for (rule, pattern) in self.rules.substring_rules.iter().zip(&self.lowered_patterns) {
            if !pattern.is_empty() && lowered.contains(pattern.as_str()) {
                return rule.canonical.clone();
            }
        }

        let mut name = trimmed;
        if let Some(index) = self.rules.code_prefix_hyphen_index {
            name = strip_code_prefix(name, index);
        }

        for rule in &self.rules.prefix_rules {
            if name.starts_with(rule.prefix.as_str()) {
                return rule.canonical.trim().to_string();
            }
        }

        name.trim().to_string()
    }

    pub fn normalize_opt(&self, raw: Option<&str>) -> String {
        raw.map(|r| self.normalize(r)).unwrap_or_default()
    }

    pub fn normalize_cell(&self, cell: &Cell) -> String {
        match cell {
            Cell::Text(text) => self.normalize(text),
            Cell::Empty => String::new(),
            other => other.to_string().trim().to_string(),
        }
    }
}

impl Default for NameNormalizer {
    fn default() -> Self {
        Self::default_rules()
    }
}

fn strip_code_prefix(name: &str, hyphen_index: usize) -> &str {
    if name.chars().count() <= hyphen_index + 1 {
        return name;
    }
    match name.char_indices().nth(hyphen_index) {
        Some((offset, '-')) => name[offset + 1..].trim(),
        _ => name,
    }
}
