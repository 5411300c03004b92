// The five canonical topics every region is scored on.
//
// Upstream sources label them inconsistently: vector files use Korean labels
// ("주거/환경", sometimes without the slash), the region table uses English
// column names, and prompts want a readable English name. Each topic carries
// all of its known spellings so the reconciler can bridge them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalTopic {
    TransportInfra,
    LaborEconomy,
    Healthcare,
    PolicyEfficiency,
    HousingEnvironment,
}

impl CanonicalTopic {
    /// All topics in table column order. This order is the tie-break order
    /// for table-based gap ranking.
    pub const ALL: [CanonicalTopic; 5] = [
        CanonicalTopic::TransportInfra,
        CanonicalTopic::LaborEconomy,
        CanonicalTopic::Healthcare,
        CanonicalTopic::PolicyEfficiency,
        CanonicalTopic::HousingEnvironment,
    ];

    /// Column / key name used by the region table and gap table.
    pub fn key(&self) -> &'static str {
        match self {
            CanonicalTopic::TransportInfra => "transport_infra",
            CanonicalTopic::LaborEconomy => "labor_economy",
            CanonicalTopic::Healthcare => "healthcare",
            CanonicalTopic::PolicyEfficiency => "policy_efficiency",
            CanonicalTopic::HousingEnvironment => "housing_environment",
        }
    }

    /// Korean label as it appears in sentiment vector files.
    pub fn korean(&self) -> &'static str {
        match self {
            CanonicalTopic::TransportInfra => "인프라/교통",
            CanonicalTopic::LaborEconomy => "노동/경제",
            CanonicalTopic::Healthcare => "의료/보건",
            CanonicalTopic::PolicyEfficiency => "정책효능감",
            CanonicalTopic::HousingEnvironment => "주거/환경",
        }
    }

    /// Readable English name.
    pub fn english(&self) -> &'static str {
        match self {
            CanonicalTopic::TransportInfra => "Transport Infra",
            CanonicalTopic::LaborEconomy => "Labor Economy",
            CanonicalTopic::Healthcare => "Healthcare",
            CanonicalTopic::PolicyEfficiency => "Policy Efficiency",
            CanonicalTopic::HousingEnvironment => "Housing Environment",
        }
    }

    /// Every known spelling, used as reconciliation targets.
    pub fn aliases(&self) -> Vec<&'static str> {
        let mut aliases = vec![self.key(), self.korean(), self.english()];
        // Older files swap the order of the two halves of the Korean label
        // (교통인프라 vs 인프라/교통).
        match self {
            CanonicalTopic::TransportInfra => aliases.push("교통인프라"),
            CanonicalTopic::LaborEconomy => aliases.push("노동경제"),
            CanonicalTopic::Healthcare => aliases.push("보건의료"),
            CanonicalTopic::PolicyEfficiency => aliases.push("정책 효능감"),
            CanonicalTopic::HousingEnvironment => aliases.push("주거환경"),
        }
        aliases
    }

    /// Find the canonical topic a label refers to, if any.
    pub fn from_label(label: &str) -> Option<CanonicalTopic> {
        let wanted = super::reconcile::normalize_label(label);
        Self::ALL.into_iter().find(|topic| {
            topic
                .aliases()
                .iter()
                .any(|alias| super::reconcile::normalize_label(alias) == wanted)
        })
    }
}

/// Reconciliation targets for an arbitrary topic label: every spelling of its
/// canonical topic, or just the label itself when it isn't canonical.
pub fn aliases_for(label: &str) -> Vec<String> {
    match CanonicalTopic::from_label(label) {
        Some(topic) => topic.aliases().into_iter().map(str::to_string).collect(),
        None => vec![label.to_string()],
    }
}

impl std::fmt::Display for CanonicalTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.korean())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_label_accepts_every_spelling() {
        assert_eq!(
            CanonicalTopic::from_label("인프라/교통"),
            Some(CanonicalTopic::TransportInfra)
        );
        assert_eq!(
            CanonicalTopic::from_label("교통인프라"),
            Some(CanonicalTopic::TransportInfra)
        );
        assert_eq!(
            CanonicalTopic::from_label("HOUSING_environment"),
            Some(CanonicalTopic::HousingEnvironment)
        );
        assert_eq!(
            CanonicalTopic::from_label(" Policy Efficiency "),
            Some(CanonicalTopic::PolicyEfficiency)
        );
    }

    #[test]
    fn test_from_label_unknown() {
        assert_eq!(CanonicalTopic::from_label("sports"), None);
    }

    #[test]
    fn test_keys_are_unique() {
        let keys: std::collections::HashSet<_> =
            CanonicalTopic::ALL.iter().map(|t| t.key()).collect();
        assert_eq!(keys.len(), 5);
    }

    #[test]
    fn test_aliases_for_unknown_label_is_itself() {
        assert_eq!(aliases_for("sports"), vec!["sports".to_string()]);
        assert!(aliases_for("인프라/교통").contains(&"transport_infra".to_string()));
    }
}
