// =============================================================================
// CONVERSION — Un ensemble de règles entre deux catégorisations
// =============================================================================
//
// Une conversion relie une catégorisation A à une catégorisation B (et
// éventuellement à des catégorisations auxiliaires) par une liste ordonnée
// de règles.
//
//   ConversionSpec : noms des catégorisations + règles en codes + métadonnées
//   Conversion     : les catégorisations résolues (Arc) + règles hydratées
//
// Le cycle de vie est un pipeline à sens unique :
//
//   texte source → ConversionSpec → hydrate(registre) → Conversion → requêtes
//
// Les requêtes (describe_detailed, find_over_counting_problems) ne modifient
// rien.
//
// =============================================================================

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::categorization::Categorization;
use super::category::Category;
use super::error::ConversionError;
use super::registry::CategorizationRegistry;
use super::rule::{Cardinality, ConversionRule, ConversionRuleSpec};

/// Une conversion sous forme de noms et de codes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionSpec {
    pub categorization_a_name: String,
    pub categorization_b_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub auxiliary_categorizations_names: Vec<String>,
    pub rules: Vec<ConversionRuleSpec>,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub references: String,
    #[serde(default)]
    pub institution: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ConversionSpec {
    pub fn new(categorization_a_name: &str, categorization_b_name: &str) -> Self {
        ConversionSpec {
            categorization_a_name: categorization_a_name.to_string(),
            categorization_b_name: categorization_b_name.to_string(),
            auxiliary_categorizations_names: Vec::new(),
            rules: Vec::new(),
            comment: String::new(),
            references: String::new(),
            institution: String::new(),
            last_update: None,
            version: None,
        }
    }

    pub fn auxiliary_categorization(mut self, name: &str) -> Self {
        self.auxiliary_categorizations_names.push(name.to_string());
        self
    }

    pub fn rule(mut self, rule: ConversionRuleSpec) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = comment.to_string();
        self
    }

    /// Résout les noms de catégorisations dans `registry` et hydrate
    /// chaque règle. La première règle invalide arrête l'hydratation.
    pub fn hydrate(
        &self,
        registry: &CategorizationRegistry,
    ) -> Result<Conversion, ConversionError> {
        let lookup = |name: &str| {
            registry
                .get(name)
                .ok_or_else(|| ConversionError::UnknownCategorization {
                    name: name.to_string(),
                })
        };
        let categorization_a = lookup(self.categorization_a_name.as_str())?;
        let categorization_b = lookup(self.categorization_b_name.as_str())?;
        let auxiliary_categorizations = self
            .auxiliary_categorizations_names
            .iter()
            .map(|name| lookup(name.as_str()))
            .collect::<Result<Vec<_>, _>>()?;

        let rules = self
            .rules
            .iter()
            .map(|rule| rule.hydrate(&categorization_a, &categorization_b, registry))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            a = %self.categorization_a_name,
            b = %self.categorization_b_name,
            rules = rules.len(),
            "conversion hydratée"
        );

        Ok(Conversion {
            categorization_a,
            categorization_b,
            auxiliary_categorizations,
            rules,
            comment: self.comment.clone(),
            references: self.references.clone(),
            institution: self.institution.clone(),
            last_update: self.last_update,
            version: self.version.clone(),
        })
    }

    /// La même conversion, lue de B vers A.
    pub fn reversed(&self) -> Self {
        ConversionSpec {
            categorization_a_name: self.categorization_b_name.clone(),
            categorization_b_name: self.categorization_a_name.clone(),
            rules: self.rules.iter().map(ConversionRuleSpec::reversed).collect(),
            ..self.clone()
        }
    }
}

/// Une conversion hydratée.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub categorization_a: Arc<Categorization>,
    pub categorization_b: Arc<Categorization>,
    pub auxiliary_categorizations: Vec<Arc<Categorization>>,
    pub rules: Vec<ConversionRule>,
    pub comment: String,
    pub references: String,
    pub institution: String,
    pub last_update: Option<NaiveDate>,
    pub version: Option<String>,
}

impl Conversion {
    /// Conversion sans métadonnées à partir de règles déjà hydratées.
    pub fn new(
        categorization_a: Arc<Categorization>,
        categorization_b: Arc<Categorization>,
        rules: Vec<ConversionRule>,
        auxiliary_categorizations: Vec<Arc<Categorization>>,
    ) -> Self {
        Conversion {
            categorization_a,
            categorization_b,
            auxiliary_categorizations,
            rules,
            comment: String::new(),
            references: String::new(),
            institution: String::new(),
            last_update: None,
            version: None,
        }
    }

    pub fn to_spec(&self) -> ConversionSpec {
        ConversionSpec {
            categorization_a_name: self.categorization_a.name().to_string(),
            categorization_b_name: self.categorization_b.name().to_string(),
            auxiliary_categorizations_names: self
                .auxiliary_categorizations
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
            rules: self.rules.iter().map(ConversionRule::to_spec).collect(),
            comment: self.comment.clone(),
            references: self.references.clone(),
            institution: self.institution.clone(),
            last_update: self.last_update,
            version: self.version.clone(),
        }
    }

    pub fn reversed(&self) -> Self {
        Conversion {
            categorization_a: Arc::clone(&self.categorization_b),
            categorization_b: Arc::clone(&self.categorization_a),
            rules: self.rules.iter().map(ConversionRule::reversed).collect(),
            ..self.clone()
        }
    }

    /// Description détaillée pour relecture humaine : les règles rangées
    /// selon leur cardinalité, puis les catégories qu'aucune règle ne cite.
    ///
    /// Les catégories non couvertes ne sont pas une erreur, seulement une
    /// information.
    pub fn describe_detailed(&self) -> String {
        let a = &self.categorization_a;
        let b = &self.categorization_b;
        let mut out = format!("# Correspondance entre {} et {}\n\n", a, b);

        let buckets = [
            (Cardinality::One, Cardinality::One, "## Correspondances une à une\n\n".to_string()),
            (
                Cardinality::One,
                Cardinality::Many,
                format!("## Une catégorie de {} vers plusieurs de {}\n\n", a, b),
            ),
            (
                Cardinality::Many,
                Cardinality::One,
                format!("## Plusieurs catégories de {} vers une de {}\n\n", a, b),
            ),
            (Cardinality::Many, Cardinality::Many, "## Plusieurs à plusieurs\n\n".to_string()),
        ];
        for (cardinality_a, cardinality_b, heading) in buckets {
            out.push_str(&heading);
            for rule in &self.rules {
                if rule.cardinality_a() == cardinality_a && rule.cardinality_b() == cardinality_b {
                    out.push_str(&rule.format_human_readable());
                    out.push('\n');
                }
            }
        }

        out.push_str("## Catégories non couvertes\n\n");
        let used_a = used_codes(self.rules.iter().map(|r| &r.factors_categories_a));
        let used_b = used_codes(self.rules.iter().map(|r| &r.factors_categories_b));
        for (categorization, used) in [(a, used_a), (b, used_b)] {
            let mut unmapped: Vec<String> = categorization
                .values()
                .filter(|c| !used.contains(c.code()))
                .map(Category::to_string)
                .collect();
            unmapped.sort();
            out.push_str(&format!("### {}\n", categorization));
            out.push_str(&unmapped.join("\n"));
            out.push_str("\n\n");
        }

        out
    }
}

fn used_codes<'a, I>(sides: I) -> BTreeSet<&'a str>
where
    I: Iterator<Item = &'a Vec<(Category, i32)>>,
{
    sides
        .flat_map(|side| side.iter().map(|(c, _)| c.code()))
        .collect()
}

impl fmt::Display for Conversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Conversion {} ⟷ {} ({} règles)",
            self.categorization_a,
            self.categorization_b,
            self.rules.len()
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::categorization::CategorizationSpec;
    use crate::core::category::CategorySpec;
    use crate::core::error::{CategorizationError, RuleError};
    use pretty_assertions::assert_eq;

    fn registry() -> CategorizationRegistry {
        let a = CategorizationSpec::new("A", "A")
            .category("1", CategorySpec::new("one"))
            .category("2", CategorySpec::new("two"))
            .category("3", CategorySpec::new("three"))
            .category("9", CategorySpec::new("nine"));
        let b = CategorizationSpec::new("B", "B")
            .category("x", CategorySpec::new("ex"))
            .category("y", CategorySpec::new("why"))
            .category("z", CategorySpec::new("zed"))
            .category("w", CategorySpec::new("double-u"));
        let gas = CategorizationSpec::new("gas", "gas")
            .category("CO2", CategorySpec::new("Carbon dioxide"));
        CategorizationRegistry::from_specs([&a, &b, &gas]).unwrap()
    }

    fn rule(a: &str, b: &str) -> ConversionRuleSpec {
        ConversionRuleSpec::from_formulas(a, b).unwrap()
    }

    fn spec() -> ConversionSpec {
        ConversionSpec::new("A", "B")
            .auxiliary_categorization("gas")
            .comment("test conversion")
            .rule(rule("1", "x").comment("direct"))
            .rule(rule("2", "y + z"))
            .rule(rule("2 + 3", "y").auxiliary("gas", &["CO2"]))
            .rule(rule("1 + 3", "y + z"))
    }

    #[test]
    fn test_hydrate_roundtrip() {
        let registry = registry();
        let conversion = spec().hydrate(&registry).unwrap();
        assert_eq!(conversion.categorization_a.name(), "A");
        assert_eq!(conversion.auxiliary_categorizations.len(), 1);
        assert_eq!(conversion.rules.len(), 4);
        assert_eq!(conversion.comment, "test conversion");
        assert_eq!(conversion.to_spec(), spec());
        assert_eq!(conversion.to_string(), "Conversion A ⟷ B (4 règles)");
    }

    #[test]
    fn test_hydrate_unknown_categorization() {
        let registry = registry();
        let err = ConversionSpec::new("A", "C").hydrate(&registry).unwrap_err();
        assert_eq!(err, ConversionError::UnknownCategorization { name: "C".into() });
    }

    #[test]
    fn test_hydrate_unknown_code() {
        let registry = registry();
        let err = ConversionSpec::new("A", "B")
            .rule(rule("4", "x"))
            .hydrate(&registry)
            .unwrap_err();
        assert_eq!(
            err,
            ConversionError::Rule(RuleError::Category(CategorizationError::UnknownCode {
                categorization: "A".into(),
                code: "4".into(),
            }))
        );
    }

    #[test]
    fn test_reversed() {
        let registry = registry();
        let conversion = spec().hydrate(&registry).unwrap();
        let reversed = conversion.reversed();
        assert_eq!(reversed.categorization_a.name(), "B");
        assert_eq!(reversed.to_spec(), spec().reversed());
        assert_eq!(reversed.reversed().to_spec(), spec());
    }

    #[test]
    fn test_describe_detailed() {
        let registry = registry();
        let conversion = spec().hydrate(&registry).unwrap();
        let expected = "\
# Correspondance entre A et B

## Correspondances une à une

 + A: 1 one
⮁
 + B: x ex
  # Commentaire : \"direct\"

## Une catégorie de A vers plusieurs de B

 + A: 2 two
⮁
 + B: y why
 + B: z zed

## Plusieurs catégories de A vers une de B

Seulement pour gas ∈ [CO2]
 + A: 2 two
 + A: 3 three
⮁
 + B: y why

## Plusieurs à plusieurs

 + A: 1 one
 + A: 3 three
⮁
 + B: y why
 + B: z zed

## Catégories non couvertes

### A
9 nine

### B
w double-u

";
        assert_eq!(conversion.describe_detailed(), expected);
    }
}
