// =============================================================================
// RULE — Règles de conversion entre deux catégorisations
// =============================================================================
//
// Une règle dit : "ces catégories de A, avec ces facteurs, correspondent à
// ces catégories de B, avec ces facteurs".
//
//   1.A + 1.B  ↔  1            (deux catégories de A = une de B)
//   2          ↔  2.A - 2.A.1  (facteur négatif)
//
// Optionnellement restreinte à certaines catégories AUXILIAIRES :
//
//   1.A  ↔  1.A.i     seulement pour gas ∈ {CO2}
//
// Deux formes, comme pour les catégorisations :
//
//   ConversionRuleSpec : codes bruts + facteurs entiers (une ligne de fichier)
//   ConversionRule     : catégories résolues ("hydratées") dans A, B et les
//                        catégorisations auxiliaires
//
// Une ligne source est découpée en champs :
//
//   formule A | codes auxiliaires (×n) | formule B | [commentaire]
//
// =============================================================================

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::categorization::Categorization;
use super::category::Category;
use super::error::RuleError;
use super::formula::{format_aux_codes, format_factors, parse_aux_codes, parse_formula};
use super::registry::CategorizationRegistry;

/// Une règle sous forme de codes, telle que lue dans un fichier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionRuleSpec {
    pub factors_categories_a: BTreeMap<String, i32>,
    pub factors_categories_b: BTreeMap<String, i32>,
    /// Catégorisation auxiliaire → codes autorisés. Absente = pas de restriction.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub auxiliary_categories: BTreeMap<String, BTreeSet<String>>,
    #[serde(default)]
    pub comment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv_line_number: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv_original_text: Option<String>,
}

impl ConversionRuleSpec {
    pub fn new(
        factors_categories_a: BTreeMap<String, i32>,
        factors_categories_b: BTreeMap<String, i32>,
    ) -> Self {
        ConversionRuleSpec {
            factors_categories_a,
            factors_categories_b,
            ..Default::default()
        }
    }

    /// Construit une règle à partir de deux formules.
    pub fn from_formulas(formula_a: &str, formula_b: &str) -> Result<Self, RuleError> {
        Ok(Self::new(parse_formula(formula_a)?, parse_formula(formula_b)?))
    }

    /// Restreint la règle à `codes` dans la catégorisation auxiliaire
    /// `categorization`. Une liste vide ne restreint rien.
    pub fn auxiliary(mut self, categorization: &str, codes: &[&str]) -> Self {
        if !codes.is_empty() {
            self.auxiliary_categories.insert(
                categorization.to_string(),
                codes.iter().map(|c| c.to_string()).collect(),
            );
        }
        self
    }

    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = comment.to_string();
        self
    }

    /// Analyse une ligne déjà découpée en champs.
    ///
    /// La ligne contient la formule A, un champ par catégorisation
    /// auxiliaire (vide = pas de restriction), la formule B, puis un
    /// commentaire optionnel. Toute erreur est rattachée à `line_number`
    /// s'il est fourni.
    pub fn from_csv_row<S, N>(
        row: &[S],
        aux_names: &[N],
        line_number: Option<usize>,
    ) -> Result<Self, RuleError>
    where
        S: AsRef<str>,
        N: AsRef<str>,
    {
        Self::parse_row(row, aux_names, line_number).map_err(|err| match line_number {
            Some(line) => err.at_line(line),
            None => err,
        })
    }

    fn parse_row<S, N>(
        row: &[S],
        aux_names: &[N],
        line_number: Option<usize>,
    ) -> Result<Self, RuleError>
    where
        S: AsRef<str>,
        N: AsRef<str>,
    {
        let n_aux = aux_names.len();
        if row.len() != n_aux + 2 && row.len() != n_aux + 3 {
            return Err(RuleError::RowLength {
                expected: n_aux + 2,
                found: row.len(),
            });
        }

        let factors_categories_a = parse_formula(row[0].as_ref())?;
        let factors_categories_b = parse_formula(row[n_aux + 1].as_ref())?;

        let mut auxiliary_categories = BTreeMap::new();
        for (name, field) in aux_names.iter().zip(&row[1..=n_aux]) {
            let codes = parse_aux_codes(field.as_ref())?;
            if !codes.is_empty() {
                auxiliary_categories.insert(name.as_ref().to_string(), codes.into_iter().collect());
            }
        }

        let comment = row
            .get(n_aux + 2)
            .map(|c| c.as_ref().trim().to_string())
            .unwrap_or_default();

        Ok(ConversionRuleSpec {
            factors_categories_a,
            factors_categories_b,
            auxiliary_categories,
            comment,
            csv_line_number: line_number,
            csv_original_text: Some(join_csv_fields(row)),
        })
    }

    /// L'inverse de `from_csv_row` : les champs d'une ligne, dans l'ordre
    /// des catégorisations auxiliaires `aux_names`.
    pub fn to_csv_row<N: AsRef<str>>(&self, aux_names: &[N]) -> Vec<String> {
        let mut row = Vec::with_capacity(aux_names.len() + 3);
        row.push(self.formula_a());
        for name in aux_names {
            row.push(
                self.auxiliary_categories
                    .get(name.as_ref())
                    .map(|codes| format_aux_codes(codes))
                    .unwrap_or_default(),
            );
        }
        row.push(self.formula_b());
        if !self.comment.is_empty() {
            row.push(self.comment.clone());
        }
        row
    }

    pub fn formula_a(&self) -> String {
        format_factors(&self.factors_categories_a)
    }

    pub fn formula_b(&self) -> String {
        format_factors(&self.factors_categories_b)
    }

    /// La même règle, lue de B vers A.
    pub fn reversed(&self) -> Self {
        ConversionRuleSpec {
            factors_categories_a: self.factors_categories_b.clone(),
            factors_categories_b: self.factors_categories_a.clone(),
            ..self.clone()
        }
    }

    /// Résout tous les codes en catégories.
    pub fn hydrate(
        &self,
        categorization_a: &Categorization,
        categorization_b: &Categorization,
        registry: &CategorizationRegistry,
    ) -> Result<ConversionRule, RuleError> {
        self.resolve(categorization_a, categorization_b, registry)
            .map_err(|err| match self.csv_line_number {
                Some(line) => err.at_line(line),
                None => err,
            })
    }

    fn resolve(
        &self,
        categorization_a: &Categorization,
        categorization_b: &Categorization,
        registry: &CategorizationRegistry,
    ) -> Result<ConversionRule, RuleError> {
        let mut auxiliary_categories = BTreeMap::new();
        for (name, codes) in &self.auxiliary_categories {
            if codes.is_empty() {
                continue;
            }
            let auxiliary = registry
                .get(name)
                .ok_or_else(|| RuleError::UnknownAuxiliaryCategorization { name: name.clone() })?;
            let categories = codes
                .iter()
                .map(|code| auxiliary.category(code).cloned())
                .collect::<Result<Vec<_>, _>>()?;
            auxiliary_categories.insert(name.clone(), categories);
        }

        Ok(ConversionRule {
            factors_categories_a: resolve_factors(&self.factors_categories_a, categorization_a)?,
            factors_categories_b: resolve_factors(&self.factors_categories_b, categorization_b)?,
            auxiliary_categories,
            comment: self.comment.clone(),
            csv_line_number: self.csv_line_number,
            csv_original_text: self.csv_original_text.clone(),
        })
    }
}

/// Codes → catégories. Deux codes d'une même catégorie additionnent leurs
/// facteurs.
fn resolve_factors(
    factors: &BTreeMap<String, i32>,
    categorization: &Categorization,
) -> Result<Vec<(Category, i32)>, RuleError> {
    let mut resolved: Vec<(Category, i32)> = Vec::with_capacity(factors.len());
    for (code, &factor) in factors {
        let category = categorization.category(code)?;
        match resolved.iter_mut().find(|(known, _)| known.code() == category.code()) {
            Some((_, total)) => *total += factor,
            None => resolved.push((category.clone(), factor)),
        }
    }
    Ok(resolved)
}

/// Recolle les champs avec la virgule du fichier source, en échappant
/// virgules et barres obliques inverses.
pub(crate) fn join_csv_fields<S: AsRef<str>>(row: &[S]) -> String {
    row.iter()
        .map(|field| {
            let mut escaped = String::with_capacity(field.as_ref().len());
            for c in field.as_ref().chars() {
                if c == ',' || c == '\\' {
                    escaped.push('\\');
                }
                escaped.push(c);
            }
            escaped
        })
        .collect::<Vec<_>>()
        .join(",")
}

impl PartialEq for ConversionRuleSpec {
    /// La provenance (ligne, texte d'origine) n'entre pas dans l'égalité.
    fn eq(&self, other: &Self) -> bool {
        self.factors_categories_a == other.factors_categories_a
            && self.factors_categories_b == other.factors_categories_b
            && self.auxiliary_categories == other.auxiliary_categories
            && self.comment == other.comment
    }
}

/// Nombre de catégories d'un côté d'une règle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Cardinality {
    One,
    Many,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cardinality::One => write!(f, "one"),
            Cardinality::Many => write!(f, "many"),
        }
    }
}

/// Une règle hydratée : les codes sont devenus des catégories.
#[derive(Debug, Clone)]
pub struct ConversionRule {
    pub factors_categories_a: Vec<(Category, i32)>,
    pub factors_categories_b: Vec<(Category, i32)>,
    /// Nom de la catégorisation auxiliaire → catégories autorisées (jamais vide).
    pub auxiliary_categories: BTreeMap<String, Vec<Category>>,
    pub comment: String,
    pub csv_line_number: Option<usize>,
    pub csv_original_text: Option<String>,
}

fn cardinality(factors: &[(Category, i32)]) -> Cardinality {
    if factors.iter().filter(|(_, f)| *f != 0).count() == 1 {
        Cardinality::One
    } else {
        Cardinality::Many
    }
}

impl ConversionRule {
    /// Re-sérialise la règle avec les codes canoniques.
    pub fn to_spec(&self) -> ConversionRuleSpec {
        let codes = |factors: &[(Category, i32)]| -> BTreeMap<String, i32> {
            factors
                .iter()
                .map(|(c, f)| (c.code().to_string(), *f))
                .collect()
        };
        ConversionRuleSpec {
            factors_categories_a: codes(&self.factors_categories_a),
            factors_categories_b: codes(&self.factors_categories_b),
            auxiliary_categories: self
                .auxiliary_categories
                .iter()
                .map(|(name, categories)| {
                    (
                        name.clone(),
                        categories.iter().map(|c| c.code().to_string()).collect(),
                    )
                })
                .collect(),
            comment: self.comment.clone(),
            csv_line_number: self.csv_line_number,
            csv_original_text: self.csv_original_text.clone(),
        }
    }

    pub fn cardinality_a(&self) -> Cardinality {
        cardinality(&self.factors_categories_a)
    }

    pub fn cardinality_b(&self) -> Cardinality {
        cardinality(&self.factors_categories_b)
    }

    /// Vrai si la règle vaut pour toutes les catégories auxiliaires.
    pub fn is_unrestricted(&self) -> bool {
        self.auxiliary_categories.is_empty()
    }

    /// Vrai si tous les facteurs, des deux côtés, valent +1.
    pub fn has_unit_factors(&self) -> bool {
        self.factors_categories_a
            .iter()
            .chain(&self.factors_categories_b)
            .all(|(_, f)| *f == 1)
    }

    pub fn reversed(&self) -> Self {
        ConversionRule {
            factors_categories_a: self.factors_categories_b.clone(),
            factors_categories_b: self.factors_categories_a.clone(),
            ..self.clone()
        }
    }

    /// Description sur plusieurs lignes, pour les rapports.
    ///
    /// ```text
    /// Seulement pour gas ∈ [CO2]
    ///  + A: 1.A Category 1.A
    /// ⮁
    ///  + B: 1 Category 1
    ///   # Commentaire : "total"
    /// ```
    pub fn format_human_readable(&self) -> String {
        let mut out = String::new();
        if !self.auxiliary_categories.is_empty() {
            let restrictions: Vec<String> = self
                .auxiliary_categories
                .iter()
                .map(|(name, categories)| {
                    let codes: Vec<&str> = categories.iter().map(|c| c.code()).collect();
                    format!("{} ∈ [{}]", name, codes.join(", "))
                })
                .collect();
            out.push_str(&format!("Seulement pour {}\n", restrictions.join(" et ")));
        }
        write_side(&mut out, &self.factors_categories_a);
        out.push_str("⮁\n");
        write_side(&mut out, &self.factors_categories_b);
        if !self.comment.is_empty() {
            out.push_str(&format!("  # Commentaire : {:?}\n", self.comment));
        }
        out
    }
}

fn write_side(out: &mut String, factors: &[(Category, i32)]) {
    for (category, factor) in factors {
        let sign = match factor {
            1 => "+".to_string(),
            -1 => "-".to_string(),
            f => format!("{:+}", f),
        };
        out.push_str(&format!(" {} {}: {}\n", sign, category.categorization(), category));
    }
}

impl PartialEq for ConversionRule {
    fn eq(&self, other: &Self) -> bool {
        self.factors_categories_a == other.factors_categories_a
            && self.factors_categories_b == other.factors_categories_b
            && self.auxiliary_categories == other.auxiliary_categories
            && self.comment == other.comment
    }
}

impl fmt::Display for ConversionRule {
    /// Forme compacte sur une ligne : `1.A + 1.B ↔ 1`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let spec = self.to_spec();
        write!(f, "{} ↔ {}", spec.formula_a(), spec.formula_b())
    }
}
