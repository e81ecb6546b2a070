// =============================================================================
// CATEGORY — Une entrée d'une catégorisation
// =============================================================================
//
// Une catégorie est identifiée par une liste NON VIDE de codes :
//   - le premier code est le code CANONIQUE (celui qu'on écrit en sortie)
//   - les suivants sont des codes alternatifs ("1A" et "1a", "0" et "TOTAL")
//
// Elle porte un titre, un commentaire optionnel, des informations libres
// (`info`) et le nom de la catégorisation qui la possède.
//
// ÉGALITÉ : deux catégories sont égales si
//   1. elles partagent AU MOINS un code, ET
//   2. elles appartiennent à la même catégorisation, ou à deux
//      catégorisations dont l'une étend l'autre (le nom de l'une est un
//      préfixe du nom de l'autre : "IPCC2006" et "IPCC2006_PRIMAP").
//
// Cette relation n'est pas transitive, donc pas de `Eq` ni de `Hash` :
// les algorithmes ensemblistes travaillent sur les codes canoniques.
//
// EXEMPLE :
//
//   SimpleCat["1"]  codes = ("1", "A", "CatA")   titre = "Category 1"
//   SimpleCat["A"]  → la même catégorie
//   format!("{}", SimpleCat["1"]) == "1 Category 1"
//
// =============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Une catégorie, possédée par sa catégorisation.
#[derive(Debug, Clone)]
pub struct Category {
    codes: Vec<String>,
    pub title: String,
    pub comment: Option<String>,
    pub info: BTreeMap<String, serde_json::Value>,
    categorization: String,
}

impl Category {
    /// Construit une catégorie à partir de son code principal et de sa spec.
    /// Les codes alternatifs suivent le code principal, dans l'ordre donné.
    pub(crate) fn from_spec(code: &str, spec: &CategorySpec, categorization: &str) -> Self {
        let mut codes = Vec::with_capacity(1 + spec.alternative_codes.len());
        codes.push(code.to_string());
        codes.extend(spec.alternative_codes.iter().cloned());
        Category {
            codes,
            title: spec.title.clone(),
            comment: spec.comment.clone(),
            info: spec.info.clone(),
            categorization: categorization.to_string(),
        }
    }

    /// Le code canonique (toujours présent).
    pub fn code(&self) -> &str {
        &self.codes[0]
    }

    /// Tous les codes, le canonique en premier.
    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    /// Les codes alternatifs (sans le canonique).
    pub fn alternative_codes(&self) -> &[String] {
        &self.codes[1..]
    }

    /// Nom de la catégorisation propriétaire.
    pub fn categorization(&self) -> &str {
        &self.categorization
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.codes.iter().any(|c| c == code)
    }

    /// Re-sérialise la catégorie (sans les enfants, qui appartiennent à la
    /// hiérarchie de la catégorisation).
    pub fn to_spec(&self) -> CategorySpec {
        CategorySpec {
            title: self.title.clone(),
            comment: self.comment.clone(),
            alternative_codes: self.alternative_codes().to_vec(),
            children: Vec::new(),
            info: self.info.clone(),
        }
    }
}

/// Vrai si les deux catégorisations sont identiques ou si l'une étend l'autre.
fn related_categorizations(a: &str, b: &str) -> bool {
    a.starts_with(b) || b.starts_with(a)
}

impl PartialEq for Category {
    fn eq(&self, other: &Self) -> bool {
        related_categorizations(&self.categorization, &other.categorization)
            && self.codes.iter().any(|c| other.has_code(c))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.title)
    }
}

/// La forme "spécification" d'une catégorie, telle que fournie par les
/// fichiers de données : titre, commentaire, codes alternatifs, ensembles
/// d'enfants (pour les catégorisations hiérarchiques) et infos libres.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CategorySpec {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternative_codes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub info: BTreeMap<String, serde_json::Value>,
}

impl CategorySpec {
    pub fn new(title: &str) -> Self {
        CategorySpec {
            title: title.to_string(),
            ..Default::default()
        }
    }

    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }

    pub fn alternative_codes(mut self, codes: &[&str]) -> Self {
        self.alternative_codes = codes.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Ajoute un ensemble d'enfants. Le premier ajouté est l'ensemble canonique.
    pub fn children(mut self, child_set: &[&str]) -> Self {
        self.children
            .push(child_set.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn info(mut self, key: &str, value: serde_json::Value) -> Self {
        self.info.insert(key.to_string(), value);
        self
    }
}
