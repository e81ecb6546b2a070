// =============================================================================
// ERROR — Les erreurs du cœur
// =============================================================================
//
// Quatre familles, toutes fatales pour l'opération qui les lève :
//   CategorizationError → structure (codes dupliqués, codes inconnus,
//                         hiérarchie mal formée) et préconditions de domaine
//                         (niveau d'une catégorie non atteignable...)
//   FormulaError        → formule ou liste de codes auxiliaires mal formée
//   RuleError           → ligne de règle de conversion invalide
//   ConversionError     → hydratation d'une conversion, préconditions du
//                         contrôle de double comptage, lecture du texte source
//
// Un problème de double comptage N'EST PAS une erreur : c'est un diagnostic
// renvoyé comme valeur (voir overcounting.rs).
//
// =============================================================================

use thiserror::Error;

use super::validate::SpecProblem;

/// Erreurs de construction et de navigation d'une catégorisation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CategorizationError {
    #[error("Spécification invalide pour '{name}' : {}", join_problems(.problems))]
    InvalidSpec {
        name: String,
        problems: Vec<SpecProblem>,
    },

    #[error("{code:?} n'existe pas dans {categorization}")]
    UnknownCode { categorization: String, code: String },

    #[error("{categorization} n'est pas hiérarchique")]
    NotHierarchical { categorization: String },

    #[error(
        "Impossible de calculer le niveau dans {categorization} sans catégorie canonique de plus haut niveau"
    )]
    NoCanonicalTopLevel { categorization: String },

    #[error(
        "{code:?} n'est pas un descendant transitif de la catégorie canonique de plus haut niveau {top:?}"
    )]
    Unreachable { code: String, top: String },

    #[error("Extension '{name}' invalide : {reason}")]
    InvalidExtension { name: String, reason: String },
}

fn join_problems(problems: &[SpecProblem]) -> String {
    problems
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Erreur de syntaxe dans une formule (`A + B - "C"`) ou une liste de codes.
///
/// Porte toujours le texte fautif et la position (en caractères) où
/// l'analyse s'est arrêtée.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Analyse impossible : {input:?}, erreur : {message}, au caractère {position}")]
pub struct FormulaError {
    pub input: String,
    pub message: String,
    pub position: usize,
}

/// Erreurs sur une règle de conversion (ligne CSV ou hydratation).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleError {
    #[error(transparent)]
    Formula(#[from] FormulaError),

    #[error("La ligne contient {found} champs, attendu {expected} (plus un commentaire optionnel)")]
    RowLength { expected: usize, found: usize },

    #[error("Erreur à la ligne {line} : {source}")]
    Line {
        line: usize,
        #[source]
        source: Box<RuleError>,
    },

    #[error(transparent)]
    Category(#[from] CategorizationError),

    #[error("La catégorisation auxiliaire '{name}' est introuvable dans le registre")]
    UnknownAuxiliaryCategorization { name: String },
}

impl RuleError {
    /// Rattache l'erreur à une ligne du fichier source.
    pub fn at_line(self, line: usize) -> Self {
        RuleError::Line {
            line,
            source: Box::new(self),
        }
    }
}

/// Erreurs au niveau d'une conversion complète.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    Categorization(#[from] CategorizationError),

    #[error("La catégorisation '{name}' est introuvable dans le registre")]
    UnknownCategorization { name: String },

    #[error("{name} n'est pas hiérarchique, le double comptage ne peut pas être détecté")]
    NotHierarchical { name: String },

    #[error(
        "Pour {name}, il n'est pas établi que la somme d'un ensemble d'enfants égale le parent, \
         le double comptage ne peut pas être détecté"
    )]
    NotTotalSum { name: String },

    #[error("En-tête manquant : il faut au moins deux colonnes (catégorisation A et B)")]
    MissingHeader,

    #[error("Métadonnée invalide à la ligne {line} : {text:?}")]
    InvalidMetadata { line: usize, text: String },

    #[error("Date invalide pour last_update : {value:?}")]
    InvalidDate { value: String },
}

/// Erreur racine de la crate, pour les appelants qui enchaînent les étapes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Categorization(#[from] CategorizationError),

    #[error(transparent)]
    Formula(#[from] FormulaError),

    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

pub type Result<T> = std::result::Result<T, Error>;
