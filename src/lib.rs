// =============================================================================
// CLIMCAT — Catégorisations des politiques climatiques en Rust
// =============================================================================
//
// Climcat modélise les catégorisations utilisées dans les inventaires
// d'émissions (IPCC1996, IPCC2006, CRF...) et les conversions entre elles.
//
// Architecture :
//   core/     → Le modèle pur (aucune entrée/sortie)
//   source/   → Lecture et écriture des fichiers de données
//
// Concepts fondamentaux :
//   Category       = un code, ses codes alternatifs, un titre
//   Categorization = un ensemble nommé de catégories, éventuellement
//                    hiérarchique (parent = somme d'un ensemble d'enfants)
//   Conversion     = des règles "somme signée ↔ somme signée" entre
//                    deux catégorisations
//   Overcounting   = une catégorie projetée sur des catégories qui se
//                    recouvrent dans l'autre hiérarchie
//
// =============================================================================

pub mod core;
pub mod source;

pub use crate::core::categorization::{Categorization, CategorizationSpec, Extension};
pub use crate::core::category::{Category, CategorySpec};
pub use crate::core::conversion::{Conversion, ConversionSpec};
pub use crate::core::error::{
    CategorizationError, ConversionError, Error, FormulaError, Result, RuleError,
};
pub use crate::core::formula::{format_factors, parse_aux_codes, parse_formula};
pub use crate::core::hierarchy::TreeOptions;
pub use crate::core::overcounting::OvercountingProblem;
pub use crate::core::registry::CategorizationRegistry;
pub use crate::core::rule::{Cardinality, ConversionRule, ConversionRuleSpec};
