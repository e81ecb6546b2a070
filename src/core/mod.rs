// =============================================================================
// CORE — Module principal : catégorisations et conversions
// =============================================================================
//
// Ce module regroupe tout le modèle du domaine, sans format de fichier
// et sans entrée/sortie : uniquement des catégories, des hiérarchies et
// des règles de conversion.
//
// Architecture :
//   category       → une catégorie (codes, titre, métadonnées)
//   categorization → un ensemble nommé de catégories (+ extension)
//   validate       → la vérification de cohérence d'une spécification
//   hierarchy      → le graphe parent/enfants et sa navigation
//   formula        → les formules "A + B - C" et les listes de codes
//   rule           → une règle de conversion (spécification et hydratée)
//   registry       → les catégorisations disponibles, par nom
//   conversion     → un ensemble de règles entre deux catégorisations
//   overcounting   → la détection de double comptage
//   error          → les erreurs de toute la crate
//
// =============================================================================

pub mod error;
pub mod category;
pub mod validate;
pub mod categorization;
pub mod hierarchy;
pub mod formula;
pub mod rule;
pub mod registry;
pub mod conversion;
pub mod overcounting;
