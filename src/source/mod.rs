// =============================================================================
// SOURCE — Lecture et écriture des fichiers de données
// =============================================================================
//
// Le cœur (module core) ne fait aucune entrée/sortie et ne connaît aucun
// format de fichier. Ce module traduit le texte des fichiers de données
// en spécifications (ConversionSpec...) et inversement.
//
// Tout se fait sur des &str : lire le fichier reste l'affaire de
// l'appelant.
//
// =============================================================================

pub mod conversion_csv;

pub use conversion_csv::{join_fields, split_fields};
