// =============================================================================
// VALIDATE — Vérification structurelle d'une spécification de catégorisation
// =============================================================================
//
// Avant de construire une Categorization, on vérifie que sa spécification
// est cohérente :
//   - chaque code (principal OU alternatif) n'apparaît qu'une seule fois :
//     code → catégorie doit être une fonction totale et sans ambiguïté
//   - chaque enfant cité dans un ensemble d'enfants existe
//   - la catégorie canonique de plus haut niveau existe
//   - une catégorisation non hiérarchique ne déclare pas d'enfants
//
// On collecte TOUS les problèmes d'un coup plutôt que de s'arrêter au
// premier : les auteurs de données corrigent ainsi leur fichier en un passage.
//
// =============================================================================

use std::collections::HashMap;
use std::fmt;

use super::categorization::CategorizationSpec;

/// Un problème structurel dans une spécification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecProblem {
    /// Le code est utilisé par deux catégories (désignées par leur code principal).
    DuplicateCode {
        code: String,
        first: String,
        second: String,
    },
    /// Un ensemble d'enfants référence un code inconnu.
    UnknownChild { parent: String, child: String },
    /// Un ensemble d'enfants vide ne partitionne rien.
    EmptyChildSet { parent: String },
    /// La catégorie canonique de plus haut niveau n'existe pas.
    UnknownTopLevel { code: String },
    /// Des enfants sont déclarés dans une catégorisation plate.
    ChildrenInFlatSpec { code: String },
}

impl fmt::Display for SpecProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecProblem::DuplicateCode { code, first, second } => write!(
                f,
                "le code '{}' est utilisé par '{}' et par '{}'",
                code, first, second
            ),
            SpecProblem::UnknownChild { parent, child } => write!(
                f,
                "'{}' a pour enfant '{}' qui n'existe pas",
                parent, child
            ),
            SpecProblem::EmptyChildSet { parent } => {
                write!(f, "'{}' a un ensemble d'enfants vide", parent)
            }
            SpecProblem::UnknownTopLevel { code } => write!(
                f,
                "la catégorie canonique de plus haut niveau '{}' n'existe pas",
                code
            ),
            SpecProblem::ChildrenInFlatSpec { code } => write!(
                f,
                "'{}' déclare des enfants alors que la catégorisation n'est pas hiérarchique",
                code
            ),
        }
    }
}

/// Vérifie qu'une spécification de catégorisation est bien formée.
pub fn validate_spec(spec: &CategorizationSpec) -> Result<(), Vec<SpecProblem>> {
    let mut problems = Vec::new();

    // code → code principal de la catégorie qui l'utilise
    let mut owners: HashMap<&str, &str> = HashMap::new();
    for (primary, category) in &spec.categories {
        let codes = std::iter::once(primary).chain(category.alternative_codes.iter());
        for code in codes {
            if let Some(first) = owners.get(code.as_str()) {
                problems.push(SpecProblem::DuplicateCode {
                    code: code.clone(),
                    first: first.to_string(),
                    second: primary.clone(),
                });
            } else {
                owners.insert(code.as_str(), primary.as_str());
            }
        }
    }

    for (primary, category) in &spec.categories {
        if category.children.is_empty() {
            continue;
        }
        if !spec.hierarchical {
            problems.push(SpecProblem::ChildrenInFlatSpec {
                code: primary.clone(),
            });
            continue;
        }
        for child_set in &category.children {
            if child_set.is_empty() {
                problems.push(SpecProblem::EmptyChildSet {
                    parent: primary.clone(),
                });
            }
            for child in child_set {
                if !owners.contains_key(child.as_str()) {
                    problems.push(SpecProblem::UnknownChild {
                        parent: primary.clone(),
                        child: child.clone(),
                    });
                }
            }
        }
    }

    if spec.hierarchical {
        if let Some(top) = &spec.canonical_top_level_category {
            if !owners.contains_key(top.as_str()) {
                problems.push(SpecProblem::UnknownTopLevel { code: top.clone() });
            }
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems)
    }
}
