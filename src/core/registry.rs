// =============================================================================
// REGISTRY — Les catégorisations disponibles, par nom
// =============================================================================
//
// Une conversion ne connaît ses catégorisations que par leur NOM ("IPCC2006",
// "gas"...). Le registre résout ces noms au moment de l'hydratation.
//
// Les catégorisations sont partagées (Arc) : une même catégorisation sert
// à plusieurs conversions sans copie.
//
// =============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use super::categorization::{Categorization, CategorizationSpec};
use super::error::CategorizationError;

#[derive(Debug, Clone, Default)]
pub struct CategorizationRegistry {
    categorizations: BTreeMap<String, Arc<Categorization>>,
}

impl CategorizationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construit chaque spécification et l'enregistre.
    pub fn from_specs<'a, I>(specs: I) -> Result<Self, CategorizationError>
    where
        I: IntoIterator<Item = &'a CategorizationSpec>,
    {
        let mut registry = Self::new();
        for spec in specs {
            registry.insert(Categorization::from_spec(spec)?);
        }
        Ok(registry)
    }

    /// Enregistre une catégorisation sous son nom. Une catégorisation de
    /// même nom est remplacée.
    pub fn insert(&mut self, categorization: Categorization) -> Arc<Categorization> {
        let shared = Arc::new(categorization);
        self.insert_shared(Arc::clone(&shared));
        shared
    }

    pub fn insert_shared(&mut self, categorization: Arc<Categorization>) {
        debug!(categorization = %categorization.name(), "catégorisation enregistrée");
        self.categorizations
            .insert(categorization.name().to_string(), categorization);
    }

    pub fn get(&self, name: &str) -> Option<Arc<Categorization>> {
        self.categorizations.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.categorizations.contains_key(name)
    }

    /// Noms enregistrés, par ordre alphabétique.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.categorizations.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.categorizations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categorizations.is_empty()
    }
}
