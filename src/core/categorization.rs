// =============================================================================
// CATEGORIZATION — Un ensemble nommé et versionné de catégories
// =============================================================================
//
// Une Categorization est un conteneur ORDONNÉ et MULTI-CLÉS :
//   - l'ordre d'itération est celui des codes principaux (ordre d'insertion)
//   - la recherche fonctionne avec N'IMPORTE QUEL code (principal ou alternatif)
//
// Deux index parallèles :
//
//   primary_index : code principal      → position dans `categories`
//   code_index    : tous les codes      → position dans `categories`
//
// Une catégorisation est construite UNE FOIS depuis sa spécification puis
// reste immuable. `extend` ne modifie jamais la source : il re-sérialise les
// catégories existantes, y fusionne le delta et construit une NOUVELLE
// catégorisation nommée "{ancien}_{extension}".
//
// Si la spécification déclare `hierarchical: true`, la catégorisation porte
// en plus une Hierarchy (voir hierarchy.rs) : parents, enfants, niveaux.
//
// EXEMPLE :
//
//   SimpleCat  (4 catégories)
//     keys()     = ["1", "2", "3", "unnumbered"]
//     all_keys() = ["1", "A", "CatA", "2", "B", "CatB", ...]
//     SimpleCat["CatA"] == SimpleCat["1"]
//
// =============================================================================

use std::collections::HashMap;
use std::fmt;
use std::ops::Index;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::category::{Category, CategorySpec};
use super::error::CategorizationError;
use super::hierarchy::Hierarchy;
use super::validate::validate_spec;

/// La spécification complète d'une catégorisation : métadonnées + catégories.
///
/// C'est la forme échangée avec les sources de données (YAML, JSON...),
/// l'ordre des catégories est conservé.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizationSpec {
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub references: String,
    #[serde(default)]
    pub institution: String,
    pub last_update: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub hierarchical: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_sum: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_top_level_category: Option<String>,
    #[serde(with = "ordered_categories")]
    pub categories: Vec<(String, CategorySpec)>,
}

impl CategorizationSpec {
    /// Spécification vide, plate, datée du 1er janvier 1970 : à compléter
    /// avec les méthodes de construction ci-dessous.
    pub fn new(name: &str, title: &str) -> Self {
        CategorizationSpec {
            name: name.to_string(),
            title: title.to_string(),
            comment: String::new(),
            references: String::new(),
            institution: String::new(),
            last_update: NaiveDate::default(),
            version: None,
            hierarchical: false,
            total_sum: None,
            canonical_top_level_category: None,
            categories: Vec::new(),
        }
    }

    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = comment.to_string();
        self
    }

    pub fn references(mut self, references: &str) -> Self {
        self.references = references.to_string();
        self
    }

    pub fn institution(mut self, institution: &str) -> Self {
        self.institution = institution.to_string();
        self
    }

    pub fn last_update(mut self, date: NaiveDate) -> Self {
        self.last_update = date;
        self
    }

    pub fn version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    pub fn hierarchical(mut self, hierarchical: bool) -> Self {
        self.hierarchical = hierarchical;
        self
    }

    pub fn total_sum(mut self, total_sum: bool) -> Self {
        self.total_sum = Some(total_sum);
        self
    }

    pub fn canonical_top_level_category(mut self, code: &str) -> Self {
        self.canonical_top_level_category = Some(code.to_string());
        self
    }

    /// Ajoute une catégorie (à la fin : l'ordre d'ajout est l'ordre d'itération).
    pub fn category(mut self, code: &str, spec: CategorySpec) -> Self {
        self.categories.push((code.to_string(), spec));
        self
    }

    /// Position de la catégorie qui porte `code` (principal ou alternatif).
    pub(crate) fn position_of(&self, code: &str) -> Option<usize> {
        self.categories.iter().position(|(primary, spec)| {
            primary == code || spec.alternative_codes.iter().any(|c| c == code)
        })
    }

    /// Le code principal de `code`, ou `code` tel quel s'il est inconnu.
    fn primary_code(&self, code: &str) -> String {
        self.position_of(code)
            .map_or_else(|| code.to_string(), |i| self.categories[i].0.clone())
    }
}

/// (Dé)sérialise la liste ordonnée des catégories comme une table
/// code → catégorie, sans perdre l'ordre du fichier.
mod ordered_categories {
    use std::fmt;

    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};

    use crate::core::category::CategorySpec;

    pub fn serialize<S: Serializer>(
        entries: &[(String, CategorySpec)],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (code, spec) in entries {
            map.serialize_entry(code, spec)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<(String, CategorySpec)>, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = Vec<(String, CategorySpec)>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "une table code → catégorie")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(entry) = access.next_entry::<String, CategorySpec>()? {
                    entries.push(entry);
                }
                Ok(entries)
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

/// Une catégorisation construite et immuable.
#[derive(Debug, Clone)]
pub struct Categorization {
    name: String,
    pub title: String,
    pub comment: String,
    pub references: String,
    pub institution: String,
    pub last_update: NaiveDate,
    pub version: Option<String>,
    categories: Vec<Category>,
    primary_index: HashMap<String, usize>,
    code_index: HashMap<String, usize>,
    hierarchy: Option<Hierarchy>,
}

impl Categorization {
    /// Construit une catégorisation depuis sa spécification.
    ///
    /// Échoue avec `InvalidSpec` (listant tous les problèmes) si un code est
    /// dupliqué, si un enfant est inconnu, ou si une spécification plate
    /// déclare des enfants.
    pub fn from_spec(spec: &CategorizationSpec) -> Result<Self, CategorizationError> {
        validate_spec(spec).map_err(|problems| CategorizationError::InvalidSpec {
            name: spec.name.clone(),
            problems,
        })?;

        let mut categories = Vec::with_capacity(spec.categories.len());
        let mut primary_index = HashMap::with_capacity(spec.categories.len());
        let mut code_index = HashMap::new();
        for (position, (code, category_spec)) in spec.categories.iter().enumerate() {
            let category = Category::from_spec(code, category_spec, &spec.name);
            primary_index.insert(code.clone(), position);
            for alias in category.codes() {
                code_index.insert(alias.clone(), position);
            }
            categories.push(category);
        }

        let hierarchy = if spec.hierarchical {
            Some(Hierarchy::from_spec(spec, |code| {
                code_index.get(code).map(|&i| categories[i].code().to_string())
            })?)
        } else {
            if spec.total_sum.is_some() || spec.canonical_top_level_category.is_some() {
                warn!(
                    categorization = %spec.name,
                    "total_sum / canonical_top_level_category ignorés : catégorisation non hiérarchique"
                );
            }
            None
        };

        debug!(
            categorization = %spec.name,
            categories = categories.len(),
            codes = code_index.len(),
            hierarchical = spec.hierarchical,
            "catégorisation construite"
        );

        Ok(Categorization {
            name: spec.name.clone(),
            title: spec.title.clone(),
            comment: spec.comment.clone(),
            references: spec.references.clone(),
            institution: spec.institution.clone(),
            last_update: spec.last_update,
            version: spec.version.clone(),
            categories,
            primary_index,
            code_index,
            hierarchy,
        })
    }

    /// Re-sérialise la catégorisation. `from_spec(&c.to_spec())` redonne
    /// une catégorisation égale.
    pub fn to_spec(&self) -> CategorizationSpec {
        let categories = self
            .categories
            .iter()
            .map(|c| {
                let mut spec = c.to_spec();
                if let Some(h) = &self.hierarchy {
                    spec.children = h.child_sets(c.code()).to_vec();
                }
                (c.code().to_string(), spec)
            })
            .collect();

        CategorizationSpec {
            name: self.name.clone(),
            title: self.title.clone(),
            comment: self.comment.clone(),
            references: self.references.clone(),
            institution: self.institution.clone(),
            last_update: self.last_update,
            version: self.version.clone(),
            hierarchical: self.hierarchical(),
            total_sum: self.hierarchy.as_ref().map(|h| h.total_sum),
            canonical_top_level_category: self
                .hierarchy
                .as_ref()
                .and_then(|h| h.canonical_top_level_category.clone()),
            categories,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Vrai si des parents, enfants et niveaux sont définis.
    pub fn hierarchical(&self) -> bool {
        self.hierarchy.is_some()
    }

    pub fn hierarchy(&self) -> Option<&Hierarchy> {
        self.hierarchy.as_ref()
    }

    /// La somme des enfants (d'un même ensemble) égale-t-elle le parent ?
    /// Toujours faux pour une catégorisation plate.
    pub fn total_sum(&self) -> bool {
        self.hierarchy.as_ref().map_or(false, |h| h.total_sum)
    }

    /// Codes principaux, dans l'ordre d'insertion.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.code())
    }

    pub fn values(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter()
    }

    pub fn items(&self) -> impl Iterator<Item = (&str, &Category)> {
        self.categories.iter().map(|c| (c.code(), c))
    }

    /// Tous les codes : pour chaque catégorie, le principal puis les alternatifs.
    pub fn all_keys(&self) -> impl Iterator<Item = &str> {
        self.categories
            .iter()
            .flat_map(|c| c.codes().iter().map(String::as_str))
    }

    pub fn contains(&self, code: &str) -> bool {
        self.code_index.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Recherche par n'importe quel code.
    pub fn get(&self, code: &str) -> Option<&Category> {
        self.code_index.get(code).map(|&i| &self.categories[i])
    }

    /// Comme `get`, mais un code absent est une erreur.
    pub fn category(&self, code: &str) -> Result<&Category, CategorizationError> {
        self.get(code).ok_or_else(|| CategorizationError::UnknownCode {
            categorization: self.name.clone(),
            code: code.to_string(),
        })
    }

    /// Le code canonique de la catégorie désignée par `code`.
    pub fn canonical_code(&self, code: &str) -> Result<&str, CategorizationError> {
        self.category(code).map(|c| c.code())
    }

    /// Rang d'une catégorie (par code principal) dans l'ordre d'itération.
    pub(crate) fn position(&self, primary: &str) -> Option<usize> {
        self.primary_index.get(primary).copied()
    }

    /// Résout une liste de codes principaux en catégories, triées dans
    /// l'ordre de la catégorisation.
    pub(crate) fn resolve_sorted<'a, I>(&self, codes: I) -> Vec<&Category>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut positions: Vec<usize> = codes
            .into_iter()
            .filter_map(|code| self.position(code))
            .collect();
        positions.sort_unstable();
        positions.dedup();
        positions.into_iter().map(|i| &self.categories[i]).collect()
    }

    /// Étend la catégorisation, produisant une NOUVELLE catégorisation.
    ///
    /// Métadonnées : le nom devient "{nom}_{extension}", titre et commentaire
    /// sont complétés, `last_update` vaut aujourd'hui si non fourni,
    /// `references` et `institution` sont vidés ; `version`, le caractère
    /// hiérarchique, `total_sum` et la catégorie canonique de plus haut
    /// niveau sont conservés.
    ///
    /// Les enfants de l'extension ajoutent des ensembles d'enfants ; pour
    /// remplacer toute la hiérarchie, voir `extend_with_hierarchy`.
    pub fn extend(&self, extension: &Extension) -> Result<Categorization, CategorizationError> {
        if !extension.children.is_empty() && !self.hierarchical() {
            return Err(CategorizationError::InvalidExtension {
                name: extension.name.clone(),
                reason: format!(
                    "{} n'est pas hiérarchique, impossible d'ajouter des enfants",
                    self.name
                ),
            });
        }

        let mut spec = self.extended_spec(extension)?;
        for (parent, child_set) in &extension.children {
            let position = spec
                .position_of(parent)
                .ok_or_else(|| CategorizationError::InvalidExtension {
                    name: extension.name.clone(),
                    reason: format!("le parent '{}' n'existe pas", parent),
                })?;
            // Comparaison en codes principaux : "1a" et "1A" sont le même enfant
            let primary = |set: &[String]| -> Vec<String> {
                set.iter().map(|code| spec.primary_code(code)).collect()
            };
            let child_set = primary(child_set.as_slice());
            let already_known = spec.categories[position]
                .1
                .children
                .iter()
                .any(|existing| same_set(&primary(existing.as_slice()), &child_set));
            if !already_known {
                spec.categories[position].1.children.push(child_set);
            }
        }

        Categorization::from_spec(&spec)
    }

    /// Prépare la spécification étendue commune à `extend` et
    /// `extend_with_hierarchy` : métadonnées, nouvelles catégories, nouveaux
    /// codes alternatifs.
    pub(crate) fn extended_spec(
        &self,
        extension: &Extension,
    ) -> Result<CategorizationSpec, CategorizationError> {
        let mut spec = self.to_spec();

        spec.name = format!("{}_{}", self.name, extension.name);
        spec.title = match &extension.title {
            Some(title) => format!("{}{}", self.title, title),
            None => format!("{} + {}", self.title, extension.name),
        };
        spec.comment = match &extension.comment {
            Some(comment) => format!("{}{}", self.comment, comment),
            None => format!("{} extended by {}", self.comment, extension.name),
        };
        spec.last_update = extension
            .last_update
            .unwrap_or_else(|| chrono::Local::now().date_naive());
        spec.references = String::new();
        spec.institution = String::new();

        spec.categories.extend(extension.categories.iter().cloned());

        for (new_code, existing) in &extension.alternative_codes {
            let position = spec
                .position_of(existing)
                .ok_or_else(|| CategorizationError::UnknownCode {
                    categorization: spec.name.clone(),
                    code: existing.clone(),
                })?;
            spec.categories[position]
                .1
                .alternative_codes
                .push(new_code.clone());
        }

        Ok(spec)
    }
}

/// Égalité ensembliste de deux ensembles d'enfants.
fn same_set(a: &[String], b: &[String]) -> bool {
    a.len() == b.len() && a.iter().all(|x| b.contains(x))
}

impl PartialEq for Categorization {
    fn eq(&self, other: &Self) -> bool {
        self.to_spec() == other.to_spec()
    }
}

impl Index<&str> for Categorization {
    type Output = Category;

    /// Accès par code, comme une table. Panique si le code est absent :
    /// utiliser `get` ou `category` quand le code vient de l'extérieur.
    fn index(&self, code: &str) -> &Category {
        match self.get(code) {
            Some(category) => category,
            None => panic!("{:?} n'existe pas dans {}", code, self.name),
        }
    }
}

impl fmt::Display for Categorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Le delta appliqué par `extend` / `extend_with_hierarchy`.
#[derive(Debug, Clone, Default)]
pub struct Extension {
    /// Suffixe du nom de la nouvelle catégorisation.
    pub name: String,
    /// Nouvelles catégories, ajoutées à la fin.
    pub categories: Vec<(String, CategorySpec)>,
    /// Nouveaux codes alternatifs : (nouveau code, code existant).
    pub alternative_codes: Vec<(String, String)>,
    /// Nouveaux ensembles d'enfants : (parent, ensemble).
    pub children: Vec<(String, Vec<String>)>,
    /// Texte ajouté au titre d'origine.
    pub title: Option<String>,
    /// Texte ajouté au commentaire d'origine.
    pub comment: Option<String>,
    pub last_update: Option<NaiveDate>,
}

impl Extension {
    pub fn new(name: &str) -> Self {
        Extension {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn category(mut self, code: &str, spec: CategorySpec) -> Self {
        self.categories.push((code.to_string(), spec));
        self
    }

    pub fn alternative_code(mut self, new_code: &str, existing: &str) -> Self {
        self.alternative_codes
            .push((new_code.to_string(), existing.to_string()));
        self
    }

    pub fn children(mut self, parent: &str, child_set: &[&str]) -> Self {
        self.children.push((
            parent.to_string(),
            child_set.iter().map(|c| c.to_string()).collect(),
        ));
        self
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }

    pub fn last_update(mut self, date: NaiveDate) -> Self {
        self.last_update = Some(date);
        self
    }
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    /// La catégorisation plate classique pour les tests
    fn simple_spec() -> CategorizationSpec {
        CategorizationSpec::new("SimpleCat", "Simple Categorization")
            .comment("A simple example categorization without relationships between categories")
            .references("doi:00000/00000")
            .institution("PIK")
            .last_update(NaiveDate::from_ymd_opt(2021, 2, 23).unwrap())
            .version("1")
            .category(
                "1",
                CategorySpec::new("Category 1")
                    .comment("The first category")
                    .alternative_codes(&["A", "CatA"])
                    .info("important_data", serde_json::json!(["A", "B", "C"])),
            )
            .category(
                "2",
                CategorySpec::new("Category 2")
                    .comment("The second category")
                    .alternative_codes(&["B", "CatB"]),
            )
            .category(
                "3",
                CategorySpec::new("Category 3")
                    .comment("The third category")
                    .alternative_codes(&["C", "CatC"]),
            )
            .category("unnumbered", CategorySpec::new("The unnumbered category"))
    }

    fn simple_cat() -> Categorization {
        Categorization::from_spec(&simple_spec()).unwrap()
    }

    #[test]
    fn test_meta() {
        let c = simple_cat();
        assert_eq!(c.name(), "SimpleCat");
        assert_eq!(format!("{}", c), "SimpleCat");
        assert_eq!(c.version.as_deref(), Some("1"));
        assert!(!c.hierarchical());
        assert!(!c.total_sum());
    }

    #[test]
    fn test_categories() {
        let c = simple_cat();
        assert!(c.contains("1"));
        assert_eq!(c["1"].title, "Category 1");
        assert_eq!(c["1"].comment.as_deref(), Some("The first category"));
        assert_eq!(c["1"].codes(), ["1", "A", "CatA"]);
        assert_eq!(c["1"], c["A"]);
        assert_eq!(c["A"], c["CatA"]);
        assert_ne!(c["1"], c["2"]);
        assert_eq!(c["1"].info["important_data"], serde_json::json!(["A", "B", "C"]));
        assert!(c["2"].info.is_empty());
        assert_eq!(c["unnumbered"].comment, None);
    }

    #[test]
    fn test_dict_like() {
        let c = simple_cat();
        assert_eq!(
            c.all_keys().collect::<Vec<_>>(),
            ["1", "A", "CatA", "2", "B", "CatB", "3", "C", "CatC", "unnumbered"]
        );
        assert_eq!(c.keys().collect::<Vec<_>>(), ["1", "2", "3", "unnumbered"]);
        let items: Vec<_> = c.items().map(|(k, v)| (k, v.title.as_str())).collect();
        assert_eq!(items[3], ("unnumbered", "The unnumbered category"));
        assert_eq!(c.len(), 4);
        assert!(!c.is_empty());
    }

    #[test]
    fn test_lookup_consistency() {
        // Chaque code d'une catégorie redonne cette même catégorie
        let c = simple_cat();
        for category in c.values() {
            for code in category.codes() {
                assert_eq!(&c[code.as_str()], category);
            }
        }
    }

    #[test]
    fn test_unknown_code() {
        let c = simple_cat();
        assert!(c.get("42").is_none());
        assert_eq!(
            c.category("42").unwrap_err(),
            CategorizationError::UnknownCode {
                categorization: "SimpleCat".into(),
                code: "42".into(),
            }
        );
        assert_eq!(c.canonical_code("CatB").unwrap(), "2");
    }

    #[test]
    fn test_duplicate_code_rejected() {
        let spec = simple_spec()
            .category("4", CategorySpec::new("Category 4").alternative_codes(&["CatA"]));
        let err = Categorization::from_spec(&spec).unwrap_err();
        assert!(matches!(err, CategorizationError::InvalidSpec { .. }));
        assert!(err.to_string().contains("CatA"));
    }

    #[test]
    fn test_roundtrip_spec() {
        let c = simple_cat();
        let again = Categorization::from_spec(&c.to_spec()).unwrap();
        assert_eq!(c, again);
        assert_eq!(c.to_spec(), simple_spec());
    }

    #[test]
    fn test_extend() {
        let c = simple_cat();
        let ext = c
            .extend(
                &Extension::new("ext")
                    .category(
                        "4",
                        CategorySpec::new("Category 4")
                            .comment("The fourth category")
                            .alternative_codes(&["D", "CatD"]),
                    )
                    .category("t", CategorySpec::new("Category T"))
                    .title(" title_ext")
                    .alternative_code("I", "1")
                    .alternative_code("II", "2")
                    .alternative_code("III", "3")
                    .alternative_code("drai", "3")
                    .alternative_code("IV", "4"),
            )
            .unwrap();

        assert_eq!(ext.name(), "SimpleCat_ext");
        assert_eq!(ext.title, "Simple Categorization title_ext");
        assert_eq!(ext.references, "");
        assert_eq!(ext.institution, "");
        assert_eq!(ext.last_update, chrono::Local::now().date_naive());
        assert_eq!(ext.version.as_deref(), Some("1"));
        assert!(ext.comment.ends_with("categories extended by ext"));
        assert!(!ext.hierarchical());

        assert_eq!(ext["1"].codes(), ["1", "A", "CatA", "I"]);
        assert_eq!(ext["III"], ext["drai"]);
        assert_eq!(ext["III"], c["3"]);
        assert_eq!(ext["1"], c["1"]);
        assert_eq!(
            ext.keys().collect::<Vec<_>>(),
            ["1", "2", "3", "unnumbered", "4", "t"]
        );
        assert_eq!(
            ext.all_keys().collect::<Vec<_>>(),
            [
                "1", "A", "CatA", "I", "2", "B", "CatB", "II", "3", "C", "CatC", "III", "drai",
                "unnumbered", "4", "D", "CatD", "IV", "t"
            ]
        );

        // La source n'est pas modifiée
        assert_eq!(c.len(), 4);
        assert!(!c.contains("I"));
    }

    #[test]
    fn test_extend_defaults() {
        let c = simple_cat();
        let ext = c.extend(&Extension::new("ext")).unwrap();
        assert_eq!(ext.title, "Simple Categorization + ext");
        assert_eq!(
            ext.comment,
            "A simple example categorization without relationships between categories extended by ext"
        );
        assert_ne!(ext, c);
    }

    #[test]
    fn test_extend_not_defaults() {
        let c = simple_cat();
        let date = NaiveDate::from_ymd_opt(2020, 2, 20).unwrap();
        let ext = c
            .extend(&Extension::new("ext").title("title").comment("comment").last_update(date))
            .unwrap();
        assert_eq!(ext.title, "Simple Categorizationtitle");
        assert!(ext.comment.ends_with("categoriescomment"));
        assert_eq!(ext.last_update, date);
    }

    #[test]
    fn test_extend_flat_with_children_rejected() {
        let c = simple_cat();
        let err = c
            .extend(&Extension::new("ext").children("1", &["2"]))
            .unwrap_err();
        assert!(matches!(err, CategorizationError::InvalidExtension { .. }));
    }

    #[test]
    fn test_extend_unknown_alternative_target() {
        let c = simple_cat();
        let err = c
            .extend(&Extension::new("ext").alternative_code("X", "nope"))
            .unwrap_err();
        assert!(matches!(err, CategorizationError::UnknownCode { .. }));
    }

    #[test]
    fn test_spec_from_yaml() {
        let yaml = r#"
name: SimpleYaml
title: Simple categorization from YAML
comment: loaded like a data file
references: doi:00000/00000
institution: PIK
last_update: 2021-02-23
hierarchical: false
categories:
  "1":
    title: Category 1
    alternative_codes: ["A"]
  "2":
    title: Category 2
    info:
      note: second
"#;
        let spec: CategorizationSpec = serde_yaml::from_str(yaml).unwrap();
        let c = Categorization::from_spec(&spec).unwrap();
        assert_eq!(c.keys().collect::<Vec<_>>(), ["1", "2"]);
        assert_eq!(c["A"].title, "Category 1");
        assert_eq!(c["2"].info["note"], serde_json::json!("second"));
        assert_eq!(c.last_update, NaiveDate::from_ymd_opt(2021, 2, 23).unwrap());

        let back = serde_yaml::to_string(&c.to_spec()).unwrap();
        let reread: CategorizationSpec = serde_yaml::from_str(&back).unwrap();
        assert_eq!(reread, spec);
    }
}
