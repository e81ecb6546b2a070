// =============================================================================
// HIERARCHY — Parents, enfants et niveaux d'une catégorisation hiérarchique
// =============================================================================
//
// Le graphe n'est PAS un arbre de pointeurs : ce sont deux index parallèles
// sur des codes canoniques.
//
//   children : parent → liste ORDONNÉE d'ensembles d'enfants
//   parents  : enfant → tous les parents qui le citent (dans N'IMPORTE QUEL
//              ensemble, pas seulement le canonique)
//
// Un parent peut avoir plusieurs ensembles d'enfants : ce sont des partitions
// alternatives, également valides, du même total. Le PREMIER est canonique,
// c'est le seul utilisé pour le calcul des niveaux.
//
// EXEMPLE (catégorisation "HierCat") :
//
//        0 ──┬── [1, 2, 3]          ← canonique
//            ├── [0X3, 3]           ← alternatif
//            └── [1A, 1B, 2, 3]     ← alternatif
//
//   parents("1")  = [0, 0X3]
//   level("1B")   = 3               (0 → 1 → 1B)
//   level("0X3")  → erreur : seulement atteignable par un ensemble alternatif
//
// =============================================================================

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use tracing::debug;

use super::categorization::{Categorization, CategorizationSpec, Extension};
use super::category::Category;
use super::error::CategorizationError;

/// Les relations parent/enfant d'une catégorisation, en codes canoniques.
#[derive(Debug, Clone)]
pub struct Hierarchy {
    pub(crate) total_sum: bool,
    pub(crate) canonical_top_level_category: Option<String>,
    children: HashMap<String, Vec<Vec<String>>>,
    parents: HashMap<String, Vec<String>>,
}

impl Hierarchy {
    /// Construit les deux index. `resolve` traduit n'importe quel code en
    /// code canonique.
    pub(crate) fn from_spec<F>(
        spec: &CategorizationSpec,
        resolve: F,
    ) -> Result<Self, CategorizationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let canonical = |code: &str| {
            resolve(code).ok_or_else(|| CategorizationError::UnknownCode {
                categorization: spec.name.clone(),
                code: code.to_string(),
            })
        };

        let mut children: HashMap<String, Vec<Vec<String>>> = HashMap::new();
        let mut parents: HashMap<String, Vec<String>> = HashMap::new();

        for (parent, category) in &spec.categories {
            if category.children.is_empty() {
                continue;
            }
            let mut sets = Vec::with_capacity(category.children.len());
            for child_set in &category.children {
                let mut set: Vec<String> = Vec::with_capacity(child_set.len());
                for child in child_set {
                    let child = canonical(child)?;
                    if !set.contains(&child) {
                        set.push(child);
                    }
                }
                for child in &set {
                    let known = parents.entry(child.clone()).or_default();
                    if !known.contains(parent) {
                        known.push(parent.clone());
                    }
                }
                sets.push(set);
            }
            children.insert(parent.clone(), sets);
        }

        let canonical_top_level_category = match &spec.canonical_top_level_category {
            Some(top) => Some(canonical(top)?),
            None => None,
        };

        Ok(Hierarchy {
            total_sum: spec.total_sum.unwrap_or(false),
            canonical_top_level_category,
            children,
            parents,
        })
    }

    /// Les ensembles d'enfants d'un code canonique (vide pour une feuille).
    pub fn child_sets(&self, code: &str) -> &[Vec<String>] {
        self.children.get(code).map_or(&[], Vec::as_slice)
    }

    /// Les parents directs d'un code canonique.
    pub fn parent_codes(&self, code: &str) -> &[String] {
        self.parents.get(code).map_or(&[], Vec::as_slice)
    }

    pub fn total_sum(&self) -> bool {
        self.total_sum
    }

    pub fn canonical_top_level_category(&self) -> Option<&str> {
        self.canonical_top_level_category.as_deref()
    }

    /// Fermeture transitive d'une relation (parents ou enfants), sans le
    /// point de départ. Tolère les cycles.
    fn closure<'a, F>(&'a self, start: &str, step: F) -> BTreeSet<String>
    where
        F: Fn(&'a Self, &str) -> Vec<&'a String>,
    {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<&String> = step(self, start).into();
        while let Some(code) = queue.pop_front() {
            if code != start && seen.insert(code.clone()) {
                queue.extend(step(self, code));
            }
        }
        seen
    }

    pub(crate) fn ancestor_codes(&self, code: &str) -> BTreeSet<String> {
        self.closure(code, |h, c| h.parent_codes(c).iter().collect())
    }

    pub(crate) fn descendant_codes(&self, code: &str) -> BTreeSet<String> {
        self.closure(code, |h, c| h.child_sets(c).iter().flatten().collect())
    }

    /// Remplace chaque membre non-feuille par les feuilles atteintes via
    /// son ensemble canonique, récursivement.
    fn expand_to_leaves(&self, code: &str, visiting: &mut HashSet<String>, out: &mut Vec<String>) {
        match self.child_sets(code).first() {
            None => {
                if !out.iter().any(|c| c == code) {
                    out.push(code.to_string());
                }
            }
            Some(canonical) => {
                if !visiting.insert(code.to_string()) {
                    return;
                }
                for child in canonical {
                    self.expand_to_leaves(child, visiting, out);
                }
                visiting.remove(code);
            }
        }
    }
}

/// Options d'affichage de `show_as_tree_with`.
#[derive(Clone, Copy)]
pub struct TreeOptions<'a> {
    /// Profondeur maximale affichée ; la racine est à la profondeur 1.
    pub maxdepth: Option<usize>,
    /// N'afficher que le sous-arbre de cette catégorie.
    pub root: Option<&'a str>,
    /// Libellé d'une catégorie.
    pub label: fn(&Category) -> String,
}

impl Default for TreeOptions<'_> {
    fn default() -> Self {
        TreeOptions {
            maxdepth: None,
            root: None,
            label: |c| c.to_string(),
        }
    }
}

impl<'a> TreeOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn maxdepth(mut self, maxdepth: usize) -> Self {
        self.maxdepth = Some(maxdepth);
        self
    }

    pub fn root(mut self, code: &'a str) -> Self {
        self.root = Some(code);
        self
    }

    pub fn label(mut self, label: fn(&Category) -> String) -> Self {
        self.label = label;
        self
    }
}

// =============================================================================
// NAVIGATION : sur la catégorisation, par n'importe quel code
// =============================================================================

impl Categorization {
    fn require_hierarchy(&self) -> Result<&Hierarchy, CategorizationError> {
        self.hierarchy()
            .ok_or_else(|| CategorizationError::NotHierarchical {
                categorization: self.name().to_string(),
            })
    }

    /// Hiérarchie + code canonique, les deux préconditions de la navigation.
    fn navigate(&self, code: &str) -> Result<(&Hierarchy, &str), CategorizationError> {
        let hierarchy = self.require_hierarchy()?;
        Ok((hierarchy, self.canonical_code(code)?))
    }

    fn resolve_set(&self, codes: &[String]) -> Vec<&Category> {
        codes.iter().filter_map(|c| self.get(c)).collect()
    }

    /// La catégorie racine pour le calcul des niveaux, si configurée.
    pub fn canonical_top_level_category(&self) -> Option<&Category> {
        self.hierarchy()
            .and_then(|h| h.canonical_top_level_category())
            .and_then(|code| self.get(code))
    }

    /// Les ensembles d'enfants, dans l'ordre (le premier est canonique).
    /// Vide pour une feuille.
    pub fn children(&self, code: &str) -> Result<Vec<Vec<&Category>>, CategorizationError> {
        let (hierarchy, code) = self.navigate(code)?;
        Ok(hierarchy
            .child_sets(code)
            .iter()
            .map(|set| self.resolve_set(set))
            .collect())
    }

    /// Toutes les catégories qui citent `code` dans l'un de leurs ensembles.
    pub fn parents(&self, code: &str) -> Result<Vec<&Category>, CategorizationError> {
        let (hierarchy, code) = self.navigate(code)?;
        Ok(self.resolve_set(hierarchy.parent_codes(code)))
    }

    /// Parents, grands-parents... dans l'ordre de la catégorisation.
    pub fn ancestors(&self, code: &str) -> Result<Vec<&Category>, CategorizationError> {
        Ok(self.resolve_sorted(&self.ancestor_codes(code)?))
    }

    /// Enfants, petits-enfants... (tous ensembles confondus), dans l'ordre
    /// de la catégorisation.
    pub fn descendants(&self, code: &str) -> Result<Vec<&Category>, CategorizationError> {
        let (hierarchy, code) = self.navigate(code)?;
        Ok(self.resolve_sorted(&hierarchy.descendant_codes(code)))
    }

    /// Codes canoniques des ancêtres de `code` (sans `code` lui-même).
    pub(crate) fn ancestor_codes(
        &self,
        code: &str,
    ) -> Result<BTreeSet<String>, CategorizationError> {
        let (hierarchy, code) = self.navigate(code)?;
        Ok(hierarchy.ancestor_codes(code))
    }

    pub fn is_leaf(&self, code: &str) -> Result<bool, CategorizationError> {
        let (hierarchy, code) = self.navigate(code)?;
        Ok(hierarchy.child_sets(code).is_empty())
    }

    /// Le niveau de `code` : la catégorie canonique de plus haut niveau est au
    /// niveau 1, ses enfants canoniques au niveau 2, etc.
    ///
    /// Seuls les ensembles d'enfants CANONIQUES comptent : une catégorie
    /// atteignable uniquement par un ensemble alternatif n'a pas de niveau.
    pub fn level(&self, code: &str) -> Result<usize, CategorizationError> {
        let (hierarchy, target) = self.navigate(code)?;
        let top = hierarchy
            .canonical_top_level_category()
            .ok_or_else(|| CategorizationError::NoCanonicalTopLevel {
                categorization: self.name().to_string(),
            })?;

        let mut visited: HashSet<&str> = HashSet::from([top]);
        let mut queue: VecDeque<(&str, usize)> = VecDeque::from([(top, 1)]);
        while let Some((current, level)) = queue.pop_front() {
            if current == target {
                return Ok(level);
            }
            if let Some(canonical) = hierarchy.child_sets(current).first() {
                for child in canonical {
                    if visited.insert(child.as_str()) {
                        queue.push_back((child.as_str(), level + 1));
                    }
                }
            }
        }

        Err(CategorizationError::Unreachable {
            code: code.to_string(),
            top: top.to_string(),
        })
    }

    /// Comme `children`, mais chaque membre non-feuille est remplacé par ses
    /// feuilles (via ses ensembles canoniques). Un agrégat comme "EU" dans
    /// une liste de pays disparaît au profit de ses membres.
    pub fn leaf_children(&self, code: &str) -> Result<Vec<Vec<&Category>>, CategorizationError> {
        let (hierarchy, code) = self.navigate(code)?;
        let mut result = Vec::new();
        for set in hierarchy.child_sets(code) {
            let mut leaves = Vec::new();
            let mut visiting = HashSet::from([code.to_string()]);
            for member in set {
                hierarchy.expand_to_leaves(member, &mut visiting, &mut leaves);
            }
            result.push(self.resolve_sorted(&leaves));
        }
        Ok(result)
    }

    /// Rendu texte de la hiérarchie, toutes les racines (catégories sans parent).
    pub fn show_as_tree(&self) -> Result<String, CategorizationError> {
        self.show_as_tree_with(&TreeOptions::default())
    }

    /// Rendu texte de la hiérarchie.
    ///
    /// ```text
    /// 0 Category 0
    /// ╠╤══ ('0 Category 0's children, option 1)
    /// ║├1 Category 1
    /// ║╰3 Category 3
    /// ╠╕ ('0 Category 0's children, option 2)
    /// ║╰0X3 Total excluding category 3
    /// ╚═══
    /// ```
    pub fn show_as_tree_with(
        &self,
        options: &TreeOptions<'_>,
    ) -> Result<String, CategorizationError> {
        let hierarchy = self.require_hierarchy()?;
        let roots: Vec<&Category> = match options.root {
            Some(code) => vec![self.category(code)?],
            None => self
                .values()
                .filter(|c| hierarchy.parent_codes(c.code()).is_empty())
                .collect(),
        };

        let blocks: Vec<String> = roots
            .into_iter()
            .map(|root| {
                let mut out = format!("{}\n", (options.label)(root));
                let mut visiting = HashSet::new();
                self.render_children(hierarchy, root, "", 1, options, &mut visiting, &mut out);
                out
            })
            .collect();
        Ok(blocks.join("\n"))
    }

    /// `visiting` : les catégories du chemin en cours. Une catégorie déjà sur
    /// le chemin est affichée sans ses enfants.
    #[allow(clippy::too_many_arguments)]
    fn render_children<'c>(
        &'c self,
        hierarchy: &Hierarchy,
        category: &'c Category,
        prefix: &str,
        depth: usize,
        options: &TreeOptions<'_>,
        visiting: &mut HashSet<&'c str>,
        out: &mut String,
    ) {
        if options.maxdepth.map_or(false, |max| depth >= max) {
            return;
        }
        if !visiting.insert(category.code()) {
            return;
        }
        let sets = hierarchy.child_sets(category.code());
        match sets {
            [] => {}
            [single] => self.render_set(hierarchy, single, prefix, depth, options, visiting, out),
            _ => {
                let label = (options.label)(category);
                for (i, set) in sets.iter().enumerate() {
                    let marker = if i == 0 { "╠╤══" } else { "╠╕" };
                    out.push_str(&format!(
                        "{}{} ('{}'s children, option {})\n",
                        prefix,
                        marker,
                        label,
                        i + 1
                    ));
                    let nested = format!("{}║", prefix);
                    self.render_set(hierarchy, set, &nested, depth, options, visiting, out);
                }
                out.push_str(&format!("{}╚═══\n", prefix));
            }
        }
        visiting.remove(category.code());
    }

    #[allow(clippy::too_many_arguments)]
    fn render_set<'c>(
        &'c self,
        hierarchy: &Hierarchy,
        set: &[String],
        prefix: &str,
        depth: usize,
        options: &TreeOptions<'_>,
        visiting: &mut HashSet<&'c str>,
        out: &mut String,
    ) {
        let members = self.resolve_set(set);
        let last = members.len().saturating_sub(1);
        for (i, child) in members.into_iter().enumerate() {
            let (branch, continuation) = if i == last { ("╰", " ") } else { ("├", "│") };
            out.push_str(&format!("{}{}{}\n", prefix, branch, (options.label)(child)));
            let nested = format!("{}{}", prefix, continuation);
            self.render_children(hierarchy, child, &nested, depth + 1, options, visiting, out);
        }
    }

    /// Étend la catégorisation en REMPLAÇANT toute la hiérarchie par
    /// `hierarchy` (parent → ensembles d'enfants). Les enfants éventuels de
    /// l'extension sont ajoutés ensuite.
    pub fn extend_with_hierarchy(
        &self,
        extension: &Extension,
        hierarchy: &[(String, Vec<Vec<String>>)],
    ) -> Result<Categorization, CategorizationError> {
        self.require_hierarchy()?;
        let mut spec = self.extended_spec(extension)?;
        for (_, category) in spec.categories.iter_mut() {
            category.children.clear();
        }

        let additions = hierarchy
            .iter()
            .flat_map(|(parent, sets)| sets.iter().map(move |set| (parent, set)))
            .chain(extension.children.iter().map(|(parent, set)| (parent, set)));
        for (parent, set) in additions {
            let position = spec
                .position_of(parent)
                .ok_or_else(|| CategorizationError::InvalidExtension {
                    name: extension.name.clone(),
                    reason: format!("le parent '{}' n'existe pas", parent),
                })?;
            spec.categories[position].1.children.push(set.clone());
        }

        debug!(
            base = %self.name(),
            extension = %extension.name,
            parents = hierarchy.len(),
            "hiérarchie remplacée"
        );
        Categorization::from_spec(&spec)
    }
}
