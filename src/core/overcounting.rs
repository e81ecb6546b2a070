// =============================================================================
// OVERCOUNTING — Détection heuristique du double comptage
// =============================================================================
//
// Question posée : une quantité de la catégorie c (dans A) peut-elle être
// attribuée, via les règles, à plusieurs endroits MUTUELLEMENT EXCLUSIFS de
// la hiérarchie B ?
//
// Pour chaque catégorie c de A (puis chaque catégorie de B, dans l'autre
// sens) :
//
//   1. lignée(c) = {c} ∪ ancêtres(c)
//   2. règles retenues : sans restriction auxiliaire, tous facteurs = +1, et
//      dont le côté A touche lignée(c)
//   3. chaque règle projette une lignée dans B. Le côté B d'une règle est
//      une SOMME : sa lignée est celle de la somme, c'est-à-dire
//      l'intersection des lignées de ses membres
//         2.A + 2.B   →   {2.A, 2, 0} ∩ {2.B, 2, 0} = {2, 0}
//   4. enveloppe = union des lignées projetées
//      si l'enveloppe n'est pas la plus grande lignée projetée, les
//      projections divergent : PROBLÈME
//
// EXEMPLE (règles 0↔0, 2↔2, 2↔1 entre deux hiérarchies 0:[1, 2]) :
//
//   lignée(A:2) = {2, 0}
//   projections : {0}  {2, 0}  {1, 0}
//   enveloppe   : {0, 1, 2}   ≠   {2, 0}        → A:2 est comptée deux fois
//
// C'est une heuristique : seules les règles unitaires et sans restriction
// sont vues, des faux positifs et des oublis sont possibles. Le résultat est
// une liste de candidats à relire, pas une preuve.
//
// =============================================================================

use std::collections::BTreeSet;
use std::fmt;

use tracing::{debug, info};

use super::categorization::Categorization;
use super::category::Category;
use super::conversion::Conversion;
use super::error::{CategorizationError, ConversionError};
use super::rule::ConversionRule;

/// Une catégorie susceptible d'être comptée plusieurs fois dans l'autre
/// catégorisation.
#[derive(Debug, Clone)]
pub struct OvercountingProblem {
    pub category: Category,
    /// Une lignée projetée par règle retenue, dans l'ordre des règles.
    pub ancestral_sets_projected: Vec<Vec<Category>>,
    /// Les règles qui ont contribué à la projection.
    pub rules: Vec<ConversionRule>,
    /// Les membres de l'enveloppe sans enfant dans l'enveloppe.
    pub leaf_level: Vec<Category>,
}

impl fmt::Display for OvercountingProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let leaves: Vec<String> = self.leaf_level.iter().map(|c| c.to_string()).collect();
        writeln!(
            f,
            "{}: {} est projetée sur des catégories qui se recouvrent : {}",
            self.category.categorization(),
            self.category,
            leaves.join(", ")
        )?;
        writeln!(f, "Règles en cause :")?;
        for rule in &self.rules {
            match rule.csv_line_number {
                Some(line) => writeln!(f, "  ligne {} : {}", line, rule)?,
                None => writeln!(f, "  {}", rule)?,
            }
        }
        Ok(())
    }
}

/// Sens de la projection.
#[derive(Clone, Copy)]
enum Direction {
    AToB,
    BToA,
}

impl Direction {
    fn sides<'r>(
        &self,
        rule: &'r ConversionRule,
    ) -> (&'r [(Category, i32)], &'r [(Category, i32)]) {
        let (a, b) = (&rule.factors_categories_a, &rule.factors_categories_b);
        match self {
            Direction::AToB => (a.as_slice(), b.as_slice()),
            Direction::BToA => (b.as_slice(), a.as_slice()),
        }
    }
}

/// {code} ∪ ancêtres(code), en codes canoniques.
fn lineage(
    categorization: &Categorization,
    code: &str,
) -> Result<BTreeSet<String>, CategorizationError> {
    let mut lineage = categorization.ancestor_codes(code)?;
    lineage.insert(categorization.canonical_code(code)?.to_string());
    Ok(lineage)
}

fn require_additive_hierarchy(categorization: &Categorization) -> Result<(), ConversionError> {
    if !categorization.hierarchical() {
        return Err(ConversionError::NotHierarchical {
            name: categorization.name().to_string(),
        });
    }
    if !categorization.total_sum() {
        return Err(ConversionError::NotTotalSum {
            name: categorization.name().to_string(),
        });
    }
    Ok(())
}

impl Conversion {
    /// Cherche les catégories qui pourraient être comptées plusieurs fois.
    ///
    /// Les deux catégorisations doivent être hiérarchiques et additives
    /// (`total_sum`), sinon la vérification n'a pas de sens.
    pub fn find_over_counting_problems(&self) -> Result<Vec<OvercountingProblem>, ConversionError> {
        require_additive_hierarchy(&self.categorization_a)?;
        require_additive_hierarchy(&self.categorization_b)?;

        let rules: Vec<&ConversionRule> = self
            .rules
            .iter()
            .filter(|r| r.is_unrestricted() && r.has_unit_factors())
            .collect();

        let (a, b) = (&self.categorization_a, &self.categorization_b);
        let mut problems = self.check_direction(a, b, Direction::AToB, &rules)?;
        problems.extend(self.check_direction(b, a, Direction::BToA, &rules)?);

        info!(
            a = %self.categorization_a,
            b = %self.categorization_b,
            rules_considered = rules.len(),
            problems = problems.len(),
            "recherche de double comptage terminée"
        );
        Ok(problems)
    }

    fn check_direction(
        &self,
        source: &Categorization,
        target: &Categorization,
        direction: Direction,
        rules: &[&ConversionRule],
    ) -> Result<Vec<OvercountingProblem>, CategorizationError> {
        let mut problems = Vec::new();

        for category in source.values() {
            let ancestry = lineage(source, category.code())?;

            let mut projected: Vec<BTreeSet<String>> = Vec::new();
            let mut contributing: Vec<ConversionRule> = Vec::new();
            for rule in rules {
                let (from, to) = direction.sides(rule);
                if !from.iter().any(|(c, _)| ancestry.contains(c.code())) {
                    continue;
                }
                let mut common: Option<BTreeSet<String>> = None;
                for (member, _) in to {
                    let member_lineage = lineage(target, member.code())?;
                    common = Some(match common {
                        None => member_lineage,
                        Some(acc) => acc.intersection(&member_lineage).cloned().collect(),
                    });
                }
                if let Some(common) = common {
                    projected.push(common);
                    contributing.push((*rule).clone());
                }
            }

            if projected.is_empty() {
                continue;
            }
            let hull: BTreeSet<String> = projected.iter().flatten().cloned().collect();
            let largest = projected.iter().map(BTreeSet::len).max().unwrap_or(0);
            // La plus grande lignée est incluse dans l'enveloppe : comparer
            // les tailles suffit.
            if hull.len() == largest {
                continue;
            }

            let problem = OvercountingProblem {
                category: category.clone(),
                ancestral_sets_projected: projected
                    .iter()
                    .map(|set| target.resolve_sorted(set).into_iter().cloned().collect())
                    .collect(),
                rules: contributing,
                leaf_level: leaf_level(target, &hull)?,
            };
            debug!(
                categorization = %source,
                category = %category,
                rules = problem.rules.len(),
                "double comptage possible"
            );
            problems.push(problem);
        }

        Ok(problems)
    }
}

/// Membres de l'enveloppe sans enfant, ou dont aucun enfant n'est dans
/// l'enveloppe.
fn leaf_level(
    target: &Categorization,
    hull: &BTreeSet<String>,
) -> Result<Vec<Category>, CategorizationError> {
    let mut leaves = Vec::new();
    for category in target.resolve_sorted(hull) {
        let children = target.children(category.code())?;
        let inside = children
            .iter()
            .flatten()
            .any(|child| hull.contains(child.code()));
        if !inside {
            leaves.push(category.clone());
        }
    }
    Ok(leaves)
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::categorization::CategorizationSpec;
    use crate::core::category::CategorySpec;
    use crate::core::registry::CategorizationRegistry;
    use crate::core::rule::ConversionRuleSpec;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn spec_a() -> CategorizationSpec {
        CategorizationSpec::new("A", "Categorization A")
            .comment("The first categorization")
            .institution("PIK")
            .last_update(NaiveDate::from_ymd_opt(2021, 7, 29).unwrap())
            .hierarchical(true)
            .total_sum(true)
            .canonical_top_level_category("0")
            .category("0", CategorySpec::new("total").children(&["1", "2"]))
            .category("1", CategorySpec::new("one").children(&["1.A", "1.B"]))
            .category("2", CategorySpec::new("two").children(&["2.A", "2.B"]))
            .category("1.A", CategorySpec::new("one-A"))
            .category("1.B", CategorySpec::new("one-B"))
            .category("2.A", CategorySpec::new("two-A").children(&["2.A.1"]))
            .category("2.B", CategorySpec::new("two-B"))
            .category("2.A.1", CategorySpec::new("two-A-one"))
    }

    fn spec_b() -> CategorizationSpec {
        CategorizationSpec::new("B", "Categorization B")
            .comment("The second categorization")
            .institution("PIK")
            .last_update(NaiveDate::from_ymd_opt(2021, 7, 29).unwrap())
            .hierarchical(true)
            .total_sum(true)
            .canonical_top_level_category("0")
            .category("0", CategorySpec::new("total").children(&["1", "2"]))
            .category("1", CategorySpec::new("one").children(&["1.A", "1.B"]))
            .category("2", CategorySpec::new("two").children(&["2.A"]))
            .category("1.A", CategorySpec::new("one-A"))
            .category("1.B", CategorySpec::new("one-B"))
            .category("2.A", CategorySpec::new("two-A").children(&["2.A.1", "2.A.2"]))
            .category("2.A.1", CategorySpec::new("two-A-one").children(&["2.A.1.a"]))
            .category("2.A.2", CategorySpec::new("two-A-two"))
            .category("2.A.1.a", CategorySpec::new("two-A-one-a"))
    }

    fn rows() -> Vec<Vec<&'static str>> {
        vec![
            vec!["0", "0", "total"],
            vec!["1", "1"],
            vec!["1.A", "1.A"],
            vec!["1.B", "1.B"],
            vec!["2", "2"],
            vec!["2.A + 2.B", "2.A"],
            vec!["2.A", "2.A.1"],
            vec!["2.A.1", "2.A.1.a"],
            vec!["2.B", "2.A.2"],
        ]
    }

    fn conversion(
        a: &CategorizationSpec,
        b: &CategorizationSpec,
        rows: &[Vec<&str>],
        aux: &[&str],
    ) -> Conversion {
        let a = Arc::new(Categorization::from_spec(a).unwrap());
        let b = Arc::new(Categorization::from_spec(b).unwrap());
        let mut registry = CategorizationRegistry::new();
        let gas = CategorizationSpec::new("gas", "Gases")
            .category("CO2", CategorySpec::new("Carbon dioxide"));
        registry.insert(Categorization::from_spec(&gas).unwrap());
        let rules = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                ConversionRuleSpec::from_csv_row(row, aux, Some(i + 2))
                    .unwrap()
                    .hydrate(&a, &b, &registry)
                    .unwrap()
            })
            .collect();
        Conversion::new(a, b, rules, Vec::new())
    }

    fn problem_keys(problems: &[OvercountingProblem]) -> Vec<String> {
        problems
            .iter()
            .map(|p| format!("{}:{}", p.category.categorization(), p.category.code()))
            .collect()
    }

    #[test]
    fn test_no_over_counting() {
        let conv = conversion(&spec_a(), &spec_b(), &rows(), &[]);
        assert!(conv.find_over_counting_problems().unwrap().is_empty());
        assert!(conv.reversed().find_over_counting_problems().unwrap().is_empty());
    }

    #[test]
    fn test_simple_over_counting() {
        let mut rows = rows();
        rows.push(vec!["2", "1"]);
        let conv = conversion(&spec_a(), &spec_b(), &rows, &[]);
        let problems = conv.find_over_counting_problems().unwrap();
        assert_eq!(
            problem_keys(&problems),
            ["A:2", "A:2.A", "A:2.B", "A:2.A.1", "B:1", "B:1.A", "B:1.B"]
        );

        let a2 = &problems[0];
        assert_eq!(a2.category, conv.categorization_a["2"]);
        assert_eq!(a2.rules.len(), 3);
        let leaves: Vec<&str> = a2.leaf_level.iter().map(|c| c.code()).collect();
        assert_eq!(leaves, ["1", "2"]);
        assert_eq!(a2.ancestral_sets_projected.len(), 3);
    }

    #[test]
    fn test_over_counting_aux() {
        // Colonne auxiliaire vide : les règles restent sans restriction
        let mut rows = rows();
        rows.push(vec!["2", "1"]);
        for row in rows.iter_mut() {
            row.insert(1, "");
        }
        let conv = conversion(&spec_a(), &spec_b(), &rows, &["gas"]);
        let problems = conv.find_over_counting_problems().unwrap();
        assert_eq!(problems.len(), 7);
        assert!(problems.iter().any(|p| p.category == conv.categorization_b["1.B"]));
    }

    #[test]
    fn test_restricted_rules_are_ignored() {
        let mut rows = rows();
        rows.push(vec!["2", "1"]);
        for row in rows.iter_mut() {
            row.insert(1, "");
        }
        let last = rows.len() - 1;
        rows[last][1] = "CO2";
        let conv = conversion(&spec_a(), &spec_b(), &rows, &["gas"]);
        assert!(conv.find_over_counting_problems().unwrap().is_empty());
    }

    #[test]
    fn test_non_unit_factors_are_ignored() {
        let mut rows = rows();
        rows.push(vec!["2 + 2", "1"]);
        let conv = conversion(&spec_a(), &spec_b(), &rows, &[]);
        assert!(conv.find_over_counting_problems().unwrap().is_empty());
    }

    #[test]
    fn test_sum_over_counting() {
        let mut b = spec_b();
        b.categories[1].1.children = vec![vec!["1.A".into(), "1.B".into(), "1.C".into()]];
        let b = b.category("1.C", CategorySpec::new("one-C"));
        let mut rows = rows();
        rows.push(vec!["1.A + 1.B", "1.C"]);
        let conv = conversion(&spec_a(), &b, &rows, &[]);
        let problems = conv.find_over_counting_problems().unwrap();
        assert_eq!(problem_keys(&problems), ["A:1.A", "A:1.B"]);
    }

    #[test]
    fn test_sum_no_over_counting() {
        let mut rows = rows();
        rows.push(vec!["1.A + 1.B", "1"]);
        let conv = conversion(&spec_a(), &spec_b(), &rows, &[]);
        assert!(conv.find_over_counting_problems().unwrap().is_empty());
    }

    /// Deux catégorisations hiérarchiques additives de plus haut niveau "0".
    fn additive(name: &str) -> CategorizationSpec {
        CategorizationSpec::new(name, name)
            .hierarchical(true)
            .total_sum(true)
            .canonical_top_level_category("0")
    }

    #[test]
    fn test_alternative_child_set_ancestry() {
        // 1 a deux parents : 0 (canonique) et X (ensemble alternatif de 0)
        let a = additive("A")
            .category(
                "0",
                CategorySpec::new("total").children(&["1", "2"]).children(&["X", "Y"]),
            )
            .category("1", CategorySpec::new("one"))
            .category("2", CategorySpec::new("two"))
            .category("X", CategorySpec::new("ex").children(&["1"]))
            .category("Y", CategorySpec::new("why"));
        let b = additive("B")
            .category("0", CategorySpec::new("total").children(&["a", "b"]))
            .category("a", CategorySpec::new("a"))
            .category("b", CategorySpec::new("b"));
        let conv = conversion(&a, &b, &[vec!["X", "a"], vec!["1", "b"]], &[]);
        let problems = conv.find_over_counting_problems().unwrap();
        assert_eq!(problem_keys(&problems), ["A:1"]);
        let leaves: Vec<&str> = problems[0].leaf_level.iter().map(|c| c.code()).collect();
        assert_eq!(leaves, ["a", "b"]);
    }

    #[test]
    fn test_cyclic_hierarchy_terminates() {
        let a = additive("A")
            .category("0", CategorySpec::new("total").children(&["1", "2"]))
            .category("1", CategorySpec::new("one").children(&["2"]))
            .category("2", CategorySpec::new("two").children(&["1"]));
        let b = additive("B")
            .category("0", CategorySpec::new("total").children(&["a", "b"]))
            .category("a", CategorySpec::new("a"))
            .category("b", CategorySpec::new("b"));
        let conv = conversion(&a, &b, &[vec!["1", "a"], vec!["2", "b"]], &[]);
        let problems = conv.find_over_counting_problems().unwrap();
        assert_eq!(problem_keys(&problems), ["A:1", "A:2"]);
    }

    #[test]
    fn test_not_hierarchical() {
        let flatten = |spec: CategorizationSpec| {
            let mut spec = spec.hierarchical(false);
            spec.total_sum = None;
            spec.canonical_top_level_category = None;
            for (_, category) in spec.categories.iter_mut() {
                category.children.clear();
            }
            spec
        };
        let conv = conversion(&flatten(spec_a()), &flatten(spec_b()), &rows(), &[]);
        let err = conv.find_over_counting_problems().unwrap_err();
        assert_eq!(err, ConversionError::NotHierarchical { name: "A".into() });
        assert!(err.to_string().contains("n'est pas hiérarchique"));
    }

    #[test]
    fn test_not_total_sum() {
        let conv = conversion(&spec_a().total_sum(false), &spec_b(), &rows(), &[]);
        assert_eq!(
            conv.find_over_counting_problems().unwrap_err(),
            ConversionError::NotTotalSum { name: "A".into() }
        );
    }

    #[test]
    fn test_display() {
        let mut rows = rows();
        rows.push(vec!["2", "1"]);
        let conv = conversion(&spec_a(), &spec_b(), &rows, &[]);
        let problems = conv.find_over_counting_problems().unwrap();
        assert_eq!(
            problems[0].to_string(),
            "A: 2 two est projetée sur des catégories qui se recouvrent : 1 one, 2 two\n\
             Règles en cause :\n  ligne 2 : 0 ↔ 0\n  ligne 6 : 2 ↔ 2\n  ligne 11 : 2 ↔ 1\n"
        );
    }
}
