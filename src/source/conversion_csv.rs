// =============================================================================
// CONVERSION CSV — Le format texte des conversions
// =============================================================================
//
// Un fichier de conversion ressemble à ceci :
//
//   # comment: Conversion entre A et B
//   # references: expert judgement
//   # institution: PIK
//   # last_update: 2021-07-29
//   # version: 1.0
//   A,gas,B,comment
//   1.A + 1.B,,1
//   2,CO2 N2O,2.A,seulement deux gaz
//
// Les lignes '#' qui précèdent l'en-tête sont des métadonnées 'clé: valeur'.
// L'en-tête nomme la catégorisation A, les catégorisations auxiliaires,
// la catégorisation B, puis éventuellement une colonne 'comment'.
// Chaque ligne suivante est une règle.
//
// Pas de guillemets au niveau CSV : une barre oblique inverse échappe le
// caractère suivant, une virgule non échappée sépare deux champs. Les
// guillemets appartiennent aux formules (voir core::formula).
//
// Les lignes vides et les lignes '#' après l'en-tête sont ignorées.
// Les numéros de ligne sont ceux du fichier, à partir de 1.
//
// =============================================================================

use chrono::NaiveDate;
use tracing::debug;

use crate::core::conversion::ConversionSpec;
use crate::core::error::ConversionError;
use crate::core::rule::{join_csv_fields, ConversionRuleSpec};

const COMMENT_COLUMN: &str = "comment";

/// Découpe une ligne en champs.
///
/// `\x` donne `x` quel que soit `x` ; une barre oblique inverse en fin de
/// ligne est gardée telle quelle.
pub fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => current.push(escaped),
                None => current.push('\\'),
            },
            ',' => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Inverse de `split_fields`.
pub fn join_fields<S: AsRef<str>>(fields: &[S]) -> String {
    join_csv_fields(fields)
}

/// L'en-tête, une fois la colonne de commentaire mise à part.
struct Header {
    categorization_a: String,
    auxiliaries: Vec<String>,
    categorization_b: String,
}

fn parse_header(line: &str) -> Result<Header, ConversionError> {
    let mut columns: Vec<String> = split_fields(line)
        .into_iter()
        .map(|c| c.trim().to_string())
        .collect();
    if columns.len() >= 3 && columns.last().map(String::as_str) == Some(COMMENT_COLUMN) {
        columns.pop();
    }
    if columns.len() < 2 || columns.iter().any(String::is_empty) {
        return Err(ConversionError::MissingHeader);
    }
    let categorization_b = columns.pop().ok_or(ConversionError::MissingHeader)?;
    let categorization_a = columns.remove(0);
    Ok(Header {
        categorization_a,
        auxiliaries: columns,
        categorization_b,
    })
}

fn apply_metadata(
    spec: &mut ConversionSpec,
    line_number: usize,
    line: &str,
) -> Result<(), ConversionError> {
    let invalid = || ConversionError::InvalidMetadata {
        line: line_number,
        text: line.to_string(),
    };
    let body = line.trim_start().trim_start_matches('#');
    let (key, value) = body.split_once(':').ok_or_else(invalid)?;
    let value = value.trim();
    match key.trim() {
        "comment" => spec.comment = value.to_string(),
        "references" => spec.references = value.to_string(),
        "institution" => spec.institution = value.to_string(),
        "last_update" => {
            let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
                ConversionError::InvalidDate {
                    value: value.to_string(),
                }
            })?;
            spec.last_update = Some(date);
        }
        "version" => spec.version = Some(value.to_string()),
        _ => return Err(invalid()),
    }
    Ok(())
}

impl ConversionSpec {
    /// Lit une conversion au format texte.
    pub fn from_csv_str(text: &str) -> Result<Self, ConversionError> {
        let mut lines = text.lines().enumerate().map(|(i, line)| (i + 1, line));

        // Métadonnées puis en-tête
        let mut spec = ConversionSpec::new("", "");
        let header = loop {
            match lines.next() {
                None => return Err(ConversionError::MissingHeader),
                Some((_, line)) if line.trim().is_empty() => continue,
                Some((number, line)) if line.trim_start().starts_with('#') => {
                    apply_metadata(&mut spec, number, line)?;
                }
                Some((_, line)) => break parse_header(line)?,
            }
        };
        spec.categorization_a_name = header.categorization_a;
        spec.categorization_b_name = header.categorization_b;
        spec.auxiliary_categorizations_names = header.auxiliaries;

        // Règles
        for (number, line) in lines {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let row = split_fields(line);
            let rule = ConversionRuleSpec::from_csv_row(
                &row,
                &spec.auxiliary_categorizations_names,
                Some(number),
            )?;
            spec.rules.push(rule);
        }

        debug!(
            a = %spec.categorization_a_name,
            b = %spec.categorization_b_name,
            rules = spec.rules.len(),
            "conversion lue"
        );
        Ok(spec)
    }

    /// Écrit la conversion au format texte. `from_csv_str` relit une
    /// conversion égale.
    pub fn to_csv_string(&self) -> String {
        let mut out = String::new();
        let mut meta = |key: &str, value: &str| {
            if !value.is_empty() {
                out.push_str(&format!("# {}: {}\n", key, value));
            }
        };
        meta("comment", &self.comment);
        meta("references", &self.references);
        meta("institution", &self.institution);
        meta(
            "last_update",
            &self.last_update.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default(),
        );
        meta("version", self.version.as_deref().unwrap_or_default());

        let mut header = vec![self.categorization_a_name.as_str()];
        header.extend(self.auxiliary_categorizations_names.iter().map(String::as_str));
        header.push(self.categorization_b_name.as_str());
        if self.rules.iter().any(|rule| !rule.comment.is_empty()) {
            header.push(COMMENT_COLUMN);
        }
        out.push_str(&join_fields(&header));
        out.push('\n');

        for rule in &self.rules {
            out.push_str(&join_fields(&rule.to_csv_row(&self.auxiliary_categorizations_names)));
            out.push('\n');
        }
        out
    }
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::categorization::CategorizationSpec;
    use crate::core::category::CategorySpec;
    use crate::core::error::RuleError;
    use crate::core::registry::CategorizationRegistry;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    const GOOD: &str = "\
# comment: A correct conversion specification file
# references: expert judgement
# institution: PIK
# last_update: 2099-12-31
# version: 1.2.3.4
A,aux1,aux2,B,comment
asdf + fdsa,,,asdf
A.5,3 4 A,\"B A\" A B,4

# une ligne de commentaire au milieu
b + argl.5 + c,,,D,nobody needs argl
b + \"argl\\,5\" + c,,,D
-2.A,,,1 - 1
";

    fn factors(pairs: &[(&str, i32)]) -> BTreeMap<String, i32> {
        pairs.iter().map(|(c, f)| (c.to_string(), *f)).collect()
    }

    #[test]
    fn test_split_fields() {
        assert_eq!(split_fields("a,b,,c"), ["a", "b", "", "c"]);
        assert_eq!(split_fields(r"a\,b,c\\"), ["a,b", r"c\"]);
        assert_eq!(split_fields(r"a\"), [r"a\"]);
        assert_eq!(split_fields(""), [""]);
        assert_eq!(split_fields(&join_fields(&["x,y", r"\z", ""])), ["x,y", r"\z", ""]);
    }

    #[test]
    fn test_good_csv() {
        let spec = ConversionSpec::from_csv_str(GOOD).unwrap();
        assert_eq!(spec.categorization_a_name, "A");
        assert_eq!(spec.categorization_b_name, "B");
        assert_eq!(spec.auxiliary_categorizations_names, ["aux1", "aux2"]);
        assert_eq!(spec.comment, "A correct conversion specification file");
        assert_eq!(spec.references, "expert judgement");
        assert_eq!(spec.institution, "PIK");
        assert_eq!(spec.last_update, NaiveDate::from_ymd_opt(2099, 12, 31));
        assert_eq!(spec.version.as_deref(), Some("1.2.3.4"));
        assert_eq!(spec.rules.len(), 5);

        assert_eq!(
            spec.rules[0],
            ConversionRuleSpec::new(factors(&[("asdf", 1), ("fdsa", 1)]), factors(&[("asdf", 1)]))
        );
        assert_eq!(
            spec.rules[1],
            ConversionRuleSpec::new(factors(&[("A.5", 1)]), factors(&[("4", 1)]))
                .auxiliary("aux1", &["3", "4", "A"])
                .auxiliary("aux2", &["B A", "A", "B"])
        );
        assert_eq!(
            spec.rules[2],
            ConversionRuleSpec::new(
                factors(&[("b", 1), ("argl.5", 1), ("c", 1)]),
                factors(&[("D", 1)])
            )
            .comment("nobody needs argl")
        );
        assert_eq!(
            spec.rules[3].factors_categories_a,
            factors(&[("b", 1), ("argl,5", 1), ("c", 1)])
        );
        assert_eq!(spec.rules[4].factors_categories_a, factors(&[("2.A", -1)]));
        assert_eq!(spec.rules[4].factors_categories_b, factors(&[("1", 0)]));
    }

    #[test]
    fn test_physical_line_numbers() {
        let spec = ConversionSpec::from_csv_str(GOOD).unwrap();
        let lines: Vec<_> = spec.rules.iter().map(|r| r.csv_line_number).collect();
        assert_eq!(lines, [Some(7), Some(8), Some(11), Some(12), Some(13)]);
        assert_eq!(spec.rules[1].csv_original_text.as_deref(), Some("A.5,3 4 A,\"B A\" A B,4"));
    }

    #[test]
    fn test_header_without_metadata() {
        let spec = ConversionSpec::from_csv_str("\nIPCC1996, IPCC2006\n1.A,1.A\n").unwrap();
        assert_eq!(spec.categorization_a_name, "IPCC1996");
        assert_eq!(spec.categorization_b_name, "IPCC2006");
        assert!(spec.auxiliary_categorizations_names.is_empty());
        assert_eq!(spec.comment, "");
        assert_eq!(spec.last_update, None);
        assert_eq!(spec.rules.len(), 1);
    }

    #[test]
    fn test_roundtrip() {
        let spec = ConversionSpec::from_csv_str(GOOD).unwrap();
        let text = spec.to_csv_string();
        assert!(text.starts_with("# comment: A correct conversion specification file\n"));
        assert!(text.contains("\nA,aux1,aux2,B,comment\n"));
        assert_eq!(ConversionSpec::from_csv_str(&text).unwrap(), spec);

        let plain = ConversionSpec::new("A", "B")
            .rule(ConversionRuleSpec::from_formulas("1", "2").unwrap());
        assert_eq!(plain.to_csv_string(), "A,B\n1,2\n");
    }

    #[test]
    fn test_errors() {
        assert_eq!(ConversionSpec::from_csv_str(""), Err(ConversionError::MissingHeader));
        assert_eq!(
            ConversionSpec::from_csv_str("# comment: rien\nA\n"),
            Err(ConversionError::MissingHeader)
        );
        assert_eq!(
            ConversionSpec::from_csv_str("# colour: blue\nA,B\n"),
            Err(ConversionError::InvalidMetadata {
                line: 1,
                text: "# colour: blue".to_string()
            })
        );
        assert_eq!(
            ConversionSpec::from_csv_str("# pas de clé\nA,B\n"),
            Err(ConversionError::InvalidMetadata {
                line: 1,
                text: "# pas de clé".to_string()
            })
        );
        assert_eq!(
            ConversionSpec::from_csv_str("# last_update: demain\nA,B\n"),
            Err(ConversionError::InvalidDate {
                value: "demain".to_string()
            })
        );

        match ConversionSpec::from_csv_str("A,B\n1,1\n\n1 +,2\n") {
            Err(ConversionError::Rule(RuleError::Line { line, .. })) => assert_eq!(line, 4),
            other => panic!("erreur de ligne attendue, obtenu {:?}", other),
        }
        match ConversionSpec::from_csv_str("A,aux,B\n1,2\n") {
            Err(ConversionError::Rule(RuleError::Line { line, .. })) => assert_eq!(line, 2),
            other => panic!("erreur de ligne attendue, obtenu {:?}", other),
        }
    }

    #[test]
    fn test_hydrate_from_text() {
        let a = CategorizationSpec::new("A", "A")
            .hierarchical(true)
            .total_sum(true)
            .canonical_top_level_category("0")
            .category("0", CategorySpec::new("total").children(&["1", "2"]))
            .category("1", CategorySpec::new("one"))
            .category("2", CategorySpec::new("two"));
        let b = CategorizationSpec::new("B", "B")
            .hierarchical(true)
            .total_sum(true)
            .canonical_top_level_category("0")
            .category("0", CategorySpec::new("total").children(&["1", "2"]))
            .category("1", CategorySpec::new("one"))
            .category("2", CategorySpec::new("two"));
        let registry = CategorizationRegistry::from_specs([&a, &b]).unwrap();

        let spec = ConversionSpec::from_csv_str("A,B\n0,0\n1,1\n2,2\n+2,1\n").unwrap();
        let conversion = spec.hydrate(&registry).unwrap();
        assert_eq!(conversion.rules.len(), 4);
        assert_eq!(conversion.rules[3].csv_line_number, Some(5));

        // A:2 part à la fois vers B:2 et vers B:1, B:1 reçoit A:1 et A:2
        let problems = conversion.find_over_counting_problems().unwrap();
        assert_eq!(problems.len(), 2);
        assert!(problems.iter().all(|p| p.rules.iter().any(|r| r.csv_line_number == Some(5))));

        let unknown = ConversionSpec::from_csv_str("A,C\n1,1\n").unwrap();
        assert_eq!(
            unknown.hydrate(&registry).err(),
            Some(ConversionError::UnknownCategorization { name: "C".to_string() })
        );
    }
}
