// =============================================================================
// CLIMCAT — Point d'entrée : démonstration sur deux petites hiérarchies
// =============================================================================
//
// Ce main.rs montre un exemple complet :
//   1. Définir deux catégorisations hiérarchiques A et B
//   2. Naviguer dans la hiérarchie (arbre, ancêtres, feuilles)
//   3. Étendre une catégorisation
//   4. Lire une conversion A ↔ B au format texte
//   5. Chercher les doubles comptages
//
// RUST_LOG=climcat=debug affiche le détail des étapes.
//
// =============================================================================

use std::process::ExitCode;

use chrono::NaiveDate;
use tracing::Level;

use climcat::{
    CategorizationRegistry, CategorizationSpec, CategorySpec, ConversionSpec, Extension,
    TreeOptions,
};

const CONVERSION: &str = "\
# comment: Conversion de démonstration entre A et B
# institution: PIK
# last_update: 2021-07-29
A,B,comment
0,0,total
1,1
1.A,1.A
1.B,1.B
2,2
2.A + 2.B,2.A
2.A,2.A.1
2.A.1,2.A.1.a
2.B,2.A.2
# la règle suivante compte 2 deux fois
+2,1,erreur volontaire
";

fn spec_a() -> CategorizationSpec {
    CategorizationSpec::new("A", "Catégorisation A")
        .comment("La première catégorisation")
        .institution("PIK")
        .last_update(NaiveDate::from_ymd_opt(2021, 7, 29).unwrap_or_default())
        .hierarchical(true)
        .total_sum(true)
        .canonical_top_level_category("0")
        .category("0", CategorySpec::new("total").children(&["1", "2"]))
        .category("1", CategorySpec::new("un").children(&["1.A", "1.B"]))
        .category("2", CategorySpec::new("deux").children(&["2.A", "2.B"]))
        .category("1.A", CategorySpec::new("un-A"))
        .category("1.B", CategorySpec::new("un-B"))
        .category("2.A", CategorySpec::new("deux-A").children(&["2.A.1"]))
        .category("2.B", CategorySpec::new("deux-B"))
        .category("2.A.1", CategorySpec::new("deux-A-un"))
}

fn spec_b() -> CategorizationSpec {
    CategorizationSpec::new("B", "Catégorisation B")
        .comment("La seconde catégorisation")
        .institution("PIK")
        .last_update(NaiveDate::from_ymd_opt(2021, 7, 29).unwrap_or_default())
        .hierarchical(true)
        .total_sum(true)
        .canonical_top_level_category("0")
        .category("0", CategorySpec::new("total").children(&["1", "2"]))
        .category("1", CategorySpec::new("un").children(&["1.A", "1.B"]))
        .category("2", CategorySpec::new("deux").children(&["2.A"]))
        .category("1.A", CategorySpec::new("un-A"))
        .category("1.B", CategorySpec::new("un-B"))
        .category("2.A", CategorySpec::new("deux-A").children(&["2.A.1", "2.A.2"]))
        .category("2.A.1", CategorySpec::new("deux-A-un").children(&["2.A.1.a"]))
        .category("2.A.2", CategorySpec::new("deux-A-deux"))
        .category("2.A.1.a", CategorySpec::new("deux-A-un-a"))
}

fn run() -> climcat::Result<()> {
    println!("╔══════════════════════════════════════════════════╗");
    println!("║      CLIMCAT — Catégorisations climatiques       ║");
    println!("║      Hiérarchies, conversions, double comptage   ║");
    println!("╚══════════════════════════════════════════════════╝\n");

    // ═══════════════════════════════════════════════════════════
    // ÉTAPE 1 : Les deux catégorisations
    // ═══════════════════════════════════════════════════════════
    println!("═══ ÉTAPE 1 : Catégorisations A et B ═══\n");

    let mut registry = CategorizationRegistry::new();
    let a = registry.insert(climcat::Categorization::from_spec(&spec_a())?);
    let b = registry.insert(climcat::Categorization::from_spec(&spec_b())?);
    for categorization in [&a, &b] {
        println!(
            "{} : {} catégories, hiérarchique = {}",
            categorization,
            categorization.len(),
            categorization.hierarchical()
        );
    }
    println!();

    // ═══════════════════════════════════════════════════════════
    // ÉTAPE 2 : Navigation dans la hiérarchie
    // ═══════════════════════════════════════════════════════════
    println!("═══ ÉTAPE 2 : Hiérarchie de B ═══\n");

    println!("{}", b.show_as_tree()?);
    println!("--- profondeur 2, titres seuls ---");
    let shallow = TreeOptions::new().maxdepth(2).label(|c| c.title.clone());
    println!("{}", b.show_as_tree_with(&shallow)?);

    let ancestors: Vec<String> = b.ancestors("2.A.1.a")?.iter().map(|c| c.to_string()).collect();
    println!("Ancêtres de 2.A.1.a : {}", ancestors.join(", "));
    println!("Niveau de 2.A.1.a : {}", b.level("2.A.1.a")?);
    let leaves: Vec<String> = b
        .leaf_children("2")?
        .iter()
        .map(|set| set.iter().map(|c| c.code().to_string()).collect::<Vec<_>>().join(" + "))
        .collect();
    println!("Feuilles sous 2 : {}\n", leaves.join(" | "));

    // ═══════════════════════════════════════════════════════════
    // ÉTAPE 3 : Extension
    // ═══════════════════════════════════════════════════════════
    println!("═══ ÉTAPE 3 : Extension de A ═══\n");

    let extension = Extension::new("detail")
        .category("1.A.i", CategorySpec::new("un-A-i"))
        .category("1.A.ii", CategorySpec::new("un-A-ii"))
        .children("1.A", &["1.A.i", "1.A.ii"])
        .alternative_code("I", "1");
    let extended = a.extend(&extension)?;
    println!("{} ({} catégories)", extended, extended.len());
    println!("{}", extended.show_as_tree()?);

    // ═══════════════════════════════════════════════════════════
    // ÉTAPE 4 : Conversion au format texte
    // ═══════════════════════════════════════════════════════════
    println!("═══ ÉTAPE 4 : Conversion A ↔ B ═══\n");

    let conversion = ConversionSpec::from_csv_str(CONVERSION)?.hydrate(&registry)?;
    println!("{}\n", conversion);
    println!("{}", conversion.describe_detailed());

    // ═══════════════════════════════════════════════════════════
    // ÉTAPE 5 : Double comptage
    // ═══════════════════════════════════════════════════════════
    println!("═══ ÉTAPE 5 : Recherche de double comptage ═══\n");

    let problems = conversion.find_over_counting_problems()?;
    if problems.is_empty() {
        println!("✓ Aucun double comptage détecté\n");
    }
    for problem in &problems {
        println!("✗ {}", problem);
    }

    println!("═══════════════════════════════════════════════════");
    println!("  {} règles, {} problèmes possibles", conversion.rules.len(), problems.len());
    println!("═══════════════════════════════════════════════════");
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::WARN.into()),
        )
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("✗ {}", err);
            ExitCode::FAILURE
        }
    }
}
