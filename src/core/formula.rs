// =============================================================================
// FORMULA — Sommes signées de codes et listes de codes auxiliaires
// =============================================================================
//
// Deux petites grammaires, analysées à la main avec un seul caractère
// d'avance :
//
//   formule      ::= [signe] code (signe code)*
//   liste        ::= code*                      (séparés par des espaces)
//   signe        ::= '+' | '-'
//   code         ::= [A-Za-z0-9.]+
//                  | '"' ( '\' <car> | <car sauf " et \> )* '"'
//
// Les espaces sont libres autour des signes et des codes.
//
// Une formule donne une table code → facteur NET : les occurrences répétées
// s'accumulent.
//
//   -A+B - "A"    →  {A: -2, B: 1}
//   A + A         →  {A: 2}
//
// `format_factors` est l'inverse : un facteur n est réécrit en |n| termes
// unitaires signés, ce qui reproduit exactement l'accumulation.
//
//   {A: -2, B: 1} →  -A - A + B
//
// =============================================================================

use std::collections::BTreeMap;

use super::error::FormulaError;

/// Curseur sur le texte analysé, positions en caractères.
struct Scanner<'a> {
    input: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Scanner {
            input,
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().map_or(false, char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn error(&self, message: &str) -> FormulaError {
        FormulaError {
            input: self.input.to_string(),
            message: message.to_string(),
            position: self.pos,
        }
    }

    /// Un signe '+' ou '-', s'il y en a un : vrai pour '-'.
    fn sign(&mut self) -> Option<bool> {
        match self.peek() {
            Some('+') => {
                self.pos += 1;
                Some(false)
            }
            Some('-') => {
                self.pos += 1;
                Some(true)
            }
            _ => None,
        }
    }

    fn code(&mut self) -> Result<String, FormulaError> {
        match self.peek() {
            Some('"') => self.quoted_code(),
            Some(c) if is_plain_code_char(c) => {
                let start = self.pos;
                while self.peek().map_or(false, is_plain_code_char) {
                    self.pos += 1;
                }
                Ok(self.chars[start..self.pos].iter().collect())
            }
            _ => Err(self.error("code de catégorie attendu")),
        }
    }

    fn quoted_code(&mut self) -> Result<String, FormulaError> {
        let opening = self.pos;
        self.pos += 1;
        let mut code = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(FormulaError {
                        position: opening,
                        ..self.error("guillemet fermant manquant")
                    })
                }
                Some('"') => {
                    self.pos += 1;
                    return Ok(code);
                }
                Some('\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(escaped) => {
                            code.push(escaped);
                            self.pos += 1;
                        }
                        None => return Err(self.error("caractère échappé attendu après '\\'")),
                    }
                }
                Some(c) => {
                    code.push(c);
                    self.pos += 1;
                }
            }
        }
    }
}

fn is_plain_code_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.'
}

/// Analyse une formule et renvoie le facteur net de chaque code.
pub fn parse_formula(formula: &str) -> Result<BTreeMap<String, i32>, FormulaError> {
    let mut scanner = Scanner::new(formula);
    let mut factors = BTreeMap::new();

    scanner.skip_whitespace();
    let mut negative = scanner.sign().unwrap_or(false);
    loop {
        scanner.skip_whitespace();
        let code = scanner.code()?;
        *factors.entry(code).or_insert(0) += if negative { -1 } else { 1 };

        scanner.skip_whitespace();
        if scanner.at_end() {
            return Ok(factors);
        }
        negative = scanner
            .sign()
            .ok_or_else(|| scanner.error("opérateur '+' ou '-' attendu"))?;
    }
}

/// Analyse une liste de codes séparés par des espaces. Une chaîne vide
/// donne une liste vide.
pub fn parse_aux_codes(codes: &str) -> Result<Vec<String>, FormulaError> {
    let mut scanner = Scanner::new(codes);
    let mut result = Vec::new();

    scanner.skip_whitespace();
    while !scanner.at_end() {
        result.push(scanner.code()?);
        match scanner.peek() {
            None => break,
            Some(c) if c.is_whitespace() => scanner.skip_whitespace(),
            Some(_) => return Err(scanner.error("espace attendu entre deux codes")),
        }
    }
    Ok(result)
}

/// Écrit un code tel que `parse_formula` le relira : tel quel s'il n'est
/// fait que de caractères alphanumériques et de points, entre guillemets
/// sinon.
pub fn format_code(code: &str) -> String {
    if !code.is_empty() && code.chars().all(is_plain_code_char) {
        return code.to_string();
    }
    let mut quoted = String::with_capacity(code.len() + 2);
    quoted.push('"');
    for c in code.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Réécrit une table de facteurs en formule. Un facteur nul devient
/// `A - A`.
pub fn format_factors(factors: &BTreeMap<String, i32>) -> String {
    let mut terms: Vec<(bool, String)> = Vec::new();
    for (code, &factor) in factors {
        let code = format_code(code);
        if factor == 0 {
            terms.push((false, code.clone()));
            terms.push((true, code));
        } else {
            for _ in 0..factor.unsigned_abs() {
                terms.push((factor < 0, code.clone()));
            }
        }
    }

    let mut formula = String::new();
    for (i, (negative, code)) in terms.iter().enumerate() {
        match (i, negative) {
            (0, false) => {}
            (0, true) => formula.push('-'),
            (_, false) => formula.push_str(" + "),
            (_, true) => formula.push_str(" - "),
        }
        formula.push_str(code);
    }
    formula
}

/// Écrit une liste de codes auxiliaires, séparés par un espace.
pub fn format_aux_codes<'a, I>(codes: I) -> String
where
    I: IntoIterator<Item = &'a String>,
{
    codes
        .into_iter()
        .map(|c| format_code(c))
        .collect::<Vec<_>>()
        .join(" ")
}
