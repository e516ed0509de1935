use crate::{CnfFormula, Literal};
use anyhow::{anyhow, Context, Result};
use flate2::read::GzDecoder;
use std::io::{BufReader, Read};

/// A structure used to read a CNF formula in the DIMACS format.
///
/// Comment lines start with `c`; the header line `p cnf <vars> <clauses>`
/// precedes the clauses, which are whitespace-separated signed integers,
/// each clause terminated by `0`. Gzip-compressed input is transparently
/// decompressed (detection by magic bytes).
#[derive(Default)]
pub struct DimacsReader;

impl DimacsReader {
    /// Reads a CNF instance and returns it.
    ///
    /// # Errors
    ///
    /// An error is returned if the content does not follow the DIMACS format.
    pub fn read<R>(&self, reader: R) -> Result<CnfFormula>
    where
        R: Read,
    {
        let mut content = Vec::new();
        BufReader::new(reader)
            .read_to_end(&mut content)
            .context("while reading a DIMACS input")?;
        if content.starts_with(&[0x1f, 0x8b]) {
            let mut decompressed = Vec::new();
            GzDecoder::new(content.as_slice())
                .read_to_end(&mut decompressed)
                .context("while decompressing a gzipped DIMACS input")?;
            content = decompressed;
        }
        Self::parse(&content).context("while parsing a DIMACS CNF")
    }

    fn parse(content: &[u8]) -> Result<CnfFormula> {
        let text = std::str::from_utf8(content).context("the input is not valid UTF-8")?;
        let mut cnf: Option<CnfFormula> = None;
        let mut current_clause: Vec<Literal> = Vec::new();
        for (line_index, line) in text.lines().enumerate() {
            let line_context = || format!("while parsing line at index {line_index}");
            let mut words = line.split_whitespace().peekable();
            match words.peek() {
                None | Some(&"c") => continue,
                Some(&"p") => {
                    if cnf.is_some() {
                        return Err(anyhow!("a second header line")).with_context(line_context);
                    }
                    words.next();
                    if words.next() != Some("cnf") {
                        return Err(anyhow!(r#"expected "cnf" after "p""#))
                            .with_context(line_context);
                    }
                    let n_vars = parse_count(words.next())
                        .context("while parsing the number of variables")
                        .with_context(line_context)?;
                    let _n_clauses = parse_count(words.next())
                        .context("while parsing the number of clauses")
                        .with_context(line_context)?;
                    if words.next().is_some() {
                        return Err(anyhow!("unexpected content after the header"))
                            .with_context(line_context);
                    }
                    cnf = Some(CnfFormula::new(n_vars));
                }
                Some(_) => {
                    let cnf = cnf
                        .as_mut()
                        .ok_or_else(|| anyhow!("a clause line before the header"))
                        .with_context(line_context)?;
                    for word in words {
                        let n = word
                            .parse::<isize>()
                            .map_err(|_| anyhow!(r#"expected a literal, got "{word}""#))
                            .with_context(line_context)?;
                        if n == 0 {
                            cnf.add_clause(std::mem::take(&mut current_clause));
                        } else {
                            let l = Literal::from(n);
                            if l.var_index() >= cnf.n_vars() {
                                return Err(anyhow!(
                                    "the variable {} exceeds the header count {}",
                                    l.var_index() + 1,
                                    cnf.n_vars()
                                ))
                                .with_context(line_context);
                            }
                            current_clause.push(l);
                        }
                    }
                }
            }
        }
        if !current_clause.is_empty() {
            return Err(anyhow!("the last clause misses its final 0"));
        }
        cnf.ok_or_else(|| anyhow!("missing header line"))
    }
}

fn parse_count(word: Option<&str>) -> Result<usize> {
    word.ok_or_else(|| anyhow!("missing integer"))?
        .parse::<usize>()
        .context("while parsing an integer")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn assert_error(instance: &str, expected_error: &str) {
        match DimacsReader::default().read(instance.as_bytes()) {
            Ok(_) => panic!(),
            Err(e) => assert_eq!(expected_error, format!("{}", e.root_cause())),
        }
    }

    #[test]
    fn test_ok() {
        let cnf = DimacsReader::default()
            .read("c a comment\np cnf 3 2\n1 2 0\n-1 3 0\n".as_bytes())
            .unwrap();
        assert_eq!(3, cnf.n_vars());
        assert_eq!(2, cnf.clauses().len());
        assert_eq!(
            vec![Literal::from(-1), Literal::from(3)],
            cnf.clauses()[1]
        );
    }

    #[test]
    fn test_clause_spanning_lines() {
        let cnf = DimacsReader::default()
            .read("p cnf 2 1\n1\n2 0\n".as_bytes())
            .unwrap();
        assert_eq!(1, cnf.clauses().len());
        assert_eq!(2, cnf.clauses()[0].len());
    }

    #[test]
    fn test_empty_formula() {
        let cnf = DimacsReader::default().read("p cnf 4 0\n".as_bytes()).unwrap();
        assert_eq!(4, cnf.n_vars());
        assert!(cnf.clauses().is_empty());
    }

    #[test]
    fn test_missing_header() {
        assert_error("1 2 0\n", "a clause line before the header");
        assert_error("c nothing\n", "missing header line");
    }

    #[test]
    fn test_second_header() {
        assert_error("p cnf 1 0\np cnf 2 0\n", "a second header line");
    }

    #[test]
    fn test_not_cnf() {
        assert_error("p wcnf 1 1\n", r#"expected "cnf" after "p""#);
    }

    #[test]
    fn test_literal_out_of_range() {
        assert_error(
            "p cnf 2 1\n1 3 0\n",
            "the variable 3 exceeds the header count 2",
        );
    }

    #[test]
    fn test_not_a_literal() {
        assert_error("p cnf 2 1\n1 x 0\n", r#"expected a literal, got "x""#);
    }

    #[test]
    fn test_missing_final_zero() {
        assert_error("p cnf 2 1\n1 2\n", "the last clause misses its final 0");
    }

    #[test]
    fn test_gzip_roundtrip() {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"p cnf 2 1\n1 -2 0\n").unwrap();
        let compressed = encoder.finish().unwrap();
        let cnf = DimacsReader::default().read(compressed.as_slice()).unwrap();
        assert_eq!(2, cnf.n_vars());
        assert_eq!(1, cnf.clauses().len());
    }
}
