use crate::{Literal, ProjectedVars, Weights};
use anyhow::{anyhow, Context, Result};
use std::io::{BufRead, BufReader, Read};

/// Reads a literal-weight file: one literal and one weight per pair,
/// whitespace-separated. Literals are signed DIMACS integers; the weight of
/// an absent literal stays 1.
///
/// # Errors
///
/// An error is returned on a malformed pair or an out-of-range literal.
pub fn read_weights<R>(reader: R, n_vars: usize) -> Result<Weights>
where
    R: Read,
{
    let context = "while parsing a weights file";
    let mut content = String::new();
    BufReader::new(reader)
        .read_to_string(&mut content)
        .context(context)?;
    let mut weights = Weights::new(n_vars);
    let mut words = content.split_whitespace();
    while let Some(word) = words.next() {
        let l: Literal = word
            .parse()
            .with_context(|| format!(r#"expected a literal, got "{word}""#))
            .context(context)?;
        if l.var_index() >= n_vars {
            return Err(anyhow!("the variable {} is out of range", l.var_index() + 1))
                .context(context);
        }
        let weight_word = words
            .next()
            .ok_or_else(|| anyhow!("a literal without its weight"))
            .context(context)?;
        let weight = weight_word
            .parse::<f64>()
            .with_context(|| format!(r#"expected a weight, got "{weight_word}""#))
            .context(context)?;
        weights.set_weight(l, weight);
    }
    Ok(weights)
}

/// Reads a projected-variables file: a comma- or newline-separated list of
/// 1-based variable numbers.
///
/// # Errors
///
/// An error is returned on a malformed or out-of-range variable number.
pub fn read_projected<R>(reader: R, n_vars: usize) -> Result<ProjectedVars>
where
    R: Read,
{
    let context = "while parsing a projected-variables file";
    let mut vars = Vec::new();
    let reader = BufReader::new(reader);
    for line in reader.lines() {
        let line = line.context(context)?;
        for word in line.split(',').flat_map(str::split_whitespace) {
            let n = word
                .parse::<usize>()
                .with_context(|| format!(r#"expected a variable number, got "{word}""#))
                .context(context)?;
            if n == 0 || n > n_vars {
                return Err(anyhow!("the variable {n} is out of range")).context(context);
            }
            vars.push(n - 1);
        }
    }
    Ok(ProjectedVars::from_vars(n_vars, &vars))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_ok() {
        let weights = read_weights("1 0.4\n-1 0.6\n2 0.25".as_bytes(), 2).unwrap();
        assert_eq!(0.4, weights.weight(Literal::from(1)));
        assert_eq!(0.6, weights.weight(Literal::from(-1)));
        assert_eq!(0.25, weights.weight(Literal::from(2)));
        assert_eq!(1., weights.weight(Literal::from(-2)));
    }

    #[test]
    fn test_weights_missing_weight() {
        assert!(read_weights("1 0.4 -1".as_bytes(), 2).is_err());
    }

    #[test]
    fn test_weights_out_of_range() {
        assert!(read_weights("3 0.5".as_bytes(), 2).is_err());
    }

    #[test]
    fn test_weights_not_a_literal() {
        assert!(read_weights("x 0.5".as_bytes(), 2).is_err());
    }

    #[test]
    fn test_projected_commas_and_newlines() {
        let projected = read_projected("1,3\n4".as_bytes(), 4).unwrap();
        assert!(projected.contains(0));
        assert!(!projected.contains(1));
        assert!(projected.contains(2));
        assert!(projected.contains(3));
    }

    #[test]
    fn test_projected_out_of_range() {
        assert!(read_projected("0".as_bytes(), 2).is_err());
        assert!(read_projected("3".as_bytes(), 2).is_err());
    }
}
