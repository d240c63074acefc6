//! Utilities shared by rule plugins but owned by the engine as a
//! core-testable building block.

use std::collections::BTreeSet;

/// Expand a list of port tokens (`"22"`, `"8080-8085"`) into the set of
/// individual ports they name. Invalid tokens are dropped silently and
/// do not affect the valid ones; a reversed range (`"8085-8080"`)
/// yields nothing for that token.
pub fn expand_port_ranges<S: AsRef<str>>(tokens: &[S]) -> BTreeSet<u16> {
    let mut ports = BTreeSet::new();
    for token in tokens {
        let token = token.as_ref().trim();
        match token.split_once('-') {
            Some((lo, hi)) => {
                if let (Ok(lo), Ok(hi)) = (lo.trim().parse::<u16>(), hi.trim().parse::<u16>()) {
                    if lo <= hi {
                        ports.extend(lo..=hi);
                    }
                }
            }
            None => {
                if let Ok(p) = token.parse::<u16>() {
                    ports.insert(p);
                }
            }
        }
    }
    ports
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_single_ports_and_ranges() {
        let ports = expand_port_ranges(&["22", "3389", "8080-8085"]);
        let expected: BTreeSet<u16> = [22, 3389, 8080, 8081, 8082, 8083, 8084, 8085]
            .into_iter()
            .collect();
        assert_eq!(ports, expected);
    }

    #[test]
    fn reversed_range_yields_nothing() {
        assert!(expand_port_ranges(&["8085-8080"]).is_empty());
    }

    #[test]
    fn invalid_tokens_are_dropped_silently() {
        let ports = expand_port_ranges(&["22", "not-a-port", "", "80-", "-90"]);
        assert_eq!(ports, [22].into_iter().collect());
    }
}
