use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default candidate wordlist file name.
pub const DEFAULT_WORDLIST: &str = "top-10000-passwords.txt";
/// Default salt list file name.
pub const DEFAULT_SALTS: &str = "known-salts.txt";

/// Text reported when a digest is in neither table.
pub const NOT_FOUND_MESSAGE: &str = "PASSWORD NOT IN DATABASE";

/// Locations of the wordlist and salt files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrackConfig {
    pub wordlist: PathBuf,
    pub salts: PathBuf,
}

impl Default for CrackConfig {
    fn default() -> Self {
        Self {
            wordlist: PathBuf::from(DEFAULT_WORDLIST),
            salts: PathBuf::from(DEFAULT_SALTS),
        }
    }
}

/// Result of a lookup. A miss is a normal value, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrackOutcome {
    Found(String),
    NotFound,
}

impl CrackOutcome {
    pub fn password(&self) -> Option<&str> {
        match self {
            CrackOutcome::Found(p) => Some(p.as_str()),
            CrackOutcome::NotFound => None,
        }
    }
}

impl fmt::Display for CrackOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrackOutcome::Found(p) => f.write_str(p),
            CrackOutcome::NotFound => f.write_str(NOT_FOUND_MESSAGE),
        }
    }
}

/// Lower-case hex SHA-1 of `data`.
pub fn sha1_hex(data: &[u8]) -> String {
    sha1_smol::Sha1::from(data).digest().to_string()
}

/// Lower-case hex SHA-1 of `a ++ b`, without building the concatenation.
pub fn sha1_hex_concat(a: &[u8], b: &[u8]) -> String {
    let mut hasher = sha1_smol::Sha1::new();
    hasher.update(a);
    hasher.update(b);
    hasher.digest().to_string()
}

/// Split wordlist content into trimmed byte lines.
///
/// Each line is trimmed at both ends of ASCII whitespace, vertical tab
/// included. Reading stops at the first line that is empty after trimming.
pub fn parse_lines(content: &[u8]) -> Vec<Vec<u8>> {
    content
        .split(|&b| b == b'\n')
        .map(|line| trim_word(line).to_vec())
        .take_while(|line| !line.is_empty())
        .collect()
}

fn is_word_space(b: &u8) -> bool {
    b.is_ascii_whitespace() || *b == b'\x0b'
}

fn trim_word(line: &[u8]) -> &[u8] {
    let start = line.iter().position(|b| !is_word_space(b)).unwrap_or(line.len());
    let end = line.iter().rposition(|b| !is_word_space(b)).map_or(start, |i| i + 1);
    &line[start..end]
}

/// Read a wordlist or salt file. A missing or unreadable file is an error.
pub fn load_lines(path: impl AsRef<Path>) -> Result<Vec<Vec<u8>>> {
    let content = fs::read(path.as_ref())
        .with_context(|| format!("failed to read word file: {}", path.as_ref().display()))?;
    Ok(parse_lines(&content))
}

fn decode(candidate: &[u8]) -> Result<String> {
    String::from_utf8(candidate.to_vec()).with_context(|| {
        format!(
            "candidate is not valid UTF-8: {}",
            String::from_utf8_lossy(candidate)
        )
    })
}

/// Digest -> plaintext mapping. Later insertions overwrite earlier ones.
#[derive(Debug, Clone, Default)]
pub struct DigestTable {
    map: HashMap<String, String>,
}

impl DigestTable {
    /// `sha1(candidate) -> candidate` for every candidate, in list order.
    pub fn unsalted(candidates: &[Vec<u8>]) -> Result<Self> {
        let mut map = HashMap::with_capacity(candidates.len());
        for c in candidates {
            map.insert(sha1_hex(c), decode(c)?);
        }
        Ok(Self { map })
    }

    /// Both `sha1(salt ++ candidate)` and `sha1(candidate ++ salt)` for every
    /// (salt, candidate) pair, salts in the outer loop.
    pub fn salted(salts: &[Vec<u8>], candidates: &[Vec<u8>]) -> Result<Self> {
        let mut map = HashMap::with_capacity(salts.len() * candidates.len() * 2);
        for salt in salts {
            for c in candidates {
                let plain = decode(c)?;
                map.insert(sha1_hex_concat(salt, c), plain.clone());
                map.insert(sha1_hex_concat(c, salt), plain);
            }
        }
        Ok(Self { map })
    }

    pub fn get(&self, digest: &str) -> Option<&str> {
        self.map.get(digest).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Look `digest` up against in-memory candidates and optional salts.
///
/// The salted table is consulted first when salts are given; a hit there is
/// returned without building the unsalted table.
pub fn crack_candidates(
    digest: &str,
    candidates: &[Vec<u8>],
    salts: Option<&[Vec<u8>]>,
) -> Result<CrackOutcome> {
    if let Some(salts) = salts {
        let salted = DigestTable::salted(salts, candidates)?;
        debug!(entries = salted.len(), "built salted digest table");
        if let Some(p) = salted.get(digest) {
            return Ok(CrackOutcome::Found(p.to_string()));
        }
    }

    let plain = DigestTable::unsalted(candidates)?;
    debug!(entries = plain.len(), "built unsalted digest table");
    Ok(match plain.get(digest) {
        Some(p) => CrackOutcome::Found(p.to_string()),
        None => CrackOutcome::NotFound,
    })
}

/// Loaded wordlist (and salts, when enabled) reusable across queries.
#[derive(Debug, Clone)]
pub struct Cracker {
    candidates: Vec<Vec<u8>>,
    salts: Option<Vec<Vec<u8>>>,
}

impl Cracker {
    pub fn new(candidates: Vec<Vec<u8>>, salts: Option<Vec<Vec<u8>>>) -> Self {
        Self { candidates, salts }
    }

    /// Load the wordlist, and the salt list only when `use_salts` is set.
    pub fn from_config(config: &CrackConfig, use_salts: bool) -> Result<Self> {
        let candidates = load_lines(&config.wordlist)?;
        let salts = if use_salts {
            Some(load_lines(&config.salts)?)
        } else {
            None
        };
        info!(
            candidates = candidates.len(),
            salts = salts.as_ref().map_or(0, Vec::len),
            "loaded cracker word files"
        );
        Ok(Self::new(candidates, salts))
    }

    pub fn crack(&self, digest: &str) -> Result<CrackOutcome> {
        crack_candidates(digest, &self.candidates, self.salts.as_deref())
    }

    pub fn candidates(&self) -> &[Vec<u8>] {
        &self.candidates
    }
}

/// Crack with the word files named in `config`.
pub fn crack_with(digest: &str, config: &CrackConfig, use_salts: bool) -> Result<CrackOutcome> {
    Cracker::from_config(config, use_salts)?.crack(digest)
}

/// Crack with the default word files in the working directory.
pub fn crack_sha1_hash(digest: &str, use_salts: bool) -> Result<CrackOutcome> {
    crack_with(digest, &CrackConfig::default(), use_salts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(list: &[&str]) -> Vec<Vec<u8>> {
        list.iter().map(|w| w.as_bytes().to_vec()).collect()
    }

    #[test]
    fn sha1_matches_known_vectors() {
        assert_eq!(sha1_hex(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert_eq!(sha1_hex(b"password"), "5baa61e4c9b93f3f0682250b6cf8331b7ee68fd8");
        assert_eq!(sha1_hex_concat(b"ab", b"c"), sha1_hex(b"abc"));
    }

    #[test]
    fn parse_trims_and_stops_at_blank_line() {
        let lines = parse_lines(b"  alpha \r\nbeta\n\ngamma\n");
        assert_eq!(lines, words(&["alpha", "beta"]));
    }

    #[test]
    fn parse_trims_vertical_tab() {
        let lines = parse_lines(b"\x0bsecret\x0b\t\nnext\x0c\n\x0b\n");
        assert_eq!(lines, words(&["secret", "next"]));
    }

    #[test]
    fn parse_empty_input() {
        assert!(parse_lines(b"").is_empty());
    }

    #[test]
    fn unsalted_hit_and_miss() {
        let cands = words(&["letmein", "password", "sammy123"]);
        let digest = sha1_hex(b"sammy123");
        assert_eq!(
            crack_candidates(&digest, &cands, None).unwrap(),
            CrackOutcome::Found("sammy123".into())
        );
        let miss = sha1_hex(b"not-there");
        assert_eq!(crack_candidates(&miss, &cands, None).unwrap(), CrackOutcome::NotFound);
    }

    #[test]
    fn digest_match_is_case_sensitive() {
        let cands = words(&["password"]);
        let upper = sha1_hex(b"password").to_uppercase();
        assert_eq!(crack_candidates(&upper, &cands, None).unwrap(), CrackOutcome::NotFound);
    }

    #[test]
    fn salted_prepended_and_appended() {
        let cands = words(&["hello", "world"]);
        let salts = words(&["s1", "s2"]);
        let pre = sha1_hex(b"s2world");
        let post = sha1_hex(b"hellos1");
        for d in [pre, post] {
            let out = crack_candidates(&d, &cands, Some(&salts)).unwrap();
            assert!(out.password().is_some(), "salted digest {d} not found");
        }
        assert_eq!(
            crack_candidates(&sha1_hex(b"s2world"), &cands, Some(&salts)).unwrap(),
            CrackOutcome::Found("world".into())
        );
    }

    #[test]
    fn salts_do_not_hide_unsalted_hits() {
        let cands = words(&["hello"]);
        let salts = words(&["xyz"]);
        let d = sha1_hex(b"hello");
        assert_eq!(
            crack_candidates(&d, &cands, Some(&salts)).unwrap(),
            CrackOutcome::Found("hello".into())
        );
    }

    #[test]
    fn salted_hit_wins_over_unsalted_hit() {
        // sha1("abc") is both "ab" ++ "c" and the bare candidate "abc".
        let cands = words(&["abc", "c"]);
        let salts = words(&["ab"]);
        let d = sha1_hex(b"abc");
        assert_eq!(
            crack_candidates(&d, &cands, Some(&salts)).unwrap(),
            CrackOutcome::Found("c".into())
        );
        assert_eq!(
            crack_candidates(&d, &cands, None).unwrap(),
            CrackOutcome::Found("abc".into())
        );
    }

    #[test]
    fn salted_collision_last_write_wins() {
        // "ab" ++ "c" and "a" ++ "bc" share a digest; the later pair wins.
        let cands = words(&["c", "bc"]);
        let salts = words(&["ab", "a"]);
        let d = sha1_hex(b"abc");
        assert_eq!(
            crack_candidates(&d, &cands, Some(&salts)).unwrap(),
            CrackOutcome::Found("bc".into())
        );
    }

    #[test]
    fn invalid_utf8_candidate_is_error() {
        let cands = vec![b"ok".to_vec(), vec![0xff, 0xfe]];
        assert!(crack_candidates(&sha1_hex(b"ok"), &cands, None).is_err());
    }

    #[test]
    fn not_found_display() {
        assert_eq!(CrackOutcome::NotFound.to_string(), "PASSWORD NOT IN DATABASE");
    }
}
