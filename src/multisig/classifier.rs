//! Script classification against our key pair
//!
//! Decides whether a bare multisig output can be signed with our key and
//! how. Classification runs a chain of [`KeyMatcher`]s: a structural
//! decoder first, then a raw byte search for scripts whose "public keys"
//! are really embedded protocol data.

use bitcoin::{Script, ScriptBuf};
use serde::{Deserialize, Serialize};

use crate::core::MultisigScript;

/// How an input has to be signed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignType {
    /// Decoded multisig; our compressed key is listed
    Compressed,
    /// Decoded multisig; our uncompressed key is listed (wins over compressed)
    Uncompressed,
    /// Not decodable as multisig, but our key bytes appear verbatim
    InvalidPubkeys,
}

/// Result of classifying one output script against our keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptClassification {
    pub sign_type: SignType,
    pub script_pubkey: ScriptBuf,
    pub our_key_is_compressed: bool,
    pub our_key_is_uncompressed: bool,
}

impl ScriptClassification {
    /// Whether either of our key encodings was found
    pub fn can_sign(&self) -> bool {
        self.our_key_is_compressed || self.our_key_is_uncompressed
    }

    /// The key encoding partial signatures are attached to: compressed
    /// when present, otherwise uncompressed
    pub fn signing_key<'a>(&self, compressed: &'a [u8], uncompressed: &'a [u8]) -> Option<&'a [u8]> {
        if self.our_key_is_compressed {
            Some(compressed)
        } else if self.our_key_is_uncompressed {
            Some(uncompressed)
        } else {
            None
        }
    }
}

/// Outcome of a single matching strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Our key was found
    Matched(ScriptClassification),
    /// The script was understood and our key is definitely not in it
    NoMatch,
    /// This strategy cannot interpret the script; try the next one
    Undecodable,
}

/// A strategy for locating our key inside an output script
pub trait KeyMatcher: Send + Sync {
    /// Short name for logging
    fn name(&self) -> &'static str;

    fn match_keys(&self, script: &Script, compressed: &[u8], uncompressed: &[u8]) -> MatchOutcome;
}

/// Standard `OP_m <keys> OP_n OP_CHECKMULTISIG` decoding
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralMatcher;

impl KeyMatcher for StructuralMatcher {
    fn name(&self) -> &'static str {
        "structural"
    }

    fn match_keys(&self, script: &Script, compressed: &[u8], uncompressed: &[u8]) -> MatchOutcome {
        let Ok(multisig) = MultisigScript::decode(script) else {
            return MatchOutcome::Undecodable;
        };

        let has_uncompressed = multisig.position(uncompressed).is_some();
        let has_compressed = multisig.position(compressed).is_some();

        // Uncompressed is checked first and wins ties
        let sign_type = if has_uncompressed {
            SignType::Uncompressed
        } else if has_compressed {
            SignType::Compressed
        } else {
            return MatchOutcome::NoMatch;
        };

        MatchOutcome::Matched(ScriptClassification {
            sign_type,
            script_pubkey: script.to_owned(),
            our_key_is_compressed: has_compressed,
            our_key_is_uncompressed: has_uncompressed,
        })
    }
}

/// Byte-exact containment search over the undecoded script.
///
/// Works on bytes rather than hex text so a match can never start on an odd
/// nibble, and only a full 33 or 65 byte run counts.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawByteMatcher;

fn contains_run(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}

impl KeyMatcher for RawByteMatcher {
    fn name(&self) -> &'static str {
        "raw-bytes"
    }

    fn match_keys(&self, script: &Script, compressed: &[u8], uncompressed: &[u8]) -> MatchOutcome {
        let has_compressed = contains_run(script.as_bytes(), compressed);
        let has_uncompressed = contains_run(script.as_bytes(), uncompressed);

        if !has_compressed && !has_uncompressed {
            return MatchOutcome::NoMatch;
        }

        MatchOutcome::Matched(ScriptClassification {
            sign_type: SignType::InvalidPubkeys,
            script_pubkey: script.to_owned(),
            our_key_is_compressed: has_compressed,
            our_key_is_uncompressed: has_uncompressed,
        })
    }
}

/// Ordered chain of matchers; the first decisive outcome wins
pub struct ScriptClassifier {
    matchers: Vec<Box<dyn KeyMatcher>>,
}

impl std::fmt::Debug for ScriptClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.matchers.iter().map(|m| m.name()).collect();
        f.debug_struct("ScriptClassifier")
            .field("matchers", &names)
            .finish()
    }
}

impl Default for ScriptClassifier {
    fn default() -> Self {
        Self::with_matchers(vec![Box::new(StructuralMatcher), Box::new(RawByteMatcher)])
    }
}

impl ScriptClassifier {
    pub fn with_matchers(matchers: Vec<Box<dyn KeyMatcher>>) -> Self {
        Self { matchers }
    }

    /// Classify `script`, returning `None` when our key cannot sign it
    pub fn classify(
        &self,
        script: &Script,
        compressed: &[u8],
        uncompressed: &[u8],
    ) -> Option<ScriptClassification> {
        for matcher in &self.matchers {
            match matcher.match_keys(script, compressed, uncompressed) {
                MatchOutcome::Matched(classification) => {
                    log::debug!(
                        "Script matched by {} matcher as {:?}",
                        matcher.name(),
                        classification.sign_type
                    );
                    return Some(classification);
                }
                MatchOutcome::NoMatch => return None,
                MatchOutcome::Undecodable => continue,
            }
        }
        None
    }
}

/// Classify with the default structural + raw byte chain
pub fn classify(script: &Script, compressed: &[u8], uncompressed: &[u8]) -> Option<ScriptClassification> {
    ScriptClassifier::default().classify(script, compressed, uncompressed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::multisig_script;
    use crate::crypto::KeyMaterial;

    fn ours() -> KeyMaterial {
        KeyMaterial::from_private_key_hex(
            "1111111111111111111111111111111111111111111111111111111111111111",
        )
        .unwrap()
    }

    fn other(n: u8) -> KeyMaterial {
        KeyMaterial::from_private_key_hex(&format!("{:064x}", n)).unwrap()
    }

    /// 33 bytes shaped like a compressed key whose x coordinate exceeds
    /// the field prime, so it can never decode
    fn data_key(fill: u8) -> [u8; 33] {
        let mut key = [0xff; 33];
        key[0] = 0x03;
        key[29..].fill(fill);
        key
    }

    #[test]
    fn test_compressed_match() {
        let keys = ours();
        let c = keys.compressed();
        let script = multisig_script(1, &[&other(2).compressed()[..], &c[..]]).unwrap();

        let cls = classify(&script, &c, &keys.uncompressed()).unwrap();
        assert_eq!(cls.sign_type, SignType::Compressed);
        assert!(cls.our_key_is_compressed);
        assert!(!cls.our_key_is_uncompressed);
        assert_eq!(cls.script_pubkey, script);
    }

    #[test]
    fn test_uncompressed_match() {
        let keys = ours();
        let u = keys.uncompressed();
        let script = multisig_script(1, &[&u[..]]).unwrap();

        let cls = classify(&script, &keys.compressed(), &u).unwrap();
        assert_eq!(cls.sign_type, SignType::Uncompressed);
        assert!(!cls.our_key_is_compressed);
        assert!(cls.our_key_is_uncompressed);
    }

    #[test]
    fn test_both_encodings_prefer_uncompressed() {
        let keys = ours();
        let (c, u) = (keys.compressed(), keys.uncompressed());
        let script = multisig_script(1, &[&c[..], &u[..], &other(3).compressed()[..]]).unwrap();

        let cls = classify(&script, &c, &u).unwrap();
        assert_eq!(cls.sign_type, SignType::Uncompressed);
        assert!(cls.our_key_is_compressed && cls.our_key_is_uncompressed);
        assert_eq!(cls.signing_key(&c, &u), Some(&c[..]));
    }

    #[test]
    fn test_foreign_multisig_is_not_searched() {
        let keys = ours();
        let script =
            multisig_script(1, &[&other(4).compressed()[..], &other(5).compressed()[..]]).unwrap();
        assert!(classify(&script, &keys.compressed(), &keys.uncompressed()).is_none());
    }

    #[test]
    fn test_invalid_pubkeys_fall_back_to_byte_search() {
        let keys = ours();
        let c = keys.compressed();
        let script =
            multisig_script(1, &[&c[..], &data_key(0x11)[..], &data_key(0x22)[..]]).unwrap();

        let cls = classify(&script, &c, &keys.uncompressed()).unwrap();
        assert_eq!(cls.sign_type, SignType::InvalidPubkeys);
        assert!(cls.our_key_is_compressed);
        assert!(!cls.our_key_is_uncompressed);
        assert!(cls.can_sign());
    }

    #[test]
    fn test_invalid_pubkeys_with_uncompressed_key() {
        let keys = ours();
        let u = keys.uncompressed();
        let script = multisig_script(1, &[&data_key(0x33)[..], &u[..]]).unwrap();

        let cls = classify(&script, &keys.compressed(), &u).unwrap();
        assert_eq!(cls.sign_type, SignType::InvalidPubkeys);
        assert!(!cls.our_key_is_compressed);
        assert!(cls.our_key_is_uncompressed);
    }

    #[test]
    fn test_truncated_key_is_not_a_match() {
        let keys = ours();
        let c = keys.compressed();
        // Our key minus its last byte, followed by unrelated data
        let mut partial = c[..32].to_vec();
        partial.push(c[32] ^ 0x01);
        let script = multisig_script(1, &[&partial[..], &data_key(0x44)[..]]).unwrap();

        assert!(classify(&script, &c, &keys.uncompressed()).is_none());

        // Key bytes cut off by the end of the script
        let mut cut = vec![0x51, 0x21];
        cut.extend_from_slice(&c[..20]);
        let cut = ScriptBuf::from_bytes(cut);
        assert!(classify(&cut, &c, &keys.uncompressed()).is_none());
    }

    #[test]
    fn test_nibble_shifted_key_is_not_a_match() {
        let keys = ours();
        let c = keys.compressed();
        // Shift the key by half a byte: its hex text would appear at an odd
        // offset, but no byte run equals the key
        let hex_shifted = format!("0{}0", hex::encode(c));
        let shifted = hex::decode(hex_shifted).unwrap();
        let script = multisig_script(1, &[&shifted[..], &data_key(0x55)[..]]).unwrap();
        assert!(hex::encode(script.as_bytes()).contains(&hex::encode(c)));

        assert!(classify(&script, &c, &keys.uncompressed()).is_none());
    }

    #[test]
    fn test_custom_matcher_chain() {
        let keys = ours();
        let c = keys.compressed();
        let script = multisig_script(1, &[&c[..], &data_key(0x66)[..]]).unwrap();

        let structural_only = ScriptClassifier::with_matchers(vec![Box::new(StructuralMatcher)]);
        assert!(structural_only
            .classify(&script, &c, &keys.uncompressed())
            .is_none());
    }
}
