//! Ed25519 signatures over the chain head, stored as `signatures.xml`.

use crate::chain::ChainError;
use crate::types::Session;
use crate::verify::verify_chain;
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};

const SIGNATURES_NS: &str = "urn:twff:signatures:1.0";

/// A detached signature over a session's head digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureBlock {
    /// Identifier of the signer (e.g. "author:anon-7f3a" or "tool:glassbox/0.1").
    pub signer: String,
    /// Signature algorithm; only "ed25519" is produced.
    pub algorithm: String,
    /// The chain tip this signature covers.
    pub head_hash: String,
    /// Signature as "ed25519:<hex>".
    pub sig: String,
}

/// Generate a new Ed25519 keypair.
///
/// Returns (private_key_bytes, public_key_bytes).
pub fn keygen() -> ([u8; 32], [u8; 32]) {
    let mut private_bytes = [0u8; 32];
    getrandom::fill(&mut private_bytes).expect("failed to generate random bytes");

    let signing_key = SigningKey::from_bytes(&private_bytes);
    let public_bytes = signing_key.verifying_key().to_bytes();

    (private_bytes, public_bytes)
}

/// Sign the session's chain head.
///
/// The chain is verified first: signing a broken chain would attest to
/// nothing. The signature covers the head digest's hex bytes; since every
/// link folds in all prior events and the session id, the head commits to
/// the entire log.
pub fn sign_head(
    session: &Session,
    private_key: &[u8; 32],
    signer_id: &str,
) -> Result<SignatureBlock, ChainError> {
    let summary = verify_chain(session)?;
    let signing_key = SigningKey::from_bytes(private_key);
    let signature = signing_key.sign(summary.head_hash.as_bytes());

    Ok(SignatureBlock {
        signer: signer_id.to_string(),
        algorithm: "ed25519".to_string(),
        head_hash: summary.head_hash,
        sig: format!("ed25519:{}", hex::encode(signature.to_bytes())),
    })
}

/// Verify a signature block against the session's recomputed head.
///
/// Fails with [`ChainError::HeadMismatch`] if the block covers a different
/// head than the chain produces, and [`ChainError::SignatureInvalid`] if the
/// signature itself does not check out.
pub fn verify_head(
    session: &Session,
    block: &SignatureBlock,
    public_key: &[u8; 32],
) -> Result<(), ChainError> {
    let summary = verify_chain(session)?;
    if block.head_hash != summary.head_hash {
        return Err(ChainError::HeadMismatch {
            expected: summary.head_hash,
            stored: block.head_hash.clone(),
        });
    }

    let sig_hex = block
        .sig
        .strip_prefix("ed25519:")
        .ok_or_else(|| ChainError::MalformedSignature("missing ed25519: prefix".to_string()))?;
    let sig_bytes = hex::decode(sig_hex)
        .map_err(|err| ChainError::MalformedSignature(err.to_string()))?;
    let sig_array: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|_| ChainError::MalformedSignature("signature must be 64 bytes".to_string()))?;
    let signature = ed25519_dalek::Signature::from_bytes(&sig_array);

    let verifying_key = VerifyingKey::from_bytes(public_key)
        .map_err(|err| ChainError::MalformedSignature(err.to_string()))?;

    verifying_key
        .verify(block.head_hash.as_bytes(), &signature)
        .map_err(|_| ChainError::SignatureInvalid {
            signer: block.signer.clone(),
        })
}

impl SignatureBlock {
    /// Render the fixed single-signature `signatures.xml` document.
    pub fn to_xml(&self) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <signatures xmlns=\"{SIGNATURES_NS}\">\n\
             \x20 <signature algorithm=\"{}\" signer=\"{}\" head=\"{}\">{}</signature>\n\
             </signatures>\n",
            xml_escape(&self.algorithm),
            xml_escape(&self.signer),
            xml_escape(&self.head_hash),
            xml_escape(&self.sig),
        )
    }

    /// Parse the fixed `signatures.xml` layout.
    ///
    /// Tolerant of whitespace and attribute order, but only one
    /// `<signature>` element is read.
    pub fn from_xml(xml: &str) -> Result<SignatureBlock, ChainError> {
        let open = xml
            .find("<signature ")
            .ok_or_else(|| ChainError::MalformedSignature("no <signature> element".to_string()))?;
        let rest = &xml[open..];
        let tag_end = rest
            .find('>')
            .ok_or_else(|| ChainError::MalformedSignature("unclosed <signature> tag".to_string()))?;
        let tag = &rest[..tag_end];
        let body_end = rest.find("</signature>").ok_or_else(|| {
            ChainError::MalformedSignature("missing </signature> close".to_string())
        })?;
        if body_end < tag_end {
            return Err(ChainError::MalformedSignature(
                "malformed <signature> element".to_string(),
            ));
        }
        let body = rest[tag_end + 1..body_end].trim();

        Ok(SignatureBlock {
            signer: xml_attr(tag, "signer")?,
            algorithm: xml_attr(tag, "algorithm")?,
            head_hash: xml_attr(tag, "head")?,
            sig: xml_unescape(body),
        })
    }
}

fn xml_attr(tag: &str, name: &str) -> Result<String, ChainError> {
    let marker = format!("{name}=\"");
    let start = tag
        .find(&marker)
        .ok_or_else(|| ChainError::MalformedSignature(format!("missing attribute {name:?}")))?
        + marker.len();
    let end = tag[start..]
        .find('"')
        .ok_or_else(|| ChainError::MalformedSignature(format!("unterminated attribute {name:?}")))?;
    Ok(xml_unescape(&tag[start..start + end]))
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn xml_unescape(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&gt;", ">")
        .replace("&lt;", "<")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Event;

    fn signed_fixture() -> (Session, [u8; 32], [u8; 32]) {
        let mut session = Session::new("anon-test");
        session.start_time = "2026-08-07T10:00:00Z".to_string();
        session
            .append(Event::session_start("2026-08-07T10:00:00Z").unwrap())
            .unwrap();
        session
            .append(Event::edit("2026-08-07T10:00:01Z", 15, "human").unwrap())
            .unwrap();
        let (private_key, public_key) = keygen();
        (session, private_key, public_key)
    }

    #[test]
    fn test_sign_and_verify_head() {
        let (session, private_key, public_key) = signed_fixture();
        let block = sign_head(&session, &private_key, "author:anon-test").unwrap();

        assert_eq!(block.algorithm, "ed25519");
        assert_eq!(Some(block.head_hash.as_str()), session.head_hash());
        assert!(verify_head(&session, &block, &public_key).is_ok());
    }

    #[test]
    fn test_wrong_public_key_fails() {
        let (session, private_key, _) = signed_fixture();
        let (_, other_public) = keygen();
        let block = sign_head(&session, &private_key, "author:anon-test").unwrap();
        assert!(matches!(
            verify_head(&session, &block, &other_public),
            Err(ChainError::SignatureInvalid { .. })
        ));
    }

    #[test]
    fn test_signature_over_stale_head_fails() {
        let (mut session, private_key, public_key) = signed_fixture();
        let block = sign_head(&session, &private_key, "author:anon-test").unwrap();

        session
            .append(Event::edit("2026-08-07T10:00:09Z", 4, "human").unwrap())
            .unwrap();
        assert!(matches!(
            verify_head(&session, &block, &public_key),
            Err(ChainError::HeadMismatch { .. })
        ));
    }

    #[test]
    fn test_sign_refuses_broken_chain() {
        let (mut session, private_key, _) = signed_fixture();
        session.events[0].timestamp = "2026-08-07T09:59:59Z".to_string();
        assert!(matches!(
            sign_head(&session, &private_key, "author:anon-test"),
            Err(ChainError::ChainBroken { .. })
        ));
    }

    #[test]
    fn test_xml_round_trip() {
        let (session, private_key, _) = signed_fixture();
        let block = sign_head(&session, &private_key, "author:\"anon\" <test>").unwrap();
        let xml = block.to_xml();
        assert!(xml.contains(SIGNATURES_NS));

        let back = SignatureBlock::from_xml(&xml).unwrap();
        assert_eq!(block, back);
    }

    #[test]
    fn test_from_xml_rejects_garbage() {
        assert!(matches!(
            SignatureBlock::from_xml("<signatures></signatures>"),
            Err(ChainError::MalformedSignature(_))
        ));
        assert!(matches!(
            SignatureBlock::from_xml("<signature signer=\"x\">"),
            Err(ChainError::MalformedSignature(_))
        ));
    }

    #[test]
    fn test_malformed_sig_string() {
        let (session, private_key, public_key) = signed_fixture();
        let mut block = sign_head(&session, &private_key, "author:anon-test").unwrap();
        block.sig = "not-a-signature".to_string();
        assert!(matches!(
            verify_head(&session, &block, &public_key),
            Err(ChainError::MalformedSignature(_))
        ));
    }
}
