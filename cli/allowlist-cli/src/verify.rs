use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;

use allowlist_cli::codec;
use allowlist_cli::common::parse_hash;
use allowlist_cli::tree::{self, MerkleProof, Position, ProofStep};

#[derive(Parser, Debug)]
#[command(name = "verify")]
#[command(about = "Check a claim proof against a published Merkle root", long_about = None)]
pub struct Cli {
    /// Input claim JSON file
    #[arg(short, long)]
    input: PathBuf,

    /// Merkle root to check against (defaults to the root embedded in the claim)
    #[arg(short, long)]
    root: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClaimInput {
    merkle_root: String,
    address: String,
    amount: String,
    leaf_index: usize,
    merkle_proof: Vec<String>,
    positions: Vec<Position>,
}

/// Recomputes the leaf from the claim and folds the proof up to a root.
///
/// `Ok(false)` means the proof did not reproduce the expected root; errors
/// are reserved for claims that cannot be interpreted at all.
fn evaluate(claim: &ClaimInput, root_override: Option<&str>) -> Result<bool> {
    let expected_root = match root_override {
        Some(root) => parse_hash(root).context("Invalid Merkle root")?,
        None => parse_hash(&claim.merkle_root).context("Invalid root in claim file")?,
    };

    if claim.merkle_proof.len() != claim.positions.len() {
        anyhow::bail!(
            "Claim has {} proof hashes but {} positions",
            claim.merkle_proof.len(),
            claim.positions.len()
        );
    }

    let address = codec::parse_address(&claim.address).context("Invalid address in claim")?;
    let amount = codec::parse_amount(&claim.amount).context("Invalid amount in claim")?;
    let leaf = codec::leaf_hash(&address, amount);

    let mut steps = Vec::with_capacity(claim.merkle_proof.len());
    for (sibling_str, position) in claim.merkle_proof.iter().zip(&claim.positions) {
        steps.push(ProofStep {
            sibling: parse_hash(sibling_str).context("Invalid proof hash in claim")?,
            position: *position,
        });
    }
    let proof = MerkleProof { steps };

    Ok(tree::verify(leaf, &proof, expected_root))
}

pub fn run(args: Cli) -> Result<()> {
    println!("Reading claim from {:?}...", args.input);
    let claim_content = fs::read_to_string(&args.input).context("Failed to read claim file")?;
    let claim: ClaimInput =
        serde_json::from_str(&claim_content).context("Failed to parse claim JSON")?;

    println!(
        "Verifying proof for {} (amount {}, leaf index {})...",
        claim.address, claim.amount, claim.leaf_index
    );

    if evaluate(&claim, args.root.as_deref())? {
        println!("Proof is valid.");
        Ok(())
    } else {
        println!("Proof is INVALID.");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use allowlist_cli::common::hex_encode;
    use allowlist_cli::tree::MerkleTree;
    use primitive_types::U256;

    fn fixture_claim() -> (ClaimInput, [u8; 32]) {
        let addresses: Vec<[u8; 20]> = (1u8..=3).map(|b| [b; 20]).collect();
        let amounts = [
            U256::from(100u64),
            U256::from(200u64),
            U256::from(300u64),
        ];
        let leaves: Vec<[u8; 32]> = addresses
            .iter()
            .zip(&amounts)
            .map(|(a, m)| codec::leaf_hash(a, *m))
            .collect();
        let tree = MerkleTree::build(leaves).unwrap();
        let proof = tree.prove_for(2).unwrap();

        let claim = ClaimInput {
            merkle_root: hex_encode(tree.root()),
            address: hex_encode(addresses[2]),
            amount: amounts[2].to_string(),
            leaf_index: 2,
            merkle_proof: proof.steps.iter().map(|s| hex_encode(s.sibling)).collect(),
            positions: proof.steps.iter().map(|s| s.position).collect(),
        };
        (claim, tree.root())
    }

    #[test]
    fn test_valid_claim() {
        let (claim, _) = fixture_claim();
        assert!(evaluate(&claim, None).unwrap());
    }

    #[test]
    fn test_valid_claim_with_root_override() {
        let (claim, root) = fixture_claim();
        assert!(evaluate(&claim, Some(&hex_encode(root))).unwrap());
        assert!(!evaluate(&claim, Some(&hex_encode([0xffu8; 32]))).unwrap());
    }

    #[test]
    fn test_tampered_sibling_is_invalid() {
        let (mut claim, _) = fixture_claim();
        let mut sibling = parse_hash(&claim.merkle_proof[0]).unwrap();
        sibling[0] ^= 0x01;
        claim.merkle_proof[0] = hex_encode(sibling);
        assert!(!evaluate(&claim, None).unwrap());
    }

    #[test]
    fn test_swapped_position_is_invalid() {
        let (mut claim, _) = fixture_claim();
        claim.positions[1] = match claim.positions[1] {
            Position::Left => Position::Right,
            Position::Right => Position::Left,
        };
        assert!(!evaluate(&claim, None).unwrap());
    }

    #[test]
    fn test_wrong_amount_is_invalid() {
        let (mut claim, _) = fixture_claim();
        claim.amount = "301".to_string();
        assert!(!evaluate(&claim, None).unwrap());
    }

    #[test]
    fn test_mismatched_positions_length_is_error() {
        let (mut claim, _) = fixture_claim();
        claim.positions.pop();
        assert!(evaluate(&claim, None).is_err());
    }

    #[test]
    fn test_malformed_address_is_error() {
        let (mut claim, _) = fixture_claim();
        claim.address = "0x1234".to_string();
        assert!(evaluate(&claim, None).is_err());
    }

    #[test]
    fn test_position_serde_spelling() {
        assert_eq!(
            serde_json::to_string(&[Position::Left, Position::Right]).unwrap(),
            r#"["left","right"]"#
        );
    }
}
