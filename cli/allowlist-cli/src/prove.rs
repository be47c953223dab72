use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use allowlist_cli::codec;
use allowlist_cli::common::{hex_encode, parse_hash, write_file_atomic};
use allowlist_cli::tree::{MerkleTree, Position};

#[derive(Parser, Debug)]
#[command(name = "prove")]
#[command(about = "Generate a claim proof for one distribution entry", long_about = None)]
pub struct Cli {
    /// Path to Merkle tree file
    #[arg(short = 't', long)]
    tree: PathBuf,

    /// Path to index map file
    #[arg(short = 'i', long)]
    index_map: PathBuf,

    /// Claimant address (hex, with or without 0x prefix)
    #[arg(short = 'a', long)]
    address: String,

    /// Entitled amount (decimal, or hex with 0x prefix)
    #[arg(short = 'm', long)]
    amount: String,

    /// Merkle root the proof must match (hex format)
    #[arg(short, long)]
    root: String,

    /// Output JSON file
    #[arg(short, long)]
    output: PathBuf,
}

#[derive(Debug, Serialize)]
struct ClaimOutput {
    merkle_root: String,
    address: String,
    amount: String,
    leaf_index: usize,
    merkle_proof: Vec<String>,
    positions: Vec<Position>,
}

fn load_index_map(path: &Path) -> Result<HashMap<[u8; 20], usize>> {
    let file = File::open(path).context("Failed to open index map file")?;
    let reader = BufReader::new(file);
    let mut map = HashMap::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read line")?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let (addr_str, index_str) = trimmed.split_once(':').with_context(|| {
            format!(
                "Invalid format at line {}: expected 'address:index', got '{}'",
                line_num + 1,
                trimmed
            )
        })?;
        let address = codec::parse_address(addr_str)
            .with_context(|| format!("Invalid address at line {}", line_num + 1))?;
        let index: usize = index_str
            .parse()
            .with_context(|| format!("Invalid index at line {}", line_num + 1))?;
        map.insert(address, index);
    }

    if map.is_empty() {
        anyhow::bail!("Index map file is empty");
    }

    Ok(map)
}

fn load_merkle_tree(path: &Path) -> Result<MerkleTree> {
    let file = File::open(path).context("Failed to open Merkle tree file")?;
    let reader = BufReader::new(file);

    let mut level_entries: Vec<HashMap<usize, [u8; 32]>> = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read line")?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let parts: Vec<&str> = trimmed.split(':').collect();
        if parts.len() != 3 {
            anyhow::bail!(
                "Invalid format at line {}: expected 'level:index:hash', got '{}'",
                line_num + 1,
                trimmed
            );
        }
        let level: usize = parts[0].parse().context("Invalid level format")?;
        let index: usize = parts[1].parse().context("Invalid index format")?;
        let hash = parse_hash(parts[2])
            .with_context(|| format!("Invalid hash at line {}", line_num + 1))?;

        while level >= level_entries.len() {
            level_entries.push(HashMap::new());
        }
        if level_entries[level].insert(index, hash).is_some() {
            anyhow::bail!("Duplicate entry at level {}, index {}", level, index);
        }
    }

    if level_entries.is_empty() {
        anyhow::bail!("Merkle tree file is empty");
    }

    let mut levels: Vec<Vec<[u8; 32]>> = Vec::new();
    for (level_num, level_map) in level_entries.iter().enumerate() {
        let node_count = level_map.len();
        if node_count == 0 {
            anyhow::bail!("Level {} is empty", level_num);
        }
        let max_index = *level_map.keys().max().unwrap();
        if max_index + 1 != node_count {
            anyhow::bail!(
                "Level {} has holes: {} nodes but highest index {}",
                level_num,
                node_count,
                max_index
            );
        }
        let mut level = vec![[0u8; 32]; node_count];
        for (&idx, &hash) in level_map {
            level[idx] = hash;
        }
        levels.push(level);
    }

    MerkleTree::from_levels(levels).context("Invalid tree structure")
}

pub fn run(args: Cli) -> Result<()> {
    println!("Validating Merkle root...");
    let expected_root = parse_hash(&args.root).context("Invalid Merkle root")?;

    println!("Loading Merkle tree...");
    let tree = load_merkle_tree(&args.tree).context("Failed to load Merkle tree")?;
    if tree.root() != expected_root {
        anyhow::bail!(
            "Tree file root {} does not match given root {}",
            hex_encode(tree.root()),
            hex_encode(expected_root)
        );
    }

    println!("Loading index map...");
    let index_map = load_index_map(&args.index_map).context("Failed to load index map")?;

    println!("Parsing claim entry...");
    let address = codec::parse_address(&args.address).context("Invalid claimant address")?;
    let amount = codec::parse_amount(&args.amount).context("Invalid amount")?;
    let leaf = codec::leaf_hash(&address, amount);

    println!("Looking up address in index map...");
    let leaf_index = index_map
        .get(&address)
        .copied()
        .context("Address not found in distribution list")?;
    if leaf_index >= tree.leaf_count() {
        anyhow::bail!(
            "Leaf index {} is out of bounds for tree with {} leaves",
            leaf_index,
            tree.leaf_count()
        );
    }
    if tree.levels()[0][leaf_index] != leaf {
        anyhow::bail!(
            "Stored leaf at index {} does not match address {} with amount {}",
            leaf_index,
            hex_encode(address),
            amount
        );
    }

    println!("Generating Merkle proof...");
    let proof = tree
        .prove_for(leaf_index)
        .context("Failed to generate Merkle proof")?;

    let claim = ClaimOutput {
        merkle_root: hex_encode(expected_root),
        address: hex_encode(address),
        amount: amount.to_string(),
        leaf_index,
        merkle_proof: proof.steps.iter().map(|s| hex_encode(s.sibling)).collect(),
        positions: proof.steps.iter().map(|s| s.position).collect(),
    };

    println!("Writing claim JSON to {:?}...", args.output);
    let json_output = serde_json::to_string_pretty(&claim).context("Failed to serialize JSON")?;
    write_file_atomic(&args.output, &json_output).context("Failed to write claim file")?;

    println!("\nClaim proof generated successfully!");
    println!("Address: {}", hex_encode(address));
    println!("Amount: {}", amount);
    println!("Leaf index: {}", leaf_index);
    println!("Proof length: {} nodes", proof.steps.len());

    Ok(())
}
