use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use allowlist_cli::codec;
use allowlist_cli::common::{hex_encode, write_file_atomic};
use allowlist_cli::tree::MerkleTree;

#[derive(Parser, Debug)]
#[command(name = "build-tree")]
#[command(about = "Build a Merkle tree from a distribution list", long_about = None)]
pub struct Cli {
    /// Input file with one `address:amount` entry per line
    #[arg(short, long)]
    input: PathBuf,

    /// Output file for the Merkle root
    #[arg(short, long)]
    root_output: PathBuf,

    /// Output file for the index map (address -> leaf index)
    #[arg(short = 'x', long)]
    index_output: PathBuf,

    /// Output file for the full Merkle tree (needed for proof generation)
    #[arg(short, long)]
    tree_output: Option<PathBuf>,
}

pub fn run(args: Cli) -> Result<()> {
    println!("Reading distribution from {:?}...", args.input);
    let file = File::open(&args.input).context("Failed to open input file")?;
    let reader = BufReader::new(file);

    let mut addresses = Vec::new();
    let mut leaves = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read line")?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let (addr_str, amount_str) = trimmed.split_once(':').with_context(|| {
            format!(
                "Invalid format at line {}: expected 'address:amount', got '{}'",
                line_num + 1,
                trimmed
            )
        })?;
        let address = codec::parse_address(addr_str)
            .with_context(|| format!("Invalid address at line {}", line_num + 1))?;
        let amount = codec::parse_amount(amount_str)
            .with_context(|| format!("Invalid amount at line {}", line_num + 1))?;

        addresses.push(address);
        leaves.push(codec::leaf_hash(&address, amount));

        if (line_num + 1) % 1_000_000 == 0 {
            println!("Processed {} entries...", line_num + 1);
        }
    }

    println!("Total entries: {}", leaves.len());
    println!("Building Merkle tree...");

    let tree = MerkleTree::build(leaves).context("Failed to build Merkle tree")?;
    let root = tree.root();

    println!("Merkle root: {}", hex_encode(root));

    write_file_atomic(&args.root_output, &format!("{}\n", hex_encode(root)))
        .context("Failed to write root file")?;

    let mut index_content = String::new();
    for (index, address) in addresses.iter().enumerate() {
        index_content.push_str(&format!("{}:{}\n", hex_encode(address), index));
    }
    write_file_atomic(&args.index_output, &index_content)
        .context("Failed to write index file")?;

    if let Some(tree_path) = args.tree_output {
        println!("Writing Merkle tree to {:?}...", tree_path);
        let mut tree_content = String::new();
        for (level_num, level) in tree.levels().iter().enumerate() {
            for (i, hash) in level.iter().enumerate() {
                tree_content.push_str(&format!("{}:{}:{}\n", level_num, i, hex_encode(hash)));
            }
        }
        write_file_atomic(&tree_path, &tree_content).context("Failed to write tree file")?;
    }

    println!("Done!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use allowlist_cli::common::parse_hash;
    use allowlist_cli::tree::hash_pair;
    use primitive_types::U256;

    #[test]
    fn test_build_tree_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("distribution.txt");
        std::fs::write(
            &input,
            "0x000158E60C393B51fdFAc71B14Ce70b70148C326:100\n\n0x1234567890abcdef1234567890abcdef12345678:200\n",
        )
        .unwrap();

        let root_path = dir.path().join("root.txt");
        let index_path = dir.path().join("index.txt");
        let tree_path = dir.path().join("tree.txt");

        run(Cli {
            input,
            root_output: root_path.clone(),
            index_output: index_path.clone(),
            tree_output: Some(tree_path.clone()),
        })
        .unwrap();

        let root = parse_hash(&std::fs::read_to_string(&root_path).unwrap()).unwrap();
        let a0 = codec::parse_address("0x000158E60C393B51fdFAc71B14Ce70b70148C326").unwrap();
        let a1 = codec::parse_address("0x1234567890abcdef1234567890abcdef12345678").unwrap();
        let l0 = codec::leaf_hash(&a0, U256::from(100u64));
        let l1 = codec::leaf_hash(&a1, U256::from(200u64));
        assert_eq!(root, hash_pair(&l0, &l1));

        let index_content = std::fs::read_to_string(&index_path).unwrap();
        assert_eq!(
            index_content,
            "0x000158e60c393b51fdfac71b14ce70b70148c326:0\n\
             0x1234567890abcdef1234567890abcdef12345678:1\n"
        );

        let tree_content = std::fs::read_to_string(&tree_path).unwrap();
        let lines: Vec<&str> = tree_content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], format!("0:0:{}", hex_encode(l0)));
        assert_eq!(lines[1], format!("0:1:{}", hex_encode(l1)));
        assert_eq!(lines[2], format!("1:0:{}", hex_encode(root)));
    }

    #[test]
    fn test_build_tree_rejects_bad_line() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("distribution.txt");
        std::fs::write(&input, "0x1234567890abcdef1234567890abcdef12345678\n").unwrap();

        let result = run(Cli {
            input,
            root_output: dir.path().join("root.txt"),
            index_output: dir.path().join("index.txt"),
            tree_output: None,
        });
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Invalid format at line 1"));
    }

    #[test]
    fn test_build_tree_rejects_empty_distribution() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("distribution.txt");
        std::fs::write(&input, "\n\n").unwrap();

        let result = run(Cli {
            input,
            root_output: dir.path().join("root.txt"),
            index_output: dir.path().join("index.txt"),
            tree_output: None,
        });
        assert!(result.is_err());
    }
}
