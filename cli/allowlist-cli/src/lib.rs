pub mod codec;
pub mod common;
pub mod tree;

pub use codec::{encode_entry, keccak256, leaf_hash, parse_address, parse_amount, CodecError};
pub use common::{hex_encode, parse_hash, write_file_atomic};
pub use tree::{hash_pair, verify, MerkleProof, MerkleTree, Position, ProofStep, TreeError};
