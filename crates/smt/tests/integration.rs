use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use smt::{
    CheckpointScheme, CheckpointedSparseMerkleTree, Fe, InMemoryChunks, LeafHasher, SmtError,
    SparseMerkleTree,
};

const CHUNK_SIZE: usize = 16368;
const HASHER: LeafHasher = LeafHasher::new(31, 528);
const DEPTH: usize = 20;

fn random_chunks(seed: u64, n: usize) -> Vec<Vec<u8>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let mut chunk = vec![0u8; CHUNK_SIZE];
            rng.fill(chunk.as_mut_slice());
            chunk
        })
        .collect()
}

fn padding() -> Fe {
    HASHER.padding_leaf_hash()
}

fn build(chunks: &[Vec<u8>], depth: usize) -> SparseMerkleTree {
    SparseMerkleTree::build(chunks, depth, &HASHER, padding()).unwrap()
}

#[test]
fn test_proofs_replay_to_root() {
    let chunks = random_chunks(1, 13);
    let tree = build(&chunks, 8);

    for i in [0u64, 1, 6, 12, 13, 14, 100, 255] {
        let lp = tree.leaf_proof(i).unwrap();
        assert_eq!(lp.proof.depth(), 8);
        assert!(lp.verify(&tree.root()), "leaf {i}");
    }
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(tree.leaf_hash(i as u64).unwrap(), HASHER.hash_chunk(chunk));
    }
}

#[test]
fn test_tampered_proof_fails() {
    let tree = build(&random_chunks(2, 4), 6);
    let lp = tree.leaf_proof(2).unwrap();

    let mut bad = lp.clone();
    bad.proof.siblings[3] = Fe::from(42u64);
    assert!(!bad.verify(&tree.root()));

    let mut bad = lp.clone();
    bad.proof.directions[0] ^= 1;
    assert!(!bad.verify(&tree.root()));

    let mut bad = lp;
    bad.leaf_hash = padding();
    assert!(!bad.verify(&tree.root()));
}

#[test]
fn test_parallel_leaf_hashes_match_sequential() {
    for n in [1usize, 2, 4, 8, 16] {
        let chunks = random_chunks(30 + n as u64, n);
        let tree = build(&chunks, DEPTH);

        assert_eq!(tree.num_leaves(), n as u64);
        assert_ne!(tree.root(), Fe::from(0u64), "n={n}");
        assert_ne!(tree.root(), tree.zero_hashes().empty_root(), "n={n}");
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(tree.leaf_hash(i as u64).unwrap(), HASHER.hash_chunk(chunk), "n={n} leaf {i}");
        }
        let proof = tree.proof(n as u64 - 1).unwrap();
        assert_eq!(proof.depth(), DEPTH);
        assert_eq!(proof.siblings.len(), DEPTH);
    }
}

#[test]
fn test_root_independent_of_thread_count() {
    let chunks = random_chunks(3, 37);
    let reference = SparseMerkleTree::from_leaf_hashes(
        chunks.iter().map(|c| HASHER.hash_chunk(c)).collect(),
        10,
        padding(),
    )
    .unwrap();

    for threads in [1, 2, 4, 8, 16] {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build().unwrap();
        let tree = pool.install(|| build(&chunks, 10));
        assert_eq!(tree, reference, "threads={threads}");
    }
}

#[test]
fn test_save_load_round_trip() {
    for n in [0usize, 1, 5, 16] {
        let tree = build(&random_chunks(4, n), 5);
        let mut buf = Vec::new();
        tree.save(&mut buf).unwrap();

        let loaded = SparseMerkleTree::load(buf.as_slice(), padding()).unwrap();
        assert_eq!(loaded, tree, "n={n}");
        assert_eq!(loaded.proof(3).unwrap(), tree.proof(3).unwrap());
    }
}

#[test]
fn test_empty_tree_layout() {
    let tree = build(&[], 3);
    let mut buf = Vec::new();
    tree.save(&mut buf).unwrap();
    // depth, leaf count and four empty levels
    assert_eq!(buf.len(), 4 * (2 + 4));
    assert_eq!(&buf[..8], &[0, 0, 0, 3, 0, 0, 0, 0]);
    assert_eq!(tree.root(), tree.zero_hashes().empty_root());
}

#[test]
fn test_load_rejects_malformed_input() {
    let tree = build(&random_chunks(5, 3), 4);
    let mut buf = Vec::new();
    tree.save(&mut buf).unwrap();

    // truncated
    assert!(matches!(
        SparseMerkleTree::load(&buf[..buf.len() - 1], padding()),
        Err(SmtError::Malformed(_))
    ));

    // leaf stored beyond the leaf count
    let mut lying = buf.clone();
    lying[7] = 2;
    assert!(matches!(
        SparseMerkleTree::load(lying.as_slice(), padding()),
        Err(SmtError::Malformed(_))
    ));

    // non-canonical hash in the first leaf entry
    let mut corrupt = buf;
    corrupt[16..48].fill(0xff);
    assert!(matches!(
        SparseMerkleTree::load(corrupt.as_slice(), padding()),
        Err(SmtError::Malformed(_))
    ));
}

#[test]
fn test_checkpoint_matches_full_tree() {
    let padding_indices = [100u64, 1000, 65536];
    for (name, scheme) in CheckpointScheme::presets() {
        for n in [1usize, 4, 8, 16] {
            let chunks = random_chunks(n as u64, n);
            let tree = build(&chunks, DEPTH);

            let mut buf = Vec::new();
            tree.save_checkpointed(&mut buf, &scheme).unwrap();
            let csmt = CheckpointedSparseMerkleTree::load(buf.as_slice(), padding()).unwrap();
            assert_eq!(csmt.root(), tree.root());
            assert_eq!(csmt.scheme(), &scheme);

            let reader = InMemoryChunks::new(chunks.clone());
            let indices = (0..n as u64).chain(padding_indices);
            for i in indices {
                let rebuilt = csmt.rebuild_proof(i, &reader, &HASHER).unwrap();
                assert_eq!(rebuilt, tree.leaf_proof(i).unwrap(), "{name} n={n} i={i}");
            }
        }
    }
}

#[test]
fn test_custom_schemes_match_full_tree() {
    let chunks = random_chunks(6, 11);
    let tree = build(&chunks, 8);
    let reader = InMemoryChunks::new(chunks);

    for levels in [vec![8], vec![1, 8], vec![0, 8], vec![2, 3, 4, 5, 6, 7, 8]] {
        let csmt = tree.to_checkpointed(&CheckpointScheme::new(levels.clone())).unwrap();
        for i in [0u64, 5, 10, 11, 200] {
            assert_eq!(
                csmt.rebuild_proof(i, &reader, &HASHER).unwrap(),
                tree.leaf_proof(i).unwrap(),
                "{levels:?} i={i}"
            );
        }
    }
}

#[test]
fn test_stored_leaves_skip_chunk_reads() {
    let chunks = random_chunks(7, 8);
    let tree = build(&chunks, DEPTH);
    let csmt = tree.to_checkpointed(&CheckpointScheme::new(vec![0, 10, 20])).unwrap();

    let calls = AtomicUsize::new(0);
    let reader = |_: u64| -> io::Result<Vec<u8>> {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(io::Error::new(io::ErrorKind::Other, "must not be read"))
    };
    for i in [0u64, 3, 7, 1000] {
        assert_eq!(csmt.rebuild_proof(i, &reader, &HASHER).unwrap(), tree.leaf_proof(i).unwrap());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_rebuild_reads_only_real_leaves() {
    let chunks = random_chunks(8, 5);
    let tree = build(&chunks, DEPTH);
    let csmt = tree.to_checkpointed(&CheckpointScheme::balanced()).unwrap();

    let max_seen = AtomicUsize::new(0);
    let reader = |i: u64| -> io::Result<Vec<u8>> {
        max_seen.fetch_max(i as usize, Ordering::SeqCst);
        Ok(chunks[i as usize].clone())
    };
    csmt.rebuild_proof(2, &reader, &HASHER).unwrap();
    assert_eq!(max_seen.load(Ordering::SeqCst), 4);

    // a padding subtree needs no chunks at all
    let before = max_seen.load(Ordering::SeqCst);
    let lp = csmt.rebuild_proof(65536, &reader, &HASHER).unwrap();
    assert_eq!(lp.leaf_hash, padding());
    assert_eq!(max_seen.load(Ordering::SeqCst), before);
}

#[test]
fn test_chunk_read_error_aborts_rebuild() {
    let tree = build(&random_chunks(9, 4), DEPTH);
    let csmt = tree.to_checkpointed(&CheckpointScheme::fast()).unwrap();
    let reader = |_: u64| -> io::Result<Vec<u8>> { Err(io::Error::new(io::ErrorKind::NotFound, "gone")) };
    assert!(matches!(
        csmt.rebuild_proof(1, &reader, &HASHER),
        Err(SmtError::ChunkRead { .. })
    ));
}

#[test]
fn test_invalid_scheme_rejected_at_save() {
    let tree = build(&random_chunks(10, 2), DEPTH);
    for levels in [vec![], vec![10, 19], vec![10, 4, 20]] {
        let mut buf = Vec::new();
        assert!(matches!(
            tree.save_checkpointed(&mut buf, &CheckpointScheme::new(levels)),
            Err(SmtError::InvalidScheme(_))
        ));
        assert!(buf.is_empty());
    }
}

#[test]
fn test_checkpoint_load_rejects_bad_scheme() {
    let mut buf = Vec::new();
    for v in [4u32, 0, 2, 3, 1] {
        buf.extend_from_slice(&v.to_be_bytes());
    }
    assert!(matches!(
        CheckpointedSparseMerkleTree::load(buf.as_slice(), padding()),
        Err(SmtError::Malformed(_))
    ));
}

#[test]
fn test_compressed_proof_round_trip() {
    let tree = build(&random_chunks(11, 3), DEPTH);
    let proof = tree.proof(1).unwrap();
    let compressed = proof.compress(tree.zero_hashes());
    // only the two lowest siblings are populated
    assert_eq!(compressed.siblings.len(), 2);
    assert_eq!(compressed.leaf_index, 1);

    let json = serde_json::to_string(&compressed).unwrap();
    let back: smt::CompressedProof = serde_json::from_str(&json).unwrap();
    assert_eq!(back.decompress(tree.zero_hashes()).unwrap(), proof);
}

#[test]
fn test_end_to_end_scenario() {
    let chunks = random_chunks(2025, 8);
    let tree = build(&chunks, DEPTH);
    assert_ne!(tree.root(), Fe::from(0u64));
    assert_eq!(tree.proof(0).unwrap().siblings.len(), DEPTH);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tree.ckpt");
    tree.save_checkpointed(std::fs::File::create(&path).unwrap(), &CheckpointScheme::balanced())
        .unwrap();
    let csmt = CheckpointedSparseMerkleTree::load(std::fs::File::open(&path).unwrap(), padding()).unwrap();

    let read_chunk = |i: u64| -> io::Result<Vec<u8>> { Ok(chunks[i as usize].clone()) };
    let hash_leaf = |c: &[u8]| HASHER.hash_chunk(c);
    let rebuilt = csmt.rebuild_proof(3, &read_chunk, &hash_leaf).unwrap();
    assert_eq!(rebuilt.proof, tree.proof(3).unwrap());
    assert_eq!(rebuilt.leaf_hash, tree.leaf_hash(3).unwrap());
}
