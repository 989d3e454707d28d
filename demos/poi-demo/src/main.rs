//! Proof-of-inclusion walk-through.
//!
//! 1. Commit to a file: chunk it, build the sparse Merkle tree
//! 2. Persist the tree in full and checkpointed form
//! 3. Answer a challenge from the checkpointed tree
//! 4. Check the witness, then show that tampering is caught
//! 5. File-size and key-leak statements

mod config;

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result};
use ark_ff::UniformRand;
use poi::{
    check_witness, generate_secret_key, prepare_witness, FileSizeWitness, KeyLeakWitness,
};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use smt::field::{to_be_bytes, Fe};
use smt::{CheckpointedSparseMerkleTree, FileChunks, SparseMerkleTree};
use tracing::info;

use crate::config::DemoConfig;

fn short(fe: &Fe) -> String {
    let hex = hex::encode(to_be_bytes(fe));
    format!("0x{}...{}", &hex[..8], &hex[56..])
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cfg = DemoConfig::from_env()?;
    let params = cfg.params;
    let mut rng = match cfg.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    fs::create_dir_all(&cfg.work_dir)
        .with_context(|| format!("Failed to create {}", cfg.work_dir.display()))?;

    println!("Proof of inclusion demo ({})\n", params.circuit_shape());

    // 1. Commit
    println!("Step 1: commit to a file");
    let input: PathBuf = match &cfg.input_file {
        Some(path) => path.clone(),
        None => {
            let mut data = vec![0u8; cfg.random_bytes];
            rng.fill_bytes(&mut data);
            let path = cfg.work_dir.join("data.bin");
            fs::write(&path, &data).with_context(|| format!("Failed to write {}", path.display()))?;
            path
        }
    };
    let chunks = FileChunks::open(&input, params.chunk_size)
        .with_context(|| format!("Failed to open {}", input.display()))?;
    let hasher = params.leaf_hasher();
    let tree = SparseMerkleTree::build(
        &chunks.read_all()?,
        params.depth,
        &hasher,
        params.padding_leaf_hash(),
    )?;
    println!("   file:   {} ({} bytes)", input.display(), chunks.file_len());
    println!("   chunks: {}", tree.num_leaves());
    println!("   root:   {}\n", short(&tree.root()));

    // 2. Persist
    println!("Step 2: persist");
    let full_path = cfg.work_dir.join("tree.smt");
    let ckpt_path = cfg.work_dir.join("tree.ckpt");
    tree.save(BufWriter::new(File::create(&full_path)?))?;
    tree.save_checkpointed(BufWriter::new(File::create(&ckpt_path)?), &cfg.scheme)?;
    let full_size = fs::metadata(&full_path)?.len();
    let ckpt_size = fs::metadata(&ckpt_path)?.len();
    println!("   full tree:        {full_size} bytes");
    println!("   checkpoint {}: {ckpt_size} bytes\n", cfg.scheme);
    info!(full = full_size, checkpoint = ckpt_size, scheme = %cfg.scheme, "demo: trees persisted");

    let stored = CheckpointedSparseMerkleTree::load(File::open(&ckpt_path)?, params.padding_leaf_hash())?;
    anyhow::ensure!(stored.root() == tree.root(), "checkpoint root differs from built tree");

    // 3. Challenge
    println!("Step 3: answer a challenge");
    let secret_key = generate_secret_key(&mut rng);
    let randomness = loop {
        let r = Fe::rand(&mut rng);
        if r != Fe::from(0u64) {
            break r;
        }
    };
    let witness = prepare_witness(&params, &secret_key, &randomness, &stored, &chunks)?;
    for (k, o) in witness.private.openings.iter().enumerate() {
        println!("   opening {k}: leaf {} (quotient {})", o.leaf_index, o.quotient);
    }
    println!("   commitment: {}\n", short(&witness.public.commitment));

    // 4. Check
    println!("Step 4: check the witness");
    check_witness(&params, &witness)?;
    println!("   honest witness: ok");

    let mut forged = witness.clone();
    let victim = rng.gen_range(0..forged.private.openings.len());
    forged.private.openings[victim].elements[0] += Fe::from(1u64);
    match check_witness(&params, &forged) {
        Ok(()) => anyhow::bail!("tampered opening {victim} was accepted"),
        Err(e) => println!("   tampered opening {victim}: rejected ({e})\n"),
    }

    if let Some(out) = &cfg.witness_out {
        fs::write(out, witness.to_json()?).with_context(|| format!("Failed to write {}", out.display()))?;
        println!("   witness written to {}\n", out.display());
    }

    // 5. Side statements
    println!("Step 5: file size and key leak");
    let size = FileSizeWitness::prepare(&stored, &chunks, &hasher)?;
    size.check(stored.zero_hashes())?;
    println!("   file holds exactly {} chunks: ok", size.num_leaves);

    let reporter = Fe::from(rng.gen::<u64>());
    let leak = KeyLeakWitness::new(secret_key, reporter);
    leak.check()?;
    println!("   leaked key matches public key {}: ok", short(&leak.public_key));

    info!(leaves = tree.num_leaves(), "demo: done");
    Ok(())
}
