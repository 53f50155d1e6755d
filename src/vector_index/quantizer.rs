//! Block-wise vector quantization for compressed, asymmetric scoring.
//!
//! Each vector is split into contiguous blocks of `dimensions_per_block`
//! values (the last block may be narrower). Every block gets its own
//! codebook trained with k-means, and a database vector is stored as one
//! byte per block: the index of the nearest codeword. Queries stay at full
//! precision and are scored against codes through a [`LookupTable`].

use log::{debug, info};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;

use crate::error::{Result, VantageError};
use crate::util::deadline::{Deadline, check_deadline};
use crate::util::simd;
use crate::vector::distance::normalized;
use crate::vector::{DistanceMeasure, VectorStore};
use crate::vector_index::kmeans::KMeans;

/// Upper bound on codewords per block; codes are stored as single bytes.
pub const MAX_CODEBOOK_SIZE: usize = 256;

/// Default k-means passes for codebook training.
pub const DEFAULT_CODEBOOK_ITERATIONS: usize = 10;

/// Trains a [`Codebook`] over a [`VectorStore`].
#[derive(Debug, Clone)]
pub struct Quantizer {
    dimensions_per_block: usize,
    codebook_size: usize,
    training_iterations: usize,
    training_sample_size: Option<usize>,
    seed: u64,
    parallel: bool,
    deadline: Option<Deadline>,
}

impl Quantizer {
    /// Create a quantizer with `dimensions_per_block` values per block.
    pub fn new(dimensions_per_block: usize) -> Result<Self> {
        if dimensions_per_block == 0 {
            return Err(VantageError::invalid_parameter(
                "dimensions_per_block must be positive",
            ));
        }

        Ok(Self {
            dimensions_per_block,
            codebook_size: MAX_CODEBOOK_SIZE,
            training_iterations: DEFAULT_CODEBOOK_ITERATIONS,
            training_sample_size: None,
            seed: 0,
            parallel: true,
            deadline: None,
        })
    }

    /// Set the number of codewords per block (1..=256).
    pub fn with_codebook_size(mut self, codebook_size: usize) -> Result<Self> {
        if codebook_size == 0 || codebook_size > MAX_CODEBOOK_SIZE {
            return Err(VantageError::invalid_parameter(format!(
                "codebook_size must be within 1..={MAX_CODEBOOK_SIZE}, got {codebook_size}"
            )));
        }
        self.codebook_size = codebook_size;
        Ok(self)
    }

    /// Set the number of k-means passes per block.
    pub fn with_training_iterations(mut self, training_iterations: usize) -> Self {
        self.training_iterations = training_iterations;
        self
    }

    /// Train on a seeded subset of at most `sample_size` candidates.
    pub fn with_training_sample_size(mut self, sample_size: Option<usize>) -> Self {
        self.training_sample_size = sample_size;
        self
    }

    /// Set the base seed; each block derives its own seed from it.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Enable or disable parallel training and encoding.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Abort with a timeout once `deadline` passes.
    pub fn with_deadline(mut self, deadline: Option<Deadline>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Width of a full block.
    pub fn dimensions_per_block(&self) -> usize {
        self.dimensions_per_block
    }

    /// Train one codebook per block over the store.
    pub fn train(&self, store: &VectorStore) -> Result<Codebook> {
        let dimension = store.dimension();
        if self.dimensions_per_block > dimension {
            return Err(VantageError::invalid_parameter(format!(
                "dimensions_per_block ({}) exceeds the vector dimension ({dimension})",
                self.dimensions_per_block
            )));
        }

        let training_positions = self.training_positions(store.len());
        let num_training = training_positions.len();
        let codebook_size = self.codebook_size.min(num_training);
        let num_blocks = dimension.div_ceil(self.dimensions_per_block);

        info!(
            "Training {} block codebook(s) of {} codewords on {} vectors",
            num_blocks, codebook_size, num_training
        );

        let train_block = |block: usize| -> Result<BlockCodebook> {
            check_deadline(self.deadline.as_ref(), "codebook training")?;

            let offset = block * self.dimensions_per_block;
            let width = self.dimensions_per_block.min(dimension - offset);

            let mut rows = Vec::with_capacity(num_training * width);
            for position in &training_positions {
                rows.extend_from_slice(&store.vector(*position)[offset..offset + width]);
            }

            // Parallelism goes to blocks unless there is only one.
            let model = KMeans::new(codebook_size, self.training_iterations, self.block_seed(block))
                .with_parallel(self.parallel && num_blocks == 1)
                .with_deadline(self.deadline)
                .fit(&rows, width)?;

            debug!("Trained codebook for block {block} (offset {offset}, width {width})");

            Ok(BlockCodebook {
                offset,
                width,
                codewords: model.centroids,
            })
        };

        let blocks: Vec<BlockCodebook> = if self.parallel {
            (0..num_blocks)
                .into_par_iter()
                .map(train_block)
                .collect::<Result<Vec<_>>>()?
        } else {
            (0..num_blocks)
                .map(train_block)
                .collect::<Result<Vec<_>>>()?
        };

        Ok(Codebook {
            dimension,
            dimensions_per_block: self.dimensions_per_block,
            codebook_size,
            blocks,
        })
    }

    /// Encode `vector` against `codebook`.
    pub fn encode(vector: &[f32], codebook: &Codebook) -> Result<EncodedVector> {
        codebook.encode(vector)
    }

    /// Store positions used for training, sorted ascending.
    fn training_positions(&self, num_candidates: usize) -> Vec<usize> {
        match self.training_sample_size {
            Some(sample_size) if sample_size > 0 && sample_size < num_candidates => {
                let mut rng = StdRng::seed_from_u64(self.seed);
                let mut positions =
                    rand::seq::index::sample(&mut rng, num_candidates, sample_size).into_vec();
                positions.sort_unstable();
                positions
            }
            _ => (0..num_candidates).collect(),
        }
    }

    fn block_seed(&self, block: usize) -> u64 {
        self.seed
            .wrapping_add((block as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }
}

/// Codewords for one block.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockCodebook {
    offset: usize,
    width: usize,
    codewords: Vec<f32>,
}

impl BlockCodebook {
    /// First dimension covered by this block.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of dimensions covered by this block.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of codewords.
    pub fn len(&self) -> usize {
        self.codewords.len() / self.width
    }

    /// Whether the block has no codewords.
    pub fn is_empty(&self) -> bool {
        self.codewords.is_empty()
    }

    /// Codeword `code`.
    pub fn codeword(&self, code: usize) -> &[f32] {
        &self.codewords[code * self.width..(code + 1) * self.width]
    }

    /// This block's slice of a full vector.
    fn slice<'a>(&self, vector: &'a [f32]) -> &'a [f32] {
        &vector[self.offset..self.offset + self.width]
    }

    /// Nearest codeword by squared L2, ties to the lowest code.
    fn nearest(&self, sub_vector: &[f32]) -> u8 {
        let mut best_code = 0;
        let mut best_distance = f32::INFINITY;
        for (code, codeword) in self.codewords.chunks_exact(self.width).enumerate() {
            let distance = simd::squared_l2(sub_vector, codeword);
            if distance < best_distance {
                best_distance = distance;
                best_code = code;
            }
        }
        best_code as u8
    }
}

/// Trained codebooks for every block of the vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Codebook {
    dimension: usize,
    dimensions_per_block: usize,
    codebook_size: usize,
    blocks: Vec<BlockCodebook>,
}

impl Codebook {
    /// Vector dimension the codebook was trained for.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Width of a full block.
    pub fn dimensions_per_block(&self) -> usize {
        self.dimensions_per_block
    }

    /// Codewords per block.
    pub fn codebook_size(&self) -> usize {
        self.codebook_size
    }

    /// Number of blocks, `ceil(dimension / dimensions_per_block)`.
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Per-block codebooks.
    pub fn blocks(&self) -> &[BlockCodebook] {
        &self.blocks
    }

    /// Encode one vector to one code per block.
    pub fn encode(&self, vector: &[f32]) -> Result<EncodedVector> {
        if vector.len() != self.dimension {
            return Err(VantageError::dimension_mismatch(
                self.dimension,
                vector.len(),
            ));
        }

        let mut codes = vec![0u8; self.blocks.len()];
        self.encode_into(vector, &mut codes);
        Ok(EncodedVector { codes })
    }

    fn encode_into(&self, vector: &[f32], codes: &mut [u8]) {
        for (code, block) in codes.iter_mut().zip(&self.blocks) {
            *code = block.nearest(block.slice(vector));
        }
    }

    /// Encode every vector of a store, in store order.
    pub fn encode_store(&self, store: &VectorStore, parallel: bool) -> Result<EncodedVectors> {
        if store.dimension() != self.dimension {
            return Err(VantageError::dimension_mismatch(
                self.dimension,
                store.dimension(),
            ));
        }

        let num_blocks = self.blocks.len();
        let mut codes = vec![0u8; store.len() * num_blocks];

        if parallel {
            codes
                .par_chunks_mut(num_blocks)
                .enumerate()
                .for_each(|(position, out)| self.encode_into(store.vector(position), out));
        } else {
            for (position, out) in codes.chunks_mut(num_blocks).enumerate() {
                self.encode_into(store.vector(position), out);
            }
        }

        Ok(EncodedVectors { num_blocks, codes })
    }

    /// Approximate reconstruction from codes. Lossy by construction.
    pub fn decode(&self, codes: &[u8]) -> Vec<f32> {
        let mut vector = Vec::with_capacity(self.dimension);
        for (code, block) in codes.iter().zip(&self.blocks) {
            vector.extend_from_slice(block.codeword(*code as usize));
        }
        vector
    }

    /// Mean squared reconstruction error over a store.
    pub fn quantization_error(&self, store: &VectorStore) -> Result<f32> {
        let mut total = 0.0f64;
        for (_, vector) in store.iter() {
            let encoded = self.encode(vector)?;
            let decoded = self.decode(encoded.codes());
            total += simd::squared_l2(vector, &decoded) as f64;
        }
        Ok((total / store.len() as f64) as f32)
    }

    /// Precompute per-block query-to-codeword distances for `measure`.
    ///
    /// For cosine the query is unit-normalized and the database is expected
    /// to have been encoded from unit vectors. Entries are half the squared
    /// L2 distance, which equals `1 - cos` for exact codes and keeps the
    /// norm error of the decoded vector in the estimate.
    pub fn lookup_table(&self, query: &[f32], measure: DistanceMeasure) -> Result<LookupTable> {
        if query.len() != self.dimension {
            return Err(VantageError::dimension_mismatch(
                self.dimension,
                query.len(),
            ));
        }

        let unit_query;
        let query = if measure == DistanceMeasure::Cosine {
            unit_query = normalized(query);
            unit_query.as_slice()
        } else {
            query
        };

        let stride = self.codebook_size;
        let mut table = vec![0.0f32; self.blocks.len() * stride];
        for (block_index, block) in self.blocks.iter().enumerate() {
            let sub_query = block.slice(query);
            let row = &mut table[block_index * stride..(block_index + 1) * stride];
            for (entry, codeword) in row.iter_mut().zip(block.codewords.chunks_exact(block.width)) {
                *entry = match measure {
                    DistanceMeasure::SquaredL2 => simd::squared_l2(sub_query, codeword),
                    DistanceMeasure::DotProduct => -simd::dot(sub_query, codeword),
                    DistanceMeasure::Cosine => 0.5 * simd::squared_l2(sub_query, codeword),
                };
            }
        }

        Ok(LookupTable { stride, table })
    }
}

/// One code per block for a single vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedVector {
    codes: Vec<u8>,
}

impl EncodedVector {
    /// The codes, one per block.
    pub fn codes(&self) -> &[u8] {
        &self.codes
    }

    /// Memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.codes.len()
    }
}

/// Codes for a whole store, flat and in store order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedVectors {
    num_blocks: usize,
    codes: Vec<u8>,
}

impl EncodedVectors {
    /// Codes of the candidate at `position`.
    #[inline]
    pub fn get(&self, position: usize) -> &[u8] {
        &self.codes[position * self.num_blocks..(position + 1) * self.num_blocks]
    }

    /// Number of encoded vectors.
    pub fn len(&self) -> usize {
        self.codes.len() / self.num_blocks
    }

    /// Whether no vectors are encoded.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Bytes per encoded vector.
    pub fn bytes_per_vector(&self) -> usize {
        self.num_blocks
    }

    /// Total memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.codes.len()
    }
}

/// Query-specific table of block-to-codeword distances.
#[derive(Debug, Clone)]
pub struct LookupTable {
    stride: usize,
    table: Vec<f32>,
}

impl LookupTable {
    /// Approximate distance to an encoded vector: one table lookup per block.
    #[inline]
    pub fn distance(&self, codes: &[u8]) -> f32 {
        let mut sum = 0.0;
        for (block, code) in codes.iter().enumerate() {
            sum += self.table[block * self.stride + *code as usize];
        }
        sum
    }
}
