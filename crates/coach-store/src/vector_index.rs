use std::fs;
use std::io::Write;
use std::path::Path;

use thiserror::Error;

const MAGIC: &[u8; 4] = b"CCIX";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 8;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("vector {position} has dimension {found}, expected {expected}")]
    DimensionMismatch {
        expected: usize,
        found: usize,
        position: usize,
    },

    #[error("vector {position} is empty")]
    EmptyVector { position: usize },

    #[error("vector {position} contains non-finite values")]
    NonFinite { position: usize },

    #[error("top-k must be greater than zero")]
    InvalidTopK,

    #[error("corrupt index blob: {0}")]
    Corrupt(String),

    #[error("index i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// One search hit: the chunk id and its Euclidean distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: usize,
    pub distance: f32,
}

/// Exact nearest-neighbour index over L2 distance.
///
/// Vector ids are insertion positions. Brute force is plenty for a corpus of
/// a few thousand chunks; callers rely only on the ordering contract of
/// [`FlatIndex::search`], not on the layout.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    vectors: Vec<Vec<f32>>,
}

impl FlatIndex {
    /// Build from vectors in id order. All vectors must share one dimension.
    pub fn build(vectors: Vec<Vec<f32>>) -> Result<Self, IndexError> {
        let dimension = vectors.first().map(Vec::len).unwrap_or(0);

        for (position, vector) in vectors.iter().enumerate() {
            if vector.is_empty() {
                return Err(IndexError::EmptyVector { position });
            }
            if vector.len() != dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: dimension,
                    found: vector.len(),
                    position,
                });
            }
            if vector.iter().any(|v| !v.is_finite()) {
                return Err(IndexError::NonFinite { position });
            }
        }

        Ok(Self { dimension, vectors })
    }

    /// Zero for an empty index.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// The `min(k, len)` nearest vectors, ascending by distance, ties broken
    /// by ascending id.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        if k == 0 {
            return Err(IndexError::InvalidTopK);
        }
        if self.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                found: query.len(),
                position: 0,
            });
        }
        if query.iter().any(|v| !v.is_finite()) {
            return Err(IndexError::NonFinite { position: 0 });
        }

        let mut hits: Vec<Neighbor> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(id, vector)| Neighbor {
                id,
                distance: euclidean(query, vector),
            })
            .collect();

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.id.cmp(&b.id)));
        hits.truncate(k);
        Ok(hits)
    }

    // ========================================================================
    // Binary encoding
    // ========================================================================

    /// `CCIX` | version u32 | dimension u32 | count u64 | count*dimension f32,
    /// all little-endian.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes =
            Vec::with_capacity(HEADER_LEN + self.len() * self.dimension * size_of::<f32>());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.vectors.len() as u64).to_le_bytes());
        for vector in &self.vectors {
            for value in vector {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IndexError> {
        if bytes.len() < HEADER_LEN {
            return Err(IndexError::Corrupt(format!(
                "blob is {} bytes, shorter than the header",
                bytes.len()
            )));
        }
        if &bytes[0..4] != MAGIC {
            return Err(IndexError::Corrupt("bad magic".into()));
        }

        let version = read_u32(&bytes[4..8]);
        if version != FORMAT_VERSION {
            return Err(IndexError::Corrupt(format!(
                "unsupported format version {version}"
            )));
        }

        let dimension = read_u32(&bytes[8..12]) as usize;
        let count = usize::try_from(read_u64(&bytes[12..20]))
            .map_err(|_| IndexError::Corrupt("vector count overflows usize".into()))?;

        if count > 0 && dimension == 0 {
            return Err(IndexError::Corrupt("non-empty index with zero dimension".into()));
        }

        let expected_len = count
            .checked_mul(dimension)
            .and_then(|n| n.checked_mul(size_of::<f32>()))
            .and_then(|n| n.checked_add(HEADER_LEN))
            .ok_or_else(|| IndexError::Corrupt("payload length overflows".into()))?;
        if bytes.len() != expected_len {
            return Err(IndexError::Corrupt(format!(
                "expected {expected_len} bytes, got {}",
                bytes.len()
            )));
        }

        let payload = &bytes[HEADER_LEN..];
        let vectors = if dimension == 0 {
            Vec::new()
        } else {
            payload
                .chunks_exact(dimension * size_of::<f32>())
                .map(|row| {
                    row.chunks_exact(4)
                        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                        .collect()
                })
                .collect()
        };

        Self::build(vectors).map_err(|e| IndexError::Corrupt(e.to_string()))
    }

    /// Write the blob to `path`, flushed to disk before returning.
    pub fn persist(&self, path: &Path) -> Result<(), IndexError> {
        let mut file = fs::File::create(path)?;
        file.write_all(&self.to_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, IndexError> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}

fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}
