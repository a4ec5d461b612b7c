//! In-memory vector backend.
//!
//! This module provides a [`MemoryBackend`] that keeps namespaced records in
//! memory. It's useful for:
//! - Running the pipeline without a Pinecone account
//! - Tests that need to inspect what was written

use async_trait::async_trait;
use docrag_core::{
    DistanceMetric, IndexCreation, IndexSpec, QueryMatch, StoreError, VectorBackend, VectorRecord,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

type Namespaces = HashMap<String, HashMap<String, VectorRecord>>;

/// In-memory vector backend.
///
/// Search is brute force over one namespace. Record operations fail until
/// the index has been created, as they would against a hosted index.
///
/// # Example
///
/// ```rust
/// use docrag_store::MemoryBackend;
/// use docrag_core::{IndexSpec, VectorBackend};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MemoryBackend::new();
/// backend.create_index(&IndexSpec::default()).await?;
///
/// assert_eq!(backend.namespace_count("report.pdf").await?, 0);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct MemoryBackend {
    index: Arc<RwLock<Option<IndexSpec>>>,
    namespaces: Arc<RwLock<Namespaces>>,
}

impl MemoryBackend {
    /// Create an empty backend with no index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All records of a namespace, sorted by id.
    pub async fn records(&self, namespace: &str) -> Vec<VectorRecord> {
        let namespaces = self.namespaces.read().await;
        let mut records: Vec<VectorRecord> = namespaces
            .get(namespace)
            .map(|ns| ns.values().cloned().collect())
            .unwrap_or_default();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    /// The created index, if any.
    pub async fn index_spec(&self) -> Option<IndexSpec> {
        self.index.read().await.clone()
    }

    async fn spec(&self) -> Result<IndexSpec, StoreError> {
        self.index
            .read()
            .await
            .clone()
            .ok_or_else(|| StoreError::Init("index does not exist".to_string()))
    }

    fn check_dimension(spec: &IndexSpec, actual: usize) -> Result<(), StoreError> {
        if actual == spec.dimension {
            Ok(())
        } else {
            Err(StoreError::Schema(format!(
                "vector dimension {actual} does not match index dimension {}",
                spec.dimension
            )))
        }
    }
}

/// Similarity score under `metric`; higher is closer except for Euclidean.
fn score(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    match metric {
        DistanceMetric::DotProduct => dot,
        DistanceMetric::Euclidean => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum(),
        DistanceMetric::Cosine => {
            let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
            let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm_a == 0.0 || norm_b == 0.0 {
                0.0
            } else {
                dot / (norm_a * norm_b)
            }
        }
    }
}

#[async_trait]
impl VectorBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<IndexCreation, StoreError> {
        let mut index = self.index.write().await;
        if index.is_some() {
            return Ok(IndexCreation::AlreadyExists);
        }
        *index = Some(spec.clone());
        debug!(
            "Created in-memory index {} (dimension: {}, metric: {})",
            spec.name,
            spec.dimension,
            spec.metric.as_str()
        );
        Ok(IndexCreation::Created)
    }

    async fn namespace_count(&self, namespace: &str) -> Result<u64, StoreError> {
        self.spec().await?;
        let namespaces = self.namespaces.read().await;
        Ok(namespaces.get(namespace).map_or(0, |ns| ns.len() as u64))
    }

    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<(), StoreError> {
        let spec = self.spec().await?;
        for record in records {
            Self::check_dimension(&spec, record.values.len())?;
        }

        let mut namespaces = self.namespaces.write().await;
        let ns = namespaces.entry(namespace.to_string()).or_default();
        for record in records {
            ns.insert(record.id.clone(), record.clone());
        }
        debug!("Upserted {} records into {}", records.len(), namespace);
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryMatch>, StoreError> {
        let spec = self.spec().await?;
        Self::check_dimension(&spec, vector.len())?;

        let namespaces = self.namespaces.read().await;
        let Some(ns) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let mut results: Vec<(f32, &VectorRecord)> = ns
            .values()
            .map(|record| (score(spec.metric, vector, &record.values), record))
            .collect();

        // Best first; ties broken by id so results are stable
        results.sort_by(|a, b| {
            let order = if spec.metric == DistanceMetric::Euclidean {
                a.0.partial_cmp(&b.0)
            } else {
                b.0.partial_cmp(&a.0)
            };
            order
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.id.cmp(&b.1.id))
        });

        Ok(results
            .into_iter()
            .take(top_k)
            .map(|(score, record)| QueryMatch {
                id: record.id.clone(),
                score,
                metadata: record.metadata.clone(),
            })
            .collect())
    }

    async fn fetch_ids(&self, namespace: &str, ids: &[String]) -> Result<Vec<String>, StoreError> {
        self.spec().await?;
        let namespaces = self.namespaces.read().await;
        let Some(ns) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };
        Ok(ids.iter().filter(|id| ns.contains_key(*id)).cloned().collect())
    }
}
