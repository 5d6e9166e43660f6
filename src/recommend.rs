//! Alternative product recommendations.
//!
//! Titles and descriptions are embedded with TF-IDF and reduced by a
//! truncated SVD (latent semantic analysis). Candidates from the same
//! category that score higher than the query are ranked by score, then by
//! cosine similarity in the reduced space.
//!
//! Only the `recommendation_pool_cap` highest-scoring qualifying entries are
//! vectorized, so the eigen-decomposition works on a bounded matrix however
//! large the cache grows.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::debug;

use crate::config::Settings;
use crate::explain;
use crate::model::{Listing, RecommendationCandidate};
use crate::text::content_terms;

const JACOBI_MAX_SWEEPS: usize = 100;
const JACOBI_TOLERANCE: f64 = 1e-18;
/// Eigenvalues below this are numerical noise, not latent dimensions.
const EIGEN_FLOOR: f64 = 1e-10;

/// Rank better-scoring alternatives to `query` from `pool`.
///
/// Returns an empty list when nothing qualifies; this never fails.
pub fn recommend(
    query: Listing<'_>,
    pool: &[Listing<'_>],
    settings: &Settings,
) -> Vec<RecommendationCandidate> {
    let min_gain = settings.min_score_improvement.max(1);
    let required = u16::from(query.analysis.score) + u16::from(min_gain);
    if required > 100 {
        return Vec::new();
    }

    let mut candidates: Vec<&Listing<'_>> = pool
        .iter()
        .filter(|c| c.product.id != query.product.id)
        .filter(|c| c.product.category == query.product.category)
        .filter(|c| u16::from(c.analysis.score) >= required)
        .collect();
    if candidates.is_empty() {
        debug!(product_id = %query.product.id, "No better same-category products to compare against");
        return Vec::new();
    }
    let qualifying = candidates.len();
    candidates.sort_by(|a, b| {
        b.analysis
            .score
            .cmp(&a.analysis.score)
            .then_with(|| a.product.id.cmp(&b.product.id))
    });
    candidates.truncate(settings.recommendation_pool_cap.max(1));

    let mut documents = vec![document(&query)];
    documents.extend(candidates.iter().map(|c| document(c)));
    let vectors = latent_vectors(&tfidf(&documents), settings.svd_components);

    let mut ranked: Vec<(&Listing<'_>, f64)> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| (*c, cosine(&vectors[0], &vectors[i + 1])))
        .filter(|(_, sim)| *sim >= settings.similarity_threshold)
        .collect();

    ranked.sort_by(|a, b| {
        b.0.analysis
            .score
            .cmp(&a.0.analysis.score)
            .then_with(|| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal))
    });
    ranked.truncate(settings.recommendation_limit);

    debug!(
        product_id = %query.product.id,
        qualifying,
        pool = candidates.len(),
        selected = ranked.len(),
        "Ranked alternatives"
    );

    ranked
        .into_iter()
        .map(|(c, similarity)| RecommendationCandidate {
            product_id: c.product.id.clone(),
            title: c.product.title.clone(),
            url: c.product.url.clone(),
            category: c.product.category.clone(),
            score: c.analysis.score,
            similarity,
            price: c.product.price,
            explanation: explain::explain(query, *c, similarity),
        })
        .collect()
}

fn document(listing: &Listing<'_>) -> Vec<String> {
    content_terms(&format!("{} {}", listing.product.title, listing.product.description))
}

/// Dense TF-IDF rows (raw counts × smoothed IDF), L2-normalized.
pub fn tfidf(documents: &[Vec<String>]) -> Vec<Vec<f64>> {
    let mut vocabulary: BTreeMap<&str, usize> = BTreeMap::new();
    for doc in documents {
        for term in doc {
            let next = vocabulary.len();
            vocabulary.entry(term.as_str()).or_insert(next);
        }
    }

    let n_docs = documents.len() as f64;
    let mut df = vec![0usize; vocabulary.len()];
    let mut rows: Vec<Vec<f64>> = documents
        .iter()
        .map(|doc| {
            let mut row = vec![0.0; vocabulary.len()];
            for term in doc {
                row[vocabulary[term.as_str()]] += 1.0;
            }
            for (j, count) in row.iter().enumerate() {
                if *count > 0.0 {
                    df[j] += 1;
                }
            }
            row
        })
        .collect();

    let idf: Vec<f64> = df
        .iter()
        .map(|&d| ((1.0 + n_docs) / (1.0 + d as f64)).ln() + 1.0)
        .collect();

    for row in &mut rows {
        for (value, weight) in row.iter_mut().zip(&idf) {
            *value *= weight;
        }
        let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            row.iter_mut().for_each(|v| *v /= norm);
        }
    }
    rows
}

/// Project documents onto the top `components` singular directions.
///
/// The document Gram matrix `X Xᵀ` has eigenvectors `U` and eigenvalues
/// `σ²`, so the reduced document coordinates are `U_k Σ_k`.
pub fn latent_vectors(rows: &[Vec<f64>], components: usize) -> Vec<Vec<f64>> {
    let n = rows.len();
    let n_terms = rows.first().map_or(0, Vec::len);
    let k = components.min(n).min(n_terms);
    if k == 0 {
        return vec![Vec::new(); n];
    }

    let gram: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| dot(&rows[i], &rows[j])).collect())
        .collect();
    let (values, vectors) = jacobi_eigen(gram);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[b].partial_cmp(&values[a]).unwrap_or(Ordering::Equal));
    let kept: Vec<usize> = order
        .into_iter()
        .filter(|&j| values[j] > EIGEN_FLOOR)
        .take(k)
        .collect();

    (0..n)
        .map(|i| kept.iter().map(|&j| vectors[i][j] * values[j].sqrt()).collect())
        .collect()
}

/// Cyclic Jacobi eigen-decomposition of a symmetric matrix.
/// Returns eigenvalues and a matrix whose columns are the eigenvectors.
fn jacobi_eigen(mut a: Vec<Vec<f64>>) -> (Vec<f64>, Vec<Vec<f64>>) {
    let n = a.len();
    let mut v: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();

    for _ in 0..JACOBI_MAX_SWEEPS {
        let off: f64 = (0..n)
            .flat_map(|p| ((p + 1)..n).map(move |q| (p, q)))
            .map(|(p, q)| a[p][q] * a[p][q])
            .sum();
        if off < JACOBI_TOLERANCE {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                if a[p][q].abs() < f64::EPSILON * 1e-3 {
                    continue;
                }
                let theta = (a[q][q] - a[p][p]) / (2.0 * a[p][q]);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for row in a.iter_mut() {
                    let (kp, kq) = (row[p], row[q]);
                    row[p] = c * kp - s * kq;
                    row[q] = s * kp + c * kq;
                }
                for k in 0..n {
                    let (pk, qk) = (a[p][k], a[q][k]);
                    a[p][k] = c * pk - s * qk;
                    a[q][k] = s * pk + c * qk;
                }
                for row in v.iter_mut() {
                    let (kp, kq) = (row[p], row[q]);
                    row[p] = c * kp - s * kq;
                    row[q] = s * kp + c * kq;
                }
            }
        }
    }

    let values = (0..n).map(|i| a[i][i]).collect();
    (values, v)
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Cosine similarity clamped to [0, 1]; zero vectors are dissimilar to everything.
pub fn cosine(a: &[f64], b: &[f64]) -> f64 {
    let na = dot(a, a).sqrt();
    let nb = dot(b, b).sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    (dot(a, b) / (na * nb)).clamp(0.0, 1.0)
}
