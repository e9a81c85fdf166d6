//! Sentence-level BLEU over whitespace tokens.
//!
//! Uniform weights over 1..=4-grams, clipped n-gram counts, brevity penalty,
//! and smoothing method 4 as NLTK's `SmoothingFunction().method4` computes
//! it, so scores line up with NLTK-produced evaluation snapshots.

use std::collections::HashMap;

const MAX_ORDER: usize = 4;
const SMOOTHING_K: f64 = 5.0;

/// Lexical similarity of `candidate` to `reference`, in `[0.0, 1.0]`.
pub fn sentence_bleu(reference: &str, candidate: &str) -> f64 {
    let reference: Vec<&str> = reference.split_whitespace().collect();
    let hypothesis: Vec<&str> = candidate.split_whitespace().collect();
    bleu_tokens(&reference, &hypothesis)
}

pub fn bleu_tokens(reference: &[&str], hypothesis: &[&str]) -> f64 {
    let hyp_len = hypothesis.len();
    if hyp_len == 0 {
        return 0.0;
    }

    let precisions: Vec<(usize, usize)> = (1..=MAX_ORDER)
        .map(|n| modified_precision(reference, hypothesis, n))
        .collect();

    // No unigram overlap means no higher-order overlap either.
    if precisions[0].0 == 0 {
        return 0.0;
    }

    let weight = 1.0 / MAX_ORDER as f64;
    let mut incvnt: i32 = 1;
    let mut log_sum = 0.0;
    for &(matched, total) in &precisions {
        let p = if matched > 0 {
            matched as f64 / total as f64
        } else if hyp_len > 1 {
            // 1 / (2^incvnt * k / ln(len)), spread over the order's denominator
            let numerator = 1.0 / (2f64.powi(incvnt) * SMOOTHING_K / (hyp_len as f64).ln());
            incvnt += 1;
            numerator / total as f64
        } else {
            // Unsmoothed zero precision drops out of the geometric mean.
            continue;
        };
        log_sum += weight * p.ln();
    }

    brevity_penalty(reference.len(), hyp_len) * log_sum.exp()
}

/// (clipped matches, max(1, candidate n-gram count)) for order `n`.
fn modified_precision(reference: &[&str], hypothesis: &[&str], n: usize) -> (usize, usize) {
    let hyp_counts = ngram_counts(hypothesis, n);
    let ref_counts = ngram_counts(reference, n);

    let matched = hyp_counts
        .iter()
        .map(|(gram, count)| (*count).min(ref_counts.get(gram).copied().unwrap_or(0)))
        .sum();
    let total = hyp_counts.values().sum::<usize>().max(1);
    (matched, total)
}

fn ngram_counts<'a>(tokens: &'a [&'a str], n: usize) -> HashMap<&'a [&'a str], usize> {
    let mut counts = HashMap::new();
    if tokens.len() >= n {
        for gram in tokens.windows(n) {
            *counts.entry(gram).or_insert(0) += 1;
        }
    }
    counts
}

fn brevity_penalty(ref_len: usize, hyp_len: usize) -> f64 {
    if hyp_len > ref_len {
        1.0
    } else {
        (1.0 - ref_len as f64 / hyp_len as f64).exp()
    }
}
