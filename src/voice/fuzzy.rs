// Edit-distance similarity for noisy speech recognition output

/// Lowercase, drop punctuation, collapse whitespace
pub fn normalize(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '\'' { c } else { ' ' })
        .collect::<String>()
        .to_lowercase();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Levenshtein distance over chars
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // Single rolling row
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut diag = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            let cost = if ca == cb { 0 } else { 1 };
            row[j + 1] = (diag + cost).min(above + 1).min(row[j] + 1);
            diag = above;
        }
    }
    row[b.len()]
}

/// Score of one candidate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    /// 1.0 = identical, 0.0 = nothing in common
    pub similarity: f64,
    pub distance: usize,
}

/// Similarity of the normalized strings, scaled by the longer one
pub fn score(a: &str, b: &str) -> Score {
    let a = normalize(a);
    let b = normalize(b);
    let distance = edit_distance(&a, &b);
    let longest = a.chars().count().max(b.chars().count());
    let similarity = if longest == 0 {
        1.0
    } else {
        (longest - distance) as f64 / longest as f64
    };
    Score { similarity, distance }
}

/// Best candidate at or above `threshold`.
/// Ties: highest similarity, then lowest distance, then first in `candidates`.
pub fn best_match<'a, T>(
    query: &str,
    candidates: impl IntoIterator<Item = (&'a str, T)>,
    threshold: f64,
) -> Option<(T, Score)> {
    let mut best: Option<(T, Score)> = None;
    for (label, item) in candidates {
        let s = score(query, label);
        if s.similarity < threshold {
            continue;
        }
        let better = match &best {
            None => true,
            Some((_, b)) => {
                s.similarity > b.similarity
                    || (s.similarity == b.similarity && s.distance < b.distance)
            }
        };
        if better {
            best = Some((item, s));
        }
    }
    best
}
