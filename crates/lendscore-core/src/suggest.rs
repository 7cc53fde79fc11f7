//! "Did you mean?" suggestions for rejected categorical values.

/// Levenshtein edit distance between two strings.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let b_len = b_chars.len();

    if a.is_empty() {
        return b_len;
    }
    if b_len == 0 {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0usize; b_len + 1];

    for (i, a_ch) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, b_ch) in b_chars.iter().enumerate() {
            let cost = usize::from(a_ch != *b_ch);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len]
}

fn max_distance(len: usize) -> usize {
    (len / 2).clamp(1, 3)
}

/// Closest candidate to `value`, if any is within the edit threshold.
///
/// Case differences cost nothing, so `"sf"` suggests `"SF"`.
pub fn suggest<S: AsRef<str>>(value: &str, candidates: &[S]) -> Option<String> {
    let threshold = max_distance(value.chars().count());
    let lower = value.to_lowercase();

    let mut best: Option<(&str, usize)> = None;
    for candidate in candidates {
        let candidate = candidate.as_ref();
        let dist = levenshtein(&lower, &candidate.to_lowercase());
        let better = match best {
            Some((_, d)) => dist < d,
            None => true,
        };
        if dist <= threshold && better {
            best = Some((candidate, dist));
        }
    }

    best.map(|(s, _)| s.to_string())
}
