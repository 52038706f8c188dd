//! "Did you mean?" suggestions for misspelled rule names.

/// Returns the candidate most similar to `actual`, if any is close enough.
pub fn did_you_mean<'a, I>(actual: &str, candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let actual_lower = actual.to_lowercase();
    let mut best: Option<(&'a str, f64)> = None;

    for candidate in candidates {
        let similarity = string_similarity(&actual_lower, &candidate.to_lowercase());
        if similarity < 0.6 {
            continue;
        }
        match best {
            Some((_, best_similarity)) if similarity <= best_similarity => {}
            _ => best = Some((candidate, similarity)),
        }
    }

    best.map(|(candidate, _)| candidate)
}

/// Similarity in `0.0..=1.0` derived from the Levenshtein distance.
fn string_similarity(s1: &str, s2: &str) -> f64 {
    if s1 == s2 {
        return 1.0;
    }
    if s1.is_empty() || s2.is_empty() {
        return 0.0;
    }

    let distance = levenshtein_distance(s1, s2);
    let max_len = s1.chars().count().max(s2.chars().count());
    1.0 - (distance as f64 / max_len as f64)
}

fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let s2_chars: Vec<char> = s2.chars().collect();
    let mut previous: Vec<usize> = (0..=s2_chars.len()).collect();
    let mut current = vec![0; s2_chars.len() + 1];

    for (i, c1) in s1.chars().enumerate() {
        current[0] = i + 1;
        for (j, c2) in s2_chars.iter().enumerate() {
            let cost = usize::from(c1 != *c2);
            current[j + 1] = (previous[j] + cost)
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[s2_chars.len()]
}
