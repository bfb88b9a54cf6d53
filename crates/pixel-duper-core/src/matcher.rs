use crate::config::AppConfig;
use crate::file_id::FileId;
use crate::index::IndexReader;
use crate::signature::{Average, Signature};
use ahash::AHashMap;
use std::collections::BTreeSet;

/// Files averaging at or below this luminance are kept out of the catch-all group.
pub const LUMINANCE_FLOOR: i32 = 2;

#[derive(Debug, Clone, Copy)]
pub struct MatchParams {
    pub quantize_num: i32,
    pub quantize_den: i32,
    pub threshold: usize,
}

impl From<&AppConfig> for MatchParams {
    fn from(config: &AppConfig) -> Self {
        Self {
            quantize_num: config.quantize_num,
            quantize_den: config.quantize_den,
            threshold: config.match_threshold(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Average luminance is above `LUMINANCE_FLOOR`.
    pub bright: bool,
    /// The file plus every candidate reaching the threshold, if any did.
    pub group: Option<BTreeSet<FileId>>,
}

/// Count grid-cell agreements between `id` and every indexed file and
/// collect the candidates that agree on at least `params.threshold` cells.
pub fn match_file(
    id: &FileId,
    signature: &Signature,
    index: &IndexReader<'_>,
    params: &MatchParams,
) -> MatchOutcome {
    let mut luminance = Average::default();
    let mut hits: AHashMap<&FileId, usize> = AHashMap::new();

    for (point, color) in signature.iter() {
        luminance.add(color.luminance());
        let quantized = color.quantize(params.quantize_num, params.quantize_den);
        if let Some(files) = index.files_at(point, &quantized) {
            for candidate in files.iter().filter(|c| *c != id) {
                *hits.entry(candidate).or_default() += 1;
            }
        }
    }

    let bright = luminance.value().is_some_and(|lum| lum > LUMINANCE_FLOOR);

    let mut matching: BTreeSet<FileId> = hits
        .into_iter()
        .filter(|(_, count)| *count >= params.threshold)
        .map(|(candidate, _)| candidate.clone())
        .collect();

    let group = if matching.is_empty() {
        None
    } else {
        matching.insert(id.clone());
        Some(matching)
    };

    MatchOutcome { bright, group }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::InvertedIndex;
    use crate::signature::{Color, GridPoint};

    const PARAMS: MatchParams = MatchParams {
        quantize_num: 1,
        quantize_den: 32,
        threshold: 8,
    };

    fn cells(values: [i32; 9]) -> Signature {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| (GridPoint::new(i as u32 % 3, i as u32 / 3), Color::gray(*v)))
            .collect()
    }

    fn index_of(files: &[(&str, &Signature)]) -> InvertedIndex {
        let index = InvertedIndex::new();
        for (name, sig) in files {
            index.insert(&FileId::new(name), &sig.quantized(1, 32));
        }
        index
    }

    #[test]
    fn test_eight_of_nine_cells_is_duplicate() {
        let a = cells([10, 40, 70, 100, 130, 160, 190, 220, 250]);
        // last cell moved to a different bucket, the rest only jitter inside their bucket
        let b = cells([12, 41, 71, 101, 131, 161, 191, 221, 10]);
        let index = index_of(&[("a", &a), ("b", &b)]);

        let outcome = match_file(&FileId::new("a"), &a, &index.reader(), &PARAMS);
        let group = outcome.group.unwrap();
        assert!(group.contains(&FileId::new("a")) && group.contains(&FileId::new("b")));
        assert_eq!(group.len(), 2);
    }

    #[test]
    fn test_seven_of_nine_cells_is_not() {
        let a = cells([10, 40, 70, 100, 130, 160, 190, 220, 250]);
        let b = cells([10, 40, 70, 100, 130, 160, 190, 10, 10]);
        let index = index_of(&[("a", &a), ("b", &b)]);

        let outcome = match_file(&FileId::new("a"), &a, &index.reader(), &PARAMS);
        assert_eq!(outcome.group, None);
    }

    #[test]
    fn test_self_is_never_a_candidate() {
        let a = cells([10; 9]);
        let index = index_of(&[("a", &a)]);
        let outcome = match_file(&FileId::new("a"), &a, &index.reader(), &PARAMS);
        assert_eq!(outcome.group, None);
    }

    #[test]
    fn test_uniform_bucket_matches_many() {
        let a = cells([100; 9]);
        let b = cells([101; 9]);
        let c = cells([102; 9]);
        let index = index_of(&[("a", &a), ("b", &b), ("c", &c)]);
        let outcome = match_file(&FileId::new("b"), &b, &index.reader(), &PARAMS);
        assert_eq!(outcome.group.unwrap().len(), 3);
    }

    #[test]
    fn test_luminance_floor() {
        let index = InvertedIndex::new();
        let black = cells([0, 0, 0, 0, 0, 0, 0, 0, 18]);
        let outcome = match_file(&FileId::new("k"), &black, &index.reader(), &PARAMS);
        // mean of 2 is not above the floor
        assert!(!outcome.bright);

        let dim = cells([0, 0, 0, 0, 0, 0, 0, 0, 27]);
        let outcome = match_file(&FileId::new("d"), &dim, &index.reader(), &PARAMS);
        assert!(outcome.bright);
    }

    #[test]
    fn test_luminance_uses_raw_colors() {
        let index = InvertedIndex::new();
        // quantized these would all be zero
        let sig = cells([20; 9]);
        let outcome = match_file(&FileId::new("x"), &sig, &index.reader(), &PARAMS);
        assert!(outcome.bright);
    }
}
