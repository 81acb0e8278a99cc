use crate::play_store::Play;

const BUCKET_COUNT: usize = 7;

/// Play categories in chart order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Interceptions,
    Sacks,
    ScreenPasses,
    ShortPasses,
    IntermediatePasses,
    DeepPasses,
    Rushes,
}

impl Bucket {
    pub const ALL: [Bucket; BUCKET_COUNT] = [
        Bucket::Interceptions,
        Bucket::Sacks,
        Bucket::ScreenPasses,
        Bucket::ShortPasses,
        Bucket::IntermediatePasses,
        Bucket::DeepPasses,
        Bucket::Rushes,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Bucket::Interceptions => "Interceptions",
            Bucket::Sacks => "Sacks",
            Bucket::ScreenPasses => "Screen passes",
            Bucket::ShortPasses => "Short passes",
            Bucket::IntermediatePasses => "Intermediate passes",
            Bucket::DeepPasses => "Deep passes",
            Bucket::Rushes => "Rushes",
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    /// Buckets overlap: a scramble with recorded air yards counts as a rush and a pass.
    pub fn matches(self, play: &Play) -> bool {
        match self {
            Bucket::Interceptions => play.interception,
            Bucket::Sacks => play.sack,
            Bucket::ScreenPasses => play.air_yards.is_some_and(|ay| ay <= 0.0),
            Bucket::ShortPasses => play.air_yards.is_some_and(|ay| ay > 0.0 && ay <= 10.0),
            Bucket::IntermediatePasses => {
                play.air_yards.is_some_and(|ay| ay > 10.0 && ay <= 20.0)
            }
            Bucket::DeepPasses => play.air_yards.is_some_and(|ay| ay > 20.0),
            Bucket::Rushes => play.qb_scramble || play.rush,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoreError {
    #[error("no plays to score")]
    EmptyPlaySet,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuarterbackProfile {
    scores: [f64; BUCKET_COUNT],
    pub plays: usize,
}

impl QuarterbackProfile {
    pub fn get(&self, bucket: Bucket) -> f64 {
        self.scores[bucket.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Bucket, f64)> + '_ {
        Bucket::ALL.iter().map(|b| (*b, self.get(*b)))
    }
}

/// Per-bucket EPA sum over the total play count, not the bucket's own count.
pub fn score_profile(plays: &[Play]) -> Result<QuarterbackProfile, ScoreError> {
    if plays.is_empty() {
        return Err(ScoreError::EmptyPlaySet);
    }

    let mut sums = [0.0_f64; BUCKET_COUNT];
    for play in plays {
        let epa = play.epa_or_zero();
        for bucket in Bucket::ALL {
            if bucket.matches(play) {
                sums[bucket.index()] += epa;
            }
        }
    }

    let n = plays.len() as f64;
    Ok(QuarterbackProfile {
        scores: sums.map(|s| s / n),
        plays: plays.len(),
    })
}
