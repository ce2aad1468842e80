use quizwheel_core::{WIN_ODDS, draw_outcome};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

const DRAWS: u32 = 50_000;

/// Binomial(n, p) standard deviation.
fn sigma(n: u32, p: f64) -> f64 {
    (f64::from(n) * p * (1.0 - p)).sqrt()
}

fn count_wins<R: rand::Rng>(rng: &mut R) -> u32 {
    (0..DRAWS)
        .map(|_| u32::from(draw_outcome(rng, WIN_ODDS)))
        .sum()
}

#[test]
fn seeded_streams_stay_within_binomial_tolerance() {
    let p = 1.0 / f64::from(WIN_ODDS);
    let expected = f64::from(DRAWS) * p;
    let tolerance = 5.0 * sigma(DRAWS, p);

    for seed in [1_u64, 0xC0FFEE, 0xDEAD_BEEF, 42, 2024] {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let wins = f64::from(count_wins(&mut rng));
        assert!(
            (wins - expected).abs() <= tolerance,
            "seed {seed}: {wins} wins, expected {expected} ± {tolerance:.1}"
        );
    }
}

#[test]
fn thread_rng_stays_within_binomial_tolerance() {
    let p = 1.0 / f64::from(WIN_ODDS);
    let expected = f64::from(DRAWS) * p;
    // Six sigma keeps the unseeded check from flaking.
    let tolerance = 6.0 * sigma(DRAWS, p);
    let wins = f64::from(count_wins(&mut rand::thread_rng()));
    assert!(
        (wins - expected).abs() <= tolerance,
        "{wins} wins, expected {expected} ± {tolerance:.1}"
    );
}

#[test]
fn every_residue_is_reachable() {
    // A uniform draw over [0, WIN_ODDS) should hit every bucket in a modest sample.
    let mut rng = ChaCha20Rng::seed_from_u64(9);
    let mut seen = vec![0_u32; WIN_ODDS as usize];
    for _ in 0..DRAWS {
        let bucket = rand::Rng::gen_range(&mut rng, 0..WIN_ODDS);
        seen[bucket as usize] += 1;
    }
    let expected = DRAWS / WIN_ODDS;
    for (bucket, hits) in seen.iter().enumerate() {
        assert!(
            hits.abs_diff(expected) < expected / 4,
            "bucket {bucket} hit {hits} times (expected ~{expected})"
        );
    }
}
