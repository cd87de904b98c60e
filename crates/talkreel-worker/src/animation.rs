//! Per-turn caption animation choice.

use rand::Rng;

use talkreel_models::Animation;

use crate::error::{PipelineError, PipelineResult};

/// How each turn's caption animation is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationPolicy {
    /// Every turn uses the same animation.
    Fixed(Animation),
    /// Uniform pick over all animations, per turn.
    Random,
}

impl AnimationPolicy {
    /// `random`, or an animation name.
    pub fn parse(value: &str) -> PipelineResult<Self> {
        if value.trim().eq_ignore_ascii_case("random") {
            return Ok(AnimationPolicy::Random);
        }
        value
            .trim()
            .parse()
            .map(AnimationPolicy::Fixed)
            .map_err(|e| PipelineError::config(format!("TALKREEL_ANIMATION: {}", e)))
    }

    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Animation {
        match self {
            AnimationPolicy::Fixed(animation) => *animation,
            AnimationPolicy::Random => Animation::ALL[rng.random_range(0..Animation::ALL.len())],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_parse() {
        assert_eq!(AnimationPolicy::parse("random").unwrap(), AnimationPolicy::Random);
        assert_eq!(
            AnimationPolicy::parse("fade").unwrap(),
            AnimationPolicy::Fixed(Animation::Fade)
        );
        assert!(AnimationPolicy::parse("spin").unwrap_err().is_config());
    }

    #[test]
    fn test_fixed_always_returns_same() {
        let mut rng = StdRng::seed_from_u64(7);
        let policy = AnimationPolicy::Fixed(Animation::SlideTop);
        assert!((0..20).all(|_| policy.pick(&mut rng) == Animation::SlideTop));
    }

    #[test]
    fn test_random_covers_variants() {
        let mut rng = StdRng::seed_from_u64(42);
        let picks: std::collections::HashSet<Animation> =
            (0..500).map(|_| AnimationPolicy::Random.pick(&mut rng)).collect();
        assert_eq!(picks.len(), Animation::ALL.len());
    }
}
