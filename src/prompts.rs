use rand::seq::IteratorRandom;
use rand::Rng;

pub const EXAMPLE_PROMPTS: &str = include_str!("../data/example_prompts.txt");

/// Non-empty lines of the bundled example prompt list.
pub fn example_prompts() -> impl Iterator<Item = &'static str> {
    EXAMPLE_PROMPTS
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
}

pub fn random_prompt<R: Rng + ?Sized>(rng: &mut R) -> Option<&'static str> {
    example_prompts().choose(rng)
}
