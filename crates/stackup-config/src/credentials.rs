//! Random credential generation.

use rand::Rng;
use rand::distr::Alphanumeric;

/// Draw `length` ASCII letters and digits from `rng`.
pub fn generate_credential<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    std::iter::repeat_with(|| char::from(rng.sample(Alphanumeric)))
        .take(length)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn credentials_are_alphanumeric_and_sized() {
        let mut rng = StdRng::seed_from_u64(7);
        let first = generate_credential(&mut rng, 16);
        let second = generate_credential(&mut rng, 16);
        assert_eq!(first.len(), 16);
        assert!(first.chars().all(|ch| ch.is_ascii_alphanumeric()));
        assert_ne!(first, second);
    }
}
