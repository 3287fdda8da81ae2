//! Browser User-Agent strings sent with generated requests.
use crate::entropy::Entropy;

/// Fallback when the pool yields nothing.
const FALLBACK_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

pub(crate) const USER_AGENTS: &[&str] = &[
    FALLBACK_USER_AGENT,
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36 Edg/130.0.0.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:132.0) Gecko/20100101 Firefox/132.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.6 Safari/605.1.15",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14.7; rv:132.0) Gecko/20100101 Firefox/132.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:132.0) Gecko/20100101 Firefox/132.0",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 18_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (iPad; CPU OS 17_7 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.7 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.6778.39 Mobile Safari/537.36",
    "Mozilla/5.0 (Linux; Android 14; SM-S921B) AppleWebKit/537.36 (KHTML, like Gecko) SamsungBrowser/26.0 Chrome/122.0.0.0 Mobile Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 OPR/114.0.0.0",
];

/// Picks a User-Agent uniformly from [`USER_AGENTS`].
#[must_use]
pub fn random_user_agent(entropy: &Entropy) -> &'static str {
    entropy
        .choose(USER_AGENTS)
        .copied()
        .unwrap_or(FALLBACK_USER_AGENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_come_from_the_pool() -> Result<(), String> {
        let entropy = Entropy::from_seed(11);
        for _ in 0..64 {
            let agent = random_user_agent(&entropy);
            if !USER_AGENTS.contains(&agent) {
                return Err(format!("Unexpected user agent: {}", agent));
            }
        }
        Ok(())
    }

    #[test]
    fn pool_varies_between_picks() -> Result<(), String> {
        let entropy = Entropy::from_seed(5);
        let first = random_user_agent(&entropy);
        let varied = (0..64).any(|_| random_user_agent(&entropy) != first);
        if !varied {
            return Err("Expected more than one distinct user agent".to_owned());
        }
        Ok(())
    }
}
