//! Fallback policy (§4.9): a fixed pool of five neutral, user-visible
//! sentences sampled uniformly whenever orchestration raises or
//! summarization returns no answer.

use rand::seq::SliceRandom;

pub const FALLBACK_MESSAGES: [&str; 5] = [
    "I'm having a bit of trouble connecting right now. Could you please try asking that again?",
    "It seems my thoughts got a little tangled. Mind repeating that?",
    "I didn't quite catch that due to a technical hiccup. Please try again.",
    "Sorry, I encountered a temporary issue. Let's try that one more time.",
    "I'm experiencing a brief service interruption. Please ask me again in a moment.",
];

/// Picks one fallback sentence uniformly at random (§4.9). The fallback still
/// goes through the normal completion path (history append, durable log,
/// channel close) so orchestration stays observable even on failure.
pub fn pick_fallback() -> &'static str {
    FALLBACK_MESSAGES.choose(&mut rand::thread_rng()).expect("pool is non-empty")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_returns_one_of_the_five_messages() {
        for _ in 0..50 {
            assert!(FALLBACK_MESSAGES.contains(&pick_fallback()));
        }
    }
}
