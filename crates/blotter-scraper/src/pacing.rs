use blotter_core::ScrapeConfig;
use rand::Rng;
use std::time::Duration;

/// Randomized pacing between portal requests.
///
/// Workers jitter their startup so concurrent sessions don't hit the portal
/// in lockstep, and pause a uniform random interval before each submit. A
/// zero-width submit range disables both.
#[derive(Debug, Clone)]
pub struct Pacing {
    startup: (Duration, Duration),
    submit: (Duration, Duration),
}

impl Pacing {
    pub fn from_config(config: &ScrapeConfig) -> Self {
        let submit = config.delay_range();
        let startup = if submit.1.is_zero() {
            (Duration::ZERO, Duration::ZERO)
        } else {
            (Duration::from_millis(500), Duration::from_secs(3))
        };
        Self { startup, submit }
    }

    /// No pacing at all, for tests.
    pub fn none() -> Self {
        Self {
            startup: (Duration::ZERO, Duration::ZERO),
            submit: (Duration::ZERO, Duration::ZERO),
        }
    }

    pub async fn startup_jitter(&self) {
        Self::pause(self.startup).await;
    }

    pub async fn submit_delay(&self) {
        Self::pause(self.submit).await;
    }

    async fn pause((min, max): (Duration, Duration)) {
        if max.is_zero() {
            return;
        }
        let millis = {
            let mut rng = rand::thread_rng();
            rng.gen_range(min.as_millis() as u64..=max.as_millis() as u64)
        };
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_delays_disable_jitter() {
        let pacing = Pacing::from_config(&ScrapeConfig::default().without_delays());
        assert_eq!(pacing.startup, (Duration::ZERO, Duration::ZERO));
        assert_eq!(pacing.submit, (Duration::ZERO, Duration::ZERO));
    }

    #[test]
    fn test_default_config_enables_jitter() {
        let pacing = Pacing::from_config(&ScrapeConfig::default());
        assert_eq!(pacing.submit, (Duration::from_secs(2), Duration::from_secs(5)));
        assert!(pacing.startup.1 > Duration::ZERO);
    }

    #[tokio::test]
    async fn test_none_returns_immediately() {
        // Would hang the test if it actually slept
        tokio::time::timeout(Duration::from_millis(50), async {
            Pacing::none().startup_jitter().await;
            Pacing::none().submit_delay().await;
        })
        .await
        .unwrap();
    }
}
