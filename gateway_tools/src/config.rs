use log::*;
use mps_common::Secret;

/// Which keyset the adapters load. Test keys in dev, live keys in prod; nothing else differs
/// between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GatewayEnvironment {
    #[default]
    Dev,
    Prod,
}

impl GatewayEnvironment {
    pub fn from_env() -> Self {
        match std::env::var("MPS_ENVIRONMENT").map(|s| s.to_lowercase()) {
            Ok(s) if s == "prod" || s == "production" => Self::Prod,
            Ok(_) | Err(_) => {
                info!("MPS_ENVIRONMENT is not 'prod'; using the dev (test key) gateway configuration");
                Self::Dev
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    pub environment: GatewayEnvironment,
    pub paystack_secret_key: Secret<String>,
    pub stripe_secret_key: Secret<String>,
    pub stripe_webhook_secret: Secret<String>,
}

impl GatewayConfig {
    pub fn new_from_env_or_default() -> Self {
        let environment = GatewayEnvironment::from_env();
        let (paystack_var, stripe_var, webhook_var) = match environment {
            GatewayEnvironment::Prod => {
                ("MPS_PAYSTACK_LIVE_SECRET_KEY", "MPS_STRIPE_LIVE_SECRET_KEY", "MPS_STRIPE_LIVE_WEBHOOK_SECRET")
            },
            GatewayEnvironment::Dev => {
                ("MPS_PAYSTACK_TEST_SECRET_KEY", "MPS_STRIPE_TEST_SECRET_KEY", "MPS_STRIPE_TEST_WEBHOOK_SECRET")
            },
        };
        let paystack_secret_key = Secret::new(std::env::var(paystack_var).unwrap_or_else(|_| {
            warn!("{paystack_var} not set, using a (probably useless) default");
            "sk_test_00000000000000".to_string()
        }));
        let stripe_secret_key = Secret::new(std::env::var(stripe_var).unwrap_or_else(|_| {
            warn!("{stripe_var} not set, using a (probably useless) default");
            "sk_test_00000000000000".to_string()
        }));
        let stripe_webhook_secret = Secret::new(std::env::var(webhook_var).unwrap_or_else(|_| {
            warn!("{webhook_var} not set, using a (probably useless) default");
            "whsec_00000000000000".to_string()
        }));
        Self { environment, paystack_secret_key, stripe_secret_key, stripe_webhook_secret }
    }
}
