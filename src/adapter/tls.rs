use log::*;
use std::sync::Once;

static INSTALL_PROVIDER: Once = Once::new();

/// Install ring as the process-wide rustls crypto provider.
///
/// Both the ring and aws-lc-rs backends end up enabled, so rustls cannot
/// pick one itself. Must run before any client is built.
pub(crate) fn install_crypto_provider() {
    INSTALL_PROVIDER.call_once(|| {
        if rustls::crypto::ring::default_provider()
            .install_default()
            .is_err()
        {
            debug!("rustls crypto provider already installed by host program");
        }
    });
}
