use crate::token::TokenSigner;

/// Shared application state, generic over the store and notifier backends
pub struct AppState<S, N> {
    pub signer: TokenSigner,
    pub cookie_domain: String,
    pub store: S,
    pub notifier: N,
}

impl<S, N> AppState<S, N> {
    pub fn new(
        signer: TokenSigner,
        cookie_domain: impl Into<String>,
        store: S,
        notifier: N,
    ) -> Self {
        Self {
            signer,
            cookie_domain: cookie_domain.into(),
            store,
            notifier,
        }
    }
}
