//! Account linking: PKCE material, the OAuth session controller, the typed
//! exchange client, and the confidential exchange proxy.

pub mod controller;
pub mod exchange;
pub mod pkce;
pub mod proxy;

pub use controller::{AuthorizationRequest, CallbackParams, OAuthController, parse_callback_url};
pub use exchange::{ExchangeClient, ExchangeSuccess, ProviderProfile, TokenBundle};
