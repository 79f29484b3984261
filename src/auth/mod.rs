pub mod oauth;
pub mod session;
pub mod token;
pub mod token_store;

pub use oauth::ClientSecrets;
pub use session::{AuthSession, GoogleOAuth, TokenExchanger};
pub use token::TokenSet;
pub use token_store::{FileTokenStore, TokenStore};
