//! Authentication: token issuance and validation, revocation, and the
//! refresh token transport codec

pub mod codec;
pub mod cookie;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod revocation;

pub use codec::{CodecError, RefreshCodec};
pub use self::cookie::CookieSettings;
pub use jwt::{Claims, JwtError, JwtManager, TokenKind, TokenPair};
pub use middleware::{bearer_token, parse_bearer, require_auth, AuthUser};
pub use password::{verify_password, PasswordError};
pub use revocation::{
    MemoryRevocationStore, RedisRevocationStore, RevocationError, RevocationStore,
};
