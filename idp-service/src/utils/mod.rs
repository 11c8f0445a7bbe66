pub mod password;
pub mod tokens;
pub mod validation;

pub use password::{generated_password, hash_password, verify_password, Password, PasswordHashString};
pub use tokens::{generate_token, secure_compare};
pub use validation::ValidatedJson;
