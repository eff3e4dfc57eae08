//! Password hashing for new accounts.

use argon2::{
  Argon2, PasswordHasher,
  password_hash::{self, SaltString},
};
use rand_core::OsRng;

/// Hash `password` into an argon2 PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(
    Argon2::default()
      .hash_password(password.as_bytes(), &salt)?
      .to_string(),
  )
}

#[cfg(test)]
mod tests {
  use argon2::{PasswordHash, PasswordVerifier};

  use super::*;

  #[test]
  fn hash_verifies_and_is_salted() {
    let a = hash_password("hunter2").unwrap();
    let b = hash_password("hunter2").unwrap();
    assert_ne!(a, b);
    assert!(a.starts_with("$argon2id$"));

    let parsed = PasswordHash::new(&a).unwrap();
    assert!(Argon2::default().verify_password(b"hunter2", &parsed).is_ok());
    assert!(Argon2::default().verify_password(b"wrong", &parsed).is_err());
  }
}
