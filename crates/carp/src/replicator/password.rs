//! Passwords for backend accounts created by replication.

use rand::Rng;

/// Length of generated backend account passwords.
pub const PASSWORD_LENGTH: usize = 64;

const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

/// Generate a random password for a backend account.
///
/// Users always log in through SSO, so nobody ever needs to know it.
pub fn generate_password() -> String {
    let mut rng = rand::rng();
    (0..PASSWORD_LENGTH)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}
