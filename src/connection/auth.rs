use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::protocol::auth_plugin::AuthPlugin;

/// Compute the challenge response for the handshake, or for an
/// auth-switch request carrying a fresh challenge.
///
/// An empty password always answers with an empty response.
pub(crate) fn scramble(plugin: AuthPlugin, password: &str, nonce: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }

    match plugin {
        AuthPlugin::MySqlNativePassword => scramble_sha1(password, nonce),
        AuthPlugin::CachingSha2Password => scramble_sha256(password, nonce),
    }
}

// SHA1( password ) ^ SHA1( nonce + SHA1( SHA1( password ) ) )
// https://mariadb.com/kb/en/connection/#mysql_native_password-plugin
fn scramble_sha1(password: &str, nonce: &[u8]) -> Vec<u8> {
    let mut ctx = Sha1::new();

    ctx.update(password);

    let mut pw_hash = ctx.finalize_reset();

    ctx.update(pw_hash);

    let pw_hash_hash = ctx.finalize_reset();

    ctx.update(nonce);
    ctx.update(pw_hash_hash);

    let nonce_hash = ctx.finalize();

    xor_eq(&mut pw_hash, &nonce_hash);

    pw_hash.to_vec()
}

// SHA256( password ) ^ SHA256( SHA256( SHA256( password ) ) + nonce )
// https://mariadb.com/kb/en/caching_sha2_password-authentication-plugin/#sha-2-encrypted-password
fn scramble_sha256(password: &str, nonce: &[u8]) -> Vec<u8> {
    let mut ctx = Sha256::new();

    ctx.update(password);

    let mut pw_hash = ctx.finalize_reset();

    ctx.update(pw_hash);

    let pw_hash_hash = ctx.finalize_reset();

    ctx.update(pw_hash_hash);
    ctx.update(nonce);

    let nonce_hash = ctx.finalize();

    xor_eq(&mut pw_hash, &nonce_hash);

    pw_hash.to_vec()
}

fn xor_eq(x: &mut [u8], y: &[u8]) {
    debug_assert_eq!(x.len(), y.len());

    for (x, y) in x.iter_mut().zip(y) {
        *x ^= y;
    }
}

#[cfg(test)]
mod tests {
    use sha1::Sha1;
    use sha2::{Digest, Sha256};

    use super::scramble;
    use crate::protocol::auth_plugin::AuthPlugin;

    const NONCE: &[u8] = b"?~~|vZAuJQ8cihP4Q}Dx";

    #[test]
    fn empty_password_answers_empty() {
        assert!(scramble(AuthPlugin::MySqlNativePassword, "", NONCE).is_empty());
        assert!(scramble(AuthPlugin::CachingSha2Password, "", NONCE).is_empty());
    }

    #[test]
    fn native_scramble_matches_formula() {
        let response = scramble(AuthPlugin::MySqlNativePassword, "secret", NONCE);

        let pw_hash = Sha1::digest(b"secret");
        let pw_hash_hash = Sha1::digest(pw_hash);

        let mut ctx = Sha1::new();
        ctx.update(NONCE);
        ctx.update(pw_hash_hash);
        let nonce_hash = ctx.finalize();

        let expected: Vec<u8> = pw_hash
            .iter()
            .zip(nonce_hash.iter())
            .map(|(a, b)| a ^ b)
            .collect();

        assert_eq!(response.len(), 20);
        assert_eq!(response, expected);
    }

    #[test]
    fn sha256_scramble_matches_formula() {
        let response = scramble(AuthPlugin::CachingSha2Password, "secret", NONCE);

        let pw_hash = Sha256::digest(b"secret");
        let pw_hash_hash = Sha256::digest(pw_hash);

        let mut ctx = Sha256::new();
        ctx.update(pw_hash_hash);
        ctx.update(NONCE);
        let nonce_hash = ctx.finalize();

        let expected: Vec<u8> = pw_hash
            .iter()
            .zip(nonce_hash.iter())
            .map(|(a, b)| a ^ b)
            .collect();

        assert_eq!(response.len(), 32);
        assert_eq!(response, expected);
    }

    #[test]
    fn scramble_depends_on_nonce() {
        let a = scramble(AuthPlugin::MySqlNativePassword, "secret", NONCE);
        let b = scramble(AuthPlugin::MySqlNativePassword, "secret", b"AAAAAAAAAAAAAAAAAAAA");

        assert_ne!(a, b);
    }
}
